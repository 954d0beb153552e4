//! Aggregate statistics over a contestant list.
//!
//! Everything here is recomputed from scratch on every call; there is no
//! cached or incremental state.

use std::cmp::Reverse;

/// Anything carrying a vote tally.
pub trait Tallied {
    fn tally(&self) -> u64;
}

impl<T: Tallied> Tallied for &T {
    fn tally(&self) -> u64 {
        (*self).tally()
    }
}

/// Sum of all tallies.
pub fn total<T: Tallied>(contestants: &[T]) -> u64 {
    contestants.iter().map(Tallied::tally).sum()
}

/// Greatest tally present, or 0 for an empty list.
pub fn max<T: Tallied>(contestants: &[T]) -> u64 {
    contestants.iter().map(Tallied::tally).max().unwrap_or(0)
}

/// Every contestant sharing the greatest tally. An all-zero field has no leader.
pub fn leaders<T: Tallied>(contestants: &[T]) -> Vec<&T> {
    let max = max(contestants);
    if max == 0 {
        return Vec::new();
    }
    contestants.iter().filter(|c| c.tally() == max).collect()
}

/// Share of `total` held by `contestant`, in percent. Zero if nobody has voted.
pub fn percentage<T: Tallied>(contestant: &T, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        contestant.tally() as f64 / total as f64 * 100.0
    }
}

/// Mean tally per contestant, or 0 for an empty list.
pub fn average<T: Tallied>(contestants: &[T]) -> f64 {
    if contestants.is_empty() {
        0.0
    } else {
        total(contestants) as f64 / contestants.len() as f64
    }
}

/// Contestants by descending tally. Equal tallies keep their input order.
pub fn ranking<T: Tallied>(contestants: &[T]) -> Vec<&T> {
    let mut ranked = contestants.iter().collect::<Vec<_>>();
    ranked.sort_by_key(|c| Reverse(c.tally()));
    ranked
}

/// Round to one decimal place for display.
pub fn to_tenths(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    struct Entry(&'static str, u64);

    impl Tallied for Entry {
        fn tally(&self) -> u64 {
            self.1
        }
    }

    fn names(entries: Vec<&Entry>) -> Vec<&'static str> {
        entries.into_iter().map(|e| e.0).collect()
    }

    #[test]
    fn tied_leaders() {
        let field = vec![Entry("A", 3), Entry("B", 3), Entry("C", 1)];

        assert_eq!(total(&field), 7);
        assert_eq!(max(&field), 3);
        assert_eq!(names(leaders(&field)), vec!["A", "B"]);
        assert_eq!(to_tenths(percentage(&field[0], 7)), 42.9);
        assert_eq!(to_tenths(percentage(&field[1], 7)), 42.9);
        assert_eq!(to_tenths(percentage(&field[2], 7)), 14.3);
        assert_eq!(to_tenths(average(&field)), 2.3);
    }

    #[test]
    fn empty_field() {
        let field: Vec<Entry> = Vec::new();

        assert_eq!(total(&field), 0);
        assert_eq!(max(&field), 0);
        assert!(leaders(&field).is_empty());
        assert_eq!(average(&field), 0.0);
        assert!(ranking(&field).is_empty());
    }

    #[test]
    fn no_votes_no_leader() {
        let field = vec![Entry("A", 0), Entry("B", 0)];

        assert!(leaders(&field).is_empty());
        for entry in &field {
            assert_eq!(percentage(entry, total(&field)), 0.0);
        }
        assert_eq!(average(&field), 0.0);
    }

    #[test]
    fn percentages_sum_to_hundred() {
        let fields = vec![
            vec![Entry("A", 1)],
            vec![Entry("A", 1), Entry("B", 2)],
            vec![Entry("A", 3), Entry("B", 3), Entry("C", 1)],
            vec![Entry("A", 7), Entry("B", 0), Entry("C", 13), Entry("D", 999)],
        ];
        for field in fields {
            let total = total(&field);
            let sum: f64 = field.iter().map(|e| percentage(e, total)).sum();
            assert!((sum - 100.0).abs() < 1e-9, "sum was {sum}");
        }
    }

    #[test]
    fn leaders_match_maximum() {
        let field = vec![Entry("A", 5), Entry("B", 2), Entry("C", 5), Entry("D", 4)];
        let leaders = leaders(&field);

        assert_eq!(names(leaders.clone()), vec!["A", "C"]);
        assert!(leaders.iter().all(|e| e.1 == max(&field)));
    }

    #[test]
    fn ranking_is_stable() {
        let field = vec![
            Entry("A", 1),
            Entry("B", 4),
            Entry("C", 1),
            Entry("D", 4),
            Entry("E", 0),
        ];

        assert_eq!(names(ranking(&field)), vec!["B", "D", "A", "C", "E"]);
    }
}
