use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub const SCHEDULE_NOT_SET: &str = "Voting schedule not set";
pub const VOTING_ENDED: &str = "Voting has ended";

/// Phases of the voting window.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VotingState {
    /// Not yet open, or no schedule configured.
    Before,
    /// Votes are being accepted.
    Active,
    /// Closed for good.
    Ended,
}

/// The evaluated state of the voting window at some instant, with a
/// human-readable message for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VotingStatus {
    pub state: VotingState,
    pub message: String,
    /// False when no complete window has been configured.
    pub scheduled: bool,
}

impl VotingStatus {
    pub fn is_active(&self) -> bool {
        self.state == VotingState::Active
    }

    /// One line describing the window, countdowns included.
    pub fn describe(&self) -> String {
        match self.state {
            VotingState::Before if !self.scheduled => self.message.clone(),
            VotingState::Before => format!("Voting opens in {}", self.message),
            VotingState::Active => format!("Voting is open, closing in {}", self.message),
            VotingState::Ended => self.message.clone(),
        }
    }
}

/// The configured voting window. Either bound may be missing, in which case
/// voting is not scheduled at all.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct VotingWindow {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl VotingWindow {
    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    /// Evaluate the window at `now`. The window is half-open: `start` is
    /// inside it and `end` is not.
    pub fn evaluate(&self, now: DateTime<Utc>) -> VotingStatus {
        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) => (start, end),
            _ => {
                return VotingStatus {
                    state: VotingState::Before,
                    message: SCHEDULE_NOT_SET.to_string(),
                    scheduled: false,
                }
            }
        };

        if now < start {
            VotingStatus {
                state: VotingState::Before,
                message: format_countdown(start - now),
                scheduled: true,
            }
        } else if now < end {
            VotingStatus {
                state: VotingState::Active,
                message: format_countdown(end - now),
                scheduled: true,
            }
        } else {
            VotingStatus {
                state: VotingState::Ended,
                message: VOTING_ENDED.to_string(),
                scheduled: true,
            }
        }
    }
}

/// Render a remaining duration as `Dd Hh Mm Ss`, dropping leading units
/// while they are zero, down to a minimum of `Mm Ss`.
///
/// Negative durations are treated as zero.
pub fn format_countdown(remaining: Duration) -> String {
    let millis = remaining.num_milliseconds().max(0);
    let total_seconds = millis / 1000;

    let days = total_seconds / 86_400;
    let hours = (total_seconds % 86_400) / 3_600;
    let minutes = (total_seconds % 3_600) / 60;
    let seconds = total_seconds % 60;

    if days > 0 {
        format!("{days}d {hours}h {minutes}m {seconds}s")
    } else if hours > 0 {
        format!("{hours}h {minutes}m {seconds}s")
    } else {
        format!("{minutes}m {seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    /// Parse a rendered countdown back into whole seconds.
    fn countdown_seconds(rendered: &str) -> i64 {
        rendered
            .split(' ')
            .map(|part| {
                let (value, unit) = part.split_at(part.len() - 1);
                let value: i64 = value.parse().unwrap();
                match unit {
                    "d" => value * 86_400,
                    "h" => value * 3_600,
                    "m" => value * 60,
                    "s" => value,
                    _ => panic!("unexpected unit in {rendered:?}"),
                }
            })
            .sum()
    }

    #[test]
    fn unscheduled() {
        let expected = VotingStatus {
            state: VotingState::Before,
            message: SCHEDULE_NOT_SET.to_string(),
            scheduled: false,
        };
        assert_eq!(VotingWindow::default().evaluate(at(0)), expected);
        assert_eq!(VotingWindow::new(Some(at(0)), None).evaluate(at(5)), expected);
        assert_eq!(VotingWindow::new(None, Some(at(10))).evaluate(at(5)), expected);
    }

    #[test]
    fn phases_and_boundaries() {
        let window = VotingWindow::new(Some(at(100)), Some(at(200)));

        let before = window.evaluate(at(40));
        assert_eq!(before.state, VotingState::Before);
        assert_eq!(before.message, "1m 0s");

        // Exactly at the start, voting is open.
        let opening = window.evaluate(at(100));
        assert_eq!(opening.state, VotingState::Active);
        assert_eq!(opening.message, "1m 40s");
        assert!(opening.is_active());

        let last_second = window.evaluate(at(199));
        assert_eq!(last_second.state, VotingState::Active);
        assert_eq!(last_second.message, "0m 1s");

        // Exactly at the end, voting is closed.
        let closing = window.evaluate(at(200));
        assert_eq!(closing.state, VotingState::Ended);
        assert_eq!(closing.message, VOTING_ENDED);

        assert_eq!(window.evaluate(at(10_000)).state, VotingState::Ended);
    }

    #[test]
    fn descriptions() {
        assert_eq!(VotingWindow::default().evaluate(at(0)).describe(), SCHEDULE_NOT_SET);

        let window = VotingWindow::new(Some(at(100)), Some(at(200)));
        assert_eq!(window.evaluate(at(40)).describe(), "Voting opens in 1m 0s");
        assert_eq!(
            window.evaluate(at(195)).describe(),
            "Voting is open, closing in 0m 5s"
        );
        assert_eq!(window.evaluate(at(200)).describe(), VOTING_ENDED);

        // The unscheduled case is told apart by the flag, not the wording.
        let countdown = VotingStatus {
            state: VotingState::Before,
            message: SCHEDULE_NOT_SET.to_string(),
            scheduled: true,
        };
        assert_eq!(
            countdown.describe(),
            format!("Voting opens in {SCHEDULE_NOT_SET}")
        );
    }

    #[test]
    fn boundaries_at_millisecond_precision() {
        let start = at(100);
        let end = at(200);
        let window = VotingWindow::new(Some(start), Some(end));
        let one_ms = Duration::milliseconds(1);

        assert_eq!(window.evaluate(start - one_ms).state, VotingState::Before);
        assert_eq!(window.evaluate(start).state, VotingState::Active);
        assert_eq!(window.evaluate(end - one_ms).state, VotingState::Active);
        assert_eq!(window.evaluate(end).state, VotingState::Ended);
    }

    #[test]
    fn empty_or_inverted_window_never_active() {
        let empty = VotingWindow::new(Some(at(100)), Some(at(100)));
        assert_eq!(empty.evaluate(at(99)).state, VotingState::Before);
        assert_eq!(empty.evaluate(at(100)).state, VotingState::Ended);

        let inverted = VotingWindow::new(Some(at(200)), Some(at(100)));
        for t in [0, 100, 150, 200, 300] {
            assert_ne!(inverted.evaluate(at(t)).state, VotingState::Active);
        }
    }

    #[test]
    fn countdown_formats() {
        assert_eq!(format_countdown(Duration::zero()), "0m 0s");
        assert_eq!(format_countdown(Duration::milliseconds(999)), "0m 0s");
        assert_eq!(format_countdown(Duration::seconds(59)), "0m 59s");
        assert_eq!(format_countdown(Duration::seconds(61)), "1m 1s");
        assert_eq!(format_countdown(Duration::seconds(3_600)), "1h 0m 0s");
        assert_eq!(format_countdown(Duration::seconds(3_661)), "1h 1m 1s");
        assert_eq!(format_countdown(Duration::seconds(86_400)), "1d 0h 0m 0s");
        assert_eq!(
            format_countdown(Duration::seconds(2 * 86_400 + 3 * 3_600 + 4 * 60 + 5)),
            "2d 3h 4m 5s"
        );
        assert_eq!(format_countdown(Duration::seconds(-30)), "0m 0s");
    }

    #[test]
    fn countdown_decreases_as_time_advances() {
        let window = VotingWindow::new(Some(at(0)), Some(at(2 * 86_400 + 7)));
        let mut previous = i64::MAX;
        let mut now = at(0);
        while window.evaluate(now).is_active() {
            let remaining = countdown_seconds(&window.evaluate(now).message);
            assert!(remaining < previous);
            previous = remaining;
            now = now + Duration::seconds(3_599);
        }
    }
}
