use serde::{Deserialize, Serialize};

use crate::model::{
    api::contestant::ContestantDesc,
    common::results::{self, to_tenths},
};

/// A contestant's position in the live ranking.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Standing {
    #[serde(flatten)]
    pub contestant: ContestantDesc,
    /// Share of all votes, in percent, to one decimal place.
    pub percentage: f64,
    /// True if this contestant is among the leaders.
    pub leading: bool,
}

/// Live aggregate results over every contestant.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Results {
    pub total: u64,
    pub max: u64,
    /// Mean votes per contestant, to one decimal place.
    pub average: f64,
    /// IDs of the contestants holding the maximum, in input order.
    pub leaders: Vec<String>,
    /// All contestants, most votes first.
    pub ranking: Vec<Standing>,
}

impl Results {
    /// Aggregate the given contestants. Order matters only for breaking
    /// ties in the ranking.
    pub fn from_contestants(contestants: &[ContestantDesc]) -> Self {
        let total = results::total(contestants);
        let leaders = results::leaders(contestants)
            .into_iter()
            .map(|c| c.id.clone())
            .collect::<Vec<_>>();
        let ranking = results::ranking(contestants)
            .into_iter()
            .map(|c| Standing {
                contestant: c.clone(),
                percentage: to_tenths(results::percentage(c, total)),
                leading: leaders.contains(&c.id),
            })
            .collect();

        Self {
            total,
            max: results::max(contestants),
            average: to_tenths(results::average(contestants)),
            leaders,
            ranking,
        }
    }
}
