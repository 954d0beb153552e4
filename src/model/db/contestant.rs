use std::ops::{Deref, DerefMut};

use chrono::{DateTime, Utc};
use mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime;
use serde::{Deserialize, Serialize};

use crate::model::mongodb::Id;

/// Core contestant data, as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestantCore {
    /// Display name, never empty.
    pub name: String,
    /// Public URL of the contestant's photo.
    pub image_url: String,
    /// Number of votes received. Only ever changed by an atomic `$inc`,
    /// or zeroed by a reset.
    pub vote_count: u64,
    #[serde(with = "chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

impl ContestantCore {
    /// A contestant with no votes yet.
    pub fn new(name: String, image_url: String) -> Self {
        Self {
            name,
            image_url,
            vote_count: 0,
            created_at: Utc::now(),
        }
    }
}

/// A contestant without an ID.
pub type NewContestant = ContestantCore;

/// A contestant from the database, with its unique ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contestant {
    #[serde(rename = "_id")]
    pub id: Id,
    #[serde(flatten)]
    pub contestant: ContestantCore,
}

impl Deref for Contestant {
    type Target = ContestantCore;

    fn deref(&self) -> &Self::Target {
        &self.contestant
    }
}

impl DerefMut for Contestant {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.contestant
    }
}

/// Example data for tests.
#[cfg(test)]
mod examples {
    use super::*;

    impl ContestantCore {
        pub fn example_named(name: &str, vote_count: u64) -> Self {
            Self {
                name: name.to_string(),
                image_url: format!("http://localhost:8000/images/{}.png", name.to_lowercase()),
                vote_count,
                created_at: Utc::now(),
            }
        }

        pub fn example() -> Self {
            Self::example_named("Ada", 0)
        }
    }
}
