use chrono::{DateTime, Utc};
use rocket::fs::TempFile;
use serde::{Deserialize, Serialize};

use crate::model::{common::results::Tallied, db::contestant::Contestant};

/// API-friendly representation of a contestant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestantDesc {
    pub id: String,
    pub name: String,
    pub image_url: String,
    pub vote_count: u64,
    pub created_at: DateTime<Utc>,
}

impl From<Contestant> for ContestantDesc {
    fn from(contestant: Contestant) -> Self {
        Self {
            id: contestant.id.to_string(),
            name: contestant.contestant.name,
            image_url: contestant.contestant.image_url,
            vote_count: contestant.contestant.vote_count,
            created_at: contestant.contestant.created_at,
        }
    }
}

impl Tallied for ContestantDesc {
    fn tally(&self) -> u64 {
        self.vote_count
    }
}

/// Multipart upload of a new contestant.
///
/// Every field is optional at the form level so that missing fields surface
/// as our own validation and authorization errors.
#[derive(Debug, FromForm)]
pub struct NewContestantForm<'r> {
    pub name: Option<String>,
    pub image: Option<TempFile<'r>>,
    pub password: Option<String>,
}

/// Multipart edit of an existing contestant's name and/or photo.
#[derive(Debug, FromForm)]
pub struct ContestantUpdateForm<'r> {
    pub name: Option<String>,
    pub image: Option<TempFile<'r>>,
    pub password: Option<String>,
}

/// Deletion request. The image URL is accepted for compatibility, but the
/// stored URL is what gets removed.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestantDeletion {
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub password: String,
}

/// Response to a successful contestant creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedContestant {
    pub id: String,
    pub image_url: String,
}

/// Trim a submitted display name, rejecting blank ones.
pub fn clean_name(name: &str) -> Option<String> {
    let trimmed = name.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_trimmed() {
        assert_eq!(clean_name("  Ada "), Some("Ada".to_string()));
        assert_eq!(clean_name(""), None);
        assert_eq!(clean_name(" \t\n"), None);
    }
}
