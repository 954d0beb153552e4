use chrono::{DateTime as ChronoDateTime, Utc};
use mongodb::{
    bson::{doc, Bson, DateTime},
    error::Error as DbError,
    options::UpdateOptions,
};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{common::schedule::VotingWindow, mongodb::Coll};

/// The settings collection holds exactly one document, with this ID.
pub const SETTINGS_ID: i32 = 1;

/// The singleton settings record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "_id")]
    pub id: i32,
    /// Voting opens at this instant. Absent means unscheduled.
    pub voting_start: Option<DateTime>,
    /// Voting closes at this instant. Absent means unscheduled.
    pub voting_end: Option<DateTime>,
    pub updated_at: DateTime,
}

impl Settings {
    /// Settings with no voting window configured.
    pub fn unscheduled() -> Self {
        Self {
            id: SETTINGS_ID,
            voting_start: None,
            voting_end: None,
            updated_at: DateTime::now(),
        }
    }

    /// The configured voting window.
    pub fn window(&self) -> VotingWindow {
        VotingWindow::new(
            self.voting_start.map(DateTime::to_chrono),
            self.voting_end.map(DateTime::to_chrono),
        )
    }

    /// Read the singleton. A missing record reads as unscheduled.
    pub async fn load(settings: &Coll<Settings>) -> Result<Self> {
        let current = settings
            .find_one(doc! { "_id": SETTINGS_ID }, None)
            .await?
            .unwrap_or_else(|| {
                warn!("Settings record missing, treating voting as unscheduled");
                Self::unscheduled()
            });
        Ok(current)
    }

    /// Replace the voting window and bump `updated_at`.
    pub async fn store_window(
        settings: &Coll<Settings>,
        start: Option<ChronoDateTime<Utc>>,
        end: Option<ChronoDateTime<Utc>>,
    ) -> Result<()> {
        let to_bson = |instant: Option<ChronoDateTime<Utc>>| {
            instant
                .map(|i| Bson::DateTime(DateTime::from_chrono(i)))
                .unwrap_or(Bson::Null)
        };
        let update = doc! {
            "$set": {
                "voting_start": to_bson(start),
                "voting_end": to_bson(end),
                "updated_at": DateTime::now(),
            }
        };
        let options = UpdateOptions::builder().upsert(true).build();
        settings
            .update_one(doc! { "_id": SETTINGS_ID }, update, options)
            .await?;
        Ok(())
    }
}

/// Ensure the settings singleton exists, without touching an existing one.
///
/// This operation is idempotent.
pub async fn ensure_settings_exist(settings: &Coll<Settings>) -> std::result::Result<(), DbError> {
    let update = doc! {
        "$setOnInsert": {
            "voting_start": Bson::Null,
            "voting_end": Bson::Null,
            "updated_at": DateTime::now(),
        }
    };
    let options = UpdateOptions::builder().upsert(true).build();
    let result = settings
        .update_one(doc! { "_id": SETTINGS_ID }, update, options)
        .await?;
    if result.upserted_id.is_some() {
        info!("Provisioned empty voting schedule");
    }
    Ok(())
}
