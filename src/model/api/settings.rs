use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{common::schedule::VotingWindow, db::settings::Settings};

/// API-friendly view of the voting schedule.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleDesc {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl ScheduleDesc {
    pub fn window(&self) -> VotingWindow {
        VotingWindow::new(self.start, self.end)
    }
}

impl From<Settings> for ScheduleDesc {
    fn from(settings: Settings) -> Self {
        let window = settings.window();
        Self {
            start: window.start,
            end: window.end,
            updated_at: settings.updated_at.to_chrono(),
        }
    }
}

/// An admin request to replace the voting window. Either bound may be null
/// to unschedule voting.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleUpdate {
    #[serde(default)]
    pub start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub password: String,
}

impl ScheduleUpdate {
    /// Reject windows that could never be open.
    pub fn validate(&self) -> Result<()> {
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(Error::Validation(
                    "Voting must end after it starts".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    #[test]
    fn window_validation() {
        let now = Utc::now();
        let update = |start, end| ScheduleUpdate {
            start,
            end,
            password: String::new(),
        };

        assert!(update(None, None).validate().is_ok());
        assert!(update(Some(now), None).validate().is_ok());
        assert!(update(None, Some(now)).validate().is_ok());
        assert!(update(Some(now), Some(now + Duration::hours(1)))
            .validate()
            .is_ok());
        assert!(update(Some(now), Some(now)).validate().is_err());
        assert!(update(Some(now + Duration::hours(1)), Some(now))
            .validate()
            .is_err());
    }
}
