use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::mongodb::Id;

/// A vote submission.
///
/// Fields default to empty so that a missing field is reported as a
/// validation error rather than a malformed body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    #[serde(default)]
    pub session_id: String,
    #[serde(default)]
    pub contestant_id: String,
}

impl VoteRequest {
    pub fn new(session_id: impl Into<String>, contestant_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            contestant_id: contestant_id.into(),
        }
    }

    /// Check both fields are present and the contestant ID is well-formed.
    pub fn validate(self) -> Result<(String, Id)> {
        let session_id = self.session_id.trim();
        let contestant_id = self.contestant_id.trim();
        if session_id.is_empty() || contestant_id.is_empty() {
            return Err(Error::Validation(
                "Both sessionId and contestantId are required".to_string(),
            ));
        }
        let contestant_id = contestant_id.parse::<Id>().map_err(|_| {
            Error::Validation(format!("Malformed contestant ID '{contestant_id}'"))
        })?;
        Ok((session_id.to_string(), contestant_id))
    }
}

/// Whether a voter session already has a recorded vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct VoteCheck {
    pub voted: bool,
}
