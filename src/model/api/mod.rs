//! API-friendly types: request bodies, forms and response payloads.

use serde::{Deserialize, Serialize};

pub mod admin;
pub mod contestant;
pub mod results;
pub mod settings;
pub mod vote;

/// Acknowledgement of a successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct Done {
    pub success: bool,
}

impl Done {
    pub fn ok() -> Self {
        Self { success: true }
    }
}
