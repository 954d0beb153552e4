use serde::{Deserialize, Serialize};

/// The shared admin secret, resubmitted with every admin request.
#[derive(Clone, Default, Deserialize, Serialize)]
pub struct AdminCredential {
    #[serde(default)]
    pub password: String,
}

impl AdminCredential {
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

// Never print the secret.
impl std::fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredential")
            .field("password", &"<redacted>")
            .finish()
    }
}
