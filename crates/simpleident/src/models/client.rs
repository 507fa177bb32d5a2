//! Registered OAuth 2.0 client application.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A third-party application permitted to request authorization codes.
///
/// `callback_url` is the pre-registered redirect base: any redirect URI the
/// client asks for must start with it. `secrets` is append-only.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub callback_url: String,
    #[serde(default)]
    pub secrets: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("callback_url", &self.callback_url)
            .field("secrets", &self.secrets.len())
            .finish()
    }
}
