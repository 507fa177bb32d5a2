//! Authorization codes and access tokens.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An authorization code issued after the user approved a client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedCode {
    pub id: Uuid,
    pub client_id: Uuid,
    pub account_id: Uuid,
    pub code: String,
    /// Redirect URI the code was delivered to.
    pub redirect_uri: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Set once the code has been exchanged for a token.
    #[serde(default)]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl IssuedCode {
    /// Check if the code has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    #[must_use]
    pub const fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }
}

/// A bearer token granting the privileges of `account_id` to `client_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: Uuid,
    pub client_id: Uuid,
    pub account_id: Uuid,
    pub token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// Check if the token has expired at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }
}
