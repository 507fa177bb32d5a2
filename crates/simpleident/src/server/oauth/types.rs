//! OAuth 2.0 request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Client;

/// Only supported `response_type`.
pub const RESPONSE_TYPE_CODE: &str = "code";

/// Only supported `grant_type`.
pub const GRANT_TYPE_AUTHORIZATION_CODE: &str = "authorization_code";

/// Query of `GET /oauth2/authorize`. Absent parameters are empty strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AuthorizeRequest {
    pub response_type: String,
    pub client_id: String,
    pub redirect_uri: String,
    pub state: String,
}

/// Result of the first authorize leg.
#[derive(Debug, Clone)]
pub struct AuthorizationPrompt {
    /// No account is bound to the session; the caller must send the user to sign in first.
    pub needs_login: bool,
    pub client: Client,
    /// Redirect URI the code will be delivered to.
    pub redirect_uri: String,
}

/// Form body of `POST /oauth2/token`. Absent fields are empty strings.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TokenRequest {
    pub grant_type: String,
    pub code: String,
    pub client_id: String,
    pub redirect_uri: String,
}

/// Successful token response (RFC 6749 §5.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    /// Always empty: refresh tokens are not issued.
    pub refresh_token: String,
}

/// Body of `GET /api/userinfo`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    pub id: Uuid,
    pub username: String,
}
