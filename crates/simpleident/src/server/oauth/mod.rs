//! OAuth 2.0 authorization server.
//!
//! ## Supported Standards
//! - RFC 6749: Authorization Code Grant
//! - RFC 6750: Bearer Token Usage
//!
//! Refresh tokens, PKCE and scopes are not supported.

pub mod authorize;
pub mod handlers;
pub mod token;
pub mod types;

pub use authorize::{AuthorizationEngine, resolve_redirect_uri};
pub use token::TokenExchangeEngine;
