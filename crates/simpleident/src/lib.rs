//! simpleident
//!
//! A small identity provider: password accounts, server-side sessions, and an
//! OAuth 2.0 authorization server issuing authorization codes and bearer
//! access tokens to registered clients.
//!
//! # Features
//!
//! - **Authorization code grant**: redirect URIs constrained to the client's
//!   registered callback URL, single-use expiring codes
//! - **Record store**: one JSON document per entity kind, consistent under
//!   concurrent requests, rolled back when a write fails
//! - **Admin API**: accounts, clients and client secrets over HTTP Basic auth
//!
//! # Example
//!
//! ```no_run
//! use simpleident::{config::Config, server::IdentityServer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     IdentityServer::new(config).await?.run_http().await
//! }
//! ```

pub mod accounts;
pub mod clients;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod password;
pub mod secret;
pub mod server;
pub mod store;

pub use config::Config;
pub use context::AppContext;
pub use error::{OAuthError, StoreError};
pub use store::RecordStore;
