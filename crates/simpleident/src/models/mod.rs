//! Persisted entities.
//!
//! Every entity carries a time-sortable `Uuid` (v7) and a creation timestamp.
//! Records are plain values; stores hand out clones.

pub mod account;
pub mod client;
pub mod grant;

pub use account::{Account, AccountSummary};
pub use client::Client;
pub use grant::{AccessToken, IssuedCode};
