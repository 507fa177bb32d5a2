//! Configuration for the identity provider.

use std::path::PathBuf;
use std::time::Duration;

/// Default lifetimes and intervals.
pub mod defaults {
    use std::time::Duration;

    /// Authorization code lifetime with durable storage.
    pub const AUTHORIZATION_CODE_LIFETIME: Duration = Duration::from_secs(5 * 60);

    /// Authorization code lifetime for the in-memory variant.
    pub const AUTHORIZATION_CODE_LIFETIME_IN_MEMORY: Duration = Duration::from_secs(60);

    /// Access token lifetime (1 hour).
    pub const ACCESS_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

    /// Idle time after which a session is dropped.
    pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

    /// Interval of the expired-record sweep.
    pub const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

    /// Listen port.
    pub const PORT: u16 = 8080;

    /// Data directory for the JSON documents.
    pub const DATA_DIR: &str = "tmp";
}

/// File names of the persisted documents, one per entity kind.
pub mod files {
    pub const ACCOUNTS: &str = "accounts.json";
    pub const CLIENTS: &str = "oauth2-clients.json";
    pub const CODES: &str = "oauth2-codes.json";
    pub const ACCESS_TOKENS: &str = "oauth2-access-tokens.json";
}

/// Credentials guarding the admin API.
#[derive(Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for AdminCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminCredentials").field("username", &self.username).finish()
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen port.
    pub port: u16,

    /// Directory holding the JSON documents; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,

    /// Authorization code lifetime.
    pub code_lifetime: Duration,

    /// Access token lifetime.
    pub token_lifetime: Duration,

    /// Session idle timeout.
    pub session_idle_timeout: Duration,

    /// Interval of the expired-record sweep.
    pub cleanup_interval: Duration,

    /// Admin API credentials; the admin API is disabled when absent.
    pub admin: Option<AdminCredentials>,

    /// Use the cheap Argon2 parameter set (tests only).
    pub fast_password_hashing: bool,
}

impl Config {
    /// Create a configuration persisting under `data_dir`, or in memory when `None`.
    ///
    /// The code lifetime follows the storage mode: 5 minutes durable, 1 minute in memory.
    #[must_use]
    pub fn new(data_dir: Option<PathBuf>, admin: Option<AdminCredentials>) -> Self {
        let code_lifetime = if data_dir.is_some() {
            defaults::AUTHORIZATION_CODE_LIFETIME
        } else {
            defaults::AUTHORIZATION_CODE_LIFETIME_IN_MEMORY
        };
        Self {
            port: defaults::PORT,
            data_dir,
            code_lifetime,
            token_lifetime: defaults::ACCESS_TOKEN_LIFETIME,
            session_idle_timeout: defaults::SESSION_IDLE_TIMEOUT,
            cleanup_interval: defaults::CLEANUP_INTERVAL,
            admin,
            fast_password_hashing: false,
        }
    }

    /// In-memory configuration with admin credentials `admin`/`admin-password`.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            data_dir: None,
            admin: Some(AdminCredentials {
                username: "admin".to_string(),
                password: "admin-password".to_string(),
            }),
            fast_password_hashing: true,
            ..Self::new(None, None)
        }
    }

    /// Create configuration from environment variables.
    ///
    /// `SIMPLEIDENT_DATA_DIR` (default `tmp`, or in memory when
    /// `SIMPLEIDENT_IN_MEMORY` is set), `SIMPLEIDENT_ADMIN_USER` and
    /// `SIMPLEIDENT_ADMIN_PASSWORD`, `PORT`.
    pub fn from_env() -> anyhow::Result<Self> {
        let in_memory = std::env::var("SIMPLEIDENT_IN_MEMORY").is_ok();
        let data_dir = if in_memory {
            None
        } else {
            Some(PathBuf::from(
                std::env::var("SIMPLEIDENT_DATA_DIR")
                    .unwrap_or_else(|_| defaults::DATA_DIR.to_string()),
            ))
        };

        let admin = match (
            std::env::var("SIMPLEIDENT_ADMIN_USER").ok(),
            std::env::var("SIMPLEIDENT_ADMIN_PASSWORD").ok(),
        ) {
            (Some(username), Some(password)) => Some(AdminCredentials { username, password }),
            (None, None) => None,
            _ => anyhow::bail!(
                "SIMPLEIDENT_ADMIN_USER and SIMPLEIDENT_ADMIN_PASSWORD must be set together"
            ),
        };

        let mut config = Self::new(data_dir, admin);
        if let Ok(port) = std::env::var("PORT") {
            config.port = port.parse()?;
        }
        Ok(config)
    }

    /// Check if the admin API is enabled.
    #[must_use]
    pub const fn has_admin(&self) -> bool {
        self.admin.is_some()
    }

    /// Path of a persisted document, if storage is durable.
    #[must_use]
    pub fn document_path(&self, file: &str) -> Option<PathBuf> {
        self.data_dir.as_ref().map(|dir| dir.join(file))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(Some(PathBuf::from(defaults::DATA_DIR)), None)
    }
}
