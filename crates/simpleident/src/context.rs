//! Shared application state: one store per entity kind plus the engines built on them.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;

use crate::accounts::AccountRegistry;
use crate::clients::ClientRegistry;
use crate::config::{Config, files};
use crate::error::StoreResult;
use crate::models::{AccessToken, IssuedCode};
use crate::password::{Argon2Config, Argon2Verifier, CredentialVerifier};
use crate::server::oauth::{AuthorizationEngine, TokenExchangeEngine};
use crate::server::session::SessionManager;
use crate::store::{Record, RecordStore};

/// Everything a request handler needs.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Config,
    pub clients: ClientRegistry,
    pub accounts: AccountRegistry,
    pub codes: RecordStore<IssuedCode>,
    pub tokens: RecordStore<AccessToken>,
    pub sessions: SessionManager,
    pub authorizer: AuthorizationEngine,
    pub token_exchange: TokenExchangeEngine,
}

impl AppContext {
    /// Open the stores named by `config` and wire up the engines.
    ///
    /// # Errors
    ///
    /// Returns error if a persisted document cannot be read or decoded, or the
    /// Argon2 parameters are invalid.
    pub async fn open(config: Config) -> anyhow::Result<Self> {
        let client_store = open_store(config.document_path(files::CLIENTS)).await?;
        let account_store = open_store(config.document_path(files::ACCOUNTS)).await?;
        let codes = open_store(config.document_path(files::CODES)).await?;
        let tokens = open_store(config.document_path(files::ACCESS_TOKENS)).await?;

        let argon2 = if config.fast_password_hashing {
            Argon2Config::testing()
        } else {
            Argon2Config::default()
        };
        let verifier: Arc<dyn CredentialVerifier> = Arc::new(Argon2Verifier::new(argon2)?);

        let clients = ClientRegistry::new(client_store);
        let accounts = AccountRegistry::new(account_store, verifier);
        let sessions = SessionManager::new(config.session_idle_timeout);

        let authorizer = AuthorizationEngine::new(
            clients.clone(),
            accounts.clone(),
            codes.clone(),
            config.code_lifetime,
        );
        let token_exchange = TokenExchangeEngine::new(
            accounts.clone(),
            codes.clone(),
            tokens.clone(),
            config.token_lifetime,
        );

        tracing::info!(
            clients = clients.list().await.len(),
            accounts = accounts.list().await.len(),
            durable = config.data_dir.is_some(),
            "Stores opened"
        );

        Ok(Self { config, clients, accounts, codes, tokens, sessions, authorizer, token_exchange })
    }

    /// Remove expired codes and tokens. Returns the number of records removed.
    pub async fn sweep_expired(&self) -> StoreResult<usize> {
        let now = Utc::now();
        let codes = self.codes.retain(|c| !c.is_expired_at(now)).await?;
        let tokens = self.tokens.retain(|t| !t.is_expired_at(now)).await?;
        Ok(codes + tokens)
    }

    /// Start the periodic sweep of expired records and idle sessions.
    pub fn start_background_tasks(&self) {
        let interval = self.config.cleanup_interval;
        self.sessions.clone().start_cleanup_task(interval);

        let ctx = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                match ctx.sweep_expired().await {
                    Ok(0) => {}
                    Ok(removed) => tracing::debug!(removed, "Expired records swept"),
                    Err(e) => tracing::warn!(error = %e, "Expired record sweep failed"),
                }
            }
        });
    }
}

async fn open_store<T: Record>(path: Option<PathBuf>) -> StoreResult<RecordStore<T>> {
    match path {
        Some(path) => RecordStore::open(path).await,
        None => Ok(RecordStore::in_memory()),
    }
}
