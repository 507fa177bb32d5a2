//! Account registry and password authentication.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::{OAuthError, OAuthResult, StoreError};
use crate::models::Account;
use crate::password::CredentialVerifier;
use crate::store::RecordStore;

/// Accounts keyed by id, unique by username.
#[derive(Clone)]
pub struct AccountRegistry {
    store: RecordStore<Account>,
    verifier: Arc<dyn CredentialVerifier>,
    /// Serializes registrations so the username check and the insert agree.
    registering: Arc<Mutex<()>>,
}

impl AccountRegistry {
    #[must_use]
    pub fn new(store: RecordStore<Account>, verifier: Arc<dyn CredentialVerifier>) -> Self {
        Self { store, verifier, registering: Arc::new(Mutex::new(())) }
    }

    /// Create an account with a freshly hashed password.
    pub async fn register(&self, username: &str, password: &str) -> OAuthResult<Account> {
        let username = username.trim();
        if username.is_empty() {
            return Err(OAuthError::invalid_request("username must not be empty"));
        }
        if password.is_empty() {
            return Err(OAuthError::invalid_request("password must not be empty"));
        }

        let password_hash = self.verifier.hash(password)?;

        let _guard = self.registering.lock().await;
        if self.find_by_username(username).await.is_ok() {
            return Err(OAuthError::already_exists(format!("username {username}")));
        }

        let account = Account {
            id: Uuid::now_v7(),
            username: username.to_owned(),
            password_hash,
            created_at: Utc::now(),
        };

        self.store.add(account.id, account.clone()).await?;

        tracing::info!(account_id = %account.id, username = %account.username, "Registered account");

        Ok(account)
    }

    pub async fn get(&self, account_id: Uuid) -> OAuthResult<Account> {
        self.store.get(account_id).await.map_err(|e| match e {
            StoreError::NotFound => OAuthError::not_found(format!("account {account_id}")),
            other => other.into(),
        })
    }

    pub async fn find_by_username(&self, username: &str) -> OAuthResult<Account> {
        self.store.find(|a| a.username == username).await.map_err(|e| match e {
            StoreError::NotFound => OAuthError::not_found(format!("username {username}")),
            other => other.into(),
        })
    }

    /// All accounts, oldest first.
    pub async fn list(&self) -> Vec<Account> {
        let mut accounts = self.store.list().await;
        accounts.sort_by_key(|a| a.id);
        accounts
    }

    /// Verify a username/password pair.
    ///
    /// Unknown user and wrong password both yield `Unauthorized`. The username
    /// is trimmed as on registration.
    pub async fn authenticate(&self, username: &str, password: &str) -> OAuthResult<Account> {
        let username = username.trim();
        let account = match self.find_by_username(username).await {
            Ok(account) => account,
            Err(OAuthError::NotFound { .. }) => {
                tracing::info!(username = %username, "Sign-in failed: unknown user");
                return Err(OAuthError::Unauthorized);
            }
            Err(e) => return Err(e),
        };

        if !self.verifier.verify(&account.password_hash, password) {
            tracing::info!(account_id = %account.id, "Sign-in failed: wrong password");
            return Err(OAuthError::Unauthorized);
        }

        Ok(account)
    }
}

impl std::fmt::Debug for AccountRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountRegistry").field("store", &self.store).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::{Argon2Config, Argon2Verifier};

    fn registry() -> AccountRegistry {
        let verifier = Argon2Verifier::new(Argon2Config::testing()).unwrap();
        AccountRegistry::new(RecordStore::in_memory(), Arc::new(verifier))
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let accounts = registry();
        let account = accounts.register("alice", "hunter2").await.unwrap();

        assert_ne!(account.password_hash, "hunter2");
        assert_eq!(accounts.get(account.id).await.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_username_unique() {
        let accounts = registry();
        accounts.register("alice", "one").await.unwrap();

        let err = accounts.register("alice", "two").await.unwrap_err();
        assert!(matches!(err, OAuthError::AlreadyExists { .. }));
        assert_eq!(accounts.list().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_fields_rejected() {
        let accounts = registry();
        assert!(matches!(accounts.register("  ", "pw").await, Err(OAuthError::InvalidRequest(_))));
        assert!(matches!(accounts.register("bob", "").await, Err(OAuthError::InvalidRequest(_))));
    }

    #[tokio::test]
    async fn test_authenticate() {
        let accounts = registry();
        let account = accounts.register("alice", "hunter2").await.unwrap();

        assert_eq!(accounts.authenticate("alice", "hunter2").await.unwrap().id, account.id);
        assert!(matches!(
            accounts.authenticate("alice", "wrong").await,
            Err(OAuthError::Unauthorized)
        ));
        assert!(matches!(
            accounts.authenticate("mallory", "hunter2").await,
            Err(OAuthError::Unauthorized)
        ));
    }

    #[tokio::test]
    async fn test_username_trimmed_on_both_paths() {
        let accounts = registry();
        let account = accounts.register("alice ", "hunter2").await.unwrap();
        assert_eq!(account.username, "alice");

        assert_eq!(accounts.authenticate("alice ", "hunter2").await.unwrap().id, account.id);
        assert_eq!(accounts.authenticate(" alice", "hunter2").await.unwrap().id, account.id);
    }
}
