//! OAuth 2.0 client registry.

use chrono::Utc;
use uuid::Uuid;

use crate::error::{OAuthError, OAuthResult, StoreError};
use crate::models::Client;
use crate::secret::{CLIENT_SECRET_LEN, generate_secret};
use crate::store::RecordStore;

/// CRUD over registered clients. No deletion, no secret revocation.
#[derive(Clone, Debug)]
pub struct ClientRegistry {
    store: RecordStore<Client>,
}

impl ClientRegistry {
    #[must_use]
    pub fn new(store: RecordStore<Client>) -> Self {
        Self { store }
    }

    /// Register a new client with an empty secret list.
    ///
    /// `callback_url` must be an absolute URL without a fragment. It is stored
    /// normalized, so redirect prefix checks compare like with like.
    pub async fn register(
        &self,
        name: impl Into<String>,
        description: impl Into<String>,
        callback_url: impl Into<String>,
    ) -> OAuthResult<Client> {
        let callback_url: String = callback_url.into();
        let parsed = url::Url::parse(&callback_url)
            .map_err(|e| OAuthError::invalid_redirect_uri(format!("callback_url: {e}")))?;
        if parsed.fragment().is_some() {
            return Err(OAuthError::invalid_redirect_uri("callback_url must not have a fragment"));
        }

        let client = Client {
            id: Uuid::now_v7(),
            name: name.into(),
            description: description.into(),
            callback_url: parsed.into(),
            secrets: Vec::new(),
            created_at: Utc::now(),
        };

        self.store.add(client.id, client.clone()).await?;

        tracing::info!(client_id = %client.id, name = %client.name, "Registered OAuth client");

        Ok(client)
    }

    /// Generate a new secret and append it to the client's secret list.
    pub async fn add_secret(&self, client_id: Uuid) -> OAuthResult<String> {
        let secret = generate_secret(CLIENT_SECRET_LEN)?;

        self.store
            .update_first(
                |c| c.id == client_id,
                |c| {
                    c.secrets.push(secret.clone());
                    Ok::<_, StoreError>(())
                },
            )
            .await
            .map_err(|e| match e {
                StoreError::NotFound => OAuthError::not_found(format!("client {client_id}")),
                other => other.into(),
            })?;

        tracing::info!(client_id = %client_id, "Added client secret");

        Ok(secret)
    }

    /// Look up a client by id.
    pub async fn get(&self, client_id: Uuid) -> OAuthResult<Client> {
        self.store.get(client_id).await.map_err(|e| match e {
            StoreError::NotFound => OAuthError::not_found(format!("client {client_id}")),
            other => other.into(),
        })
    }

    /// All registered clients, oldest first.
    pub async fn list(&self) -> Vec<Client> {
        let mut clients = self.store.list().await;
        clients.sort_by_key(|c| c.id);
        clients
    }
}
