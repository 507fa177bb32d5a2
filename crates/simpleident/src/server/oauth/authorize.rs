//! Authorization endpoint logic: request validation and code issuance.
//!
//! An authorization attempt moves through
//! `requested -> (suspended for login) -> confirmed -> code issued`.
//! Nothing persists the intermediate states; the first leg stores a
//! `PendingAuthorization` in the session, and the second leg consumes it and
//! adds an `IssuedCode` to the store as its only durable effect.

use std::time::Duration;

use chrono::Utc;
use url::Url;
use uuid::Uuid;

use super::types::{AuthorizationPrompt, AuthorizeRequest, RESPONSE_TYPE_CODE};
use crate::accounts::AccountRegistry;
use crate::clients::ClientRegistry;
use crate::error::{OAuthError, OAuthResult};
use crate::models::{Client, IssuedCode};
use crate::secret::{AUTHORIZATION_CODE_LEN, generate_secret};
use crate::server::session::{PendingAuthorization, SessionBridge};
use crate::store::RecordStore;

/// Validates authorization requests and issues authorization codes.
#[derive(Clone, Debug)]
pub struct AuthorizationEngine {
    clients: ClientRegistry,
    accounts: AccountRegistry,
    codes: RecordStore<IssuedCode>,
    code_lifetime: Duration,
}

impl AuthorizationEngine {
    #[must_use]
    pub fn new(
        clients: ClientRegistry,
        accounts: AccountRegistry,
        codes: RecordStore<IssuedCode>,
        code_lifetime: Duration,
    ) -> Self {
        Self { clients, accounts, codes, code_lifetime }
    }

    /// First leg: validate the request and remember it in the session.
    pub async fn begin_authorization<S>(
        &self,
        request: &AuthorizeRequest,
        session: &mut S,
    ) -> OAuthResult<AuthorizationPrompt>
    where
        S: SessionBridge + ?Sized,
    {
        if request.response_type != RESPONSE_TYPE_CODE {
            return Err(OAuthError::UnsupportedResponseType(request.response_type.clone()));
        }

        let client = self.lookup_client(&request.client_id).await?;
        let redirect_uri = resolve_redirect_uri(&client, &request.redirect_uri)?;

        session.set_pending_authorization(PendingAuthorization {
            client_id: client.id,
            redirect_uri: redirect_uri.clone(),
            state: request.state.clone(),
        });
        session.save().await?;

        let needs_login = session.account_id().is_none();

        tracing::info!(
            client_id = %client.id,
            redirect_uri = %redirect_uri,
            needs_login,
            "Authorization requested"
        );

        Ok(AuthorizationPrompt { needs_login, client, redirect_uri })
    }

    /// Second leg: issue a code for `account_id` and build the redirect back to the client.
    ///
    /// Protocol failures (`InvalidSession`, `InvalidClient`) are returned as
    /// errors. Internal failures while generating or storing the code are
    /// reported to the client instead, as `error=server_error` on the redirect.
    pub async fn confirm_authorization<S>(
        &self,
        session: &mut S,
        account_id: Uuid,
    ) -> OAuthResult<String>
    where
        S: SessionBridge + ?Sized,
    {
        let pending = session
            .take_pending_authorization()
            .ok_or_else(|| OAuthError::invalid_session("no authorization in progress"))?;
        session.save().await?;

        let client = match self.clients.get(pending.client_id).await {
            Ok(client) => client,
            Err(OAuthError::NotFound { .. }) => return Err(OAuthError::InvalidClient),
            Err(e) => return Err(e),
        };

        match self.accounts.get(account_id).await {
            Ok(_) => {}
            Err(OAuthError::NotFound { .. }) => {
                return Err(OAuthError::invalid_session("signed-in account no longer exists"));
            }
            Err(e) => return Err(e),
        }

        match self.issue_code(&client, account_id, &pending.redirect_uri).await {
            Ok(code) => {
                tracing::info!(client_id = %client.id, account_id = %account_id, "Issued authorization code");
                redirect_with(&pending.redirect_uri, &[("code", &code)], &pending.state)
            }
            Err(e) if e.is_internal() => {
                tracing::error!(client_id = %client.id, error = %e, "Failed to issue authorization code");
                redirect_with(&pending.redirect_uri, &[("error", "server_error")], &pending.state)
            }
            Err(e) => Err(e),
        }
    }

    async fn issue_code(
        &self,
        client: &Client,
        account_id: Uuid,
        redirect_uri: &str,
    ) -> OAuthResult<String> {
        let code = generate_secret(AUTHORIZATION_CODE_LEN)?;
        let lifetime = chrono::Duration::from_std(self.code_lifetime)
            .map_err(|e| OAuthError::internal(format!("code lifetime out of range: {e}")))?;
        let now = Utc::now();

        let issued = IssuedCode {
            id: Uuid::now_v7(),
            client_id: client.id,
            account_id,
            code: code.clone(),
            redirect_uri: redirect_uri.to_owned(),
            created_at: now,
            expires_at: now + lifetime,
            consumed_at: None,
        };
        self.codes.add(issued.id, issued).await?;

        Ok(code)
    }

    async fn lookup_client(&self, client_id: &str) -> OAuthResult<Client> {
        let id = Uuid::parse_str(client_id).map_err(|_| OAuthError::InvalidClient)?;
        match self.clients.get(id).await {
            Ok(client) => Ok(client),
            Err(OAuthError::NotFound { .. }) => Err(OAuthError::InvalidClient),
            Err(e) => Err(e),
        }
    }
}

/// Resolve the redirect URI for `client`.
///
/// Empty `requested` resolves to the registered callback URL. Otherwise the
/// requested URI must parse, must not carry a fragment, and must start with
/// the callback URL; it then resolves to itself (normalized).
pub fn resolve_redirect_uri(client: &Client, requested: &str) -> OAuthResult<String> {
    if requested.is_empty() {
        return Ok(client.callback_url.clone());
    }

    let url = Url::parse(requested).map_err(|e| OAuthError::invalid_redirect_uri(e.to_string()))?;

    if url.fragment().is_some() {
        return Err(OAuthError::invalid_redirect_uri("must not contain a fragment"));
    }

    if !url.as_str().starts_with(&client.callback_url) {
        return Err(OAuthError::invalid_redirect_uri("not under the registered callback URL"));
    }

    Ok(url.into())
}

/// Append `params` and a non-empty `state` to the query of `redirect_uri`.
fn redirect_with(redirect_uri: &str, params: &[(&str, &str)], state: &str) -> OAuthResult<String> {
    let mut url = Url::parse(redirect_uri)
        .map_err(|e| OAuthError::internal(format!("stored redirect_uri unparsable: {e}")))?;

    {
        let mut query = url.query_pairs_mut();
        for (key, value) in params {
            query.append_pair(key, value);
        }
        if !state.is_empty() {
            query.append_pair("state", state);
        }
    }

    Ok(url.into())
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use super::*;
    use crate::password::{Argon2Config, Argon2Verifier};
    use crate::server::session::SessionManager;

    struct Fixture {
        engine: AuthorizationEngine,
        clients: ClientRegistry,
        accounts: AccountRegistry,
        codes: RecordStore<IssuedCode>,
        sessions: SessionManager,
    }

    fn fixture() -> Fixture {
        let clients = ClientRegistry::new(RecordStore::in_memory());
        let verifier = Argon2Verifier::new(Argon2Config::testing()).unwrap();
        let accounts = AccountRegistry::new(RecordStore::in_memory(), Arc::new(verifier));
        let codes = RecordStore::in_memory();
        let engine = AuthorizationEngine::new(
            clients.clone(),
            accounts.clone(),
            codes.clone(),
            Duration::from_secs(60),
        );
        Fixture {
            engine,
            clients,
            accounts,
            codes,
            sessions: SessionManager::new(Duration::from_secs(60)),
        }
    }

    fn request(client_id: Uuid, redirect_uri: &str, state: &str) -> AuthorizeRequest {
        AuthorizeRequest {
            response_type: "code".into(),
            client_id: client_id.to_string(),
            redirect_uri: redirect_uri.into(),
            state: state.into(),
        }
    }

    fn query(url: &str) -> HashMap<String, String> {
        Url::parse(url).unwrap().query_pairs().into_owned().collect()
    }

    #[tokio::test]
    async fn test_begin_defaults_to_callback() {
        let f = fixture();
        let client = f.clients.register("app", "", "https://app.example/cb").await.unwrap();
        let mut session = f.sessions.load(None).await.unwrap();

        let prompt =
            f.engine.begin_authorization(&request(client.id, "", "xyz"), &mut session).await.unwrap();

        assert!(prompt.needs_login);
        assert_eq!(prompt.redirect_uri, "https://app.example/cb");
        assert_eq!(
            session.pending_authorization(),
            Some(&PendingAuthorization {
                client_id: client.id,
                redirect_uri: "https://app.example/cb".into(),
                state: "xyz".into(),
            })
        );
    }

    #[tokio::test]
    async fn test_begin_rejects_response_type() {
        let f = fixture();
        let client = f.clients.register("app", "", "https://app.example/cb").await.unwrap();
        let mut session = f.sessions.load(None).await.unwrap();
        let mut req = request(client.id, "", "");
        req.response_type = "token".into();

        let err = f.engine.begin_authorization(&req, &mut session).await.unwrap_err();
        assert!(matches!(err, OAuthError::UnsupportedResponseType(_)));
        assert!(session.pending_authorization().is_none());
    }

    #[tokio::test]
    async fn test_begin_rejects_unknown_client() {
        let f = fixture();
        let mut session = f.sessions.load(None).await.unwrap();

        let err = f
            .engine
            .begin_authorization(&request(Uuid::now_v7(), "", ""), &mut session)
            .await
            .unwrap_err();
        assert!(matches!(err, OAuthError::InvalidClient));

        let mut req = request(Uuid::now_v7(), "", "");
        req.client_id = "not-a-uuid".into();
        let err = f.engine.begin_authorization(&req, &mut session).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidClient));
    }

    #[test]
    fn test_resolve_redirect_uri() {
        let client = Client {
            id: Uuid::now_v7(),
            name: "app".into(),
            description: String::new(),
            callback_url: "https://app.example/cb".into(),
            secrets: vec![],
            created_at: Utc::now(),
        };

        assert_eq!(
            resolve_redirect_uri(&client, "https://app.example/cb/sub?x=1").unwrap(),
            "https://app.example/cb/sub?x=1"
        );
        assert!(matches!(
            resolve_redirect_uri(&client, "https://evil.example/cb"),
            Err(OAuthError::InvalidRedirectUri(_))
        ));
        assert!(matches!(
            resolve_redirect_uri(&client, "https://app.example/cb#frag"),
            Err(OAuthError::InvalidRedirectUri(_))
        ));
        assert!(matches!(
            resolve_redirect_uri(&client, "https://app.example/cb#"),
            Err(OAuthError::InvalidRedirectUri(_))
        ));
        assert!(matches!(
            resolve_redirect_uri(&client, "/relative"),
            Err(OAuthError::InvalidRedirectUri(_))
        ));
    }

    #[tokio::test]
    async fn test_confirm_issues_code() {
        let f = fixture();
        let client = f.clients.register("app", "", "https://app.example/cb").await.unwrap();
        let account = f.accounts.register("u1", "pw").await.unwrap();
        let mut session = f.sessions.load(None).await.unwrap();
        session.set_account_id(account.id);

        let prompt =
            f.engine.begin_authorization(&request(client.id, "", "xyz"), &mut session).await.unwrap();
        assert!(!prompt.needs_login);

        let location = f.engine.confirm_authorization(&mut session, account.id).await.unwrap();
        assert!(location.starts_with("https://app.example/cb?code="));

        let params = query(&location);
        assert_eq!(params["code"].len(), AUTHORIZATION_CODE_LEN);
        assert_eq!(params["state"], "xyz");

        let stored = f.codes.find(|c| c.code == params["code"]).await.unwrap();
        assert_eq!(stored.client_id, client.id);
        assert_eq!(stored.account_id, account.id);
        assert!(!stored.is_consumed());
        assert!(session.pending_authorization().is_none());
    }

    #[tokio::test]
    async fn test_confirm_keeps_existing_query() {
        let f = fixture();
        let client = f.clients.register("app", "", "https://app.example/cb").await.unwrap();
        let account = f.accounts.register("u1", "pw").await.unwrap();
        let mut session = f.sessions.load(None).await.unwrap();
        session.set_account_id(account.id);

        f.engine
            .begin_authorization(
                &request(client.id, "https://app.example/cb?tenant=7", ""),
                &mut session,
            )
            .await
            .unwrap();
        let location = f.engine.confirm_authorization(&mut session, account.id).await.unwrap();

        let params = query(&location);
        assert_eq!(params["tenant"], "7");
        assert!(params.contains_key("code"));
        assert!(!params.contains_key("state"));
    }

    #[tokio::test]
    async fn test_confirm_without_first_leg() {
        let f = fixture();
        let account = f.accounts.register("u1", "pw").await.unwrap();
        let mut session = f.sessions.load(None).await.unwrap();

        let err = f.engine.confirm_authorization(&mut session, account.id).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidSession(_)));
        assert!(f.codes.is_empty().await);
    }

    #[tokio::test]
    async fn test_confirm_cannot_be_replayed() {
        let f = fixture();
        let client = f.clients.register("app", "", "https://app.example/cb").await.unwrap();
        let account = f.accounts.register("u1", "pw").await.unwrap();
        let mut session = f.sessions.load(None).await.unwrap();
        session.set_account_id(account.id);

        f.engine.begin_authorization(&request(client.id, "", "s"), &mut session).await.unwrap();
        f.engine.confirm_authorization(&mut session, account.id).await.unwrap();

        let err = f.engine.confirm_authorization(&mut session, account.id).await.unwrap_err();
        assert!(matches!(err, OAuthError::InvalidSession(_)));
        assert_eq!(f.codes.len().await, 1);
    }

    #[tokio::test]
    async fn test_confirm_unknown_account() {
        let f = fixture();
        let client = f.clients.register("app", "", "https://app.example/cb").await.unwrap();
        let mut session = f.sessions.load(None).await.unwrap();

        f.engine.begin_authorization(&request(client.id, "", "s"), &mut session).await.unwrap();
        let err = f.engine.confirm_authorization(&mut session, Uuid::now_v7()).await.unwrap_err();

        assert!(matches!(err, OAuthError::InvalidSession(_)));
        assert!(f.codes.is_empty().await);
    }

    #[test]
    fn test_redirect_with_error() {
        let location =
            redirect_with("https://app.example/cb", &[("error", "server_error")], "st 1").unwrap();
        assert_eq!(location, "https://app.example/cb?error=server_error&state=st+1");

        let location = redirect_with("https://app.example/cb", &[("error", "server_error")], "").unwrap();
        assert_eq!(location, "https://app.example/cb?error=server_error");
    }
}
