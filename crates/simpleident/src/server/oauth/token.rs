//! Token endpoint logic: authorization code redemption and bearer validation.

use std::time::Duration;

use chrono::Utc;
use url::Url;
use uuid::Uuid;

use super::types::{GRANT_TYPE_AUTHORIZATION_CODE, TokenRequest, TokenResponse, UserInfo};
use crate::accounts::AccountRegistry;
use crate::error::{OAuthError, OAuthResult, StoreError};
use crate::models::{AccessToken, IssuedCode};
use crate::secret::{ACCESS_TOKEN_LEN, generate_secret};
use crate::store::RecordStore;

/// Token type reported in token responses.
pub const TOKEN_TYPE_BEARER: &str = "bearer";

/// Redeems authorization codes and resolves bearer tokens.
#[derive(Clone, Debug)]
pub struct TokenExchangeEngine {
    accounts: AccountRegistry,
    codes: RecordStore<IssuedCode>,
    tokens: RecordStore<AccessToken>,
    token_lifetime: Duration,
}

impl TokenExchangeEngine {
    #[must_use]
    pub fn new(
        accounts: AccountRegistry,
        codes: RecordStore<IssuedCode>,
        tokens: RecordStore<AccessToken>,
        token_lifetime: Duration,
    ) -> Self {
        Self { accounts, codes, tokens, token_lifetime }
    }

    /// Exchange an authorization code for an access token.
    ///
    /// The code is checked and marked consumed in one store mutation, so two
    /// concurrent exchanges of the same code cannot both succeed.
    pub async fn exchange_code_for_token(
        &self,
        request: &TokenRequest,
    ) -> OAuthResult<TokenResponse> {
        if request.grant_type != GRANT_TYPE_AUTHORIZATION_CODE {
            return Err(OAuthError::UnsupportedGrantType(request.grant_type.clone()));
        }
        if request.code.is_empty() {
            return Err(OAuthError::invalid_grant("missing code"));
        }

        // Compared in the normalized form the code was issued with.
        let redirect_uri = if request.redirect_uri.is_empty() {
            None
        } else {
            let url = Url::parse(&request.redirect_uri)
                .map_err(|_| OAuthError::invalid_grant("redirect_uri mismatch"))?;
            Some(String::from(url))
        };

        let value = generate_secret(ACCESS_TOKEN_LEN)?;
        let lifetime = chrono::Duration::from_std(self.token_lifetime)
            .map_err(|e| OAuthError::internal(format!("token lifetime out of range: {e}")))?;
        let now = Utc::now();

        let code = self
            .codes
            .update_first(
                |c| c.code == request.code,
                |c| {
                    if c.is_consumed() {
                        return Err(OAuthError::invalid_grant("authorization code already used"));
                    }
                    if c.is_expired_at(now) {
                        return Err(OAuthError::invalid_grant("authorization code expired"));
                    }
                    if Uuid::parse_str(&request.client_id).ok() != Some(c.client_id) {
                        return Err(OAuthError::InvalidClient);
                    }
                    if redirect_uri.as_ref().is_some_and(|uri| *uri != c.redirect_uri) {
                        return Err(OAuthError::invalid_grant("redirect_uri mismatch"));
                    }
                    c.consumed_at = Some(now);
                    Ok(c.clone())
                },
            )
            .await
            .map_err(|e| match e {
                OAuthError::Store(StoreError::NotFound) => {
                    OAuthError::invalid_grant("unknown authorization code")
                }
                other => other,
            })?;

        let token = AccessToken {
            id: Uuid::now_v7(),
            client_id: code.client_id,
            account_id: code.account_id,
            token: value,
            created_at: now,
            expires_at: now + lifetime,
        };
        if let Err(e) = self.tokens.add(token.id, token.clone()).await {
            tracing::error!(code_id = %code.id, error = %e, "Failed to store access token");
            self.release_code(code.id).await;
            return Err(e.into());
        }

        tracing::info!(
            client_id = %token.client_id,
            account_id = %token.account_id,
            code_id = %code.id,
            "Issued access token"
        );

        Ok(TokenResponse {
            access_token: token.token,
            token_type: TOKEN_TYPE_BEARER.to_string(),
            expires_in: self.token_lifetime.as_secs(),
            refresh_token: String::new(),
        })
    }

    /// Undo the consumption of a code whose token was never stored.
    async fn release_code(&self, code_id: Uuid) {
        let released = self
            .codes
            .update_first(
                |c| c.id == code_id,
                |c| {
                    c.consumed_at = None;
                    Ok::<_, StoreError>(())
                },
            )
            .await;
        if let Err(e) = released {
            tracing::error!(code_id = %code_id, error = %e, "Failed to release authorization code");
        }
    }

    /// Resolve a bearer token to its unexpired record.
    pub async fn authenticate_bearer(&self, token: &str) -> OAuthResult<AccessToken> {
        let access = match self.tokens.find(|t| t.token == token).await {
            Ok(access) => access,
            Err(StoreError::NotFound) => return Err(OAuthError::Unauthorized),
            Err(e) => return Err(e.into()),
        };

        if access.is_expired_at(Utc::now()) {
            tracing::debug!(token_id = %access.id, "Rejected expired access token");
            return Err(OAuthError::Unauthorized);
        }

        Ok(access)
    }

    /// Identity of the account owning a bearer token.
    pub async fn userinfo(&self, token: &str) -> OAuthResult<UserInfo> {
        let access = self.authenticate_bearer(token).await?;

        let account = match self.accounts.get(access.account_id).await {
            Ok(account) => account,
            Err(OAuthError::NotFound { .. }) => return Err(OAuthError::Unauthorized),
            Err(e) => return Err(e),
        };

        Ok(UserInfo { id: account.id, username: account.username })
    }
}
