//! Admin JSON API for accounts and OAuth clients, behind HTTP Basic auth.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::Deserialize;
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::context::AppContext;
use crate::error::OAuthResult;
use crate::models::{AccountSummary, Client};

/// Reject requests lacking the configured admin credentials.
///
/// Responds 404 when no admin credentials are configured, so the API does not
/// advertise itself.
pub async fn require_admin(
    State(ctx): State<Arc<AppContext>>,
    request: Request,
    next: Next,
) -> Response {
    let Some(ref admin) = ctx.config.admin else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let credentials = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(parse_basic_auth);

    if let Some((username, password)) = credentials {
        if credentials_match(&username, &password, &admin.username, &admin.password) {
            return next.run(request).await;
        }
        tracing::warn!(username = %username, "Admin authentication failed");
    }

    let mut response = (StatusCode::UNAUTHORIZED, "Unauthorized").into_response();
    response
        .headers_mut()
        .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Basic realm=\"simpleident\""));
    response
}

/// Compare both fields in constant time; neither short-circuits the other.
fn credentials_match(
    username: &str,
    password: &str,
    expected_user: &str,
    expected_pass: &str,
) -> bool {
    let user_ok = username.as_bytes().ct_eq(expected_user.as_bytes());
    let pass_ok = password.as_bytes().ct_eq(expected_pass.as_bytes());
    (user_ok & pass_ok).into()
}

/// Decode an `Authorization: Basic ...` header value into username and password.
fn parse_basic_auth(header_value: &str) -> Option<(String, String)> {
    let encoded = header_value.trim().strip_prefix("Basic ")?;
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let credentials = String::from_utf8(decoded).ok()?;

    // Password may contain colons
    let (username, password) = credentials.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

// ─── Accounts ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub username: String,
    pub password: String,
}

/// `POST /admin/accounts`
pub async fn handle_create_account(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<CreateAccountRequest>,
) -> OAuthResult<impl IntoResponse> {
    let account = ctx.accounts.register(&req.username, &req.password).await?;
    Ok((StatusCode::CREATED, Json(AccountSummary::from(&account))))
}

/// `GET /admin/accounts`
pub async fn handle_list_accounts(State(ctx): State<Arc<AppContext>>) -> impl IntoResponse {
    let accounts: Vec<AccountSummary> =
        ctx.accounts.list().await.iter().map(AccountSummary::from).collect();
    Json(accounts)
}

// ─── Clients ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateClientRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub callback_url: String,
}

/// `POST /admin/oauth2/clients`
pub async fn handle_create_client(
    State(ctx): State<Arc<AppContext>>,
    Json(req): Json<CreateClientRequest>,
) -> OAuthResult<impl IntoResponse> {
    let client = ctx.clients.register(req.name, req.description, req.callback_url).await?;
    Ok((StatusCode::CREATED, Json(client)))
}

/// `GET /admin/oauth2/clients`
pub async fn handle_list_clients(State(ctx): State<Arc<AppContext>>) -> Json<Vec<Client>> {
    Json(ctx.clients.list().await)
}

/// `GET /admin/oauth2/clients/{id}`
pub async fn handle_get_client(
    State(ctx): State<Arc<AppContext>>,
    Path(client_id): Path<Uuid>,
) -> OAuthResult<Json<Client>> {
    Ok(Json(ctx.clients.get(client_id).await?))
}

/// `POST /admin/oauth2/clients/{id}/secrets`
pub async fn handle_add_secret(
    State(ctx): State<Arc<AppContext>>,
    Path(client_id): Path<Uuid>,
) -> OAuthResult<impl IntoResponse> {
    let secret = ctx.clients.add_secret(client_id).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "client_id": client_id,
            "secret": secret
        })),
    ))
}
