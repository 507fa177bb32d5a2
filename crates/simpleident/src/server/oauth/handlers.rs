//! OAuth 2.0 endpoint handlers.
//!
//! Implements:
//! - RFC 6749 §4.1: Authorization Code Grant (`/oauth2/authorize`, `/oauth2/token`)
//! - RFC 6750: Bearer token usage (`/api/userinfo`)

use std::sync::Arc;

use axum::{
    Form, Json,
    extract::{OriginalUri, Query, State},
    http::{HeaderMap, HeaderValue, header},
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;

use super::types::{AuthorizeRequest, TokenRequest, TokenResponse, UserInfo};
use crate::context::AppContext;
use crate::error::{OAuthError, OAuthResult};
use crate::server::pages;
use crate::server::session::{SessionBridge, load_session};
use crate::server::web::sign_in_location;

// ─── Authorization Endpoint ──────────────────────────────────────────────────

/// `GET /oauth2/authorize`
///
/// Validates the request and remembers it in the session. Sends the user to
/// sign in first when no account is bound, otherwise renders the confirmation
/// page.
pub async fn handle_authorize_get(
    State(ctx): State<Arc<AppContext>>,
    jar: CookieJar,
    OriginalUri(uri): OriginalUri,
    Query(request): Query<AuthorizeRequest>,
) -> OAuthResult<Response> {
    let mut session = load_session(&ctx.sessions, &jar).await?;
    let prompt = ctx.authorizer.begin_authorization(&request, &mut session).await?;
    let jar = jar.add(session.cookie());

    let return_to = uri.path_and_query().map_or("/oauth2/authorize", |pq| pq.as_str());
    let sign_in = sign_in_location(return_to);
    if prompt.needs_login {
        return Ok((jar, Redirect::to(&sign_in)).into_response());
    }

    let account = match session.account_id() {
        Some(account_id) => match ctx.accounts.get(account_id).await {
            Ok(account) => account,
            Err(OAuthError::NotFound { .. }) => {
                return Ok((jar, Redirect::to(&sign_in)).into_response());
            }
            Err(e) => return Err(e),
        },
        None => return Ok((jar, Redirect::to(&sign_in)).into_response()),
    };

    let html =
        pages::render_authorize_page(&prompt.client, &prompt.redirect_uri, &account.username);
    Ok((jar, Html(html)).into_response())
}

/// `POST /oauth2/authorize`
///
/// Issues a code for the signed-in account and redirects back to the client.
pub async fn handle_authorize_post(
    State(ctx): State<Arc<AppContext>>,
    jar: CookieJar,
) -> OAuthResult<Response> {
    let mut session = load_session(&ctx.sessions, &jar).await?;
    let Some(account_id) = session.account_id() else {
        return Err(OAuthError::invalid_session("not signed in"));
    };

    let location = ctx.authorizer.confirm_authorization(&mut session, account_id).await?;
    Ok((jar.add(session.cookie()), Redirect::to(&location)).into_response())
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

/// `POST /oauth2/token`
///
/// Exchange an authorization code for an access token.
pub async fn handle_token(
    State(ctx): State<Arc<AppContext>>,
    Form(request): Form<TokenRequest>,
) -> OAuthResult<Response> {
    let response = ctx.token_exchange.exchange_code_for_token(&request).await?;
    Ok(token_success(response))
}

/// Build a token response with required OAuth 2.0 cache headers (RFC 6749 §5.1).
fn token_success(body: TokenResponse) -> Response {
    let mut response = Json(body).into_response();

    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    response
}

// ─── Userinfo ────────────────────────────────────────────────────────────────

/// `GET /api/userinfo`, `GET /api/me`
pub async fn handle_userinfo(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
) -> OAuthResult<Json<UserInfo>> {
    let token = extract_bearer_token(&headers)?;
    Ok(Json(ctx.token_exchange.userinfo(token).await?))
}

fn extract_bearer_token(headers: &HeaderMap) -> OAuthResult<&str> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or_else(|| OAuthError::invalid_request("missing Authorization header"))?
        .to_str()
        .map_err(|_| OAuthError::invalid_request("malformed Authorization header"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.is_empty() => {
            Ok(token)
        }
        _ => Err(OAuthError::invalid_request("expected a Bearer token")),
    }
}
