//! Sign-in and sign-out pages.

use std::sync::Arc;

use axum::{
    Form,
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use serde::Deserialize;
use url::form_urlencoded;

use crate::context::AppContext;
use crate::error::{OAuthError, OAuthResult};
use crate::server::pages;
use crate::server::session::{SESSION_COOKIE, SessionBridge, load_session};

const SIGN_IN_FAILED: &str = "Invalid username or password";

/// `/sign-in` URL carrying `return_to` as the return target.
pub fn sign_in_location(return_to: &str) -> String {
    let encoded: String = form_urlencoded::byte_serialize(return_to.as_bytes()).collect();
    format!("/sign-in?return={encoded}")
}

/// Return target to redirect to after sign-in; anything but a local absolute path becomes `/`.
fn local_return_target(target: &str) -> &str {
    let local = target.starts_with('/') && !target.starts_with("//") && !target.contains('\\');
    if local { target } else { "/" }
}

#[derive(Debug, Default, Deserialize)]
pub struct SignInQuery {
    #[serde(rename = "return", default)]
    pub return_to: String,
}

/// `GET /sign-in`
pub async fn handle_sign_in_get(Query(query): Query<SignInQuery>) -> Html<String> {
    Html(pages::render_sign_in_page(&query.return_to, None))
}

#[derive(Debug, Deserialize)]
pub struct SignInForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(rename = "return", default)]
    pub return_to: String,
}

/// `POST /sign-in`
///
/// Moves the session to a new id, binds the account to it and continues to
/// the return target.
/// Wrong credentials re-render the form with status 403.
pub async fn handle_sign_in_post(
    State(ctx): State<Arc<AppContext>>,
    jar: CookieJar,
    Form(form): Form<SignInForm>,
) -> OAuthResult<Response> {
    let account = match ctx.accounts.authenticate(&form.username, &form.password).await {
        Ok(account) => account,
        Err(OAuthError::Unauthorized) => {
            tracing::info!(username = %form.username, "Sign-in failed");
            let html = pages::render_sign_in_page(&form.return_to, Some(SIGN_IN_FAILED));
            return Ok((StatusCode::FORBIDDEN, Html(html)).into_response());
        }
        Err(e) => return Err(e),
    };

    let mut session = load_session(&ctx.sessions, &jar).await?;
    session.regenerate().await?;
    session.set_account_id(account.id);
    session.save().await?;

    tracing::info!(account_id = %account.id, username = %account.username, "Signed in");

    let target = local_return_target(&form.return_to);
    Ok((jar.add(session.cookie()), Redirect::to(target)).into_response())
}

/// `POST /sign-out`
pub async fn handle_sign_out(
    State(ctx): State<Arc<AppContext>>,
    jar: CookieJar,
) -> OAuthResult<Response> {
    let mut session = load_session(&ctx.sessions, &jar).await?;
    if let Some(account_id) = session.account_id() {
        tracing::info!(account_id = %account_id, "Signed out");
    }
    session.clear();
    session.save().await?;

    let jar = jar.remove(Cookie::build(SESSION_COOKIE).path("/"));
    Ok((jar, Redirect::to("/sign-in")).into_response())
}
