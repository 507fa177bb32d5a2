//! HTTP router.

use std::sync::Arc;

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use super::{admin, oauth::handlers, web};
use crate::context::AppContext;

/// Create the HTTP router over `ctx`.
pub fn create_router(ctx: AppContext) -> Router {
    let state = Arc::new(ctx);

    let admin_routes = Router::new()
        .route("/accounts", post(admin::handle_create_account).get(admin::handle_list_accounts))
        .route(
            "/oauth2/clients",
            post(admin::handle_create_client).get(admin::handle_list_clients),
        )
        .route("/oauth2/clients/{id}", get(admin::handle_get_client))
        .route("/oauth2/clients/{id}/secrets", post(admin::handle_add_secret))
        .route_layer(middleware::from_fn_with_state(Arc::clone(&state), admin::require_admin));

    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        // Sign-in
        .route("/sign-in", get(web::handle_sign_in_get).post(web::handle_sign_in_post))
        .route("/sign-out", post(web::handle_sign_out))
        // OAuth 2.0
        .route(
            "/oauth2/authorize",
            get(handlers::handle_authorize_get).post(handlers::handle_authorize_post),
        )
        .route("/oauth2/token", post(handlers::handle_token))
        .route("/api/userinfo", get(handlers::handle_userinfo))
        .route("/api/me", get(handlers::handle_userinfo))
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "simpleident",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
