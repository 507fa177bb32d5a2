//! HTTP server for the identity provider.
//!
//! Routes:
//! - `/sign-in`, `/sign-out`: password sign-in bound to a server-side session
//! - `/oauth2/authorize`, `/oauth2/token`: authorization code grant
//! - `/api/userinfo`, `/api/me`: bearer-protected identity
//! - `/admin/...`: account and client administration (HTTP Basic)

pub mod admin;
pub mod oauth;
pub mod pages;
pub mod session;
pub mod transport;
pub mod web;

use std::net::SocketAddr;

use crate::config::Config;
use crate::context::AppContext;

/// Identity provider server.
#[derive(Debug)]
pub struct IdentityServer {
    ctx: AppContext,
}

impl IdentityServer {
    /// Open the stores described by `config`.
    ///
    /// # Errors
    ///
    /// Returns error if a persisted document cannot be loaded.
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Ok(Self { ctx: AppContext::open(config).await? })
    }

    /// Shared application state.
    #[must_use]
    pub const fn context(&self) -> &AppContext {
        &self.ctx
    }

    /// Run the HTTP server until Ctrl-C.
    ///
    /// # Errors
    ///
    /// Returns error on server failure.
    pub async fn run_http(self) -> anyhow::Result<()> {
        let port = self.ctx.config.port;
        tracing::info!("Starting identity provider on port {}", port);

        self.ctx.start_background_tasks();

        let router = transport::create_router(self.ctx);
        let addr = SocketAddr::from(([0, 0, 0, 0], port));

        tracing::info!("HTTP server listening on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, router).with_graceful_shutdown(shutdown_signal()).await?;

        tracing::info!("HTTP server shut down");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received shutdown signal");
}
