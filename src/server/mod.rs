mod config;
mod http;

use std::io;
use std::sync::Arc;

use axum::{Router, routing::get};
use tokio::net::TcpListener;

use crate::LoginService;

pub use config::ServerConfig;

use self::http::{LoginState, action_handler, default_handler, fallback_handler};

/// HTTP front for the login flow: `GET {base}` renders the prompt,
/// `GET {base}/redirect` starts an authorization and `GET {base}/callback`
/// completes it.
pub struct LoginServer {
    service: Arc<LoginService>,
    config: Arc<ServerConfig>,
}

impl LoginServer {
    pub fn new(service: LoginService, config: ServerConfig) -> Self {
        Self {
            service: Arc::new(service),
            config: Arc::new(config),
        }
    }

    pub fn router(&self) -> Router {
        let state = LoginState {
            service: self.service.clone(),
            config: self.config.clone(),
        };

        Router::new()
            .route(&self.config.base_path, get(default_handler))
            .route(&self.config.action_path("{action}"), get(action_handler))
            .fallback(fallback_handler)
            .with_state(state)
    }

    pub async fn serve(self) -> io::Result<()> {
        let listener = TcpListener::bind(self.config.bind).await?;
        tracing::info!(addr = %listener.local_addr()?, base = %self.config.base_path, "listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(async {
                if let Err(err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %err, "failed to listen for shutdown signal");
                    std::future::pending::<()>().await;
                }
            })
            .await
    }
}
