//! # HTTP Server
//!
//! Serves the backup routes over axum with request tracing.

pub mod routes;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::backup::service::BackupService;

pub use routes::{backup_routes, ErrorResponse};

pub struct HttpServer {
    service: Arc<BackupService>,
    addr: SocketAddr,
    enable_cors: bool,
}

impl HttpServer {
    pub fn new(service: Arc<BackupService>, addr: SocketAddr) -> Self {
        Self {
            service,
            addr,
            enable_cors: false,
        }
    }

    /// Allow cross-origin requests from any origin.
    pub fn with_cors(mut self, enable: bool) -> Self {
        self.enable_cors = enable;
        self
    }

    pub fn router(&self) -> Router {
        let mut app = backup_routes(self.service.clone()).layer(TraceLayer::new_for_http());
        if self.enable_cors {
            app = app.layer(CorsLayer::permissive());
        }
        app
    }

    /// Bind and serve until Ctrl-C.
    pub async fn start(&self) -> io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        info!(addr = %listener.local_addr()?, "HTTP server listening");

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
