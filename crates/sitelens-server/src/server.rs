//! `SitelensServer` — Axum HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use sitelens_ingest::EventQueue;
use sitelens_store::StoreRegistry;

use crate::routes::{analytics, events, sites};

/// Event payloads are tiny; anything larger is not a beacon.
const BODY_LIMIT_BYTES: usize = 16 * 1024;

/// Shared state accessible from Axum handlers.
#[derive(Clone)]
pub struct AppState {
    /// Durable ingestion queue.
    pub queue: Arc<EventQueue>,
    /// Per-tenant store registry.
    pub registry: Arc<StoreRegistry>,
}

/// The main Sitelens server.
pub struct SitelensServer {
    state: AppState,
    shutdown: Arc<Notify>,
}

impl SitelensServer {
    pub fn new(queue: Arc<EventQueue>, registry: Arc<StoreRegistry>) -> Self {
        Self {
            state: AppState { queue, registry },
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Build the Axum router with all routes and middleware.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/api/event", post(events::post_event))
            .route("/api/sites", get(sites::get_sites))
            .route("/api/{domain}/summaries", get(analytics::get_summaries))
            .route("/api/{domain}/browsers", get(analytics::get_browsers))
            .route("/api/{domain}/os", get(analytics::get_os))
            .route("/api/{domain}/countries", get(analytics::get_countries))
            .route("/api/{domain}/referrers", get(analytics::get_referrers))
            .route("/api/{domain}/pages", get(analytics::get_pages))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .layer(RequestBodyLimitLayer::new(BODY_LIMIT_BYTES))
            .with_state(self.state.clone())
    }

    /// Bind and serve. Returns the bound address (useful with port 0) and
    /// the serve task handle; [`SitelensServer::shutdown`] stops it
    /// gracefully.
    pub async fn listen(
        &self,
        host: &str,
        port: u16,
    ) -> std::io::Result<(SocketAddr, JoinHandle<std::io::Result<()>>)> {
        let listener = TcpListener::bind((host, port)).await?;
        let addr = listener.local_addr()?;
        info!(%addr, "http server listening");

        let app = self
            .router()
            .into_make_service_with_connect_info::<SocketAddr>();
        let shutdown = Arc::clone(&self.shutdown);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move { shutdown.notified().await })
                .await
        });
        Ok((addr, handle))
    }

    /// Stop accepting connections and let in-flight requests finish.
    pub fn shutdown(&self) {
        self.shutdown.notify_waiters();
    }
}
