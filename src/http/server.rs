//! HTTP server for the front role.
//!
//! # Responsibilities
//! - Create the Axum router: local health route plus a catch-all relay route
//! - Wire up middleware (tracing)
//! - Serve on a listener until shutdown
//!
//! # Design Decisions
//! - The handler never talks to the target; it only submits and waits
//! - Health is answered locally and never written to the store

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

use crate::front::Relay;
use crate::http::convert::{into_response, into_submission};

pub const HEALTH_PATH: &str = "/_relay/health";

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
    pub max_body_bytes: usize,
}

pub struct RelayServer {
    router: Router,
}

impl RelayServer {
    pub fn new(relay: Relay, max_body_bytes: usize) -> Self {
        let state = AppState {
            relay,
            max_body_bytes,
        };
        Self {
            router: Self::build_router(state),
        }
    }

    fn build_router(state: AppState) -> Router {
        Router::new()
            .route(HEALTH_PATH, get(health_handler))
            .route("/{*path}", any(relay_handler))
            .route("/", any(relay_handler))
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// The router alone, for serving on a custom listener or in tests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve on `listener` until `shutdown` fires.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server received shutdown signal");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Submit the request, wait for its response, and replay it.
async fn relay_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let submission = match into_submission(request, state.max_body_bytes).await {
        Ok(submission) => submission,
        Err(rejection) => {
            tracing::warn!(error = %rejection, "Rejecting request");
            return rejection.into_response();
        }
    };

    match state.relay.relay(submission).await {
        Ok(record) => into_response(record),
        Err(e) => e.into_response(),
    }
}
