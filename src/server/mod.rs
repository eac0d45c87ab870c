//! JSON API server for clauselens.
//!
//! Auth lives in front of this service; handlers read the caller
//! identity from the `X-User-Id` header and scope every operation to it.
//! Analyze requests return immediately and clients poll the status
//! endpoint for progress.

mod handlers;
mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::config::Settings;
use crate::error::CoreError;
use crate::services::{ServiceSet, WorkerPool};

pub use routes::create_router;

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub services: ServiceSet,
}

impl IntoResponse for CoreError {
    fn into_response(self) -> Response {
        let status = match &self {
            CoreError::NotFound(_) => StatusCode::NOT_FOUND,
            CoreError::InvalidIndex(_) => StatusCode::BAD_REQUEST,
            CoreError::ConcurrentRun(_) => StatusCode::CONFLICT,
            CoreError::Extraction(_)
            | CoreError::Inference(_)
            | CoreError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.to_string() }))).into_response()
    }
}

/// Start the web server (and, when the queue is enabled, its workers).
pub async fn serve(settings: &Settings, host: &str, port: u16) -> anyhow::Result<()> {
    let services = ServiceSet::from_settings(settings)?;

    let _workers = if settings.queue.enabled {
        Some(WorkerPool::start(Arc::clone(&services.analysis)))
    } else {
        tracing::info!("Durable queue disabled; analyses run as inline tasks");
        None
    };

    let state = AppState { services };
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    tracing::info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
