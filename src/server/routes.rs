//! Router configuration for the web server.

use axum::{
    routing::{delete, get, post, put},
    Router,
};
use tower_http::cors::CorsLayer;

use super::handlers;
use super::AppState;

/// Create the main router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Document CRUD
        .route("/documents", post(handlers::upload_document))
        .route("/documents", get(handlers::list_documents))
        .route("/documents/:doc_id", get(handlers::get_document))
        .route("/documents/:doc_id", delete(handlers::delete_document))
        // Analysis lifecycle
        .route("/documents/:doc_id/analyze", post(handlers::request_analysis))
        .route("/documents/:doc_id/status", get(handlers::get_status))
        .route("/documents/:doc_id/analysis", get(handlers::get_analysis))
        // Clause notes
        .route(
            "/documents/:doc_id/clauses/:clause_index/notes",
            post(handlers::add_note),
        )
        .route(
            "/documents/:doc_id/clauses/:clause_index/notes/:note_index",
            put(handlers::update_note),
        )
        .route(
            "/documents/:doc_id/clauses/:clause_index/notes/:note_index",
            delete(handlers::delete_note),
        )
        // Observability
        .route("/api/jobs", get(handlers::job_counts))
        .route("/health", get(handlers::health))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
