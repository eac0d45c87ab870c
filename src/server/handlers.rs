//! HTTP handlers mapping the service layer onto JSON endpoints.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;

use super::AppState;
use crate::models::DocumentView;

/// Fallback owner for unauthenticated local use.
const DEFAULT_OWNER: &str = "local";

/// Caller identity, as established by the auth layer in front of us.
fn owner_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_OWNER)
        .to_string()
}

fn file_name_from_headers(headers: &HeaderMap) -> String {
    headers
        .get("x-file-name")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .unwrap_or("untitled")
        .to_string()
}

/// Health check endpoint for container orchestration.
pub async fn health() -> impl IntoResponse {
    StatusCode::OK
}

/// Upload a document as a raw request body.
pub async fn upload_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if body.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": "empty upload" })),
        )
            .into_response();
    }

    let owner = owner_from_headers(&headers);
    let file_name = file_name_from_headers(&headers);

    match state.services.documents.ingest(&owner, &file_name, &body) {
        Ok(doc) => (
            StatusCode::CREATED,
            Json(DocumentView::from_document(&doc)),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn list_documents(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let owner = owner_from_headers(&headers);
    match state.services.documents.list(&owner) {
        Ok(docs) => Json(docs).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<String>,
) -> Response {
    let owner = owner_from_headers(&headers);
    match state.services.documents.get(&owner, &doc_id) {
        Ok(doc) => Json(DocumentView::from_document(&doc)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_document(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<String>,
) -> Response {
    let owner = owner_from_headers(&headers);
    match state.services.documents.delete(&owner, &doc_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeParams {
    /// Re-run the pipeline even when a completed analysis exists.
    #[serde(default)]
    pub force: bool,
}

/// Trigger analysis. Responds immediately; poll the status endpoint.
pub async fn request_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<String>,
    Query(params): Query<AnalyzeParams>,
) -> Response {
    let owner = owner_from_headers(&headers);
    match state
        .services
        .analysis
        .request_analysis(&owner, &doc_id, params.force)
        .await
    {
        Ok(outcome) => (StatusCode::ACCEPTED, Json(outcome)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn get_status(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<String>,
) -> Response {
    let owner = owner_from_headers(&headers);
    match state.services.analysis.status(&owner, &doc_id) {
        Ok(report) => Json(report).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Fetch the completed analysis. The `x-cache` header reports whether
/// the read was served from the result cache.
pub async fn get_analysis(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(doc_id): Path<String>,
) -> Response {
    let owner = owner_from_headers(&headers);
    match state.services.analysis.get_analysis(&owner, &doc_id) {
        Ok(fetched) => {
            let cache_header = if fetched.cache_hit { "hit" } else { "miss" };
            ([("x-cache", cache_header)], Json(fetched.analysis)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

#[derive(Debug, Deserialize)]
pub struct NoteBody {
    pub text: String,
}

pub async fn add_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((doc_id, clause_index)): Path<(String, usize)>,
    Json(body): Json<NoteBody>,
) -> Response {
    let owner = owner_from_headers(&headers);
    match state
        .services
        .notes
        .add_note(&owner, &doc_id, clause_index, body.text)
    {
        Ok(note) => (StatusCode::CREATED, Json(note)).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn update_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((doc_id, clause_index, note_index)): Path<(String, usize, usize)>,
    Json(body): Json<NoteBody>,
) -> Response {
    let owner = owner_from_headers(&headers);
    match state
        .services
        .notes
        .update_note(&owner, &doc_id, clause_index, note_index, body.text)
    {
        Ok(note) => Json(note).into_response(),
        Err(e) => e.into_response(),
    }
}

pub async fn delete_note(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((doc_id, clause_index, note_index)): Path<(String, usize, usize)>,
) -> Response {
    let owner = owner_from_headers(&headers);
    match state
        .services
        .notes
        .delete_note(&owner, &doc_id, clause_index, note_index)
    {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Queue depth by job status.
pub async fn job_counts(State(state): State<AppState>) -> Response {
    match state.services.analysis.job_counts() {
        Ok(counts) => {
            let map: serde_json::Map<String, serde_json::Value> = counts
                .into_iter()
                .map(|(status, count)| (status, serde_json::json!(count)))
                .collect();
            Json(serde_json::Value::Object(map)).into_response()
        }
        Err(e) => e.into_response(),
    }
}
