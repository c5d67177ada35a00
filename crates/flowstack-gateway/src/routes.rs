use std::sync::Arc;

use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use flowstack_core::error::FlowstackError;
use flowstack_graph::{prepare, Edge, Graph, Node, NodeExecutor};
use flowstack_kb::extract;

use crate::state::AppState;
use crate::stream;

// GET / — liveness, no auth
pub async fn root() -> Json<serde_json::Value> {
    Json(json!({ "message": "Flowstack backend is running" }))
}

// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// ── Stacks CRUD ─────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct StackBody {
    pub name: String,
    /// Either a parsed JSON object or a stringified one; the store
    /// normalizes both.
    #[serde(default)]
    pub blocks: serde_json::Value,
}

// POST /stacks
pub async fn create_stack(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StackBody>,
) -> Response {
    match state.stacks.create(&body.name, body.blocks).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

// GET /stacks
pub async fn list_stacks(State(state): State<Arc<AppState>>) -> Response {
    match state.stacks.list().await {
        Ok(records) => Json(records).into_response(),
        Err(e) => error_response(e),
    }
}

// GET /stacks/{id}
pub async fn get_stack(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    match state.stacks.get(id).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

// PUT /stacks/{id}
pub async fn update_stack(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<StackBody>,
) -> Response {
    match state.stacks.update(id, &body.name, body.blocks).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

// DELETE /stacks/{id}
pub async fn delete_stack(State(state): State<Arc<AppState>>, Path(id): Path<i64>) -> Response {
    match state.stacks.delete(id).await {
        Ok(()) => Json(json!({
            "message": format!("Stack {id} deleted successfully")
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

// ── Knowledge base ──────────────────────────────────────────────

// POST /upload/{stack_id} — multipart PDF upload into the stack's collection
pub async fn upload(
    State(state): State<Arc<AppState>>,
    Path(stack_id): Path<i64>,
    mut multipart: Multipart,
) -> Response {
    let mut filename = String::new();
    let mut payload = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or_default().to_string();
            match field.bytes().await {
                Ok(bytes) => payload = Some(bytes),
                Err(e) => {
                    return detail_response(
                        StatusCode::BAD_REQUEST,
                        format!("Failed to read upload: {e}"),
                    )
                }
            }
            break;
        }
    }

    let Some(payload) = payload else {
        return detail_response(StatusCode::BAD_REQUEST, "No file field in upload".to_string());
    };
    if !filename.to_lowercase().ends_with(".pdf") {
        return detail_response(
            StatusCode::BAD_REQUEST,
            "Only PDF files are supported".to_string(),
        );
    }

    let text = match extract::pdf_text(&payload) {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, filename = %filename, "PDF extraction failed");
            return detail_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error processing file: {e}"),
            );
        }
    };

    match state.kb.ingest(&text, stack_id, &filename).await {
        Ok(stats) => {
            info!(stack_id, filename = %filename, chunks = stats.chunks_added, "Document uploaded");
            Json(json!({
                "filename": filename,
                "preview": stats.preview,
                "length": text.chars().count(),
                "chunks_added": stats.chunks_added,
            }))
            .into_response()
        }
        Err(e) => detail_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error processing file: {e}"),
        ),
    }
}

#[derive(Deserialize)]
pub struct KbSearchBody {
    pub query: String,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

fn default_top_k() -> usize {
    4
}

// POST /kb/search/{stack_id}
pub async fn kb_search(
    State(state): State<Arc<AppState>>,
    Path(stack_id): Path<i64>,
    Json(body): Json<KbSearchBody>,
) -> Response {
    match state.kb.search(&body.query, stack_id, body.top_k).await {
        Ok(hits) => Json(hits).into_response(),
        Err(e) => error_response(e),
    }
}

// POST /kb/clear/{stack_id}
pub async fn kb_clear(State(state): State<Arc<AppState>>, Path(stack_id): Path<i64>) -> Response {
    match state.kb.clear(stack_id).await {
        Ok(()) => Json(json!({
            "cleared": true,
            "collection": format!("knowledge_base_{stack_id}"),
        }))
        .into_response(),
        Err(e) => error_response(e),
    }
}

// ── Execution ───────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct ExecuteRequest {
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default = "default_stream_logs")]
    pub stream_logs: bool,
}

fn default_stream_logs() -> bool {
    true
}

// POST /execute — validate, resolve, then stream NDJSON events.
//
// Everything that can fail before the stream opens is a synchronous 400;
// once the stream opens, failures arrive as in-band error events.
pub async fn execute(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ExecuteRequest>,
) -> Response {
    let graph = Graph::new(req.nodes, req.edges);
    let plan = match prepare(&graph) {
        Ok(plan) => plan,
        Err(e) => return error_response(e),
    };

    info!(hops = plan.path.len(), stream_logs = req.stream_logs, "Executing graph");

    let executor = NodeExecutor::new(state.backend.clone());
    stream::ndjson_response(executor.execute(plan, req.query, req.stream_logs)).into_response()
}

// ── Error mapping ───────────────────────────────────────────────

fn error_response(err: FlowstackError) -> Response {
    let status = match &err {
        FlowstackError::MalformedGraph(_) | FlowstackError::PathUnresolved => {
            StatusCode::BAD_REQUEST
        }
        FlowstackError::StackNotFound(_) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let detail = match &err {
        FlowstackError::StackNotFound(_) => "Stack not found".to_string(),
        other => other.to_string(),
    };
    detail_response(status, detail)
}

fn detail_response(status: StatusCode, detail: String) -> Response {
    (status, Json(json!({ "detail": detail }))).into_response()
}
