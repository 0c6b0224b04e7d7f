//! Status and info endpoints

use axum::{extract::State, Json};

use crate::server::state::AppState;
use crate::types::response::StatusResponse;

/// GET /api/status - Store and backend summary
pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let index = state.index();

    Json(StatusResponse {
        status: "ok".to_string(),
        documents_in_db: index.count(),
        files: index.document_count(),
        embedding_model: state.embedder().model().to_string(),
        embedding_dimension: index.dimensions(),
        llm: format!("{} ({})", state.llm().name(), state.llm().model()),
        delete_policy: index.policy().to_string(),
        pending_tombstones: index.pending_tombstones(),
    })
}

/// GET /api/info - API description
pub async fn info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "docqa-rag",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Document Q&A: upload documents, ask questions, get answers with source excerpts",
        "endpoints": {
            "POST /api/upload": "Upload a document (multipart field 'file', optional JSON 'options')",
            "POST /api/ask": "Ask a question: {\"question\": \"...\", \"k\": 3}",
            "GET /api/files": "List uploaded documents",
            "DELETE /api/files/{name}": "Delete a document",
            "GET /api/status": "Store and backend status",
            "DELETE /api/clear": "Delete all documents"
        },
        "supported_file_types": ["pdf", "txt", "md"]
    }))
}
