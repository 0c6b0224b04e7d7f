//! API routes for the document Q&A server

pub mod documents;
pub mod query;
pub mod status;

use axum::{
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
    Router,
};

use crate::server::state::AppState;

/// Build all API routes
pub fn api_routes(max_upload_size: usize) -> Router<AppState> {
    Router::new()
        // Upload, with a larger body limit
        .route(
            "/upload",
            post(documents::upload).layer(DefaultBodyLimit::max(max_upload_size)),
        )
        .route("/ask", post(query::ask))
        .route("/files", get(documents::list_files))
        .route("/files/*name", delete(documents::delete_file))
        .route("/clear", delete(documents::clear))
        .route("/status", get(status::status))
        .route("/info", get(status::info))
}
