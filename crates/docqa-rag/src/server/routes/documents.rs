//! Upload, listing and deletion endpoints

use axum::{
    extract::{Multipart, Path, State},
    Json,
};
use std::time::Instant;

use crate::error::{Error, Result};
use crate::server::state::AppState;
use crate::types::{
    query::IngestOptions,
    response::{ClearResponse, DeleteResponse, FileListResponse, UploadResponse},
    FileType,
};

/// POST /api/upload - Upload one document (multipart `file`, optional `options`)
pub async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>> {
    let start = Instant::now();
    let mut options = IngestOptions::default();
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| Error::invalid(format!("Failed to read multipart field: {}", e)))?
    {
        let name = field.name().unwrap_or("").to_string();
        match name.as_str() {
            "options" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::invalid(format!("Failed to read options: {}", e)))?;
                options = serde_json::from_slice(&data)
                    .map_err(|e| Error::invalid(format!("Invalid upload options: {}", e)))?;
            }
            "file" => {
                let filename = field
                    .file_name()
                    .map(|name| name.trim().to_string())
                    .filter(|name| !name.is_empty())
                    .ok_or_else(|| Error::invalid("Uploaded file has no file name"))?;

                // Reject before reading the body
                if !FileType::from_filename(&filename).is_supported() {
                    return Err(Error::invalid(format!(
                        "Unsupported file type: {}. Supported: .pdf, .txt, .md",
                        filename
                    )));
                }

                let data = field
                    .bytes()
                    .await
                    .map_err(|e| Error::invalid(format!("Failed to read file: {}", e)))?;
                upload = Some((filename, data.to_vec()));
            }
            other => {
                tracing::debug!("Ignoring multipart field '{}'", other);
            }
        }
    }

    let (filename, data) = upload.ok_or_else(|| Error::invalid("No file provided"))?;
    tracing::info!("Upload: {} ({} bytes)", filename, data.len());

    let report = state
        .pipeline()
        .ingest_file(&filename, data, &options)
        .await?;

    let message = if report.replaced_chunks > 0 {
        format!(
            "Replaced {} ({} chunks, previously {})",
            report.document, report.chunks, report.replaced_chunks
        )
    } else {
        format!("Successfully processed {}", report.document)
    };

    Ok(Json(UploadResponse {
        message,
        filename: report.document,
        chunks: report.chunks,
        replaced_chunks: report.replaced_chunks,
        total_chunks: report.total_chunks,
        embedding_model: state.embedder().model().to_string(),
        processing_time_ms: start.elapsed().as_millis() as u64,
    }))
}

/// GET /api/files - List documents with their chunk counts
pub async fn list_files(State(state): State<AppState>) -> Json<FileListResponse> {
    let files = state.index().list_documents();
    let total_chunks: usize = files.iter().map(|f| f.chunks).sum();

    Json(FileListResponse {
        total_files: files.len(),
        total_chunks,
        files,
    })
}

/// DELETE /api/files/*name - Delete a document and all its chunks
pub async fn delete_file(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<Json<DeleteResponse>> {
    let filename = filename.trim().to_string();
    let chunks_deleted = state.pipeline().delete(&filename).await?;

    Ok(Json(DeleteResponse {
        message: format!("Successfully deleted {}", filename),
        filename,
        chunks_deleted,
        remaining_chunks: state.index().count(),
    }))
}

/// DELETE /api/clear - Delete every document
pub async fn clear(State(state): State<AppState>) -> Result<Json<ClearResponse>> {
    let outcome = state.pipeline().clear().await?;

    Ok(Json(ClearResponse {
        message: format!(
            "Cleared {} files ({} chunks)",
            outcome.documents, outcome.chunks
        ),
        files_deleted: outcome.documents,
        chunks_cleared: outcome.chunks,
    }))
}
