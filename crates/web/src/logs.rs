//! Run log browser
//!
//! Lists, shows, downloads and deletes the files in the logs directory, and
//! bundles all of them into a single zip download.

use autotest_common::{Error, Result};
use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Serialize;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};
use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::error::ApiResult;
use crate::static_files::{attachment, checked_name};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif"];

/// What the browser shows for one log file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogEntry {
    Text { filename: String, content: String },
    Image { filename: String, url: String },
}

/// Files in the logs directory.
pub struct LogStore {
    dir: PathBuf,
}

impl LogStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path(&self, name: &str) -> ApiResult<PathBuf> {
        Ok(self.dir.join(checked_name("log", name)?))
    }

    /// Sorted file names; a missing directory is empty.
    pub async fn list(&self) -> Result<Vec<String>> {
        let mut files = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(files),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        files.sort();
        Ok(files)
    }

    pub async fn read(&self, name: &str) -> ApiResult<Vec<u8>> {
        let path = self.path(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found("log", name).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Images are returned as a download link, everything else as text.
    pub async fn entry(&self, name: &str) -> ApiResult<LogEntry> {
        if is_image(name) {
            // existence check only
            self.read(name).await?;
            return Ok(LogEntry::Image {
                filename: name.to_string(),
                url: format!("/api/logs/download/{}", name),
            });
        }
        let bytes = self.read(name).await?;
        Ok(LogEntry::Text {
            filename: name.to_string(),
            content: String::from_utf8_lossy(&bytes).to_string(),
        })
    }

    pub async fn delete(&self, name: &str) -> ApiResult<()> {
        let path = self.path(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(log = %name, "log deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(Error::not_found("log", name).into()),
            Err(e) => Err(e.into()),
        }
    }

    /// Zip archive of every log file.
    pub async fn archive(&self) -> Result<Vec<u8>> {
        let names = self.list().await?;
        let dir = self.dir.clone();
        let count = names.len();
        let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut zip = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
            let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
            for name in &names {
                let content = std::fs::read(dir.join(name))?;
                zip.start_file(name.as_str(), options).map_err(zip_error)?;
                zip.write_all(&content)?;
            }
            Ok(zip.finish().map_err(zip_error)?.into_inner())
        })
        .await
        .map_err(|e| Error::Internal(format!("archive task failed: {}", e)))??;

        info!(files = count, bytes = bytes.len(), "log archive built");
        Ok(bytes)
    }
}

fn zip_error(e: zip::result::ZipError) -> Error {
    Error::Internal(format!("zip: {}", e))
}

fn is_image(name: &str) -> bool {
    std::path::Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Serialize)]
struct LogListResponse {
    files: Vec<String>,
}

async fn list_logs_handler(State(store): State<Arc<LogStore>>) -> ApiResult<Json<LogListResponse>> {
    Ok(Json(LogListResponse {
        files: store.list().await?,
    }))
}

async fn get_log_handler(
    State(store): State<Arc<LogStore>>,
    Path(name): Path<String>,
) -> ApiResult<Json<LogEntry>> {
    Ok(Json(store.entry(&name).await?))
}

async fn delete_log_handler(
    State(store): State<Arc<LogStore>>,
    Path(name): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    store.delete(&name).await?;
    Ok(Json(serde_json::json!({"success": true})))
}

async fn download_log_handler(
    State(store): State<Arc<LogStore>>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let bytes = store.read(&name).await?;
    Ok(attachment(&name, bytes))
}

async fn download_all_handler(State(store): State<Arc<LogStore>>) -> ApiResult<Response> {
    let bytes = store.archive().await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/zip"),
            (header::CONTENT_DISPOSITION, "attachment; filename=logs.zip"),
        ],
        bytes,
    )
        .into_response())
}

// ============================================================================
// Route Builder
// ============================================================================

/// Build the logs browser routes
pub fn logs_routes(store: Arc<LogStore>) -> Router {
    Router::new()
        .route("/api/logs", get(list_logs_handler))
        .route("/api/logs/download_all", get(download_all_handler))
        .route("/api/logs/download/:name", get(download_log_handler))
        .route("/api/logs/:name", get(get_log_handler).delete(delete_log_handler))
        .with_state(store)
}
