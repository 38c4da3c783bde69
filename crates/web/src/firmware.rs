//! Firmware store
//!
//! Firmware images live under the store root, one directory per version.
//! Uploaded pictures are normalised to PNG and named `info.png`,
//! `info1.png`, ... so the upload suite can find them; other files keep a
//! sanitised form of their original name.

use autotest_common::{Error, Result};
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ApiError, ApiResult};
use crate::static_files::{attachment, checked_name};

/// Firmware versions on disk.
pub struct FirmwareStore {
    root: PathBuf,
}

impl FirmwareStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    fn version_dir(&self, version: &str) -> ApiResult<PathBuf> {
        Ok(self.root.join(checked_name("version", version)?))
    }

    fn file_path(&self, version: &str, file: &str) -> ApiResult<PathBuf> {
        Ok(self.version_dir(version)?.join(checked_name("file", file)?))
    }

    /// Version directory names, sorted. A missing root has no versions.
    pub async fn versions(&self) -> Result<Vec<String>> {
        let mut versions = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(versions),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                versions.push(entry.file_name().to_string_lossy().to_string());
            }
        }
        versions.sort();
        Ok(versions)
    }

    pub async fn create_version(&self, version: &str) -> ApiResult<String> {
        let version = version.trim();
        if version.is_empty() {
            return Err(ApiError::BadRequest("version name is required".into()));
        }
        let dir = self.version_dir(version)?;
        tokio::fs::create_dir_all(&self.root).await?;
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => {
                info!(version, "firmware version created");
                Ok(version.to_string())
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                Err(Error::already_exists("version", version).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn files(&self, version: &str) -> ApiResult<Vec<String>> {
        let dir = self.version_dir(version)?;
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::not_found("version", version).into());
            }
            Err(e) => return Err(e.into()),
        };
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            files.push(entry.file_name().to_string_lossy().to_string());
        }
        files.sort();
        Ok(files)
    }

    /// Save an upload into `version`, creating it if needed. Returns the
    /// stored file name.
    pub async fn store(
        &self,
        version: &str,
        file_name: &str,
        content_type: Option<&str>,
        bytes: Vec<u8>,
    ) -> ApiResult<String> {
        let dir = self.version_dir(version)?;
        tokio::fs::create_dir_all(&dir).await?;

        let is_image = content_type.is_some_and(|ct| ct.starts_with("image/"));
        let (name, content) = if is_image {
            let png = tokio::task::spawn_blocking(move || to_png(&bytes))
                .await
                .map_err(|e| Error::Internal(format!("image task failed: {}", e)))??;
            (unique_info_name(&dir).await?, png)
        } else {
            let name = secure_file_name(file_name);
            if name.is_empty() {
                return Err(ApiError::BadRequest(format!("unusable file name: {:?}", file_name)));
            }
            (name, bytes)
        };

        tokio::fs::write(dir.join(&name), &content).await?;
        info!(version, file = %name, bytes = content.len(), "firmware file stored");
        Ok(name)
    }

    pub async fn read(&self, version: &str, file: &str) -> ApiResult<Vec<u8>> {
        let path = self.file_path(version, file)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found("file", format!("{}/{}", version, file)).into())
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete(&self, version: &str, file: &str) -> ApiResult<()> {
        let path = self.file_path(version, file)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(version, file, "firmware file deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::not_found("file", format!("{}/{}", version, file)).into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Re-encode any decodable picture as RGBA PNG.
fn to_png(bytes: &[u8]) -> ApiResult<Vec<u8>> {
    let img = image::load_from_memory(bytes)
        .map_err(|e| ApiError::BadRequest(format!("image conversion failed: {}", e)))?;
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img.to_rgba8())
        .write_to(&mut out, image::ImageFormat::Png)
        .map_err(|e| Error::Internal(format!("png encoding failed: {}", e)))?;
    Ok(out.into_inner())
}

/// First free name of `info.png`, `info1.png`, `info2.png`, ...
async fn unique_info_name(dir: &std::path::Path) -> Result<String> {
    let mut name = "info.png".to_string();
    let mut counter = 1;
    while tokio::fs::try_exists(dir.join(&name)).await? {
        name = format!("info{}.png", counter);
        counter += 1;
    }
    Ok(name)
}

/// Last path component reduced to ASCII letters, digits, `.`, `-` and `_`;
/// whitespace becomes `_` and leading dots are dropped.
fn secure_file_name(raw: &str) -> String {
    let base = raw.rsplit(&['/', '\\'][..]).next().unwrap_or(raw);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    cleaned.trim_start_matches(|c| c == '.' || c == '_').to_string()
}

// ============================================================================
// Handlers
// ============================================================================

#[derive(Debug, Deserialize)]
struct CreateVersionRequest {
    #[serde(default)]
    version: String,
}

async fn list_versions_handler(State(store): State<Arc<FirmwareStore>>) -> ApiResult<Json<serde_json::Value>> {
    let versions = store.versions().await?;
    Ok(Json(serde_json::json!({ "versions": versions })))
}

async fn create_version_handler(
    State(store): State<Arc<FirmwareStore>>,
    Json(req): Json<CreateVersionRequest>,
) -> ApiResult<Response> {
    let version = store.create_version(&req.version).await?;
    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({ "success": true, "version": version })),
    )
        .into_response())
}

async fn list_files_handler(
    State(store): State<Arc<FirmwareStore>>,
    Path(version): Path<String>,
) -> ApiResult<Json<serde_json::Value>> {
    let files = store.files(&version).await?;
    Ok(Json(serde_json::json!({ "files": files })))
}

async fn upload_handler(
    State(store): State<Arc<FirmwareStore>>,
    Path(version): Path<String>,
    mut multipart: Multipart,
) -> ApiResult<Json<serde_json::Value>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field.content_type().map(str::to_string);
        if file_name.is_empty() {
            return Err(ApiError::BadRequest("no file selected".into()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(e.to_string()))?;

        let stored = store
            .store(&version, &file_name, content_type.as_deref(), bytes.to_vec())
            .await?;
        return Ok(Json(serde_json::json!({ "success": true, "filename": stored })));
    }
    Err(ApiError::BadRequest("missing file field".into()))
}

async fn download_handler(
    State(store): State<Arc<FirmwareStore>>,
    Path((version, file)): Path<(String, String)>,
) -> ApiResult<Response> {
    let bytes = store.read(&version, &file).await?;
    Ok(attachment(&file, bytes))
}

async fn delete_handler(
    State(store): State<Arc<FirmwareStore>>,
    Path((version, file)): Path<(String, String)>,
) -> ApiResult<Json<serde_json::Value>> {
    store.delete(&version, &file).await?;
    Ok(Json(serde_json::json!({ "success": true })))
}

// ============================================================================
// Route Builder
// ============================================================================

/// Build the firmware store routes
pub fn firmware_routes(store: Arc<FirmwareStore>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/api/firmware/versions", get(list_versions_handler))
        .route("/api/firmware/versions/create", post(create_version_handler))
        .route("/api/firmware/:version", get(list_files_handler))
        .route("/api/firmware/:version/upload", post(upload_handler))
        .route("/api/firmware/:version/delete/:file", delete(delete_handler))
        .route("/firmware/:version/:file", get(download_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(store)
}
