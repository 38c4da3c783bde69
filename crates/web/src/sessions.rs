//! Configuration editor sessions
//!
//! Each page load opens a session holding an [`Editor`] over the stored
//! configuration. The session is the authoritative model: the browser sends
//! operations, the server answers with the re-rendered form. Submitting
//! serializes the editor, writes the stored file and ends the session.

use autotest_common::{Editor, EditorView, Error, Result};
use axum::{
    extract::{Path, State},
    routing::{delete, get, post, put},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::html;

/// Default lifetime of an unsubmitted session.
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 12;

struct Session {
    editor: Editor,
    created_at: DateTime<Utc>,
}

/// Stored configuration file plus the open editor sessions.
pub struct EditorState {
    config_file: PathBuf,
    ttl: Duration,
    sessions: RwLock<HashMap<String, Session>>,
}

impl EditorState {
    pub fn new(config_file: PathBuf) -> Self {
        Self::with_ttl(config_file, Duration::hours(DEFAULT_SESSION_TTL_HOURS))
    }

    pub fn with_ttl(config_file: PathBuf, ttl: Duration) -> Self {
        Self {
            config_file,
            ttl,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Current stored text; a missing file reads as empty.
    pub async fn read_stored(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.config_file).await {
            Ok(text) => Ok(text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %self.config_file.display(), "config file not found, starting empty");
                Ok(String::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Replace the stored text verbatim.
    pub async fn write_stored(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.config_file.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        tokio::fs::write(&self.config_file, text).await?;
        info!(path = %self.config_file.display(), bytes = text.len(), "config saved");
        Ok(())
    }

    /// Open a session over the stored configuration.
    pub async fn open_session(&self) -> Result<(String, EditorView, String)> {
        let stored = self.read_stored().await?;
        let editor = Editor::open(&stored);
        let view = EditorView::project(&editor);
        let id = Uuid::new_v4().to_string();

        let mut sessions = self.sessions.write().await;
        let cutoff = Utc::now() - self.ttl;
        let before = sessions.len();
        sessions.retain(|_, s| s.created_at > cutoff);
        if sessions.len() < before {
            debug!(expired = before - sessions.len(), "dropped expired editor sessions");
        }
        sessions.insert(
            id.clone(),
            Session {
                editor,
                created_at: Utc::now(),
            },
        );
        debug!(session = %id, groups = view.groups.len(), "editor session opened");

        Ok((id, view, stored))
    }

    pub async fn view(&self, id: &str) -> Result<EditorView> {
        let sessions = self.sessions.read().await;
        let session = sessions
            .get(id)
            .ok_or_else(|| Error::not_found("session", id))?;
        Ok(EditorView::project(&session.editor))
    }

    /// Apply one operation to a session's editor.
    pub async fn apply<T>(&self, id: &str, op: impl FnOnce(&mut Editor) -> Result<T>) -> Result<T> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| Error::not_found("session", id))?;
        op(&mut session.editor)
    }

    /// Serialize, save and close the session. A failed write leaves the
    /// session open with its edits intact.
    pub async fn submit(&self, id: &str) -> Result<String> {
        let mut sessions = self.sessions.write().await;
        let text = sessions
            .get(id)
            .ok_or_else(|| Error::not_found("session", id))?
            .editor
            .preview();
        self.write_stored(&text).await?;
        sessions.remove(id);
        Ok(text)
    }

    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct AddGroupRequest {
    /// Index of the group to copy pairs from
    #[serde(default)]
    pub template: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PairRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub value: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EditorResponse {
    pub id: String,
    pub view: EditorView,
    pub html: String,
}

impl EditorResponse {
    fn new(id: String, view: EditorView) -> Self {
        let html = html::editor_fragment(&view);
        Self { id, view, html }
    }
}

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub saved: bool,
    pub config: String,
}

// ============================================================================
// Handlers
// ============================================================================

async fn open_session_handler(State(state): State<Arc<EditorState>>) -> ApiResult<Json<EditorResponse>> {
    let (id, view, _) = state.open_session().await?;
    Ok(Json(EditorResponse::new(id, view)))
}

async fn get_session_handler(
    State(state): State<Arc<EditorState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<EditorResponse>> {
    let view = state.view(&id).await?;
    Ok(Json(EditorResponse::new(id, view)))
}

async fn add_group_handler(
    State(state): State<Arc<EditorState>>,
    Path(id): Path<String>,
    Json(req): Json<AddGroupRequest>,
) -> ApiResult<Json<EditorResponse>> {
    let index = state
        .apply(&id, |editor| match req.template {
            Some(template) => editor.duplicate_group(template),
            None => Ok(editor.add_group(None)),
        })
        .await?;
    debug!(session = %id, index, template = ?req.template, "group added");
    let view = state.view(&id).await?;
    Ok(Json(EditorResponse::new(id, view)))
}

async fn remove_group_handler(
    State(state): State<Arc<EditorState>>,
    Path((id, group)): Path<(String, usize)>,
) -> ApiResult<Json<EditorResponse>> {
    state.apply(&id, |editor| editor.remove_group(group)).await?;
    let view = state.view(&id).await?;
    Ok(Json(EditorResponse::new(id, view)))
}

async fn add_pair_handler(
    State(state): State<Arc<EditorState>>,
    Path((id, group)): Path<(String, usize)>,
    Json(req): Json<PairRequest>,
) -> ApiResult<Json<EditorResponse>> {
    state
        .apply(&id, |editor| {
            editor.add_pair(group, req.name.unwrap_or_default(), req.value.unwrap_or_default())
        })
        .await?;
    let view = state.view(&id).await?;
    Ok(Json(EditorResponse::new(id, view)))
}

async fn update_pair_handler(
    State(state): State<Arc<EditorState>>,
    Path((id, group, pair)): Path<(String, usize, usize)>,
    Json(req): Json<PairRequest>,
) -> ApiResult<Json<serde_json::Value>> {
    state
        .apply(&id, |editor| {
            if let Some(name) = req.name {
                editor.set_name(group, pair, name)?;
            }
            if let Some(value) = req.value {
                editor.set_value(group, pair, value)?;
            }
            Ok(())
        })
        .await?;
    Ok(Json(serde_json::json!({ "updated": true })))
}

async fn remove_pair_handler(
    State(state): State<Arc<EditorState>>,
    Path((id, group, pair)): Path<(String, usize, usize)>,
) -> ApiResult<Json<EditorResponse>> {
    state.apply(&id, |editor| editor.remove_pair(group, pair)).await?;
    let view = state.view(&id).await?;
    Ok(Json(EditorResponse::new(id, view)))
}

async fn submit_handler(
    State(state): State<Arc<EditorState>>,
    Path(id): Path<String>,
) -> ApiResult<Json<SubmitResponse>> {
    let config = state.submit(&id).await?;
    info!(session = %id, "editor session submitted");
    Ok(Json(SubmitResponse {
        saved: true,
        config,
    }))
}

// ============================================================================
// Route Builder
// ============================================================================

/// Build the editor session routes
pub fn editor_routes(state: Arc<EditorState>) -> Router {
    Router::new()
        .route("/api/editor", post(open_session_handler))
        .route("/api/editor/:id", get(get_session_handler))
        .route("/api/editor/:id/groups", post(add_group_handler))
        .route("/api/editor/:id/groups/:group", delete(remove_group_handler))
        .route("/api/editor/:id/groups/:group/pairs", post(add_pair_handler))
        .route(
            "/api/editor/:id/groups/:group/pairs/:pair",
            put(update_pair_handler).delete(remove_pair_handler),
        )
        .route("/api/editor/:id/submit", post(submit_handler))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn state(tmp: &TempDir, stored: Option<&str>) -> EditorState {
        let path = tmp.path().join("config.txt");
        if let Some(text) = stored {
            std::fs::write(&path, text).unwrap();
        }
        EditorState::new(path)
    }

    #[tokio::test]
    async fn test_missing_file_opens_one_empty_group() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp, None);
        let (_, view, stored) = state.open_session().await.unwrap();
        assert_eq!(stored, "");
        assert_eq!(view.groups.len(), 1);
        assert!(view.groups[0].rows.is_empty());
    }

    #[tokio::test]
    async fn test_edits_then_submit_writes_file() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp, Some("IP_CAMERA=10.0.0.1:85\r\nLOGIN=admin\r\n"));
        let (id, _, _) = state.open_session().await.unwrap();

        state.apply(&id, |e| e.duplicate_group(0)).await.unwrap();
        state.apply(&id, |e| e.set_value(1, 0, "10.0.0.2:85")).await.unwrap();
        state.apply(&id, |e| e.set_name(1, 1, "")).await.unwrap();

        // nothing touches the stored file before submission
        let on_disk = std::fs::read_to_string(tmp.path().join("config.txt")).unwrap();
        assert_eq!(on_disk, "IP_CAMERA=10.0.0.1:85\r\nLOGIN=admin\r\n");

        let text = state.submit(&id).await.unwrap();
        assert_eq!(
            text,
            "IP_CAMERA=10.0.0.1:85\nLOGIN=admin\n__________________\nIP_CAMERA=10.0.0.2:85"
        );
        assert_eq!(std::fs::read_to_string(tmp.path().join("config.txt")).unwrap(), text);
        assert_eq!(state.session_count().await, 0);
        assert!(matches!(state.submit(&id).await, Err(Error::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_failed_write_keeps_session() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp, None);
        let (id, _, _) = state.open_session().await.unwrap();
        state.apply(&id, |e| e.add_pair(0, "LOGIN", "admin")).await.unwrap();

        // a directory in place of the file makes the write fail
        let path = tmp.path().join("config.txt");
        std::fs::create_dir(&path).unwrap();
        assert!(matches!(state.submit(&id).await, Err(Error::Io(_))));

        let view = state.view(&id).await.unwrap();
        assert_eq!(view.groups[0].rows[0].name, "LOGIN");

        std::fs::remove_dir(&path).unwrap();
        assert_eq!(state.submit(&id).await.unwrap(), "LOGIN=admin");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "LOGIN=admin");
        assert_eq!(state.session_count().await, 0);
    }

    #[tokio::test]
    async fn test_expired_sessions_are_evicted() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp, None);

        let backdate = |hours: i64| Session {
            editor: Editor::default(),
            created_at: Utc::now() - Duration::hours(hours),
        };
        {
            let mut sessions = state.sessions.write().await;
            sessions.insert("stale".to_string(), backdate(DEFAULT_SESSION_TTL_HOURS + 1));
            sessions.insert("recent".to_string(), backdate(1));
        }

        let (id, _, _) = state.open_session().await.unwrap();
        assert_eq!(state.session_count().await, 2);
        assert!(matches!(state.view("stale").await, Err(Error::NotFound { .. })));
        assert!(state.view("recent").await.is_ok());
        assert!(state.view(&id).await.is_ok());
    }

    #[tokio::test]
    async fn test_custom_ttl() {
        let tmp = TempDir::new().unwrap();
        let state = EditorState::with_ttl(tmp.path().join("config.txt"), Duration::zero());
        let (first, _, _) = state.open_session().await.unwrap();
        let (second, _, _) = state.open_session().await.unwrap();
        assert!(state.view(&first).await.is_err());
        assert!(state.view(&second).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let tmp = TempDir::new().unwrap();
        let state = state(&tmp, None);
        assert!(state.view("nope").await.is_err());
        assert!(state.apply("nope", |e| Ok(e.add_group(None))).await.is_err());
    }
}
