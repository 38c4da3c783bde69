//! Web server implementation

use crate::error::ApiResult;
use crate::firmware::{firmware_routes, FirmwareStore};
use crate::html;
use crate::logs::{logs_routes, LogStore};
use crate::runner::{CommandRunner, RunManager, StopOutcome, SuiteRunner};
use crate::sessions::{editor_routes, EditorState};
use crate::settings::PanelConfig;
use crate::static_files::StaticFiles;
use autotest_common::Suite;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{
        sse::{Event, KeepAlive, Sse},
        Html, IntoResponse, Redirect, Response,
    },
    routing::{get, post},
    Form, Json, Router,
};
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

/// Web server state
#[derive(Clone)]
pub struct WebServer {
    state: Arc<WebServerState>,
}

struct WebServerState {
    /// Static file handler
    static_files: StaticFiles,

    /// Stored configuration and editor sessions
    editor: Arc<EditorState>,

    /// Test run coordinator
    runs: Arc<RunManager>,

    /// Run reports
    logs: Arc<LogStore>,

    firmware: Arc<FirmwareStore>,
    max_upload_bytes: usize,
}

pub async fn serve(cfg: PanelConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = cfg.listen.parse()?;
    let runner: Arc<dyn SuiteRunner> = Arc::new(CommandRunner::from_config(&cfg));
    WebServer::new(&cfg, runner).serve(addr).await
}

impl WebServer {
    /// Create a new web server
    pub fn new(cfg: &PanelConfig, runner: Arc<dyn SuiteRunner>) -> Self {
        Self {
            state: Arc::new(WebServerState {
                static_files: StaticFiles::new(),
                editor: Arc::new(EditorState::with_ttl(cfg.config_file.clone(), cfg.session_ttl())),
                runs: Arc::new(RunManager::from_config(cfg, runner)),
                logs: Arc::new(LogStore::new(cfg.logs_dir.clone())),
                firmware: Arc::new(FirmwareStore::new(cfg.firmware_dir.clone())),
                max_upload_bytes: cfg.max_upload_bytes,
            }),
        }
    }

    /// Create router
    pub fn router(&self) -> Router {
        Router::new()
            // Pages
            .route("/", get(index_handler))
            .route("/static/*path", get(static_handler))
            .route("/config", get(config_page_handler).post(config_save_handler))
            .route("/logs", get(logs_page_handler))
            .route("/firmware", get(firmware_page_handler))

            // Test runs
            .route("/runs/:suite/progress", get(run_progress_handler))
            .route("/api/run/stop", post(run_stop_handler))
            .route("/result", get(result_handler))

            .route("/api/health", get(health_handler))
            .with_state(self.state.clone())

            // Editor session API
            .merge(editor_routes(self.state.editor.clone()))

            // Logs browser and firmware store
            .merge(logs_routes(self.state.logs.clone()))
            .merge(firmware_routes(self.state.firmware.clone(), self.state.max_upload_bytes))

            // Fallback
            .fallback(not_found_handler)
            .layer(CorsLayer::new().allow_origin(Any).allow_methods(Any))
            .layer(TraceLayer::new_for_http())
    }

    /// Start the web server
    pub async fn serve(self, addr: SocketAddr) -> anyhow::Result<()> {
        info!("Control panel starting on http://{}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, self.router()).await?;

        Ok(())
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<WebServerState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "autotest-web",
        "version": autotest_common::VERSION,
        "running": state.runs.running(),
        "editor_sessions": state.editor.session_count().await,
    }))
}

async fn index_handler(State(state): State<Arc<WebServerState>>) -> Response {
    state.static_files.index()
}

async fn logs_page_handler(State(state): State<Arc<WebServerState>>) -> Response {
    state.static_files.logs_page()
}

async fn firmware_page_handler(State(state): State<Arc<WebServerState>>) -> Response {
    state.static_files.firmware_page()
}

async fn static_handler(
    State(state): State<Arc<WebServerState>>,
    Path(path): Path<String>,
) -> Response {
    state.static_files.serve(&path).await
}

async fn not_found_handler() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({"error": "not found"})),
    )
}

// ============================================================================
// Configuration page
// ============================================================================

async fn config_page_handler(State(state): State<Arc<WebServerState>>) -> ApiResult<Html<String>> {
    let (id, view, stored) = state.editor.open_session().await?;
    Ok(Html(html::config_page(&id, &view, &stored)))
}

#[derive(Debug, Deserialize)]
struct ConfigForm {
    #[serde(default)]
    config: String,
}

/// Plain form save: the field is written verbatim.
async fn config_save_handler(
    State(state): State<Arc<WebServerState>>,
    Form(form): Form<ConfigForm>,
) -> ApiResult<Redirect> {
    state.editor.write_stored(&form.config).await?;
    Ok(Redirect::to("/config"))
}

// ============================================================================
// Test runs
// ============================================================================

async fn run_progress_handler(
    State(state): State<Arc<WebServerState>>,
    Path(suite): Path<Suite>,
) -> Sse<impl Stream<Item = Result<Event, axum::Error>>> {
    let rx = state.runs.start(suite);
    let stream = futures::stream::unfold(rx, |mut rx| async move {
        let event = rx.recv().await?;
        Some((Event::default().json_data(&event), rx))
    });
    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn run_stop_handler(State(state): State<Arc<WebServerState>>) -> Json<StopOutcome> {
    Json(state.runs.stop())
}

#[derive(Debug, Serialize)]
struct ResultResponse {
    result: Option<String>,
}

async fn result_handler(State(state): State<Arc<WebServerState>>) -> Json<ResultResponse> {
    Json(ResultResponse {
        result: state.runs.last_result(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use autotest_common::{DeviceConfig, ProgressEvent};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Method, Request};
    use tempfile::TempDir;
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    struct EchoRunner;

    #[async_trait]
    impl SuiteRunner for EchoRunner {
        async fn run(
            &self,
            suite: Suite,
            devices: &[DeviceConfig],
            _: CancellationToken,
        ) -> autotest_common::Result<String> {
            Ok(format!("{}: {} ok", suite, devices.len()))
        }
    }

    fn server(tmp: &TempDir) -> WebServer {
        let cfg = PanelConfig {
            config_file: tmp.path().join("config.txt"),
            logs_dir: tmp.path().join("logs"),
            firmware_dir: tmp.path().join("firmware"),
            workdir: tmp.path().to_path_buf(),
            progress_step_ms: 0,
            ..Default::default()
        };
        WebServer::new(&cfg, Arc::new(EchoRunner))
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<serde_json::Value>) -> (StatusCode, String) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                req = req.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };
        let res = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    fn json(body: &str) -> serde_json::Value {
        serde_json::from_str(body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let tmp = TempDir::new().unwrap();
        let app = server(&tmp).router();
        let (status, body) = send(&app, Method::GET, "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["status"], "ok");
    }

    #[tokio::test]
    async fn test_form_save_writes_verbatim() {
        let tmp = TempDir::new().unwrap();
        let app = server(&tmp).router();

        let req = Request::builder()
            .method(Method::POST)
            .uri("/config")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("config=a%3D1%0A__________________%0Ab%3D2"))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::SEE_OTHER);
        assert_eq!(res.headers().get(header::LOCATION).unwrap(), "/config");

        let saved = std::fs::read_to_string(tmp.path().join("config.txt")).unwrap();
        assert_eq!(saved, "a=1\n__________________\nb=2");

        let (status, page) = send(&app, Method::GET, "/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains("Intercom 1"));
    }

    #[tokio::test]
    async fn test_editor_session_flow() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.txt"),
            "IP_CAMERA=10.0.0.1\n__________________\nIP_CAMERA=10.0.0.2\n__________________\nIP_CAMERA=10.0.0.3",
        )
        .unwrap();
        let app = server(&tmp).router();

        let (status, body) = send(&app, Method::POST, "/api/editor", None).await;
        assert_eq!(status, StatusCode::OK);
        let id = json(&body)["id"].as_str().unwrap().to_string();

        let (status, body) = send(&app, Method::DELETE, &format!("/api/editor/{}/groups/1", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let view = json(&body)["view"].clone();
        assert_eq!(view["groups"][0]["header"]["label"], "Intercom 0");
        assert_eq!(view["groups"][1]["header"]["label"], "Intercom 1");
        assert_eq!(view["groups"][0]["header"]["deletable"], false);
        assert_eq!(view["groups"][1]["header"]["deletable"], true);

        let (status, _) = send(&app, Method::DELETE, &format!("/api/editor/{}/groups/0", id), None).await;
        assert_eq!(status, StatusCode::CONFLICT);

        let (status, _) = send(
            &app,
            Method::POST,
            &format!("/api/editor/{}/groups/1/pairs", id),
            Some(serde_json::json!({"name": "LOGIN"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/editor/{}/groups/1/pairs/1", id),
            Some(serde_json::json!({"value": " admin "})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(
            &app,
            Method::PUT,
            &format!("/api/editor/{}/groups/5/pairs/0", id),
            Some(serde_json::json!({"value": "x"})),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::POST, &format!("/api/editor/{}/submit", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let expected = "IP_CAMERA=10.0.0.1\n__________________\nIP_CAMERA=10.0.0.3\nLOGIN=admin";
        assert_eq!(json(&body)["config"], expected);
        assert_eq!(std::fs::read_to_string(tmp.path().join("config.txt")).unwrap(), expected);

        let (status, _) = send(&app, Method::GET, &format!("/api/editor/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_progress_stream_ends_with_terminal_event() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("config.txt"), "IP_CAMERA=10.0.0.1\n__________________\nIP_CAMERA=10.0.0.2").unwrap();
        let app = server(&tmp).router();

        let (status, body) = send(&app, Method::GET, "/runs/acceptance/progress", None).await;
        assert_eq!(status, StatusCode::OK);

        let events: Vec<ProgressEvent> = body
            .lines()
            .filter_map(|line| line.strip_prefix("data:"))
            .map(|data| serde_json::from_str(data.trim()).unwrap())
            .collect();
        assert_eq!(events.len(), 3);
        assert_eq!(events.iter().filter(|e| e.done).count(), 1);
        assert_eq!(events[2].result.as_deref(), Some("acceptance: 2 ok"));

        let (_, body) = send(&app, Method::GET, "/result", None).await;
        assert_eq!(json(&body)["result"], "acceptance: 2 ok");

        let (_, body) = send(&app, Method::POST, "/api/run/stop", None).await;
        assert_eq!(json(&body)["status"], "idle");

        let (_, body) = send(&app, Method::GET, "/api/logs", None).await;
        let files = json(&body)["files"].as_array().unwrap().clone();
        assert_eq!(files.len(), 1);

        let name = files[0].as_str().unwrap();
        let (status, body) = send(&app, Method::GET, &format!("/api/logs/{}", name), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["content"], "acceptance: 2 ok");

        let (status, _) = send(&app, Method::DELETE, &format!("/api/logs/{}", name), None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::GET, &format!("/api/logs/{}", name), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_unknown_suite_rejected() {
        let tmp = TempDir::new().unwrap();
        let app = server(&tmp).router();
        let (status, _) = send(&app, Method::GET, "/runs/smoke/progress", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_log_names_cannot_escape() {
        let tmp = TempDir::new().unwrap();
        let app = server(&tmp).router();
        let (status, _) = send(&app, Method::GET, "/api/logs/..%2Fconfig.txt", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let (status, _) = send(&app, Method::DELETE, "/api/logs/%2E%2E", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    async fn fetch(app: &Router, uri: &str) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let headers = res.headers().clone();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, headers, bytes.to_vec())
    }

    #[tokio::test]
    async fn test_log_downloads() {
        let tmp = TempDir::new().unwrap();
        let logs = tmp.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(logs.join("run..txt"), "dotted").unwrap();
        std::fs::write(logs.join("logfirmware_20250101_120000.txt"), "uploaded").unwrap();
        let app = server(&tmp).router();

        let (status, body) = send(&app, Method::GET, "/api/logs/run..txt", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json(&body)["type"], "text");
        assert_eq!(json(&body)["content"], "dotted");

        let (status, headers, bytes) = fetch(&app, "/api/logs/download/logfirmware_20250101_120000.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"uploaded");
        assert!(headers[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment"));

        let (status, headers, bytes) = fetch(&app, "/api/logs/download_all").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/zip");
        let archive = zip::ZipArchive::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(archive.len(), 2);
    }

    #[tokio::test]
    async fn test_firmware_store_routes() {
        let tmp = TempDir::new().unwrap();
        let app = server(&tmp).router();

        let (status, _) = send(
            &app,
            Method::POST,
            "/api/firmware/versions/create",
            Some(serde_json::json!({"version": "1.2"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = send(
            &app,
            Method::POST,
            "/api/firmware/versions/create",
            Some(serde_json::json!({"version": "1.2"})),
        )
        .await;
        assert_eq!(status, StatusCode::CONFLICT);

        let boundary = "autotest-boundary";
        let body = format!(
            "--{b}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"fw.bin\"\r\n\
             Content-Type: application/octet-stream\r\n\r\nFIRMWARE\r\n--{b}--\r\n",
            b = boundary
        );
        let req = Request::builder()
            .method(Method::POST)
            .uri("/api/firmware/1.2/upload")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={}", boundary))
            .body(Body::from(body))
            .unwrap();
        let res = app.clone().oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let (_, body) = send(&app, Method::GET, "/api/firmware/versions", None).await;
        assert_eq!(json(&body)["versions"], serde_json::json!(["1.2"]));
        let (_, body) = send(&app, Method::GET, "/api/firmware/1.2", None).await;
        assert_eq!(json(&body)["files"], serde_json::json!(["fw.bin"]));

        let (status, _, bytes) = fetch(&app, "/firmware/1.2/fw.bin").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(bytes, b"FIRMWARE");

        let (status, _) = send(&app, Method::DELETE, "/api/firmware/1.2/delete/fw.bin", None).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = send(&app, Method::GET, "/api/firmware/7.7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_pages() {
        let tmp = TempDir::new().unwrap();
        let app = server(&tmp).router();
        for uri in ["/", "/logs", "/firmware", "/static/logs.js", "/static/firmware.js"] {
            let (status, _, _) = fetch(&app, uri).await;
            assert_eq!(status, StatusCode::OK, "{}", uri);
        }
    }
}
