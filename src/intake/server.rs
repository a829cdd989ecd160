//! axum server behind the published page's edit buttons.
//!
//! Handlers only append to the change log; documents are edited later by the
//! synchronizer. When a page secret is configured, every `POST /api/*` must
//! carry it in the `X-Page-Secret` header.

use axum::{
    Router,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::{oneshot, watch};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::changelog::FileChangeLog;
use crate::error::{Error, ErrorCode};
use crate::query::DATE_FORMAT;
use crate::retry::compute_jittered_delay;
use crate::service::{arrival_key, now_ms, today};
use crate::types::{PendingChange, TaskId};

/// Longest postpone accepted from the page, in days.
const MAX_POSTPONE_DAYS: u64 = 366;

/// Header the published page sends the secret in.
pub const SECRET_HEADER: &str = "x-page-secret";

/// State shared across handlers.
#[derive(Clone)]
pub struct IntakeServer {
    changelog: Arc<FileChangeLog>,
    secret: Option<Arc<str>>,
}

impl IntakeServer {
    /// `secret` gates the edit routes; empty leaves them open.
    pub fn new(changelog: Arc<FileChangeLog>, secret: &str) -> Self {
        Self {
            changelog,
            secret: (!secret.is_empty()).then(|| Arc::from(secret)),
        }
    }

    fn authorize(&self, headers: &HeaderMap) -> Result<(), ApiError> {
        let Some(expected) = &self.secret else {
            return Ok(());
        };
        let given = headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if given == Some(expected.as_ref()) {
            Ok(())
        } else {
            warn!("Rejected edit without a valid page secret");
            Err(ApiError(StatusCode::UNAUTHORIZED, Error::Unauthorized))
        }
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct QueuedResponse {
    queued: bool,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    code: ErrorCode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleRequest {
    pub task_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostponeRequest {
    pub task_id: String,
    pub days: u64,
}

#[derive(Debug, Deserialize)]
pub struct NewTaskRequest {
    pub text: String,
}

/// Handler failure, rendered as JSON.
struct ApiError(StatusCode, Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            error: self.1.to_string(),
            code: self.1.code(),
        };
        (self.0, Json(body)).into_response()
    }
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        warn!("Failed to queue change: {}", e);
        ApiError(StatusCode::INTERNAL_SERVER_ERROR, e)
    }
}

fn bad_request(e: Error) -> ApiError {
    ApiError(StatusCode::BAD_REQUEST, e)
}

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    let id = TaskId::from(raw.trim());
    id.resolve().map_err(bad_request)?;
    Ok(id)
}

async fn health() -> impl IntoResponse {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn queue_toggle(
    State(state): State<IntakeServer>,
    headers: HeaderMap,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<QueuedResponse>, ApiError> {
    state.authorize(&headers)?;
    let task_id = parse_task_id(&req.task_id)?;
    state
        .changelog
        .append(PendingChange::Toggle { task_id }, "")
        .await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn queue_postpone(
    State(state): State<IntakeServer>,
    headers: HeaderMap,
    Json(req): Json<PostponeRequest>,
) -> Result<Json<QueuedResponse>, ApiError> {
    state.authorize(&headers)?;
    let task_id = parse_task_id(&req.task_id)?;
    if req.days > MAX_POSTPONE_DAYS {
        return Err(bad_request(Error::InvalidRequest(format!(
            "cannot postpone more than {} days",
            MAX_POSTPONE_DAYS
        ))));
    }
    let new_date = today()
        .checked_add_days(chrono::Days::new(req.days))
        .ok_or_else(|| bad_request(Error::InvalidRequest("date out of range".to_string())))?
        .format(DATE_FORMAT)
        .to_string();
    state
        .changelog
        .append(PendingChange::Postpone { task_id, new_date }, "")
        .await?;
    Ok(Json(QueuedResponse { queued: true }))
}

async fn queue_new_task(
    State(state): State<IntakeServer>,
    headers: HeaderMap,
    Json(req): Json<NewTaskRequest>,
) -> Result<Json<QueuedResponse>, ApiError> {
    state.authorize(&headers)?;
    let text = req.text.trim();
    if text.is_empty() || text.contains('\n') {
        return Err(bad_request(Error::InvalidRequest(
            "task text must be a single non-empty line".to_string(),
        )));
    }
    state
        .changelog
        .append(
            PendingChange::NewTask {
                text: text.to_string(),
            },
            &arrival_key(now_ms()),
        )
        .await?;
    Ok(Json(QueuedResponse { queued: true }))
}

/// Build the router with all routes.
pub fn build_router(state: IntakeServer) -> Router {
    // The page is served from another origin
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/api/toggle", post(queue_toggle))
        .route("/api/postpone", post(queue_postpone))
        .route("/api/tasks", post(queue_new_task))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Status of the intake server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeStatus {
    Running,
    /// Failed to start, retrying in background.
    Retrying,
    Stopped,
}

/// Handle for managing the intake server lifecycle.
pub struct IntakeHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    status_rx: watch::Receiver<IntakeStatus>,
}

impl IntakeHandle {
    pub fn status(&self) -> IntakeStatus {
        *self.status_rx.borrow()
    }

    pub fn shutdown(mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

/// Bind and serve on `addr`.
///
/// Returns a shutdown sender and the bound address.
pub async fn start_server(
    state: IntakeServer,
    addr: SocketAddr,
) -> anyhow::Result<(oneshot::Sender<()>, SocketAddr)> {
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let bound_addr = listener.local_addr()?;

    info!("Intake server listening on http://{}", bound_addr);

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
                info!("Intake server shutting down");
            })
            .await
        {
            // Scheduled syncs keep running without intake
            tracing::error!("Intake server error: {}", e);
        }
    });

    Ok((shutdown_tx, bound_addr))
}

/// Start the intake server, retrying in the background with exponential
/// backoff while the port is unavailable. Never fails.
pub fn start_server_with_retry(
    state: IntakeServer,
    addr: SocketAddr,
    retry: crate::retry::RetryPolicy,
) -> IntakeHandle {

    let (status_tx, status_rx) = watch::channel(IntakeStatus::Retrying);
    let (handle_shutdown_tx, mut handle_shutdown_rx) = oneshot::channel::<()>();

    tokio::spawn(async move {
        let mut current_delay_ms = retry.initial_ms;

        loop {
            match handle_shutdown_rx.try_recv() {
                Ok(()) | Err(oneshot::error::TryRecvError::Closed) => {
                    info!("Intake retry loop shutting down");
                    let _ = status_tx.send(IntakeStatus::Stopped);
                    break;
                }
                Err(oneshot::error::TryRecvError::Empty) => {}
            }

            match start_server(state.clone(), addr).await {
                Ok((server_shutdown_tx, bound_addr)) => {
                    info!("Intake available at http://{}", bound_addr);
                    let _ = status_tx.send(IntakeStatus::Running);

                    let _ = handle_shutdown_rx.await;
                    let _ = server_shutdown_tx.send(());
                    let _ = status_tx.send(IntakeStatus::Stopped);
                    break;
                }
                Err(e) => {
                    warn!(
                        "Failed to start intake server on {}: {}. Retrying in {:.1}s...",
                        addr,
                        e,
                        current_delay_ms as f64 / 1000.0
                    );
                    let _ = status_tx.send(IntakeStatus::Retrying);

                    let delay = compute_jittered_delay(current_delay_ms, retry.jitter_ms);
                    tokio::time::sleep(delay).await;

                    current_delay_ms = retry.backoff(current_delay_ms);
                }
            }
        }
    });

    IntakeHandle {
        shutdown_tx: Some(handle_shutdown_tx),
        status_rx,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serialization() {
        let response = HealthResponse {
            status: "healthy",
            version: "0.1.0",
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("healthy"));
        assert!(json.contains("0.1.0"));
    }

    #[test]
    fn test_requests_use_camel_case() {
        let req: PostponeRequest =
            serde_json::from_str(r#"{"taskId":"notes.md:3","days":7}"#).unwrap();
        assert_eq!(req.task_id, "notes.md:3");
        assert_eq!(req.days, 7);
    }

    #[test]
    fn test_task_id_validation() {
        assert!(parse_task_id(" notes.md:3 ").is_ok());
        assert!(parse_task_id("notes.md").is_err());
    }

    async fn post(addr: SocketAddr, path: &str, secret: Option<&str>, body: &str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        let secret_header = secret
            .map(|s| format!("X-Page-Secret: {}\r\n", s))
            .unwrap_or_default();
        let request = format!(
            concat!(
                "POST {} HTTP/1.1\r\nHost: localhost\r\n",
                "Content-Type: application/json\r\nContent-Length: {}\r\n",
                "{}Connection: close\r\n\r\n{}",
            ),
            path,
            body.len(),
            secret_header,
            body
        );
        stream.write_all(request.as_bytes()).await.unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        response
    }

    async fn serve(
        changelog: &Arc<FileChangeLog>,
        secret: &str,
    ) -> (oneshot::Sender<()>, SocketAddr) {
        let state = IntakeServer::new(Arc::clone(changelog), secret);
        start_server(state, SocketAddr::from(([127, 0, 0, 1], 0)))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_requests_are_queued_in_the_change_log() {
        let temp = tempfile::TempDir::new().unwrap();
        let changelog = Arc::new(FileChangeLog::new(temp.path().join("pending.json")));
        let (shutdown, addr) = serve(&changelog, "").await;
        assert!(addr.ip().is_loopback());

        let ok = post(addr, "/api/toggle", None, r#"{"taskId":"notes.md:3"}"#).await;
        assert!(ok.starts_with("HTTP/1.1 200"));
        assert!(ok.contains(r#"{"queued":true}"#));

        let ok = post(addr, "/api/tasks", None, r#"{"text":"  call mom "}"#).await;
        assert!(ok.starts_with("HTTP/1.1 200"));

        let body = r#"{"taskId":"notes.md:3","days":400}"#;
        let rejected = post(addr, "/api/postpone", None, body).await;
        assert!(rejected.starts_with("HTTP/1.1 400"));
        assert!(rejected.contains("INVALID_REQUEST"));

        let pending = changelog.pending().await.unwrap();
        assert_eq!(pending.toggles.get("notes.md:3"), Some(&true));
        assert!(pending.postpones.is_empty());
        let texts: Vec<String> = pending.new_tasks.values().cloned().collect();
        assert_eq!(texts, vec!["call mom".to_string()]);

        let _ = shutdown.send(());
    }

    #[tokio::test]
    async fn test_edits_require_the_page_secret() {
        let temp = tempfile::TempDir::new().unwrap();
        let changelog = Arc::new(FileChangeLog::new(temp.path().join("pending.json")));
        let (shutdown, addr) = serve(&changelog, "s3cret").await;
        let body = r#"{"taskId":"notes.md:3"}"#;

        let missing = post(addr, "/api/toggle", None, body).await;
        assert!(missing.starts_with("HTTP/1.1 401"));
        assert!(missing.contains("UNAUTHORIZED"));

        let wrong = post(addr, "/api/tasks", Some("guess"), r#"{"text":"x"}"#).await;
        assert!(wrong.starts_with("HTTP/1.1 401"));
        assert!(changelog.pending().await.unwrap().is_empty());

        let ok = post(addr, "/api/toggle", Some("s3cret"), body).await;
        assert!(ok.starts_with("HTTP/1.1 200"));
        assert_eq!(changelog.pending().await.unwrap().toggles.len(), 1);

        let _ = shutdown.send(());
    }
}
