//! Backup HTTP Routes
//!
//! Thin request layer over [`BackupService`]. Handlers parse the request,
//! call one service operation and map [`BackupError`] to a JSON error body
//! with the status from [`BackupErrorCode::status_code`].

use std::io;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tracing::warn;
use uuid::Uuid;

use crate::backup::attempt::AttemptRecord;
use crate::backup::catalog::BulkDeleteReport;
use crate::backup::errors::{BackupError, BackupErrorCode, BackupResult};
use crate::backup::restore::RestoreOutcome;
use crate::backup::scheduler::{BulkScheduleDeleteReport, NewSchedule, ScheduleRecord};
use crate::backup::service::BackupService;
use crate::backup::{CatalogStatus, DumpFile, SQL_CONTENT_TYPE};

// ==================
// Request/Response Types
// ==================

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: u16,
    /// `DUMPVAULT_*` error code
    pub kind: String,
    /// Per-attempt diagnostics of aggregated failures
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<AttemptRecord>,
}

#[derive(Debug, Deserialize)]
pub struct RestoreRequest {
    pub file: String,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteFilesRequest {
    pub files: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct BulkDeleteSchedulesRequest {
    pub ids: Vec<Uuid>,
}

/// Error wrapper rendered as [`ErrorResponse`].
pub struct ApiError(BackupError);

impl From<BackupError> for ApiError {
    fn from(err: BackupError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let code = self.0.code();
        let status = StatusCode::from_u16(code.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            warn!(error = %self.0, "request failed");
        }

        let body = ErrorResponse {
            error: self.0.message().to_string(),
            code: status.as_u16(),
            kind: code.as_str().to_string(),
            diagnostics: self.0.attempts().to_vec(),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Run a catalog or schedule store call on the blocking pool; both touch the
/// filesystem synchronously.
async fn blocking<T, F>(service: Arc<BackupService>, op: F) -> ApiResult<T>
where
    F: FnOnce(&BackupService) -> BackupResult<T> + Send + 'static,
    T: Send + 'static,
{
    let result = tokio::task::spawn_blocking(move || op(&service))
        .await
        .map_err(|e| BackupError::io_error(io::Error::other(e), "Storage task failed"))?;
    Ok(result?)
}

// ==================
// Route Handlers
// ==================

/// GET /health
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// GET /backups - Dump files, newest first
async fn list_dumps(State(service): State<Arc<BackupService>>) -> ApiResult<Json<Vec<DumpFile>>> {
    Ok(Json(blocking(service, |s| s.list_dump_files()).await?))
}

/// GET /backups/status
async fn status(State(service): State<Arc<BackupService>>) -> ApiResult<Json<CatalogStatus>> {
    Ok(Json(blocking(service, |s| s.status()).await?))
}

/// POST /backups - Run a dump now
async fn run_dump(
    State(service): State<Arc<BackupService>>,
) -> ApiResult<(StatusCode, Json<DumpFile>)> {
    Ok((StatusCode::CREATED, Json(service.run_dump().await?)))
}

/// POST /backups/restore
async fn run_restore(
    State(service): State<Arc<BackupService>>,
    Json(request): Json<RestoreRequest>,
) -> ApiResult<Json<RestoreOutcome>> {
    Ok(Json(service.run_restore(&request.file).await?))
}

/// GET /backups/:name - Download a dump file
async fn download(
    State(service): State<Arc<BackupService>>,
    Path(name): Path<String>,
) -> ApiResult<Response> {
    let opened = blocking(service, move |s| s.open_dump_file(&name)).await?;
    let file = tokio::fs::File::open(&opened.path).await.map_err(|e| {
        BackupError::io_error(e, format!("Failed to open dump file: {}", opened.file.name))
    })?;

    let headers = [
        (header::CONTENT_TYPE, SQL_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", opened.file.name),
        ),
        (header::CONTENT_LENGTH, opened.file.size_bytes.to_string()),
    ];
    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// DELETE /backups/:name
async fn delete_dump(
    State(service): State<Arc<BackupService>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    blocking(service, move |s| s.delete_dump_file(&name)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /backups/bulk-delete
async fn bulk_delete_dumps(
    State(service): State<Arc<BackupService>>,
    Json(request): Json<BulkDeleteFilesRequest>,
) -> ApiResult<Json<BulkDeleteReport>> {
    Ok(Json(
        blocking(service, move |s| s.bulk_delete_dump_files(&request.files)).await?,
    ))
}

/// GET /schedules - Most recent first
async fn list_schedules(
    State(service): State<Arc<BackupService>>,
) -> ApiResult<Json<Vec<ScheduleRecord>>> {
    Ok(Json(blocking(service, |s| s.list_schedules()).await?))
}

/// POST /schedules
async fn create_schedule(
    State(service): State<Arc<BackupService>>,
    Json(request): Json<NewSchedule>,
) -> ApiResult<(StatusCode, Json<ScheduleRecord>)> {
    let created = blocking(service, move |s| s.create_schedule(&request)).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// DELETE /schedules/:id
async fn delete_schedule(
    State(service): State<Arc<BackupService>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    let id = Uuid::parse_str(&id).map_err(|_| BackupError::schedule_not_found(&id))?;
    blocking(service, move |s| s.delete_schedule(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// POST /schedules/bulk-delete
async fn bulk_delete_schedules(
    State(service): State<Arc<BackupService>>,
    Json(request): Json<BulkDeleteSchedulesRequest>,
) -> ApiResult<Json<BulkScheduleDeleteReport>> {
    Ok(Json(
        blocking(service, move |s| s.bulk_delete_schedules(&request.ids)).await?,
    ))
}

// ==================
// Router
// ==================

/// Create backup and schedule routes
pub fn backup_routes(service: Arc<BackupService>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/backups", get(list_dumps).post(run_dump))
        .route("/backups/status", get(status))
        .route("/backups/restore", post(run_restore))
        .route("/backups/bulk-delete", post(bulk_delete_dumps))
        .route("/backups/:name", get(download).delete(delete_dump))
        .route("/schedules", get(list_schedules).post(create_schedule))
        .route("/schedules/bulk-delete", post(bulk_delete_schedules))
        .route("/schedules/:id", delete(delete_schedule))
        .with_state(service)
}

impl ErrorResponse {
    /// Parsed `kind`, if it names a known code
    pub fn error_code(&self) -> Option<BackupErrorCode> {
        [
            BackupErrorCode::InvalidName,
            BackupErrorCode::UnsupportedDriver,
            BackupErrorCode::MissingDatabase,
            BackupErrorCode::NotFound,
            BackupErrorCode::EmptySource,
            BackupErrorCode::AllAttemptsFailed,
            BackupErrorCode::RestoreFailed,
            BackupErrorCode::InvalidSchedule,
            BackupErrorCode::ScheduleNotFound,
            BackupErrorCode::IoError,
            BackupErrorCode::InvalidConfig,
            BackupErrorCode::DirNotAccessible,
        ]
        .into_iter()
        .find(|c| c.as_str() == self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::service::tests::service;
    use crate::process::scripted::Reply;
    use axum::body::to_bytes;
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    const CONNECT_ERROR: &str = "mysqldump: Got error: 2003: Can't connect to MySQL server on '::1' (10061)";

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Response) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(json) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        (response.status(), response)
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_dump_list_download_delete() {
        let (_temp, service, _runner) = service(|_| Reply::dump("CREATE TABLE t (id INT);\n"));
        let app = backup_routes(Arc::new(service));

        let (status, response) = send(&app, "POST", "/backups", None).await;
        assert_eq!(status, StatusCode::CREATED);
        let name = json_body(response).await["name"].as_str().unwrap().to_string();

        let (status, response) = send(&app, "GET", "/backups", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(response).await[0]["name"], name.as_str());

        let (status, response) = send(&app, "GET", &format!("/backups/{}", name), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/sql");
        assert_eq!(
            response.headers()[header::CONTENT_DISPOSITION],
            format!("attachment; filename=\"{}\"", name).as_str()
        );
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"CREATE TABLE t (id INT);\n");

        let (status, _) = send(&app, "DELETE", &format!("/backups/{}", name), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &format!("/backups/{}", name), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_storage_calls_leave_the_async_worker() {
        let (_temp, service, _runner) = service(|_| Reply::ok());
        let service = Arc::new(service);
        let worker = std::thread::current().id();

        let (thread, files) = blocking(service.clone(), |s| {
            Ok((std::thread::current().id(), s.list_dump_files()?))
        })
        .await
        .ok()
        .unwrap();
        assert_ne!(thread, worker);
        assert!(files.is_empty());

        let err = match blocking(service, |s| s.open_dump_file("missing.sql")).await {
            Err(ApiError(e)) => e,
            Ok(_) => panic!("missing dump must not open"),
        };
        assert_eq!(err.code(), BackupErrorCode::NotFound);
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected() {
        let (_temp, service, _runner) = service(|_| Reply::ok());
        let app = backup_routes(Arc::new(service));

        let (status, response) = send(&app, "GET", "/backups/notes.txt", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        let body: ErrorResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.error_code(), Some(BackupErrorCode::InvalidName));

        let (status, _) = send(&app, "GET", "/backups/..%2Fsecret.sql", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &app,
            "POST",
            "/backups/restore",
            Some(serde_json::json!({ "file": "a b.sql" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_failed_dump_carries_diagnostics() {
        let (_temp, service, _runner) = service(|_| Reply::fail(2, CONNECT_ERROR));
        let app = backup_routes(Arc::new(service));

        let (status, response) = send(&app, "POST", "/backups", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let body: ErrorResponse = serde_json::from_value(json_body(response).await).unwrap();
        assert_eq!(body.error_code(), Some(BackupErrorCode::AllAttemptsFailed));
        assert_eq!(body.diagnostics.len(), 2);
        assert!(body.diagnostics[0].stderr.contains("Can't connect"));
    }

    #[tokio::test]
    async fn test_bulk_delete_dumps() {
        let (_temp, service, _runner) = service(|_| Reply::dump("-- dump\n"));
        let app = backup_routes(Arc::new(service));

        let (_, response) = send(&app, "POST", "/backups", None).await;
        let name = json_body(response).await["name"].as_str().unwrap().to_string();

        let (status, response) = send(
            &app,
            "POST",
            "/backups/bulk-delete",
            Some(serde_json::json!({ "files": [name, "missing.sql"] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let report = json_body(response).await;
        assert_eq!(report["deleted_count"], 1);
        assert_eq!(report["missing"], serde_json::json!(["missing.sql"]));
    }

    #[tokio::test]
    async fn test_schedule_routes() {
        let (_temp, service, _runner) = service(|_| Reply::ok());
        let app = backup_routes(Arc::new(service));

        let (status, _) = send(
            &app,
            "POST",
            "/schedules",
            Some(serde_json::json!({ "type": "scheduled", "frequency_days": 0 })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, response) = send(
            &app,
            "POST",
            "/schedules",
            Some(serde_json::json!({ "type": "scheduled", "frequency_days": 3 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created = json_body(response).await;

        let (_, response) = send(&app, "GET", "/schedules", None).await;
        let listed = json_body(response).await;
        assert_eq!(listed[0]["id"], created["id"]);

        let (status, response) = send(
            &app,
            "POST",
            "/schedules/bulk-delete",
            Some(serde_json::json!({ "ids": [created["id"]] })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(response).await["deleted_count"], 1);

        let (status, _) = send(&app, "DELETE", "/schedules/not-a-uuid", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
