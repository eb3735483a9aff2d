use std::io::Cursor;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use muv_content_core::{RestoreOptions, RestoreReport};
use muv_content_repair::HtmlRepair;
use muv_content_storage::{BackupSummary, ContentRepository};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use uuid::Uuid;

#[derive(Clone)]
pub struct AppState {
    pub repo: ContentRepository,
    pub repairer: Option<Arc<dyn HtmlRepair>>,
    pub restore_defaults: RestoreOptions,
    /// Held for the duration of a restore pass, including passes whose
    /// caller has disconnected. Concurrent passes are refused.
    pub restore_gate: Arc<Mutex<()>>,
    pub retention_days: i64,
    pub api_token: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/functions/v1/restore-backups", post(restore_backups))
        .route("/functions/v1/normalize-slugs", post(normalize_slugs))
        .route("/api/v1/healthz", get(healthz))
        .route("/api/v1/posts/{slug}/backups", get(list_post_backups))
        .route("/api/v1/backups/{id}/download", get(download_backup))
        .route("/api/v1/retention", post(prune_backups))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthzResponse {
    status: &'static str,
}

async fn healthz() -> Json<HealthzResponse> {
    Json(HealthzResponse { status: "ok" })
}

fn require_api_auth(state: &AppState, headers: &HeaderMap) -> Result<(), StatusCode> {
    let Some(expected) = &state.api_token else {
        return Ok(());
    };

    let provided = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));

    match provided {
        Some(token) if token == expected => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

#[derive(Debug, Serialize)]
struct FailureResponse {
    success: bool,
    error: String,
}

fn failure(status: StatusCode, error: impl Into<String>) -> Response {
    let body = FailureResponse {
        success: false,
        error: error.into(),
    };
    (status, Json(body)).into_response()
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RestoreRequest {
    exclude_slugs: Option<Vec<String>>,
    min_words: Option<usize>,
}

impl RestoreRequest {
    /// An absent or empty body means "use the configured defaults".
    fn parse(body: &[u8]) -> Result<Self, serde_json::Error> {
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(body)
    }

    fn apply(self, defaults: &RestoreOptions) -> RestoreOptions {
        RestoreOptions {
            exclude_slugs: self
                .exclude_slugs
                .unwrap_or_else(|| defaults.exclude_slugs.clone()),
            min_words: self.min_words.unwrap_or(defaults.min_words),
            cta_class: defaults.cta_class.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
struct RestoreResponse {
    success: bool,
    #[serde(flatten)]
    report: RestoreReport,
}

async fn restore_backups(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Err(status) = require_api_auth(&state, &headers) {
        return status.into_response();
    }
    let options = match RestoreRequest::parse(&body) {
        Ok(request) => request.apply(&state.restore_defaults),
        Err(e) => return failure(StatusCode::BAD_REQUEST, format!("invalid request body: {e}")),
    };

    let Ok(running) = state.restore_gate.clone().try_lock_owned() else {
        return failure(StatusCode::CONFLICT, "a restore pass is already running");
    };

    info!(
        excluded = options.exclude_slugs.len(),
        min_words = options.min_words,
        "restore requested"
    );
    // Runs to completion even if the caller disconnects.
    let repo = state.repo.clone();
    let repairer = state.repairer.clone();
    let pass = tokio::spawn(async move {
        let _running = running;
        repo.restore(&options, repairer.as_deref()).await
    });

    match pass.await {
        Ok(Ok(report)) => Json(RestoreResponse {
            success: true,
            report,
        })
        .into_response(),
        Ok(Err(e)) => {
            error!(error = %e, "restore pass aborted");
            failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
        Err(e) => {
            error!(error = %e, "restore task failed");
            failure(StatusCode::INTERNAL_SERVER_ERROR, "restore task failed")
        }
    }
}

async fn normalize_slugs(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Err(status) = require_api_auth(&state, &headers) {
        return status.into_response();
    }
    match state.repo.normalize_slugs().await {
        Ok(report) => Json(report).into_response(),
        Err(e) => {
            error!(error = %e, "slug normalization aborted");
            failure(StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}"))
        }
    }
}

async fn list_post_backups(
    Path(slug): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<BackupSummary>>, StatusCode> {
    require_api_auth(&state, &headers)?;
    let backups = state
        .repo
        .list_backups_for_slug(&slug)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok(Json(backups))
}

async fn download_backup(
    Path(id): Path<String>,
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    require_api_auth(&state, &headers)?;
    let id = Uuid::parse_str(&id).map_err(|_| StatusCode::BAD_REQUEST)?;
    let backup = state
        .repo
        .get_backup(id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;
    let post = state
        .repo
        .get_post(backup.post_id)
        .await
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?
        .ok_or(StatusCode::NOT_FOUND)?;

    let bytes = backup.content.into_bytes();
    let mut tar_data = Vec::new();
    {
        let mut builder = tar::Builder::new(&mut tar_data);
        let mut hdr = tar::Header::new_gnu();
        hdr.set_size(bytes.len() as u64);
        hdr.set_mode(0o644);
        hdr.set_mtime(backup.created_at.timestamp().max(0) as u64);
        hdr.set_cksum();
        builder
            .append_data(&mut hdr, format!("{}.html", post.slug), Cursor::new(bytes))
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
        builder
            .finish()
            .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    }

    let compressed =
        zstd::encode_all(Cursor::new(&tar_data), 3).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let disposition = HeaderValue::from_str(&format!(
        "attachment; filename=backup-{}-{}.tar.zst",
        post.slug, backup.id
    ))
    .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    let mut response = compressed.into_response();
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/zstd"),
    );
    response
        .headers_mut()
        .insert(header::CONTENT_DISPOSITION, disposition);
    Ok(response)
}

async fn prune_backups(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, StatusCode> {
    require_api_auth(&state, &headers)?;
    let removed = state
        .repo
        .prune_backups_older_than_days(state.retention_days)
        .await
        .map_err(|e| {
            error!(error = %e, "retention pruning failed");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;
    Ok(Json(serde_json::json!({
        "removed": removed,
        "retention_days": state.retention_days,
    })))
}
