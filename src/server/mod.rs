//! HTTP API for the tag and test lifecycle.
//!
//! One store connection is opened at startup and shared behind a mutex. Every
//! handler waits for it at most `request_timeout`; expiry answers 503 so the
//! caller can retry.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path as AxumPath, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, MutexGuard};

use crate::commands::{self, BulkTagAction};
use crate::config::ResolvedConfig;
use crate::storage::Storage;
use crate::Error;

/// Shared server state
#[derive(Clone)]
pub struct ServerState {
    /// The one store connection for this process
    pub storage: Arc<Mutex<Storage>>,
    /// How long a handler waits for the store
    pub request_timeout: Duration,
}

impl ServerState {
    pub fn new(storage: Storage, request_timeout: Duration) -> Self {
        Self {
            storage: Arc::new(Mutex::new(storage)),
            request_timeout,
        }
    }

    /// Acquire the store, giving up after the request timeout.
    async fn store(&self) -> Result<MutexGuard<'_, Storage>, ApiError> {
        tokio::time::timeout(self.request_timeout, self.storage.lock())
            .await
            .map_err(|_| ApiError(Error::Timeout))
    }
}

/// A library error rendered as an HTTP response with a JSON `{error}` body.
#[derive(Debug)]
pub struct ApiError(pub Error);

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        Self(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self(Error::InvalidArgument(rejection.body_text()))
    }
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Timeout => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, status = status.as_u16(), "request failed");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// Build the API router.
pub fn router(state: ServerState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/tags", get(list_tags))
        .route("/api/tags/{name}", post(create_tag).delete(delete_tag))
        .route("/api/tests", get(list_tests).post(create_test))
        .route("/api/tests/bulk-tag", post(bulk_tag))
        .route(
            "/api/tests/{id}",
            get(get_test).put(update_test).delete(delete_test),
        )
        .route("/api/settings", get(get_settings).post(set_setting))
        .route("/api/app-state", get(get_app_state))
        .with_state(state)
}

/// Start the API server and run until Ctrl+C.
///
/// Bootstrap runs once before the listener opens; its failure is logged and
/// never stops startup.
pub async fn start_server(config: &ResolvedConfig) -> crate::Result<()> {
    let mut storage = Storage::open_with_timeout(config.data_dir(), config.request_timeout())?;
    if let Some(outcome) = commands::run_startup_bootstrap(&mut storage, config.fixture_path()) {
        tracing::info!(
            inserted = outcome.inserted,
            skipped = outcome.skipped,
            "startup bootstrap"
        );
    }

    let state = ServerState::new(storage, config.request_timeout());
    let app = router(state);

    let addr = config.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, data_dir = %config.data_dir().display(), "tilt server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("tilt server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "commit": env!("TILT_GIT_COMMIT"),
        "built": env!("TILT_BUILD_TIMESTAMP"),
    }))
}

// === Tags ===

/// List every known tag.
async fn list_tags(State(state): State<ServerState>) -> ApiResult<Json<Value>> {
    let storage = state.store().await?;
    let list = commands::tag_list(&storage)?;
    Ok(Json(json!(list.tags)))
}

#[derive(Debug, Default, Deserialize)]
struct CreateTagBody {
    color: Option<String>,
}

/// Create a tag if absent. The body is optional.
async fn create_tag(
    State(state): State<ServerState>,
    AxumPath(name): AxumPath<String>,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    let body: CreateTagBody = if body.iter().all(u8::is_ascii_whitespace) {
        CreateTagBody::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| Error::InvalidArgument(format!("Invalid request body: {}", e)))?
    };

    let mut storage = state.store().await?;
    let result = commands::tag_create(&mut storage, &name, body.color)?;
    Ok(Json(json!(result)))
}

/// Delete a tag and untag everything that references it.
async fn delete_tag(
    State(state): State<ServerState>,
    AxumPath(name): AxumPath<String>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut storage = state.store().await?;
    let result = commands::tag_delete(&mut storage, &name)?;
    let status = if result.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    Ok((status, Json(json!(result))))
}

// === Tests ===

#[derive(Debug, Deserialize)]
struct TestListQuery {
    tag: Option<String>,
}

/// The reconciled list of derived and stored tests.
async fn list_tests(
    State(state): State<ServerState>,
    Query(query): Query<TestListQuery>,
) -> ApiResult<Json<Value>> {
    let storage = state.store().await?;
    let list = commands::test_list(&storage, query.tag.as_deref())?;
    Ok(Json(json!(list.tests)))
}

#[derive(Debug, Deserialize)]
struct CreateTestBody {
    name: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    steps: Vec<String>,
}

async fn create_test(
    State(state): State<ServerState>,
    body: Result<Json<CreateTestBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let Json(body) = body?;
    let name = body.name.unwrap_or_default();

    let mut storage = state.store().await?;
    let test = commands::test_create(&mut storage, &name, body.tags, body.steps)?;
    Ok((StatusCode::CREATED, Json(json!(test))))
}

async fn get_test(
    State(state): State<ServerState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<Value>> {
    let storage = state.store().await?;
    Ok(Json(json!(commands::test_show(&storage, &id)?)))
}

#[derive(Debug, Deserialize)]
struct UpdateTestBody {
    name: Option<String>,
    tags: Option<Vec<String>>,
    steps: Option<Vec<String>>,
}

async fn update_test(
    State(state): State<ServerState>,
    AxumPath(id): AxumPath<String>,
    body: Result<Json<UpdateTestBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let mut storage = state.store().await?;
    let test = commands::test_update(&mut storage, &id, body.name, body.tags, body.steps)?;
    Ok(Json(json!(test)))
}

async fn delete_test(
    State(state): State<ServerState>,
    AxumPath(id): AxumPath<String>,
) -> ApiResult<Json<Value>> {
    let mut storage = state.store().await?;
    Ok(Json(json!(commands::test_delete(&mut storage, &id)?)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BulkTagBody {
    #[serde(default)]
    test_ids: Vec<String>,
    tag: Option<String>,
    action: BulkTagAction,
}

async fn bulk_tag(
    State(state): State<ServerState>,
    body: Result<Json<BulkTagBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let tag = body.tag.unwrap_or_default();

    let mut storage = state.store().await?;
    let result = commands::bulk_tag(&mut storage, &body.test_ids, &tag, body.action)?;
    Ok(Json(json!(result)))
}

// === Settings & app state ===

#[derive(Debug, Deserialize)]
struct SettingsQuery {
    key: Option<String>,
}

/// One setting with `?key=`, otherwise all of them.
async fn get_settings(
    State(state): State<ServerState>,
    Query(query): Query<SettingsQuery>,
) -> ApiResult<Json<Value>> {
    let storage = state.store().await?;
    match query.key {
        Some(key) => Ok(Json(json!(commands::setting_get(&storage, &key)?))),
        None => Ok(Json(json!(commands::setting_list(&storage)?))),
    }
}

#[derive(Debug, Deserialize)]
struct SetSettingBody {
    key: String,
    value: Value,
}

async fn set_setting(
    State(state): State<ServerState>,
    body: Result<Json<SetSettingBody>, JsonRejection>,
) -> ApiResult<Json<Value>> {
    let Json(body) = body?;
    let mut storage = state.store().await?;
    Ok(Json(json!(commands::setting_set(&mut storage, &body.key, body.value)?)))
}

async fn get_app_state(State(state): State<ServerState>) -> ApiResult<Json<Value>> {
    let storage = state.store().await?;
    Ok(Json(json!(commands::app_state_show(&storage)?)))
}
