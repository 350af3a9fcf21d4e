//! REST surface over the task API.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{FromRequest, Path, Query, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use kanban_core::error::AppError;
use kanban_core::model::{Direction, NewTask, Task, TaskPatch};
use kanban_core::storage::sqlite_store::TaskStore;
use kanban_core::task_api::{self, BoardView, StepOutcome, TaskQuery};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: TaskStore,
}

/// Error wrapper mapping [`AppError`] codes onto HTTP statuses.
#[derive(Debug)]
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(value: AppError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            error!(error = %self.0, "request failed");
        }
        let body = Json(json!({
            "error": self.0.message(),
            "code": self.0.code(),
        }));
        (status, body).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// JSON request body whose failures surface as `invalid_input`. An empty body reads as the
/// default request, so a bare POST behaves like `{}`.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Default + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|rejection| AppError::invalid_input(rejection.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self(T::default()));
        }

        let value = serde_json::from_slice(&bytes)
            .map_err(|err| AppError::invalid_input(format!("invalid JSON body: {err}")))?;
        Ok(Self(value))
    }
}

/// Runs a store call off the async workers; SQLite access is blocking.
async fn with_store<T, F>(state: &AppState, call: F) -> Result<T, ApiError>
where
    F: FnOnce(&TaskStore) -> Result<T, AppError> + Send + 'static,
    T: Send + 'static,
{
    let store = state.store.clone();
    let outcome = tokio::task::spawn_blocking(move || call(&store))
        .await
        .map_err(|err| AppError::storage(format!("store task failed: {err}")))?;
    Ok(outcome?)
}

/// Build the HTTP router for the board service.
pub fn build_router(state: AppState) -> Router {
    let api = Router::new()
        .route("/tasks", get(list_tasks))
        .route("/board", get(board))
        .route("/projects", get(list_projects))
        .route("/task", post(create_task))
        .route(
            "/task/{id}",
            get(get_task)
                .put(update_task)
                .patch(update_task)
                .delete(delete_task),
        )
        .route("/task/{id}/move", post(move_task))
        .route("/task/{id}/step", post(step_task))
        .route("/task/{id}/archive", post(archive_task))
        .route("/task/{id}/unarchive", post(unarchive_task));

    Router::new()
        .nest("/api", api)
        .route("/health", get(health_check))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `listen` and serve until Ctrl-C.
pub async fn serve(listen: &str, store: TaskStore) -> Result<(), AppError> {
    let listener = TcpListener::bind(listen)
        .await
        .map_err(|err| AppError::io(format!("{listen}: {err}")))?;
    info!(address = %listen, db = %store.path().display(), "kanban server listening");

    axum::serve(listener, build_router(AppState { store }))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| AppError::io(err.to_string()))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown requested");
    }
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    #[serde(default)]
    archived: Option<String>,
    #[serde(default)]
    project: Option<String>,
    #[serde(default)]
    q: Option<String>,
}

impl From<ListParams> for TaskQuery {
    fn from(params: ListParams) -> Self {
        let include_archived = matches!(
            params.archived.as_deref().map(str::trim),
            Some("1" | "true" | "yes")
        );
        TaskQuery {
            include_archived,
            project: params.project,
            search: params.q,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct MoveRequest {
    #[serde(default)]
    to: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct StepRequest {
    #[serde(default)]
    direction: Option<String>,
}

async fn health_check() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

async fn list_tasks(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<Vec<Task>> {
    let query = TaskQuery::from(params);
    let tasks = with_store(&state, move |store| task_api::list_tasks(store, &query)).await?;
    Ok(Json(tasks))
}

async fn board(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> ApiResult<BoardView> {
    let query = TaskQuery::from(params);
    let view = with_store(&state, move |store| task_api::board(store, &query)).await?;
    Ok(Json(view))
}

async fn list_projects(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    let projects = with_store(&state, task_api::list_projects).await?;
    Ok(Json(projects))
}

async fn create_task(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<NewTask>,
) -> ApiResult<Value> {
    let id = with_store(&state, move |store| task_api::create_task(store, request)).await?;
    Ok(Json(json!({ "id": id })))
}

async fn get_task(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Task> {
    let task = with_store(&state, move |store| task_api::get_task(store, id)).await?;
    Ok(Json(task))
}

async fn update_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(patch): JsonBody<TaskPatch>,
) -> ApiResult<Value> {
    with_store(&state, move |store| task_api::update_task(store, id, patch)).await?;
    Ok(Json(json!({ "updated": true })))
}

async fn move_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(request): JsonBody<MoveRequest>,
) -> ApiResult<Value> {
    let Some(target) = request.to else {
        return Err(AppError::invalid_input("invalid target column").into());
    };
    let column = with_store(&state, move |store| task_api::move_task(store, id, &target)).await?;
    Ok(Json(json!({ "moved": true, "to": column })))
}

async fn step_task(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    JsonBody(request): JsonBody<StepRequest>,
) -> ApiResult<Value> {
    let direction: Direction = request.direction.as_deref().unwrap_or("").parse()?;
    let outcome = with_store(&state, move |store| task_api::step_task(store, id, direction)).await?;
    let (from, column) = match outcome {
        StepOutcome::Moved { from, to } => (Some(from), Some(to)),
        StepOutcome::NotMoved => (None, None),
    };
    Ok(Json(json!({ "moved": outcome.moved(), "from": from, "column": column })))
}

async fn archive_task(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    with_store(&state, move |store| task_api::archive_task(store, id)).await?;
    Ok(Json(json!({ "archived": true })))
}

async fn unarchive_task(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    with_store(&state, move |store| task_api::unarchive_task(store, id)).await?;
    Ok(Json(json!({ "unarchived": true })))
}

async fn delete_task(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Value> {
    with_store(&state, move |store| task_api::delete_task(store, id)).await?;
    Ok(Json(json!({ "deleted": true })))
}
