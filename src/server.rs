//! REST API over the task repository.
//!
//! Routes:
//!
//! - `GET/POST/DELETE /tasks` — list, create, clear
//! - `GET/PUT/DELETE /tasks/{id}` — fetch, update, remove
//! - the same shapes under `/epics` and `/subtasks`
//! - `GET /epics/{id}/subtasks` — an epic's subtasks in recorded order
//! - `GET /history` — recently viewed items, oldest first
//! - `GET /prioritized` — all items in schedule order
//!
//! The repository is the single shared-state boundary: one `RwLock` guards
//! it, and every handler body is one critical section. Fetch handlers take
//! the write lock because a successful fetch records view history.
//!
//! Error mapping: NotFound → 404, DanglingEpic → 422, ScheduleConflict → 409,
//! snapshot-store failures → 500. Bodies are `{"error": "..."}`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::info;

use crate::error::RepoError;
use crate::repo::TaskRepository;
use crate::task::{Epic, Subtask, Task, WorkItem};

type SharedRepo = Arc<RwLock<TaskRepository>>;
type ApiError = (StatusCode, Json<ErrorBody>);

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Serialize)]
struct CreatedResponse {
    id: u64,
}

#[derive(Serialize)]
struct UpdatedResponse {
    updated: bool,
}

#[derive(Serialize)]
struct RemovedResponse {
    removed: bool,
}

fn repo_error(err: RepoError) -> ApiError {
    let code = match &err {
        RepoError::NotFound(_) => StatusCode::NOT_FOUND,
        RepoError::DanglingEpic(_) => StatusCode::UNPROCESSABLE_ENTITY,
        RepoError::ScheduleConflict(_) => StatusCode::CONFLICT,
        RepoError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (code, Json(ErrorBody { error: err.to_string() }))
}

fn not_found(id: u64) -> ApiError {
    repo_error(RepoError::NotFound(id))
}

pub fn router(state: SharedRepo) -> Router {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task).delete(clear_tasks))
        .route(
            "/tasks/{id}",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/epics", get(list_epics).post(create_epic).delete(clear_epics))
        .route(
            "/epics/{id}",
            get(get_epic).put(update_epic).delete(delete_epic),
        )
        .route("/epics/{id}/subtasks", get(get_epic_subtasks))
        .route(
            "/subtasks",
            get(list_subtasks).post(create_subtask).delete(clear_subtasks),
        )
        .route(
            "/subtasks/{id}",
            get(get_subtask).put(update_subtask).delete(delete_subtask),
        )
        .route("/history", get(get_history))
        .route("/prioritized", get(get_prioritized))
        .with_state(state)
}

/// Run the API server on `addr`, blocking the current thread.
pub fn run(repo: TaskRepository, addr: &str) -> std::io::Result<()> {
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(async move {
        let state = Arc::new(RwLock::new(repo));
        let app = router(state);
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("taskboard api listening on {addr}");
        axum::serve(listener, app).await
    })
}

// ── Tasks ─────────────────────────────────────────────────────────────────

async fn list_tasks(State(state): State<SharedRepo>) -> Json<Vec<Task>> {
    Json(state.read().await.list_tasks())
}

async fn create_task(
    State(state): State<SharedRepo>,
    Json(task): Json<Task>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state.write().await.add_task(task).map_err(repo_error)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn clear_tasks(State(state): State<SharedRepo>) -> Result<StatusCode, ApiError> {
    state.write().await.remove_all_tasks().map_err(repo_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_task(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
) -> Result<Json<Task>, ApiError> {
    match state.write().await.get_task(id).map_err(repo_error)? {
        Some(task) => Ok(Json(task)),
        None => Err(not_found(id)),
    }
}

async fn update_task(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
    Json(mut task): Json<Task>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    task.id = id;
    state.write().await.update_task(task).map_err(repo_error)?;
    Ok(Json(UpdatedResponse { updated: true }))
}

async fn delete_task(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = state.write().await.remove_task(id).map_err(repo_error)?;
    Ok(Json(RemovedResponse { removed }))
}

// ── Epics ─────────────────────────────────────────────────────────────────

async fn list_epics(State(state): State<SharedRepo>) -> Json<Vec<Epic>> {
    Json(state.read().await.list_epics())
}

async fn create_epic(
    State(state): State<SharedRepo>,
    Json(epic): Json<Epic>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state.write().await.add_epic(epic).map_err(repo_error)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn clear_epics(State(state): State<SharedRepo>) -> Result<StatusCode, ApiError> {
    state.write().await.remove_all_epics().map_err(repo_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_epic(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
) -> Result<Json<Epic>, ApiError> {
    match state.write().await.get_epic(id).map_err(repo_error)? {
        Some(epic) => Ok(Json(epic)),
        None => Err(not_found(id)),
    }
}

async fn update_epic(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
    Json(mut epic): Json<Epic>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    epic.id = id;
    state.write().await.update_epic(epic).map_err(repo_error)?;
    Ok(Json(UpdatedResponse { updated: true }))
}

async fn delete_epic(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = state.write().await.remove_epic(id).map_err(repo_error)?;
    Ok(Json(RemovedResponse { removed }))
}

async fn get_epic_subtasks(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
) -> Result<Json<Vec<Subtask>>, ApiError> {
    let subtasks = state
        .read()
        .await
        .get_epic_subtasks(id)
        .map_err(repo_error)?;
    Ok(Json(subtasks))
}

// ── Subtasks ──────────────────────────────────────────────────────────────

async fn list_subtasks(State(state): State<SharedRepo>) -> Json<Vec<Subtask>> {
    Json(state.read().await.list_subtasks())
}

async fn create_subtask(
    State(state): State<SharedRepo>,
    Json(subtask): Json<Subtask>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let id = state.write().await.add_subtask(subtask).map_err(repo_error)?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

async fn clear_subtasks(State(state): State<SharedRepo>) -> Result<StatusCode, ApiError> {
    state.write().await.remove_all_subtasks().map_err(repo_error)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_subtask(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
) -> Result<Json<Subtask>, ApiError> {
    match state.write().await.get_subtask(id).map_err(repo_error)? {
        Some(subtask) => Ok(Json(subtask)),
        None => Err(not_found(id)),
    }
}

async fn update_subtask(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
    Json(mut subtask): Json<Subtask>,
) -> Result<Json<UpdatedResponse>, ApiError> {
    subtask.id = id;
    state.write().await.update_subtask(subtask).map_err(repo_error)?;
    Ok(Json(UpdatedResponse { updated: true }))
}

async fn delete_subtask(
    State(state): State<SharedRepo>,
    Path(id): Path<u64>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed = state.write().await.remove_subtask(id).map_err(repo_error)?;
    Ok(Json(RemovedResponse { removed }))
}

// ── Views ─────────────────────────────────────────────────────────────────

async fn get_history(State(state): State<SharedRepo>) -> Json<Vec<WorkItem>> {
    Json(state.read().await.history())
}

async fn get_prioritized(State(state): State<SharedRepo>) -> Json<Vec<WorkItem>> {
    Json(state.read().await.prioritized_tasks())
}
