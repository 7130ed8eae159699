use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::TransactionTrait;
use db::models::{
    access::AccessGuard,
    task::{CreateTask, Task, TaskStats, UpdateTask},
    user::User,
};
use db::types::TaskStatus;
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_task_middleware};

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
}

/// Destination of a move: a column, or a status group for column-less
/// legacy tasks. Exactly one of the two must be set.
#[derive(Debug, Deserialize, TS)]
pub struct MoveTaskRequest {
    pub column_id: Option<Uuid>,
    pub status: Option<TaskStatus>,
    pub position: i32,
}

/// Legacy listing of column-less tasks, optionally filtered by status.
pub async fn get_tasks(
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = Task::find_legacy(&state.db().pool, query.status).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_stats(
    State(state): State<AppState>,
) -> Result<ResponseJson<ApiResponse<TaskStats>>, ApiError> {
    let stats = Task::stats(&state.db().pool).await?;
    Ok(ResponseJson(ApiResponse::success(stats)))
}

pub async fn create_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateTask>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Task>>), ApiError> {
    if let Some(column_id) = payload.column_id {
        ApiError::require(AccessGuard::column(&state.db().pool, column_id, user.id).await?)?;
    }
    let tx = state.db().pool.begin().await?;
    let task = Task::create(&tx, &payload, Uuid::new_v4()).await?;
    tx.commit().await?;
    Ok((StatusCode::CREATED, ResponseJson(ApiResponse::success(task))))
}

pub async fn update_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(task): Extension<Task>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    ApiError::require(AccessGuard::task(&state.db().pool, task.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    let task = Task::update(&tx, task.id, &payload).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn move_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(task): Extension<Task>,
    Json(payload): Json<MoveTaskRequest>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    ApiError::require(AccessGuard::task(&state.db().pool, task.id, user.id).await?)?;

    let task = match (payload.column_id, payload.status) {
        (Some(column_id), None) => {
            ApiError::require(AccessGuard::column(&state.db().pool, column_id, user.id).await?)?;
            let tx = state.db().pool.begin().await?;
            let task = Task::move_to_column(&tx, task.id, column_id, payload.position).await?;
            tx.commit().await?;
            task
        }
        (None, Some(status)) => {
            let tx = state.db().pool.begin().await?;
            let task = Task::move_to_status(&tx, task.id, status, payload.position).await?;
            tx.commit().await?;
            task
        }
        _ => {
            return Err(ApiError::BadRequest(
                "a move targets either a column or a status, not both".to_string(),
            ));
        }
    };
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ApiError::require(AccessGuard::task(&state.db().pool, task.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    Task::delete(&tx, task.id).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let task_id_router = Router::new()
        .route("/", axum::routing::put(update_task).delete(delete_task))
        .route("/move", post(move_task))
        .layer(from_fn_with_state(state.clone(), load_task_middleware));

    Router::new()
        .route("/tasks", get(get_tasks).post(create_task))
        .route("/tasks/stats", get(get_stats))
        .nest("/tasks/{task_id}", task_id_router)
}
