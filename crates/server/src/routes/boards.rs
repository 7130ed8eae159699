use std::collections::HashMap;

use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::TransactionTrait;
use db::models::{
    access::AccessGuard,
    board::{Board, CreateBoard},
    board_column::BoardColumn,
    task::Task,
    user::User,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_board_middleware};

#[derive(Debug, Serialize, TS)]
pub struct ColumnWithTasks {
    #[serde(flatten)]
    pub column: BoardColumn,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize, TS)]
pub struct BoardDetail {
    #[serde(flatten)]
    pub board: Board,
    pub columns: Vec<ColumnWithTasks>,
}

#[derive(Debug, Deserialize, TS)]
pub struct RenameBoardRequest {
    pub name: String,
}

pub async fn create_board(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateBoard>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Board>>), ApiError> {
    payload.validate()?;
    if let Some(workspace_id) = payload.workspace_id {
        ApiError::require(AccessGuard::workspace(&state.db().pool, workspace_id, user.id).await?)?;
    }
    if let Some(project_id) = payload.project_id {
        ApiError::require(AccessGuard::project(&state.db().pool, project_id, user.id).await?)?;
    }

    let tx = state.db().pool.begin().await?;
    let board = Board::create(&tx, &payload, Uuid::new_v4()).await?;
    tx.commit().await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(board)),
    ))
}

/// Full board payload: columns in order, tasks in order within each column.
pub async fn get_board(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(board): Extension<Board>,
) -> Result<ResponseJson<ApiResponse<BoardDetail>>, ApiError> {
    ApiError::require(AccessGuard::board(&state.db().pool, board.id, user.id).await?)?;

    let columns = BoardColumn::find_by_board(&state.db().pool, board.id).await?;
    let mut by_column: HashMap<Uuid, Vec<Task>> = HashMap::new();
    for task in Task::find_by_board(&state.db().pool, board.id).await? {
        if let Some(column_id) = task.column_id {
            by_column.entry(column_id).or_default().push(task);
        }
    }
    let columns = columns
        .into_iter()
        .map(|column| {
            let tasks = by_column.remove(&column.id).unwrap_or_default();
            ColumnWithTasks { column, tasks }
        })
        .collect();

    Ok(ResponseJson(ApiResponse::success(BoardDetail {
        board,
        columns,
    })))
}

pub async fn rename_board(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(board): Extension<Board>,
    Json(payload): Json<RenameBoardRequest>,
) -> Result<ResponseJson<ApiResponse<Board>>, ApiError> {
    ApiError::require(AccessGuard::board(&state.db().pool, board.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    let board = Board::rename(&tx, board.id, &payload.name).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(board)))
}

pub async fn delete_board(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(board): Extension<Board>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ApiError::require(AccessGuard::board(&state.db().pool, board.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    Board::delete(&tx, board.id).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let board_id_router = Router::new()
        .route(
            "/",
            get(get_board).put(rename_board).delete(delete_board),
        )
        .layer(from_fn_with_state(state.clone(), load_board_middleware));

    Router::new()
        .route("/boards", post(create_board))
        .nest("/boards/{board_id}", board_id_router)
}
