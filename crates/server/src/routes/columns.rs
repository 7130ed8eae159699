use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::post,
};
use db::TransactionTrait;
use db::models::{
    access::AccessGuard,
    board_column::{BoardColumn, CreateColumn},
    user::User,
};
use serde::Deserialize;
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_column_middleware};

#[derive(Debug, Deserialize, TS)]
pub struct RenameColumnRequest {
    pub title: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct ReorderColumnRequest {
    pub position: i32,
}

pub async fn create_column(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateColumn>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<BoardColumn>>), ApiError> {
    ApiError::require(AccessGuard::board(&state.db().pool, payload.board_id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    let column = BoardColumn::create(&tx, &payload, Uuid::new_v4()).await?;
    tx.commit().await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(column)),
    ))
}

pub async fn rename_column(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(column): Extension<BoardColumn>,
    Json(payload): Json<RenameColumnRequest>,
) -> Result<ResponseJson<ApiResponse<BoardColumn>>, ApiError> {
    ApiError::require(AccessGuard::column(&state.db().pool, column.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    let column = BoardColumn::rename(&tx, column.id, &payload.title).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

pub async fn reorder_column(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(column): Extension<BoardColumn>,
    Json(payload): Json<ReorderColumnRequest>,
) -> Result<ResponseJson<ApiResponse<BoardColumn>>, ApiError> {
    ApiError::require(AccessGuard::column(&state.db().pool, column.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    let column = BoardColumn::reorder(&tx, column.id, payload.position).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(column)))
}

pub async fn delete_column(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(column): Extension<BoardColumn>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ApiError::require(AccessGuard::column(&state.db().pool, column.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    BoardColumn::delete(&tx, column.id).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let column_id_router = Router::new()
        .route("/", axum::routing::put(rename_column).delete(delete_column))
        .route("/reorder", post(reorder_column))
        .layer(from_fn_with_state(state.clone(), load_column_middleware));

    Router::new()
        .route("/columns", post(create_column))
        .nest("/columns/{column_id}", column_id_router)
}
