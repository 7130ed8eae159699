use axum::{
    Extension, Json, Router,
    extract::State,
    http::StatusCode,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::TransactionTrait;
use db::models::{
    board::{Board, CreateBoard},
    board_column::{BoardColumn, CreateColumn},
    task::{CreateTask, Task},
    user::{CreateUser, User},
    workspace::Workspace,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError};

const DEFAULT_BOARD_NAME: &str = "Default board";
const SEED_COLUMNS: [&str; 3] = ["Backlog", "In Progress", "Done"];

#[derive(Debug, Deserialize, TS)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize, TS)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, TS)]
pub struct AuthSession {
    pub token: String,
    pub user: User,
}

/// Creates the account and seeds the personal workspace: a default board
/// with Backlog / In Progress / Done columns and one starter task, all in
/// one transaction.
pub async fn register(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<AuthSession>>), ApiError> {
    if payload.password.len() < 8 {
        return Err(ApiError::BadRequest(
            "password must be at least 8 characters".to_string(),
        ));
    }
    let password_hash = auth::hash_password(&payload.password)?;

    let tx = state.db().pool.begin().await?;
    let user = User::create(
        &tx,
        &CreateUser {
            name: payload.name.clone(),
            email: payload.email.clone(),
            password_hash,
        },
        Uuid::new_v4(),
    )
    .await?;
    let workspace = Workspace::create(
        &tx,
        user.id,
        &format!("{} — Workspace", user.name),
        Uuid::new_v4(),
    )
    .await?;
    let board = Board::create(
        &tx,
        &CreateBoard {
            name: DEFAULT_BOARD_NAME.to_string(),
            workspace_id: Some(workspace.id),
            project_id: None,
        },
        Uuid::new_v4(),
    )
    .await?;

    let mut backlog_id = None;
    for title in SEED_COLUMNS {
        let column = BoardColumn::create(
            &tx,
            &CreateColumn {
                board_id: board.id,
                title: title.to_string(),
            },
            Uuid::new_v4(),
        )
        .await?;
        backlog_id.get_or_insert(column.id);
    }
    Task::create(
        &tx,
        &CreateTask {
            column_id: backlog_id,
            title: "Add your first task".to_string(),
            description: Some("Use the create button to start filling your board.".to_string()),
            priority: None,
            status: None,
            due_date: None,
            assignee_id: None,
        },
        Uuid::new_v4(),
    )
    .await?;
    tx.commit().await?;

    let token = state.tokens().issue(user.id)?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(AuthSession { token, user })),
    ))
}

pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<ResponseJson<ApiResponse<AuthSession>>, ApiError> {
    let credential = User::credential_by_email(&state.db().pool, &payload.email)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    if !auth::verify_password(&payload.password, &credential.password_hash)? {
        return Err(ApiError::Unauthorized);
    }
    let token = state.tokens().issue(credential.user.id)?;
    Ok(ResponseJson(ApiResponse::success(AuthSession {
        token,
        user: credential.user,
    })))
}

pub async fn me(
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
}

pub fn protected_router() -> Router<AppState> {
    Router::new().route("/auth/me", get(me))
}
