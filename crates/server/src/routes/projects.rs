use axum::{
    Extension, Json, Router,
    extract::{Path, State},
    http::StatusCode,
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{delete, get, post},
};
use db::TransactionTrait;
use db::models::{
    access::AccessGuard,
    board::Board,
    project::{CreateProject, Project, ProjectMember},
    user::User,
};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use utils::response::ApiResponse;
use uuid::Uuid;

use crate::{AppState, error::ApiError, middleware::load_project_middleware};

#[derive(Debug, Serialize, TS)]
pub struct ProjectDetail {
    #[serde(flatten)]
    pub project: Project,
    pub members: Vec<ProjectMember>,
    pub boards: Vec<Board>,
}

#[derive(Debug, Deserialize, TS)]
pub struct AddMemberRequest {
    pub email: String,
}

pub async fn list_projects(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let projects = Project::find_for_user(&state.db().pool, user.id).await?;
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn create_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Json(payload): Json<CreateProject>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<Project>>), ApiError> {
    let tx = state.db().pool.begin().await?;
    let project = Project::create(&tx, &payload, user.id, Uuid::new_v4()).await?;
    tx.commit().await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(project)),
    ))
}

pub async fn get_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<ProjectDetail>>, ApiError> {
    ApiError::require(AccessGuard::project(&state.db().pool, project.id, user.id).await?)?;
    let members = Project::members(&state.db().pool, project.id).await?;
    let boards = Board::find_by_project(&state.db().pool, project.id).await?;
    Ok(ResponseJson(ApiResponse::success(ProjectDetail {
        project,
        members,
        boards,
    })))
}

pub async fn delete_project(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    ApiError::require(AccessGuard::project_owner(&state.db().pool, project.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    Project::delete(&tx, project.id).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub async fn add_member(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Extension(project): Extension<Project>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<(StatusCode, ResponseJson<ApiResponse<ProjectMember>>), ApiError> {
    ApiError::require(AccessGuard::project_owner(&state.db().pool, project.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    let member = Project::add_member(&tx, project.id, &payload.email).await?;
    tx.commit().await?;
    Ok((
        StatusCode::CREATED,
        ResponseJson(ApiResponse::success(member)),
    ))
}

pub async fn remove_member(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Path(member_id): Path<Uuid>,
) -> Result<ResponseJson<ApiResponse<()>>, ApiError> {
    let (member, project) = Project::member_with_project(&state.db().pool, member_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("member not found".to_string()))?;
    ApiError::require(AccessGuard::project_owner(&state.db().pool, project.id, user.id).await?)?;
    let tx = state.db().pool.begin().await?;
    Project::remove_member(&tx, member.id).await?;
    tx.commit().await?;
    Ok(ResponseJson(ApiResponse::success(())))
}

pub fn router(state: &AppState) -> Router<AppState> {
    let project_id_router = Router::new()
        .route("/", get(get_project).delete(delete_project))
        .route("/members", post(add_member))
        .layer(from_fn_with_state(state.clone(), load_project_middleware));

    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .nest("/projects/{project_id}", project_id_router)
        .route("/project-members/{member_id}", delete(remove_member))
}
