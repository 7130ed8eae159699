use axum::{Extension, Router, extract::State, response::Json as ResponseJson, routing::get};
use db::models::{board::Board, user::User, workspace::Workspace};
use serde::Serialize;
use ts_rs::TS;
use utils::response::ApiResponse;

use crate::{AppState, error::ApiError};

#[derive(Debug, Serialize, TS)]
pub struct WorkspaceWithBoards {
    #[serde(flatten)]
    pub workspace: Workspace,
    pub boards: Vec<Board>,
}

pub async fn list_workspaces(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
) -> Result<ResponseJson<ApiResponse<Vec<WorkspaceWithBoards>>>, ApiError> {
    let workspaces = Workspace::find_by_owner(&state.db().pool, user.id).await?;
    let mut out = Vec::with_capacity(workspaces.len());
    for workspace in workspaces {
        let boards = Board::find_by_workspace(&state.db().pool, workspace.id).await?;
        out.push(WorkspaceWithBoards { workspace, boards });
    }
    Ok(ResponseJson(ApiResponse::success(out)))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/workspaces", get(list_workspaces))
}
