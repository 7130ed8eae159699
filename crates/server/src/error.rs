use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::{
    DbErr,
    models::{
        access::{Access, AccessError},
        board::BoardError,
        board_column::ColumnError,
        project::ProjectError,
        task::TaskError,
        user::UserError,
        workspace::WorkspaceError,
    },
};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl From<AccessError> for ApiError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::Database(db_err) => ApiError::Database(db_err),
            AccessError::NotFound => ApiError::NotFound("entity not found".to_string()),
        }
    }
}

impl From<auth::AuthError> for ApiError {
    fn from(err: auth::AuthError) -> Self {
        match err {
            auth::AuthError::InvalidToken(_) => ApiError::Unauthorized,
            auth::AuthError::PasswordHash(msg) => ApiError::Internal(msg),
        }
    }
}

impl ApiError {
    /// Converts a guard verdict into a typed error instead of a silent no-op.
    pub fn require(access: Access) -> Result<(), ApiError> {
        match access {
            Access::Allowed => Ok(()),
            Access::Denied => Err(ApiError::Forbidden(
                "you do not have access to this resource".to_string(),
            )),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = match &self {
            ApiError::User(err) => match err {
                UserError::EmailTaken => (StatusCode::CONFLICT, "UserError"),
                UserError::UserNotFound => (StatusCode::NOT_FOUND, "UserError"),
                UserError::ValidationError(_) => (StatusCode::BAD_REQUEST, "UserError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "UserError"),
            },
            ApiError::Workspace(err) => match err {
                WorkspaceError::WorkspaceNotFound | WorkspaceError::OwnerNotFound => {
                    (StatusCode::NOT_FOUND, "WorkspaceError")
                }
                WorkspaceError::ValidationError(_) => (StatusCode::BAD_REQUEST, "WorkspaceError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "WorkspaceError"),
            },
            ApiError::Project(err) => match err {
                ProjectError::ProjectNotFound
                | ProjectError::UserNotFound
                | ProjectError::MemberNotFound => (StatusCode::NOT_FOUND, "ProjectError"),
                ProjectError::AlreadyMember => (StatusCode::CONFLICT, "ProjectError"),
                ProjectError::ValidationError(_) => (StatusCode::BAD_REQUEST, "ProjectError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "ProjectError"),
            },
            ApiError::Board(err) => match err {
                BoardError::BoardNotFound | BoardError::ParentNotFound => {
                    (StatusCode::NOT_FOUND, "BoardError")
                }
                BoardError::ValidationError(_) => (StatusCode::BAD_REQUEST, "BoardError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "BoardError"),
            },
            ApiError::Column(err) => match err {
                ColumnError::ColumnNotFound | ColumnError::BoardNotFound => {
                    (StatusCode::NOT_FOUND, "ColumnError")
                }
                ColumnError::ValidationError(_) => (StatusCode::BAD_REQUEST, "ColumnError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "ColumnError"),
            },
            ApiError::Task(err) => match err {
                TaskError::TaskNotFound
                | TaskError::ColumnNotFound
                | TaskError::AssigneeNotFound => (StatusCode::NOT_FOUND, "TaskError"),
                TaskError::ValidationError(_) => (StatusCode::BAD_REQUEST, "TaskError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "TaskError"),
            },
            ApiError::Database(db_err) => match db_err {
                DbErr::RecordNotFound(_) => (StatusCode::NOT_FOUND, "DatabaseError"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
            },
            ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "ForbiddenError"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        };

        let error_message = match &self {
            ApiError::Unauthorized => "Unauthorized. Please sign in again.".to_string(),
            ApiError::Forbidden(msg)
            | ApiError::NotFound(msg)
            | ApiError::BadRequest(msg)
            | ApiError::Conflict(msg)
            | ApiError::Internal(msg) => msg.clone(),
            _ if status_code.is_server_error() => format!("{}: {}", error_type, self),
            _ => self.to_string(),
        };

        if status_code.is_server_error() {
            tracing::error!(
                status = %status_code,
                error_type,
                error = %self,
                "API request failed"
            );
        }
        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_errors_map_to_the_right_status() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (UserError::EmailTaken.into(), StatusCode::CONFLICT),
            (
                UserError::ValidationError("bad".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (TaskError::TaskNotFound.into(), StatusCode::NOT_FOUND),
            (ProjectError::AlreadyMember.into(), StatusCode::CONFLICT),
            (ApiError::Unauthorized, StatusCode::UNAUTHORIZED),
            (
                ApiError::Forbidden("nope".into()),
                StatusCode::FORBIDDEN,
            ),
            (
                DbErr::Custom("boom".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn denied_access_becomes_forbidden() {
        assert!(ApiError::require(Access::Allowed).is_ok());
        let err = ApiError::require(Access::Denied).unwrap_err();
        assert!(matches!(err, ApiError::Forbidden(_)));
    }
}
