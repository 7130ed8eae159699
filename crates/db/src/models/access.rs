use sea_orm::{ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QuerySelect};
use thiserror::Error;
use uuid::Uuid;

use crate::{
    entities::{board, board_column, project, project_member, task, workspace},
    models::ids,
};

#[derive(Debug, Error)]
pub enum AccessError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("entity not found")]
    NotFound,
}

/// Outcome of a guard check for an entity that exists. Missing entities
/// surface as `AccessError::NotFound` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Allowed,
    Denied,
}

/// Query-level authorization checks. A board inherits its audience from its
/// parent: workspace boards are owner-only, project boards admit the owner
/// and every member. Columns and tasks resolve through their board.
pub struct AccessGuard;

impl AccessGuard {
    pub async fn workspace<C: ConnectionTrait>(
        db: &C,
        workspace_id: Uuid,
        user_id: Uuid,
    ) -> Result<Access, AccessError> {
        let model = workspace::Entity::find()
            .filter(workspace::Column::Uuid.eq(workspace_id))
            .one(db)
            .await?
            .ok_or(AccessError::NotFound)?;
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Access::Denied);
        };
        Ok(if model.owner_id == user_row_id {
            Access::Allowed
        } else {
            Access::Denied
        })
    }

    pub async fn project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Access, AccessError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(AccessError::NotFound)?;
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Access::Denied);
        };
        Self::project_rows(db, project_row_id, user_row_id).await
    }

    /// Owner-only check, for member management and project deletion.
    pub async fn project_owner<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        user_id: Uuid,
    ) -> Result<Access, AccessError> {
        let owner_row_id: i64 = project::Entity::find()
            .select_only()
            .column(project::Column::OwnerId)
            .filter(project::Column::Uuid.eq(project_id))
            .into_tuple()
            .one(db)
            .await?
            .ok_or(AccessError::NotFound)?;
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Access::Denied);
        };
        Ok(if owner_row_id == user_row_id {
            Access::Allowed
        } else {
            Access::Denied
        })
    }

    pub async fn board<C: ConnectionTrait>(
        db: &C,
        board_id: Uuid,
        user_id: Uuid,
    ) -> Result<Access, AccessError> {
        let model = board::Entity::find()
            .filter(board::Column::Uuid.eq(board_id))
            .one(db)
            .await?
            .ok_or(AccessError::NotFound)?;
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Access::Denied);
        };
        Self::board_rows(db, &model, user_row_id).await
    }

    pub async fn column<C: ConnectionTrait>(
        db: &C,
        column_id: Uuid,
        user_id: Uuid,
    ) -> Result<Access, AccessError> {
        let board_row_id: i64 = board_column::Entity::find()
            .select_only()
            .column(board_column::Column::BoardId)
            .filter(board_column::Column::Uuid.eq(column_id))
            .into_tuple()
            .one(db)
            .await?
            .ok_or(AccessError::NotFound)?;
        Self::board_by_row_id(db, board_row_id, user_id).await
    }

    /// Column-less tasks belong to the legacy path, which has no board to
    /// inherit from; any authenticated user may touch them.
    pub async fn task<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        user_id: Uuid,
    ) -> Result<Access, AccessError> {
        let column_row_id: Option<i64> = task::Entity::find()
            .select_only()
            .column(task::Column::ColumnId)
            .filter(task::Column::Uuid.eq(task_id))
            .into_tuple()
            .one(db)
            .await?
            .ok_or(AccessError::NotFound)?;
        match column_row_id {
            None => Ok(Access::Allowed),
            Some(column_row_id) => {
                let board_row_id: i64 = board_column::Entity::find()
                    .select_only()
                    .column(board_column::Column::BoardId)
                    .filter(board_column::Column::Id.eq(column_row_id))
                    .into_tuple()
                    .one(db)
                    .await?
                    .ok_or(AccessError::NotFound)?;
                Self::board_by_row_id(db, board_row_id, user_id).await
            }
        }
    }

    async fn board_by_row_id<C: ConnectionTrait>(
        db: &C,
        board_row_id: i64,
        user_id: Uuid,
    ) -> Result<Access, AccessError> {
        let model = board::Entity::find_by_id(board_row_id)
            .one(db)
            .await?
            .ok_or(AccessError::NotFound)?;
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Access::Denied);
        };
        Self::board_rows(db, &model, user_row_id).await
    }

    async fn board_rows<C: ConnectionTrait>(
        db: &C,
        model: &board::Model,
        user_row_id: i64,
    ) -> Result<Access, AccessError> {
        if let Some(workspace_row_id) = model.workspace_id {
            let owner_row_id: i64 = workspace::Entity::find()
                .select_only()
                .column(workspace::Column::OwnerId)
                .filter(workspace::Column::Id.eq(workspace_row_id))
                .into_tuple()
                .one(db)
                .await?
                .ok_or(AccessError::NotFound)?;
            return Ok(if owner_row_id == user_row_id {
                Access::Allowed
            } else {
                Access::Denied
            });
        }
        if let Some(project_row_id) = model.project_id {
            return Self::project_rows(db, project_row_id, user_row_id).await;
        }
        Ok(Access::Denied)
    }

    async fn project_rows<C: ConnectionTrait>(
        db: &C,
        project_row_id: i64,
        user_row_id: i64,
    ) -> Result<Access, AccessError> {
        let owner_row_id: i64 = project::Entity::find()
            .select_only()
            .column(project::Column::OwnerId)
            .filter(project::Column::Id.eq(project_row_id))
            .into_tuple()
            .one(db)
            .await?
            .ok_or(AccessError::NotFound)?;
        if owner_row_id == user_row_id {
            return Ok(Access::Allowed);
        }
        let membership = project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .filter(project_member::Column::UserId.eq(user_row_id))
            .one(db)
            .await?;
        Ok(if membership.is_some() {
            Access::Allowed
        } else {
            Access::Denied
        })
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use crate::models::{
        board::{Board, CreateBoard},
        board_column::{BoardColumn, CreateColumn},
        project::{CreateProject, Project},
        task::{CreateTask, Task},
        user::{CreateUser, User},
        workspace::Workspace,
    };

    use super::*;

    struct Fixture {
        db: sea_orm::DatabaseConnection,
        owner: User,
        member: User,
        outsider: User,
        workspace: Workspace,
        project: Project,
    }

    async fn setup() -> Fixture {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();

        let mut users = Vec::new();
        for email in ["owner@example.com", "member@example.com", "out@example.com"] {
            users.push(
                User::create(
                    &db,
                    &CreateUser {
                        name: email.split('@').next().unwrap().to_string(),
                        email: email.to_string(),
                        password_hash: "hash".to_string(),
                    },
                    Uuid::new_v4(),
                )
                .await
                .unwrap(),
            );
        }
        let outsider = users.pop().unwrap();
        let member = users.pop().unwrap();
        let owner = users.pop().unwrap();

        let workspace = Workspace::create(&db, owner.id, "Workspace", Uuid::new_v4())
            .await
            .unwrap();
        let project = Project::create(
            &db,
            &CreateProject {
                name: "Team project".to_string(),
                description: None,
            },
            owner.id,
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        Project::add_member(&db, project.id, "member@example.com")
            .await
            .unwrap();

        Fixture {
            db,
            owner,
            member,
            outsider,
            workspace,
            project,
        }
    }

    #[tokio::test]
    async fn workspace_boards_are_owner_only() {
        let f = setup().await;
        let board = Board::create(
            &f.db,
            &CreateBoard {
                name: "Personal".to_string(),
                workspace_id: Some(f.workspace.id),
                project_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(
            AccessGuard::board(&f.db, board.id, f.owner.id).await.unwrap(),
            Access::Allowed
        );
        assert_eq!(
            AccessGuard::board(&f.db, board.id, f.member.id).await.unwrap(),
            Access::Denied
        );
        assert_eq!(
            AccessGuard::board(&f.db, board.id, f.outsider.id).await.unwrap(),
            Access::Denied
        );
    }

    #[tokio::test]
    async fn project_boards_admit_owner_and_members() {
        let f = setup().await;
        let board = Board::create(
            &f.db,
            &CreateBoard {
                name: "Shared".to_string(),
                workspace_id: None,
                project_id: Some(f.project.id),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(
            AccessGuard::board(&f.db, board.id, f.owner.id).await.unwrap(),
            Access::Allowed
        );
        assert_eq!(
            AccessGuard::board(&f.db, board.id, f.member.id).await.unwrap(),
            Access::Allowed
        );
        assert_eq!(
            AccessGuard::board(&f.db, board.id, f.outsider.id).await.unwrap(),
            Access::Denied
        );
    }

    #[tokio::test]
    async fn columns_and_tasks_inherit_from_their_board() {
        let f = setup().await;
        let board = Board::create(
            &f.db,
            &CreateBoard {
                name: "Shared".to_string(),
                workspace_id: None,
                project_id: Some(f.project.id),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let column = BoardColumn::create(
            &f.db,
            &CreateColumn {
                board_id: board.id,
                title: "Backlog".to_string(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        let task = Task::create(
            &f.db,
            &CreateTask {
                column_id: Some(column.id),
                title: "Guarded".to_string(),
                description: None,
                priority: None,
                status: None,
                due_date: None,
                assignee_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(
            AccessGuard::column(&f.db, column.id, f.member.id).await.unwrap(),
            Access::Allowed
        );
        assert_eq!(
            AccessGuard::column(&f.db, column.id, f.outsider.id).await.unwrap(),
            Access::Denied
        );
        assert_eq!(
            AccessGuard::task(&f.db, task.id, f.member.id).await.unwrap(),
            Access::Allowed
        );
        assert_eq!(
            AccessGuard::task(&f.db, task.id, f.outsider.id).await.unwrap(),
            Access::Denied
        );
    }

    #[tokio::test]
    async fn legacy_tasks_are_open_to_any_session() {
        let f = setup().await;
        let task = Task::create(
            &f.db,
            &CreateTask {
                column_id: None,
                title: "Legacy".to_string(),
                description: None,
                priority: None,
                status: None,
                due_date: None,
                assignee_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        assert_eq!(
            AccessGuard::task(&f.db, task.id, f.outsider.id).await.unwrap(),
            Access::Allowed
        );
    }

    #[tokio::test]
    async fn missing_entities_surface_not_found() {
        let f = setup().await;
        assert!(matches!(
            AccessGuard::board(&f.db, Uuid::new_v4(), f.owner.id).await,
            Err(AccessError::NotFound)
        ));
        assert!(matches!(
            AccessGuard::project_owner(&f.db, Uuid::new_v4(), f.owner.id).await,
            Err(AccessError::NotFound)
        ));
    }

    #[tokio::test]
    async fn member_management_is_owner_only() {
        let f = setup().await;
        assert_eq!(
            AccessGuard::project_owner(&f.db, f.project.id, f.owner.id)
                .await
                .unwrap(),
            Access::Allowed
        );
        assert_eq!(
            AccessGuard::project_owner(&f.db, f.project.id, f.member.id)
                .await
                .unwrap(),
            Access::Denied
        );
        assert_eq!(
            AccessGuard::workspace(&f.db, f.workspace.id, f.outsider.id)
                .await
                .unwrap(),
            Access::Denied
        );
    }
}
