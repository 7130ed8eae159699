use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    QueryFilter, QueryOrder,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::board,
    events::{self, BoardEventPayload},
    models::{event_outbox::EventOutbox, ids},
};

#[derive(Debug, Error)]
pub enum BoardError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("board not found")]
    BoardNotFound,
    #[error("parent workspace or project not found")]
    ParentNotFound,
    #[error("{0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Board {
    pub id: Uuid,
    pub name: String,
    pub workspace_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateBoard {
    pub name: String,
    pub workspace_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

impl CreateBoard {
    pub fn validate(&self) -> Result<(), BoardError> {
        let name = self.name.trim();
        if name.len() < 2 || name.len() > 80 {
            return Err(BoardError::ValidationError(
                "board name must be between 2 and 80 characters".to_string(),
            ));
        }
        match (self.workspace_id, self.project_id) {
            (Some(_), None) | (None, Some(_)) => Ok(()),
            _ => Err(BoardError::ValidationError(
                "a board belongs to exactly one workspace or project".to_string(),
            )),
        }
    }
}

impl Board {
    async fn from_model<C: ConnectionTrait>(db: &C, model: &board::Model) -> Result<Self, DbErr> {
        let workspace_id = match model.workspace_id {
            Some(row_id) => ids::workspace_uuid_by_id(db, row_id).await?,
            None => None,
        };
        let project_id = match model.project_id {
            Some(row_id) => ids::project_uuid_by_id(db, row_id).await?,
            None => None,
        };
        Ok(Self {
            id: model.uuid,
            name: model.name.clone(),
            workspace_id,
            project_id,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateBoard,
        board_id: Uuid,
    ) -> Result<Self, BoardError> {
        data.validate()?;
        let workspace_row_id = match data.workspace_id {
            Some(workspace_id) => Some(
                ids::workspace_id_by_uuid(db, workspace_id)
                    .await?
                    .ok_or(BoardError::ParentNotFound)?,
            ),
            None => None,
        };
        let project_row_id = match data.project_id {
            Some(project_id) => Some(
                ids::project_id_by_uuid(db, project_id)
                    .await?
                    .ok_or(BoardError::ParentNotFound)?,
            ),
            None => None,
        };

        let now = Utc::now();
        let model = board::ActiveModel {
            uuid: Set(board_id),
            name: Set(data.name.trim().to_string()),
            workspace_id: Set(workspace_row_id),
            project_id: Set(project_row_id),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_BOARD_CREATED,
            "board",
            board_id,
            &BoardEventPayload {
                board_id,
                workspace_id: data.workspace_id,
                project_id: data.project_id,
            },
        )
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        board_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let model = board::Entity::find()
            .filter(board::Column::Uuid.eq(board_id))
            .one(db)
            .await?;
        match model {
            Some(model) => Ok(Some(Self::from_model(db, &model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_workspace<C: ConnectionTrait>(
        db: &C,
        workspace_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(workspace_row_id) = ids::workspace_id_by_uuid(db, workspace_id).await? else {
            return Ok(Vec::new());
        };
        let models = board::Entity::find()
            .filter(board::Column::WorkspaceId.eq(workspace_row_id))
            .order_by_asc(board::Column::CreatedAt)
            .all(db)
            .await?;
        let mut boards = Vec::with_capacity(models.len());
        for model in &models {
            boards.push(Self::from_model(db, model).await?);
        }
        Ok(boards)
    }

    pub async fn find_by_project<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(project_row_id) = ids::project_id_by_uuid(db, project_id).await? else {
            return Ok(Vec::new());
        };
        let models = board::Entity::find()
            .filter(board::Column::ProjectId.eq(project_row_id))
            .order_by_asc(board::Column::CreatedAt)
            .all(db)
            .await?;
        let mut boards = Vec::with_capacity(models.len());
        for model in &models {
            boards.push(Self::from_model(db, model).await?);
        }
        Ok(boards)
    }

    pub async fn rename<C: ConnectionTrait>(
        db: &C,
        board_id: Uuid,
        name: &str,
    ) -> Result<Self, BoardError> {
        let name = name.trim();
        if name.len() < 2 || name.len() > 80 {
            return Err(BoardError::ValidationError(
                "board name must be between 2 and 80 characters".to_string(),
            ));
        }
        let model = board::Entity::find()
            .filter(board::Column::Uuid.eq(board_id))
            .one(db)
            .await?
            .ok_or(BoardError::BoardNotFound)?;

        let mut active: board::ActiveModel = model.into();
        active.name = Set(name.to_string());
        active.updated_at = Set(Utc::now());
        let model = active.update(db).await?;
        let board = Self::from_model(db, &model).await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_BOARD_UPDATED,
            "board",
            board_id,
            &BoardEventPayload {
                board_id,
                workspace_id: board.workspace_id,
                project_id: board.project_id,
            },
        )
        .await?;
        Ok(board)
    }

    /// Deletes the board; columns and their tasks cascade at the schema level.
    pub async fn delete<C: ConnectionTrait>(db: &C, board_id: Uuid) -> Result<u64, BoardError> {
        let model = board::Entity::find()
            .filter(board::Column::Uuid.eq(board_id))
            .one(db)
            .await?
            .ok_or(BoardError::BoardNotFound)?;
        // Resolve the parent before the row disappears; the deletion event
        // scopes to the parent's audience.
        let board = Self::from_model(db, &model).await?;
        let result = board::Entity::delete_by_id(model.id).exec(db).await?;
        EventOutbox::enqueue(
            db,
            events::EVENT_BOARD_DELETED,
            "board",
            board_id,
            &BoardEventPayload {
                board_id,
                workspace_id: board.workspace_id,
                project_id: board.project_id,
            },
        )
        .await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use crate::models::{
        user::{CreateUser, User},
        workspace::Workspace,
    };

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_workspace(db: &sea_orm::DatabaseConnection) -> Workspace {
        let user = User::create(
            db,
            &CreateUser {
                name: "Owner".to_string(),
                email: "owner@example.com".to_string(),
                password_hash: "hash".to_string(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();
        Workspace::create(db, user.id, "Owner — Workspace", Uuid::new_v4())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn create_requires_exactly_one_parent() {
        let db = setup_db().await;
        let workspace = seed_workspace(&db).await;

        let both = CreateBoard {
            name: "Roadmap".to_string(),
            workspace_id: Some(workspace.id),
            project_id: Some(Uuid::new_v4()),
        };
        assert!(matches!(
            Board::create(&db, &both, Uuid::new_v4()).await,
            Err(BoardError::ValidationError(_))
        ));

        let neither = CreateBoard {
            name: "Roadmap".to_string(),
            workspace_id: None,
            project_id: None,
        };
        assert!(matches!(
            Board::create(&db, &neither, Uuid::new_v4()).await,
            Err(BoardError::ValidationError(_))
        ));

        let valid = CreateBoard {
            name: "Roadmap".to_string(),
            workspace_id: Some(workspace.id),
            project_id: None,
        };
        let board = Board::create(&db, &valid, Uuid::new_v4()).await.unwrap();
        assert_eq!(board.workspace_id, Some(workspace.id));
        assert_eq!(board.project_id, None);
    }

    #[tokio::test]
    async fn create_rejects_missing_parent() {
        let db = setup_db().await;
        let data = CreateBoard {
            name: "Roadmap".to_string(),
            workspace_id: Some(Uuid::new_v4()),
            project_id: None,
        };
        assert!(matches!(
            Board::create(&db, &data, Uuid::new_v4()).await,
            Err(BoardError::ParentNotFound)
        ));
    }

    #[tokio::test]
    async fn rename_and_delete() {
        let db = setup_db().await;
        let workspace = seed_workspace(&db).await;
        let board = Board::create(
            &db,
            &CreateBoard {
                name: "Roadmap".to_string(),
                workspace_id: Some(workspace.id),
                project_id: None,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap();

        let renamed = Board::rename(&db, board.id, "Q3 Roadmap").await.unwrap();
        assert_eq!(renamed.name, "Q3 Roadmap");

        assert_eq!(Board::delete(&db, board.id).await.unwrap(), 1);
        assert!(Board::find_by_id(&db, board.id).await.unwrap().is_none());
        assert!(matches!(
            Board::delete(&db, board.id).await,
            Err(BoardError::BoardNotFound)
        ));
    }
}
