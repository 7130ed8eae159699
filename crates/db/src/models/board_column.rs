use chrono::{DateTime, Utc};
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, ConnectionTrait, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::board_column,
    events::{self, ColumnEventPayload},
    models::{event_outbox::EventOutbox, ids},
};

#[derive(Debug, Error)]
pub enum ColumnError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("column not found")]
    ColumnNotFound,
    #[error("board not found")]
    BoardNotFound,
    #[error("{0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct BoardColumn {
    pub id: Uuid,
    pub board_id: Uuid,
    pub title: String,
    pub position: i32,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateColumn {
    pub board_id: Uuid,
    pub title: String,
}

fn validate_title(title: &str) -> Result<&str, ColumnError> {
    let title = title.trim();
    if title.len() < 2 || title.len() > 50 {
        return Err(ColumnError::ValidationError(
            "column title must be between 2 and 50 characters".to_string(),
        ));
    }
    Ok(title)
}

impl BoardColumn {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: &board_column::Model,
    ) -> Result<Self, DbErr> {
        let board_id = ids::board_uuid_by_id(db, model.board_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("board row {}", model.board_id)))?;
        Ok(Self {
            id: model.uuid,
            board_id,
            title: model.title.clone(),
            position: model.position,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    /// Appends a column at the end of the board.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateColumn,
        column_id: Uuid,
    ) -> Result<Self, ColumnError> {
        let title = validate_title(&data.title)?;
        let board_row_id = ids::board_id_by_uuid(db, data.board_id)
            .await?
            .ok_or(ColumnError::BoardNotFound)?;

        let last_position: Option<i32> = board_column::Entity::find()
            .select_only()
            .column(board_column::Column::Position)
            .filter(board_column::Column::BoardId.eq(board_row_id))
            .order_by_desc(board_column::Column::Position)
            .into_tuple()
            .one(db)
            .await?;
        let position = last_position.map_or(0, |p| p + 1);

        let now = Utc::now();
        let model = board_column::ActiveModel {
            uuid: Set(column_id),
            board_id: Set(board_row_id),
            title: Set(title.to_string()),
            position: Set(position),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_COLUMN_CREATED,
            "column",
            column_id,
            &ColumnEventPayload {
                column_id,
                board_id: data.board_id,
            },
        )
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        column_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let model = board_column::Entity::find()
            .filter(board_column::Column::Uuid.eq(column_id))
            .one(db)
            .await?;
        match model {
            Some(model) => Ok(Some(Self::from_model(db, &model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_board<C: ConnectionTrait>(
        db: &C,
        board_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(board_row_id) = ids::board_id_by_uuid(db, board_id).await? else {
            return Ok(Vec::new());
        };
        let models = board_column::Entity::find()
            .filter(board_column::Column::BoardId.eq(board_row_id))
            .order_by_asc(board_column::Column::Position)
            .all(db)
            .await?;
        let mut columns = Vec::with_capacity(models.len());
        for model in &models {
            columns.push(Self::from_model(db, model).await?);
        }
        Ok(columns)
    }

    pub async fn rename<C: ConnectionTrait>(
        db: &C,
        column_id: Uuid,
        title: &str,
    ) -> Result<Self, ColumnError> {
        let title = validate_title(title)?;
        let model = board_column::Entity::find()
            .filter(board_column::Column::Uuid.eq(column_id))
            .one(db)
            .await?
            .ok_or(ColumnError::ColumnNotFound)?;
        let board_id = ids::board_uuid_by_id(db, model.board_id)
            .await?
            .ok_or(ColumnError::BoardNotFound)?;

        let mut active: board_column::ActiveModel = model.into();
        active.title = Set(title.to_string());
        active.updated_at = Set(Utc::now());
        let model = active.update(db).await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_COLUMN_UPDATED,
            "column",
            column_id,
            &ColumnEventPayload {
                column_id,
                board_id,
            },
        )
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    /// Moves the column to `new_index` within its board and renumbers the
    /// rest so positions stay dense. Run inside a transaction.
    pub async fn reorder<C: ConnectionTrait>(
        db: &C,
        column_id: Uuid,
        new_index: i32,
    ) -> Result<Self, ColumnError> {
        let model = board_column::Entity::find()
            .filter(board_column::Column::Uuid.eq(column_id))
            .one(db)
            .await?
            .ok_or(ColumnError::ColumnNotFound)?;
        let board_id = ids::board_uuid_by_id(db, model.board_id)
            .await?
            .ok_or(ColumnError::BoardNotFound)?;

        let siblings = board_column::Entity::find()
            .filter(board_column::Column::BoardId.eq(model.board_id))
            .filter(board_column::Column::Id.ne(model.id))
            .count(db)
            .await? as i32;
        let new_index = new_index.clamp(0, siblings);

        // Close the gap the column leaves behind.
        board_column::Entity::update_many()
            .col_expr(
                board_column::Column::Position,
                Expr::col(board_column::Column::Position).sub(1),
            )
            .filter(board_column::Column::BoardId.eq(model.board_id))
            .filter(board_column::Column::Position.gt(model.position))
            .filter(board_column::Column::Id.ne(model.id))
            .exec(db)
            .await?;

        // Open a gap at the target slot.
        board_column::Entity::update_many()
            .col_expr(
                board_column::Column::Position,
                Expr::col(board_column::Column::Position).add(1),
            )
            .filter(board_column::Column::BoardId.eq(model.board_id))
            .filter(board_column::Column::Position.gte(new_index))
            .filter(board_column::Column::Id.ne(model.id))
            .exec(db)
            .await?;

        let mut active: board_column::ActiveModel = model.into();
        active.position = Set(new_index);
        active.updated_at = Set(Utc::now());
        let model = active.update(db).await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_COLUMN_UPDATED,
            "column",
            column_id,
            &ColumnEventPayload {
                column_id,
                board_id,
            },
        )
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    /// Deletes the column and compacts the remaining positions; its tasks
    /// cascade at the schema level. Run inside a transaction.
    pub async fn delete<C: ConnectionTrait>(db: &C, column_id: Uuid) -> Result<u64, ColumnError> {
        let model = board_column::Entity::find()
            .filter(board_column::Column::Uuid.eq(column_id))
            .one(db)
            .await?
            .ok_or(ColumnError::ColumnNotFound)?;
        let board_id = ids::board_uuid_by_id(db, model.board_id)
            .await?
            .ok_or(ColumnError::BoardNotFound)?;

        let result = board_column::Entity::delete_by_id(model.id).exec(db).await?;
        board_column::Entity::update_many()
            .col_expr(
                board_column::Column::Position,
                Expr::col(board_column::Column::Position).sub(1),
            )
            .filter(board_column::Column::BoardId.eq(model.board_id))
            .filter(board_column::Column::Position.gt(model.position))
            .exec(db)
            .await?;
        EventOutbox::enqueue(
            db,
            events::EVENT_COLUMN_DELETED,
            "column",
            column_id,
            &ColumnEventPayload {
                column_id,
                board_id,
            },
        )
        .await?;
        Ok(result.rows_affected)
    }
}
