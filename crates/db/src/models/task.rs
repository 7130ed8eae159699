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
    entities::{board_column, task},
    events::{self, TaskEventPayload},
    models::{event_outbox::EventOutbox, ids},
    types::{TaskPriority, TaskStatus},
};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("task not found")]
    TaskNotFound,
    #[error("column not found")]
    ColumnNotFound,
    #[error("assignee not found")]
    AssigneeNotFound,
    #[error("{0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: Uuid,
    pub column_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    #[ts(type = "Date | null")]
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
    pub position: i32,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTask {
    pub column_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    #[ts(type = "Date | null")]
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
}

/// Partial update; `None` keeps the stored value. An empty description
/// clears the field.
#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    #[ts(type = "Date | null")]
    pub due_date: Option<DateTime<Utc>>,
    pub assignee_id: Option<Uuid>,
}

/// Per-status and per-priority counts for the analytics cards.
#[derive(Debug, Clone, Serialize, TS)]
pub struct TaskStats {
    pub total: u64,
    pub todo: u64,
    pub in_progress: u64,
    pub review: u64,
    pub done: u64,
    pub low: u64,
    pub medium: u64,
    pub high: u64,
}

fn validate_title(title: &str) -> Result<&str, TaskError> {
    let title = title.trim();
    if title.len() < 2 || title.len() > 100 {
        return Err(TaskError::ValidationError(
            "task title must be between 2 and 100 characters".to_string(),
        ));
    }
    Ok(title)
}

fn validate_description(description: &Option<String>) -> Result<(), TaskError> {
    if let Some(description) = description {
        if description.len() > 500 {
            return Err(TaskError::ValidationError(
                "description must be at most 500 characters".to_string(),
            ));
        }
    }
    Ok(())
}

impl Task {
    async fn from_model<C: ConnectionTrait>(db: &C, model: &task::Model) -> Result<Self, DbErr> {
        let column_id = match model.column_id {
            Some(row_id) => ids::column_uuid_by_id(db, row_id).await?,
            None => None,
        };
        let assignee_id = match model.assignee_id {
            Some(row_id) => ids::user_uuid_by_id(db, row_id).await?,
            None => None,
        };
        Ok(Self {
            id: model.uuid,
            column_id,
            title: model.title.clone(),
            description: model.description.clone(),
            priority: model.priority,
            status: model.status,
            due_date: model.due_date,
            assignee_id,
            position: model.position,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    /// Appends the task at the end of its column, or of its status group
    /// when no column is given.
    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateTask,
        task_id: Uuid,
    ) -> Result<Self, TaskError> {
        let title = validate_title(&data.title)?;
        validate_description(&data.description)?;

        let column_row_id = match data.column_id {
            Some(column_id) => Some(
                ids::column_id_by_uuid(db, column_id)
                    .await?
                    .ok_or(TaskError::ColumnNotFound)?,
            ),
            None => None,
        };
        let assignee_row_id = match data.assignee_id {
            Some(assignee_id) => Some(
                ids::user_id_by_uuid(db, assignee_id)
                    .await?
                    .ok_or(TaskError::AssigneeNotFound)?,
            ),
            None => None,
        };
        let status = data.status.unwrap_or_default();

        let last_position: Option<i32> = match column_row_id {
            Some(row_id) => {
                task::Entity::find()
                    .select_only()
                    .column(task::Column::Position)
                    .filter(task::Column::ColumnId.eq(row_id))
                    .order_by_desc(task::Column::Position)
                    .into_tuple()
                    .one(db)
                    .await?
            }
            None => {
                task::Entity::find()
                    .select_only()
                    .column(task::Column::Position)
                    .filter(task::Column::ColumnId.is_null())
                    .filter(task::Column::Status.eq(status))
                    .order_by_desc(task::Column::Position)
                    .into_tuple()
                    .one(db)
                    .await?
            }
        };
        let position = last_position.map_or(0, |p| p + 1);

        let now = Utc::now();
        let model = task::ActiveModel {
            uuid: Set(task_id),
            column_id: Set(column_row_id),
            title: Set(title.to_string()),
            description: Set(data.description.clone().filter(|d| !d.trim().is_empty())),
            priority: Set(data.priority.unwrap_or_default()),
            status: Set(status),
            due_date: Set(data.due_date),
            assignee_id: Set(assignee_row_id),
            position: Set(position),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_TASK_CREATED,
            "task",
            task_id,
            &TaskEventPayload {
                task_id,
                column_id: data.column_id,
            },
        )
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let model = task::Entity::find()
            .filter(task::Column::Uuid.eq(task_id))
            .one(db)
            .await?;
        match model {
            Some(model) => Ok(Some(Self::from_model(db, &model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_column<C: ConnectionTrait>(
        db: &C,
        column_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(column_row_id) = ids::column_id_by_uuid(db, column_id).await? else {
            return Ok(Vec::new());
        };
        let models = task::Entity::find()
            .filter(task::Column::ColumnId.eq(column_row_id))
            .order_by_asc(task::Column::Position)
            .all(db)
            .await?;
        let mut tasks = Vec::with_capacity(models.len());
        for model in &models {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    /// All tasks on a board, position-ordered within each column.
    pub async fn find_by_board<C: ConnectionTrait>(
        db: &C,
        board_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(board_row_id) = ids::board_id_by_uuid(db, board_id).await? else {
            return Ok(Vec::new());
        };
        let column_row_ids: Vec<i64> = board_column::Entity::find()
            .select_only()
            .column(board_column::Column::Id)
            .filter(board_column::Column::BoardId.eq(board_row_id))
            .into_tuple()
            .all(db)
            .await?;
        let models = task::Entity::find()
            .filter(task::Column::ColumnId.is_in(column_row_ids))
            .order_by_asc(task::Column::Position)
            .all(db)
            .await?;
        let mut tasks = Vec::with_capacity(models.len());
        for model in &models {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    /// Column-less tasks, optionally narrowed to one status group.
    pub async fn find_legacy<C: ConnectionTrait>(
        db: &C,
        status: Option<TaskStatus>,
    ) -> Result<Vec<Self>, DbErr> {
        let mut query = task::Entity::find().filter(task::Column::ColumnId.is_null());
        if let Some(status) = status {
            query = query.filter(task::Column::Status.eq(status));
        }
        let models = query
            .order_by_asc(task::Column::Status)
            .order_by_asc(task::Column::Position)
            .all(db)
            .await?;
        let mut tasks = Vec::with_capacity(models.len());
        for model in &models {
            tasks.push(Self::from_model(db, model).await?);
        }
        Ok(tasks)
    }

    pub async fn update<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        data: &UpdateTask,
    ) -> Result<Self, TaskError> {
        let model = task::Entity::find()
            .filter(task::Column::Uuid.eq(task_id))
            .one(db)
            .await?
            .ok_or(TaskError::TaskNotFound)?;
        let column_uuid = match model.column_id {
            Some(row_id) => ids::column_uuid_by_id(db, row_id).await?,
            None => None,
        };

        let mut active: task::ActiveModel = model.into();
        if let Some(title) = &data.title {
            active.title = Set(validate_title(title)?.to_string());
        }
        if let Some(description) = &data.description {
            validate_description(&data.description)?;
            let trimmed = description.trim();
            active.description = Set(if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            });
        }
        if let Some(priority) = data.priority {
            active.priority = Set(priority);
        }
        if let Some(status) = data.status {
            active.status = Set(status);
        }
        if let Some(due_date) = data.due_date {
            active.due_date = Set(Some(due_date));
        }
        if let Some(assignee_id) = data.assignee_id {
            let assignee_row_id = ids::user_id_by_uuid(db, assignee_id)
                .await?
                .ok_or(TaskError::AssigneeNotFound)?;
            active.assignee_id = Set(Some(assignee_row_id));
        }
        active.updated_at = Set(Utc::now());
        let model = active.update(db).await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_TASK_UPDATED,
            "task",
            task_id,
            &TaskEventPayload {
                task_id,
                column_id: column_uuid,
            },
        )
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    /// Moves the task into `column_id` at `new_index`: the source group is
    /// compacted, a gap is opened at the target slot, then the task is
    /// written. Run inside a transaction so the intermediate non-dense
    /// state is never visible.
    pub async fn move_to_column<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        column_id: Uuid,
        new_index: i32,
    ) -> Result<Self, TaskError> {
        let model = task::Entity::find()
            .filter(task::Column::Uuid.eq(task_id))
            .one(db)
            .await?
            .ok_or(TaskError::TaskNotFound)?;
        let dest_row_id = ids::column_id_by_uuid(db, column_id)
            .await?
            .ok_or(TaskError::ColumnNotFound)?;

        let dest_len = task::Entity::find()
            .filter(task::Column::ColumnId.eq(dest_row_id))
            .filter(task::Column::Id.ne(model.id))
            .count(db)
            .await? as i32;
        let new_index = new_index.clamp(0, dest_len);

        Self::compact_source(db, &model).await?;

        // Open a gap at the target slot.
        task::Entity::update_many()
            .col_expr(
                task::Column::Position,
                Expr::col(task::Column::Position).add(1),
            )
            .filter(task::Column::ColumnId.eq(dest_row_id))
            .filter(task::Column::Position.gte(new_index))
            .filter(task::Column::Id.ne(model.id))
            .exec(db)
            .await?;

        let mut active: task::ActiveModel = model.into();
        active.column_id = Set(Some(dest_row_id));
        active.position = Set(new_index);
        active.updated_at = Set(Utc::now());
        let model = active.update(db).await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_TASK_UPDATED,
            "task",
            task_id,
            &TaskEventPayload {
                task_id,
                column_id: Some(column_id),
            },
        )
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    /// Legacy move for column-less tasks: the destination is a status group
    /// instead of a column. Same renumbering as `move_to_column`.
    pub async fn move_to_status<C: ConnectionTrait>(
        db: &C,
        task_id: Uuid,
        status: TaskStatus,
        new_index: i32,
    ) -> Result<Self, TaskError> {
        let model = task::Entity::find()
            .filter(task::Column::Uuid.eq(task_id))
            .one(db)
            .await?
            .ok_or(TaskError::TaskNotFound)?;
        if model.column_id.is_some() {
            return Err(TaskError::ValidationError(
                "task belongs to a column; move it by column instead".to_string(),
            ));
        }

        let dest_len = task::Entity::find()
            .filter(task::Column::ColumnId.is_null())
            .filter(task::Column::Status.eq(status))
            .filter(task::Column::Id.ne(model.id))
            .count(db)
            .await? as i32;
        let new_index = new_index.clamp(0, dest_len);

        Self::compact_source(db, &model).await?;

        task::Entity::update_many()
            .col_expr(
                task::Column::Position,
                Expr::col(task::Column::Position).add(1),
            )
            .filter(task::Column::ColumnId.is_null())
            .filter(task::Column::Status.eq(status))
            .filter(task::Column::Position.gte(new_index))
            .filter(task::Column::Id.ne(model.id))
            .exec(db)
            .await?;

        let mut active: task::ActiveModel = model.into();
        active.status = Set(status);
        active.position = Set(new_index);
        active.updated_at = Set(Utc::now());
        let model = active.update(db).await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_TASK_UPDATED,
            "task",
            task_id,
            &TaskEventPayload {
                task_id,
                column_id: None,
            },
        )
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    /// Deletes the task and compacts its group. Run inside a transaction.
    pub async fn delete<C: ConnectionTrait>(db: &C, task_id: Uuid) -> Result<u64, TaskError> {
        let model = task::Entity::find()
            .filter(task::Column::Uuid.eq(task_id))
            .one(db)
            .await?
            .ok_or(TaskError::TaskNotFound)?;
        let column_uuid = match model.column_id {
            Some(row_id) => ids::column_uuid_by_id(db, row_id).await?,
            None => None,
        };

        let result = task::Entity::delete_by_id(model.id).exec(db).await?;
        Self::compact_source(db, &model).await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_TASK_DELETED,
            "task",
            task_id,
            &TaskEventPayload {
                task_id,
                column_id: column_uuid,
            },
        )
        .await?;
        Ok(result.rows_affected)
    }

    pub async fn stats<C: ConnectionTrait>(db: &C) -> Result<TaskStats, DbErr> {
        let by_status = |status: TaskStatus| {
            task::Entity::find()
                .filter(task::Column::Status.eq(status))
                .count(db)
        };
        let by_priority = |priority: TaskPriority| {
            task::Entity::find()
                .filter(task::Column::Priority.eq(priority))
                .count(db)
        };
        Ok(TaskStats {
            total: task::Entity::find().count(db).await?,
            todo: by_status(TaskStatus::Todo).await?,
            in_progress: by_status(TaskStatus::InProgress).await?,
            review: by_status(TaskStatus::Review).await?,
            done: by_status(TaskStatus::Done).await?,
            low: by_priority(TaskPriority::Low).await?,
            medium: by_priority(TaskPriority::Medium).await?,
            high: by_priority(TaskPriority::High).await?,
        })
    }

    /// Shifts every task behind the given one in its group down by one.
    async fn compact_source<C: ConnectionTrait>(db: &C, model: &task::Model) -> Result<(), DbErr> {
        let update = task::Entity::update_many()
            .col_expr(
                task::Column::Position,
                Expr::col(task::Column::Position).sub(1),
            )
            .filter(task::Column::Position.gt(model.position))
            .filter(task::Column::Id.ne(model.id));
        let update = match model.column_id {
            Some(column_row_id) => update.filter(task::Column::ColumnId.eq(column_row_id)),
            None => update
                .filter(task::Column::ColumnId.is_null())
                .filter(task::Column::Status.eq(model.status)),
        };
        update.exec(db).await?;
        Ok(())
    }
}
