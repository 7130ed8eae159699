use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{entities::workspace, models::ids};

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("workspace not found")]
    WorkspaceNotFound,
    #[error("owner not found")]
    OwnerNotFound,
    #[error("{0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Workspace {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

impl Workspace {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: &workspace::Model,
    ) -> Result<Self, DbErr> {
        let owner_id = ids::user_uuid_by_id(db, model.owner_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user row {}", model.owner_id)))?;
        Ok(Self {
            id: model.uuid,
            owner_id,
            name: model.name.clone(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        owner_id: Uuid,
        name: &str,
        workspace_id: Uuid,
    ) -> Result<Self, WorkspaceError> {
        let name = name.trim();
        if name.is_empty() || name.len() > 120 {
            return Err(WorkspaceError::ValidationError(
                "workspace name must be between 1 and 120 characters".to_string(),
            ));
        }
        let owner_row_id = ids::user_id_by_uuid(db, owner_id)
            .await?
            .ok_or(WorkspaceError::OwnerNotFound)?;

        let now = Utc::now();
        let model = workspace::ActiveModel {
            uuid: Set(workspace_id),
            owner_id: Set(owner_row_id),
            name: Set(name.to_string()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        workspace_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let model = workspace::Entity::find()
            .filter(workspace::Column::Uuid.eq(workspace_id))
            .one(db)
            .await?;
        match model {
            Some(model) => Ok(Some(Self::from_model(db, &model).await?)),
            None => Ok(None),
        }
    }

    pub async fn find_by_owner<C: ConnectionTrait>(
        db: &C,
        owner_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(owner_row_id) = ids::user_id_by_uuid(db, owner_id).await? else {
            return Ok(Vec::new());
        };
        let models = workspace::Entity::find()
            .filter(workspace::Column::OwnerId.eq(owner_row_id))
            .order_by_asc(workspace::Column::CreatedAt)
            .all(db)
            .await?;
        let mut workspaces = Vec::with_capacity(models.len());
        for model in &models {
            workspaces.push(Self::from_model(db, model).await?);
        }
        Ok(workspaces)
    }
}
