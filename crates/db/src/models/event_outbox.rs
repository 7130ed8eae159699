use chrono::Utc;
use sea_orm::sea_query::{Expr, ExprTrait};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
};
use serde::Serialize;
use uuid::Uuid;

use crate::entities::event_outbox;

/// Transactional outbox. Rows are written in the same transaction as the
/// domain change they describe and drained by the publisher loop in the
/// server binary.
pub struct EventOutbox;

impl EventOutbox {
    pub async fn enqueue<C: ConnectionTrait, P: Serialize>(
        db: &C,
        event_type: &str,
        entity_type: &str,
        entity_uuid: Uuid,
        payload: &P,
    ) -> Result<(), DbErr> {
        let payload = serde_json::to_value(payload)
            .map_err(|e| DbErr::Custom(format!("failed to serialize outbox payload: {e}")))?;
        event_outbox::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            event_type: Set(event_type.to_string()),
            entity_type: Set(entity_type.to_string()),
            entity_uuid: Set(entity_uuid),
            payload: Set(payload),
            created_at: Set(Utc::now()),
            published_at: Set(None),
            attempts: Set(0),
            last_error: Set(None),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(())
    }

    /// Oldest-first batch of rows that have not been delivered yet.
    pub async fn fetch_unpublished<C: ConnectionTrait>(
        db: &C,
        limit: u64,
    ) -> Result<Vec<event_outbox::Model>, DbErr> {
        event_outbox::Entity::find()
            .filter(event_outbox::Column::PublishedAt.is_null())
            .order_by_asc(event_outbox::Column::Id)
            .limit(limit)
            .all(db)
            .await
    }

    pub async fn mark_published<C: ConnectionTrait>(db: &C, row_id: i64) -> Result<(), DbErr> {
        event_outbox::Entity::update_many()
            .col_expr(
                event_outbox::Column::PublishedAt,
                Expr::value(Some(Utc::now())),
            )
            .filter(event_outbox::Column::Id.eq(row_id))
            .exec(db)
            .await?;
        Ok(())
    }

    /// Deletes delivered rows older than the retention window. Undelivered
    /// rows are kept whatever their age.
    pub async fn prune_published<C: ConnectionTrait>(
        db: &C,
        retention: chrono::Duration,
    ) -> Result<u64, DbErr> {
        let cutoff = Utc::now() - retention;
        let result = event_outbox::Entity::delete_many()
            .filter(event_outbox::Column::PublishedAt.is_not_null())
            .filter(event_outbox::Column::PublishedAt.lt(cutoff))
            .exec(db)
            .await?;
        Ok(result.rows_affected)
    }

    pub async fn mark_failed<C: ConnectionTrait>(
        db: &C,
        row_id: i64,
        error: &str,
    ) -> Result<(), DbErr> {
        event_outbox::Entity::update_many()
            .col_expr(
                event_outbox::Column::Attempts,
                Expr::col(event_outbox::Column::Attempts).add(1),
            )
            .col_expr(
                event_outbox::Column::LastError,
                Expr::value(Some(error.to_string())),
            )
            .filter(event_outbox::Column::Id.eq(row_id))
            .exec(db)
            .await?;
        Ok(())
    }
}
