use sea_orm::ConnectionTrait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    entities::event_outbox,
    models::access::{Access, AccessError, AccessGuard},
};

pub const EVENT_TASK_CREATED: &str = "task.created";
pub const EVENT_TASK_UPDATED: &str = "task.updated";
pub const EVENT_TASK_DELETED: &str = "task.deleted";

pub const EVENT_COLUMN_CREATED: &str = "column.created";
pub const EVENT_COLUMN_UPDATED: &str = "column.updated";
pub const EVENT_COLUMN_DELETED: &str = "column.deleted";

pub const EVENT_BOARD_CREATED: &str = "board.created";
pub const EVENT_BOARD_UPDATED: &str = "board.updated";
pub const EVENT_BOARD_DELETED: &str = "board.deleted";

pub const EVENT_PROJECT_CREATED: &str = "project.created";
pub const EVENT_PROJECT_DELETED: &str = "project.deleted";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEventPayload {
    pub task_id: Uuid,
    pub column_id: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnEventPayload {
    pub column_id: Uuid,
    pub board_id: Uuid,
}

/// Carries the board's parent so deleted boards can still be scoped to
/// their audience.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoardEventPayload {
    pub board_id: Uuid,
    pub workspace_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
}

/// `owner_id` and `member_ids` snapshot the audience at enqueue time;
/// a deleted project has no membership rows left to check against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectEventPayload {
    pub project_id: Uuid,
    pub owner_id: Uuid,
    pub member_ids: Vec<Uuid>,
}

/// Outbox row as delivered to event-stream subscribers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEvent {
    pub event_type: String,
    pub entity_type: String,
    pub entity_uuid: Uuid,
    pub payload: serde_json::Value,
}

impl From<&event_outbox::Model> for OutboxEvent {
    fn from(model: &event_outbox::Model) -> Self {
        Self {
            event_type: model.event_type.clone(),
            entity_type: model.entity_type.clone(),
            entity_uuid: model.entity_uuid,
            payload: model.payload.clone(),
        }
    }
}

impl OutboxEvent {
    /// Whether the event may be delivered to the given subscriber. Events
    /// scope through the guard of the nearest surviving ancestor (a column
    /// event checks its board, a board event its workspace or project), so
    /// deletions still reach the audience that could see the entity.
    /// Anything unresolvable is withheld.
    pub async fn visible_to<C: ConnectionTrait>(
        &self,
        db: &C,
        user_id: Uuid,
    ) -> Result<bool, AccessError> {
        match self.entity_type.as_str() {
            "task" => {
                let Ok(payload) = serde_json::from_value::<TaskEventPayload>(self.payload.clone())
                else {
                    return Ok(false);
                };
                match payload.column_id {
                    // Column-less tasks are the legacy path, open to any session.
                    None => Ok(true),
                    Some(column_id) => allows(AccessGuard::column(db, column_id, user_id).await),
                }
            }
            "column" => {
                let Ok(payload) =
                    serde_json::from_value::<ColumnEventPayload>(self.payload.clone())
                else {
                    return Ok(false);
                };
                allows(AccessGuard::board(db, payload.board_id, user_id).await)
            }
            "board" => {
                let Ok(payload) = serde_json::from_value::<BoardEventPayload>(self.payload.clone())
                else {
                    return Ok(false);
                };
                if let Some(workspace_id) = payload.workspace_id {
                    return allows(AccessGuard::workspace(db, workspace_id, user_id).await);
                }
                if let Some(project_id) = payload.project_id {
                    return allows(AccessGuard::project(db, project_id, user_id).await);
                }
                Ok(false)
            }
            "project" => {
                let Ok(payload) =
                    serde_json::from_value::<ProjectEventPayload>(self.payload.clone())
                else {
                    return Ok(false);
                };
                match AccessGuard::project(db, payload.project_id, user_id).await {
                    Ok(access) => Ok(access == Access::Allowed),
                    // The project is gone; fall back to the enqueue-time audience.
                    Err(AccessError::NotFound) => {
                        Ok(payload.owner_id == user_id || payload.member_ids.contains(&user_id))
                    }
                    Err(err) => Err(err),
                }
            }
            _ => Ok(false),
        }
    }
}

fn allows(result: Result<Access, AccessError>) -> Result<bool, AccessError> {
    match result {
        Ok(access) => Ok(access == Access::Allowed),
        Err(AccessError::NotFound) => Ok(false),
        Err(err) => Err(err),
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use crate::models::{
        board::{Board, CreateBoard},
        board_column::{BoardColumn, CreateColumn},
        event_outbox::EventOutbox,
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

    async fn latest_event(db: &sea_orm::DatabaseConnection) -> OutboxEvent {
        let rows = EventOutbox::fetch_unpublished(db, 100).await.unwrap();
        OutboxEvent::from(rows.last().unwrap())
    }

    #[tokio::test]
    async fn task_events_scope_through_their_column() {
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
        Task::create(
            &f.db,
            &CreateTask {
                column_id: Some(column.id),
                title: "Scoped".to_string(),
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

        let event = latest_event(&f.db).await;
        assert_eq!(event.event_type, EVENT_TASK_CREATED);
        assert!(event.visible_to(&f.db, f.owner.id).await.unwrap());
        assert!(event.visible_to(&f.db, f.member.id).await.unwrap());
        assert!(!event.visible_to(&f.db, f.outsider.id).await.unwrap());
    }

    #[tokio::test]
    async fn legacy_task_events_reach_any_session() {
        let f = setup().await;
        Task::create(
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

        let event = latest_event(&f.db).await;
        assert!(event.visible_to(&f.db, f.outsider.id).await.unwrap());
    }

    #[tokio::test]
    async fn board_deletion_events_keep_their_audience() {
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
        Board::delete(&f.db, board.id).await.unwrap();

        let event = latest_event(&f.db).await;
        assert_eq!(event.event_type, EVENT_BOARD_DELETED);
        assert!(event.visible_to(&f.db, f.owner.id).await.unwrap());
        assert!(!event.visible_to(&f.db, f.member.id).await.unwrap());
        assert!(!event.visible_to(&f.db, f.outsider.id).await.unwrap());
    }

    #[tokio::test]
    async fn project_deletion_events_use_the_snapshot_audience() {
        let f = setup().await;
        Project::delete(&f.db, f.project.id).await.unwrap();

        let event = latest_event(&f.db).await;
        assert_eq!(event.event_type, EVENT_PROJECT_DELETED);
        assert!(event.visible_to(&f.db, f.owner.id).await.unwrap());
        assert!(event.visible_to(&f.db, f.member.id).await.unwrap());
        assert!(!event.visible_to(&f.db, f.outsider.id).await.unwrap());
    }

    #[tokio::test]
    async fn malformed_payloads_are_withheld() {
        let f = setup().await;
        let event = OutboxEvent {
            event_type: EVENT_BOARD_UPDATED.to_string(),
            entity_type: "board".to_string(),
            entity_uuid: Uuid::new_v4(),
            payload: serde_json::json!({ "unexpected": true }),
        };
        assert!(!event.visible_to(&f.db, f.owner.id).await.unwrap());
    }
}
