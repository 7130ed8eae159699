use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DbErr, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::{
    entities::{project, project_member, user},
    events::{self, ProjectEventPayload},
    models::{event_outbox::EventOutbox, ids, user::User},
};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("project not found")]
    ProjectNotFound,
    #[error("no user with that email")]
    UserNotFound,
    #[error("user is already a member of this project")]
    AlreadyMember,
    #[error("member not found")]
    MemberNotFound,
    #[error("{0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct ProjectMember {
    pub id: Uuid,
    pub project_id: Uuid,
    pub user: User,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProject {
    pub name: String,
    pub description: Option<String>,
}

impl CreateProject {
    pub fn validate(&self) -> Result<(), ProjectError> {
        let name = self.name.trim();
        if name.len() < 2 || name.len() > 100 {
            return Err(ProjectError::ValidationError(
                "project name must be between 2 and 100 characters".to_string(),
            ));
        }
        if let Some(description) = &self.description {
            if description.len() > 500 {
                return Err(ProjectError::ValidationError(
                    "description must be at most 500 characters".to_string(),
                ));
            }
        }
        Ok(())
    }
}

impl Project {
    async fn from_model<C: ConnectionTrait>(
        db: &C,
        model: &project::Model,
    ) -> Result<Self, DbErr> {
        let owner_id = ids::user_uuid_by_id(db, model.owner_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user row {}", model.owner_id)))?;
        Ok(Self {
            id: model.uuid,
            owner_id,
            name: model.name.clone(),
            description: model.description.clone(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateProject,
        owner_id: Uuid,
        project_id: Uuid,
    ) -> Result<Self, ProjectError> {
        data.validate()?;
        let owner_row_id = ids::user_id_by_uuid(db, owner_id)
            .await?
            .ok_or(ProjectError::UserNotFound)?;

        let now = Utc::now();
        let model = project::ActiveModel {
            uuid: Set(project_id),
            owner_id: Set(owner_row_id),
            name: Set(data.name.trim().to_string()),
            description: Set(data.description.clone().filter(|d| !d.trim().is_empty())),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;

        EventOutbox::enqueue(
            db,
            events::EVENT_PROJECT_CREATED,
            "project",
            project_id,
            &ProjectEventPayload {
                project_id,
                owner_id,
                member_ids: Vec::new(),
            },
        )
        .await?;
        Ok(Self::from_model(db, &model).await?)
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let model = project::Entity::find()
            .filter(project::Column::Uuid.eq(project_id))
            .one(db)
            .await?;
        match model {
            Some(model) => Ok(Some(Self::from_model(db, &model).await?)),
            None => Ok(None),
        }
    }

    /// Projects the user owns plus projects they were added to as a member.
    pub async fn find_for_user<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Vec<Self>, DbErr> {
        let Some(user_row_id) = ids::user_id_by_uuid(db, user_id).await? else {
            return Ok(Vec::new());
        };
        let member_project_ids: Vec<i64> = project_member::Entity::find()
            .filter(project_member::Column::UserId.eq(user_row_id))
            .all(db)
            .await?
            .into_iter()
            .map(|m| m.project_id)
            .collect();

        let models = project::Entity::find()
            .filter(
                Condition::any()
                    .add(project::Column::OwnerId.eq(user_row_id))
                    .add(project::Column::Id.is_in(member_project_ids)),
            )
            .order_by_asc(project::Column::CreatedAt)
            .all(db)
            .await?;

        let mut projects = Vec::with_capacity(models.len());
        for model in &models {
            projects.push(Self::from_model(db, model).await?);
        }
        Ok(projects)
    }

    pub async fn delete<C: ConnectionTrait>(db: &C, project_id: Uuid) -> Result<u64, ProjectError> {
        let project = Self::find_by_id(db, project_id)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;
        // Snapshot the audience; membership rows cascade away with the project.
        let member_ids = Self::members(db, project_id)
            .await?
            .into_iter()
            .map(|m| m.user.id)
            .collect();
        let row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;
        let result = project::Entity::delete_by_id(row_id).exec(db).await?;
        EventOutbox::enqueue(
            db,
            events::EVENT_PROJECT_DELETED,
            "project",
            project_id,
            &ProjectEventPayload {
                project_id,
                owner_id: project.owner_id,
                member_ids,
            },
        )
        .await?;
        Ok(result.rows_affected)
    }

    /// Adds the user with the given email as a member. Caller must already
    /// have verified project ownership.
    pub async fn add_member<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
        email: &str,
    ) -> Result<ProjectMember, ProjectError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;
        let user_model = user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(db)
            .await?
            .ok_or(ProjectError::UserNotFound)?;

        let existing = project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .filter(project_member::Column::UserId.eq(user_model.id))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ProjectError::AlreadyMember);
        }

        let member = project_member::ActiveModel {
            uuid: Set(Uuid::new_v4()),
            project_id: Set(project_row_id),
            user_id: Set(user_model.id),
            created_at: Set(Utc::now()),
            ..Default::default()
        }
        .insert(db)
        .await?;

        Ok(ProjectMember {
            id: member.uuid,
            project_id,
            user: User::find_by_id(db, user_model.uuid)
                .await?
                .ok_or(ProjectError::UserNotFound)?,
            created_at: member.created_at,
        })
    }

    /// Members of the project in join order, each carrying the user record.
    pub async fn members<C: ConnectionTrait>(
        db: &C,
        project_id: Uuid,
    ) -> Result<Vec<ProjectMember>, ProjectError> {
        let project_row_id = ids::project_id_by_uuid(db, project_id)
            .await?
            .ok_or(ProjectError::ProjectNotFound)?;
        let rows = project_member::Entity::find()
            .filter(project_member::Column::ProjectId.eq(project_row_id))
            .order_by_asc(project_member::Column::Id)
            .all(db)
            .await?;

        let mut members = Vec::with_capacity(rows.len());
        for row in rows {
            let user_uuid = ids::user_uuid_by_id(db, row.user_id)
                .await?
                .ok_or_else(|| DbErr::RecordNotFound(format!("user row {}", row.user_id)))?;
            let user = User::find_by_id(db, user_uuid)
                .await?
                .ok_or(ProjectError::UserNotFound)?;
            members.push(ProjectMember {
                id: row.uuid,
                project_id,
                user,
                created_at: row.created_at,
            });
        }
        Ok(members)
    }

    /// The membership row together with its project, for ownership checks
    /// before removal.
    pub async fn member_with_project<C: ConnectionTrait>(
        db: &C,
        member_id: Uuid,
    ) -> Result<Option<(ProjectMember, Self)>, DbErr> {
        let Some(row) = project_member::Entity::find()
            .filter(project_member::Column::Uuid.eq(member_id))
            .one(db)
            .await?
        else {
            return Ok(None);
        };
        let project_model = project::Entity::find_by_id(row.project_id)
            .one(db)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("project row {}", row.project_id)))?;
        let project = Self::from_model(db, &project_model).await?;

        let user_uuid = ids::user_uuid_by_id(db, row.user_id)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user row {}", row.user_id)))?;
        let user = User::find_by_id(db, user_uuid)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user {user_uuid}")))?;

        Ok(Some((
            ProjectMember {
                id: row.uuid,
                project_id: project.id,
                user,
                created_at: row.created_at,
            },
            project,
        )))
    }

    pub async fn remove_member<C: ConnectionTrait>(
        db: &C,
        member_id: Uuid,
    ) -> Result<u64, ProjectError> {
        let row_id = ids::project_member_id_by_uuid(db, member_id)
            .await?
            .ok_or(ProjectError::MemberNotFound)?;
        let result = project_member::Entity::delete_by_id(row_id).exec(db).await?;
        Ok(result.rows_affected)
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use crate::models::user::CreateUser;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    async fn seed_user(db: &sea_orm::DatabaseConnection, name: &str, email: &str) -> User {
        User::create(
            db,
            &CreateUser {
                name: name.to_string(),
                email: email.to_string(),
                password_hash: "hash".to_string(),
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    fn sample_project(name: &str) -> CreateProject {
        CreateProject {
            name: name.to_string(),
            description: None,
        }
    }

    #[tokio::test]
    async fn find_for_user_includes_owned_and_member_projects() {
        let db = setup_db().await;
        let owner = seed_user(&db, "Owner", "owner@example.com").await;
        let member = seed_user(&db, "Member", "member@example.com").await;

        let owned = Project::create(&db, &sample_project("Owned"), owner.id, Uuid::new_v4())
            .await
            .unwrap();
        let shared = Project::create(&db, &sample_project("Shared"), member.id, Uuid::new_v4())
            .await
            .unwrap();
        Project::add_member(&db, shared.id, "owner@example.com")
            .await
            .unwrap();

        let visible = Project::find_for_user(&db, owner.id).await.unwrap();
        let mut ids: Vec<Uuid> = visible.iter().map(|p| p.id).collect();
        ids.sort();
        let mut expected = vec![owned.id, shared.id];
        expected.sort();
        assert_eq!(ids, expected);

        let member_visible = Project::find_for_user(&db, member.id).await.unwrap();
        assert_eq!(member_visible.len(), 1);
        assert_eq!(member_visible[0].id, shared.id);
    }

    #[tokio::test]
    async fn add_member_rejects_duplicates_and_unknown_emails() {
        let db = setup_db().await;
        let owner = seed_user(&db, "Owner", "owner@example.com").await;
        seed_user(&db, "Member", "member@example.com").await;
        let project = Project::create(&db, &sample_project("Team"), owner.id, Uuid::new_v4())
            .await
            .unwrap();

        Project::add_member(&db, project.id, "member@example.com")
            .await
            .unwrap();
        assert!(matches!(
            Project::add_member(&db, project.id, "member@example.com").await,
            Err(ProjectError::AlreadyMember)
        ));
        assert!(matches!(
            Project::add_member(&db, project.id, "ghost@example.com").await,
            Err(ProjectError::UserNotFound)
        ));
    }

    #[tokio::test]
    async fn remove_member_deletes_the_membership_row() {
        let db = setup_db().await;
        let owner = seed_user(&db, "Owner", "owner@example.com").await;
        seed_user(&db, "Member", "member@example.com").await;
        let project = Project::create(&db, &sample_project("Team"), owner.id, Uuid::new_v4())
            .await
            .unwrap();
        let member = Project::add_member(&db, project.id, "member@example.com")
            .await
            .unwrap();

        let (loaded_member, loaded_project) = Project::member_with_project(&db, member.id)
            .await
            .unwrap()
            .expect("membership");
        assert_eq!(loaded_project.owner_id, owner.id);
        assert_eq!(loaded_member.user.email, "member@example.com");

        let removed = Project::remove_member(&db, member.id).await.unwrap();
        assert_eq!(removed, 1);
        assert!(Project::members(&db, project.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_validates_name_length() {
        let db = setup_db().await;
        let owner = seed_user(&db, "Owner", "owner@example.com").await;
        let err = Project::create(&db, &sample_project("x"), owner.id, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, ProjectError::ValidationError(_)));
    }
}
