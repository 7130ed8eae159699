use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use uuid::Uuid;

use crate::entities::user;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] DbErr),
    #[error("email is already registered")]
    EmailTaken,
    #[error("user not found")]
    UserNotFound,
    #[error("{0}")]
    ValidationError(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    #[ts(type = "Date")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "Date")]
    pub updated_at: DateTime<Utc>,
}

/// A user together with the stored password hash. Never serialized; the hash
/// stays inside the auth flow.
#[derive(Debug, Clone)]
pub struct UserCredential {
    pub user: User,
    pub password_hash: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
}

impl CreateUser {
    pub fn validate(&self) -> Result<(), UserError> {
        let name = self.name.trim();
        if name.is_empty() || name.len() > 50 {
            return Err(UserError::ValidationError(
                "name must be between 1 and 50 characters".to_string(),
            ));
        }
        let email = self.email.trim();
        if email.is_empty() || !email.contains('@') {
            return Err(UserError::ValidationError(
                "email address is invalid".to_string(),
            ));
        }
        Ok(())
    }
}

impl User {
    fn from_model(model: &user::Model) -> Self {
        Self {
            id: model.uuid,
            name: model.name.clone(),
            email: model.email.clone(),
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }

    pub async fn create<C: ConnectionTrait>(
        db: &C,
        data: &CreateUser,
        user_id: Uuid,
    ) -> Result<Self, UserError> {
        data.validate()?;
        let email = data.email.trim().to_lowercase();
        let existing = user::Entity::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(UserError::EmailTaken);
        }

        let now = Utc::now();
        let model = user::ActiveModel {
            uuid: Set(user_id),
            name: Set(data.name.trim().to_string()),
            email: Set(email),
            password_hash: Set(data.password_hash.clone()),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await?;
        Ok(Self::from_model(&model))
    }

    pub async fn find_by_id<C: ConnectionTrait>(
        db: &C,
        user_id: Uuid,
    ) -> Result<Option<Self>, DbErr> {
        let model = user::Entity::find()
            .filter(user::Column::Uuid.eq(user_id))
            .one(db)
            .await?;
        Ok(model.as_ref().map(Self::from_model))
    }

    pub async fn find_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<Self>, DbErr> {
        let model = user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(db)
            .await?;
        Ok(model.as_ref().map(Self::from_model))
    }

    pub async fn credential_by_email<C: ConnectionTrait>(
        db: &C,
        email: &str,
    ) -> Result<Option<UserCredential>, DbErr> {
        let model = user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(db)
            .await?;
        Ok(model.map(|m| UserCredential {
            user: Self::from_model(&m),
            password_hash: m.password_hash,
        }))
    }
}

#[cfg(test)]
mod tests {
    use sea_orm::Database;
    use sea_orm_migration::MigratorTrait;

    use super::*;

    async fn setup_db() -> sea_orm::DatabaseConnection {
        let db = Database::connect("sqlite::memory:").await.unwrap();
        db_migration::Migrator::up(&db, None).await.unwrap();
        db
    }

    fn sample(email: &str) -> CreateUser {
        CreateUser {
            name: "Grace".to_string(),
            email: email.to_string(),
            password_hash: "argon2-hash".to_string(),
        }
    }

    #[tokio::test]
    async fn create_normalizes_email_and_rejects_duplicates() {
        let db = setup_db().await;

        let user = User::create(&db, &sample("Grace@Example.COM"), Uuid::new_v4())
            .await
            .unwrap();
        assert_eq!(user.email, "grace@example.com");

        let err = User::create(&db, &sample("grace@example.com"), Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::EmailTaken));
    }

    #[tokio::test]
    async fn create_rejects_invalid_input() {
        let db = setup_db().await;

        let mut data = sample("grace@example.com");
        data.name = "  ".to_string();
        assert!(matches!(
            User::create(&db, &data, Uuid::new_v4()).await,
            Err(UserError::ValidationError(_))
        ));

        let mut data = sample("not-an-email");
        data.name = "Grace".to_string();
        assert!(matches!(
            User::create(&db, &data, Uuid::new_v4()).await,
            Err(UserError::ValidationError(_))
        ));
    }

    #[tokio::test]
    async fn credential_lookup_returns_stored_hash() {
        let db = setup_db().await;
        User::create(&db, &sample("grace@example.com"), Uuid::new_v4())
            .await
            .unwrap();

        let credential = User::credential_by_email(&db, "grace@example.com")
            .await
            .unwrap()
            .expect("credential");
        assert_eq!(credential.password_hash, "argon2-hash");
        assert_eq!(credential.user.name, "Grace");

        assert!(User::credential_by_email(&db, "nobody@example.com")
            .await
            .unwrap()
            .is_none());
    }
}
