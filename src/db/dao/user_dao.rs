use chrono::Utc;
use sea_orm::{ColumnTrait, DatabaseConnection, QueryFilter, Set};
use uuid::Uuid;

use super::{DaoBase, DaoResult};
use crate::auth::Role;
use crate::db::entities::user;

#[derive(Clone)]
pub struct UserDao {
    db: DatabaseConnection,
}

impl DaoBase for UserDao {
    type Entity = user::Entity;

    fn from_db(db: DatabaseConnection) -> Self {
        Self { db }
    }

    fn db(&self) -> &DatabaseConnection {
        &self.db
    }
}

/// Profile fields carried by an external identity at login time.
#[derive(Debug, Clone, Default)]
pub struct ExternalProfile {
    pub provider_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
}

impl UserDao {
    /// Every lookup used for authentication excludes soft-deleted rows.
    pub async fn find_by_email(&self, email: &str) -> DaoResult<Option<user::Model>> {
        let email = email.to_string();
        self.find(1, 1, None, move |query| {
            query
                .filter(user::Column::Email.eq(email))
                .filter(user::Column::DeletedAt.is_null())
        })
        .await
        .map(|response| response.data.into_iter().next())
    }

    pub async fn find_live_by_id(&self, id: &Uuid) -> DaoResult<Option<user::Model>> {
        let id = *id;
        self.find(1, 1, None, move |query| {
            query
                .filter(user::Column::Id.eq(id))
                .filter(user::Column::DeletedAt.is_null())
        })
        .await
        .map(|response| response.data.into_iter().next())
    }

    pub async fn create_external_user(
        &self,
        email: &str,
        provider: &str,
        profile: ExternalProfile,
    ) -> DaoResult<user::Model> {
        let model = user::ActiveModel {
            email: Set(email.to_string()),
            provider: Set(provider.to_string()),
            provider_id: Set(profile.provider_id),
            first_name: Set(profile.first_name),
            last_name: Set(profile.last_name),
            avatar_url: Set(profile.avatar_url),
            role: Set(Role::User.as_str().to_string()),
            onboarding_completed: Set(false),
            password_hash: Set(None),
            deleted_at: Set(None),
            ..Default::default()
        };
        self.create(model).await
    }

    pub async fn create_email_user(
        &self,
        email: &str,
        password_hash: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> DaoResult<user::Model> {
        let model = user::ActiveModel {
            email: Set(email.to_string()),
            provider: Set("email".to_string()),
            provider_id: Set(None),
            first_name: Set(first_name),
            last_name: Set(last_name),
            avatar_url: Set(None),
            role: Set(Role::User.as_str().to_string()),
            onboarding_completed: Set(false),
            password_hash: Set(Some(password_hash.to_string())),
            deleted_at: Set(None),
            ..Default::default()
        };
        self.create(model).await
    }

    /// Re-establishes the identity binding on a returning external login.
    /// Email stays the stable join key; subject id and avatar may move.
    pub async fn update_identity(
        &self,
        id: &Uuid,
        provider_id: Option<String>,
        avatar_url: Option<String>,
    ) -> DaoResult<user::Model> {
        self.update(*id, move |active| {
            if provider_id.is_some() {
                active.provider_id = Set(provider_id);
            }
            if avatar_url.is_some() {
                active.avatar_url = Set(avatar_url);
            }
        })
        .await
    }

    pub async fn set_onboarding_completed(&self, id: &Uuid) -> DaoResult<user::Model> {
        self.update(*id, |active| {
            active.onboarding_completed = Set(true);
        })
        .await
    }

    /// Deletion is a timestamp flag, never a row removal.
    pub async fn soft_delete(&self, id: &Uuid) -> DaoResult<user::Model> {
        let now = Utc::now().fixed_offset();
        self.update(*id, move |active| {
            active.deleted_at = Set(Some(now));
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use sea_orm::{DatabaseBackend, MockDatabase};
    use uuid::Uuid;

    use crate::db::entities::user;

    use super::{DaoBase, ExternalProfile, UserDao};
    use crate::db::dao::DaoLayerError;

    fn ts() -> chrono::DateTime<chrono::FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("offset should be valid")
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid")
    }

    fn user_model(id: Uuid, email: &str) -> user::Model {
        let now = ts();
        user::Model {
            id,
            email: email.to_string(),
            provider: "google".to_string(),
            provider_id: Some("g-123".to_string()),
            first_name: Some("Ann".to_string()),
            last_name: None,
            avatar_url: None,
            role: "user".to_string(),
            onboarding_completed: false,
            password_hash: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[tokio::test]
    async fn find_by_email_returns_first_match() {
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_model(id, "alice@example.com")]])
            .into_connection();
        let dao = UserDao::new(&db);

        let result = dao
            .find_by_email("alice@example.com")
            .await
            .expect("query should succeed");
        assert_eq!(result.map(|u| u.id), Some(id));
    }

    #[tokio::test]
    async fn find_by_email_returns_none_when_missing() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let dao = UserDao::new(&db);

        let result = dao
            .find_by_email("missing@example.com")
            .await
            .expect("query should succeed");
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn create_external_user_defaults_role_and_onboarding() {
        let id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([[user_model(id, "alice@example.com")]])
            .into_connection();
        let dao = UserDao::new(&db);

        let user = dao
            .create_external_user(
                "alice@example.com",
                "google",
                ExternalProfile {
                    provider_id: Some("g-123".to_string()),
                    first_name: Some("Ann".to_string()),
                    ..Default::default()
                },
            )
            .await
            .expect("insert should succeed");
        assert_eq!(user.role, "user");
        assert!(!user.onboarding_completed);
    }

    #[tokio::test]
    async fn set_onboarding_completed_propagates_not_found() {
        let missing_id = Uuid::new_v4();
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<user::Model>::new()])
            .into_connection();
        let dao = UserDao::new(&db);

        let err = dao
            .set_onboarding_completed(&missing_id)
            .await
            .expect_err("update should fail");
        assert!(matches!(
            err,
            DaoLayerError::NotFound { id, .. } if id == missing_id
        ));
    }
}
