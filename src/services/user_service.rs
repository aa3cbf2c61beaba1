use chrono::{DateTime, FixedOffset};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::dao::{DaoLayerError, UserDao, user_dao::ExternalProfile},
    db::entities::user,
    error::AppError,
};

/// Public view of a user row. Never carries the password hash.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub email: String,
    pub provider: String,
    pub provider_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    pub onboarding_completed: bool,
    pub created_at: DateTime<FixedOffset>,
    pub updated_at: DateTime<FixedOffset>,
}

impl From<user::Model> for UserProfile {
    fn from(user: user::Model) -> Self {
        Self {
            id: user.id,
            email: user.email,
            provider: user.provider,
            provider_id: user.provider_id,
            first_name: user.first_name,
            last_name: user.last_name,
            avatar_url: user.avatar_url,
            role: user.role,
            onboarding_completed: user.onboarding_completed,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Clone)]
pub struct UserService {
    user_dao: UserDao,
}

impl UserService {
    pub fn new(user_dao: UserDao) -> Self {
        Self { user_dao }
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<user::Model>, AppError> {
        Ok(self.user_dao.find_by_email(email).await?)
    }

    pub async fn find_live_by_id(&self, id: &Uuid) -> Result<Option<user::Model>, AppError> {
        Ok(self.user_dao.find_live_by_id(id).await?)
    }

    pub async fn create_external_user(
        &self,
        email: &str,
        provider: &str,
        profile: ExternalProfile,
    ) -> Result<user::Model, AppError> {
        Ok(self
            .user_dao
            .create_external_user(email, provider, profile)
            .await?)
    }

    pub async fn create_email_user(
        &self,
        email: &str,
        password_hash: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<user::Model, AppError> {
        Ok(self
            .user_dao
            .create_email_user(email, password_hash, first_name, last_name)
            .await?)
    }

    pub async fn update_identity(
        &self,
        id: &Uuid,
        provider_id: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<user::Model, AppError> {
        Ok(self
            .user_dao
            .update_identity(id, provider_id, avatar_url)
            .await?)
    }

    pub async fn set_onboarding_completed(&self, id: &Uuid) -> Result<user::Model, AppError> {
        match self.user_dao.set_onboarding_completed(id).await {
            Ok(user) => Ok(user),
            Err(DaoLayerError::NotFound { .. }) => {
                Err(AppError::unauthorized("Invalid credentials"))
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{FixedOffset, TimeZone};
    use uuid::Uuid;

    use crate::db::entities::user;

    use super::UserProfile;

    #[test]
    fn profile_serialization_is_camel_case_and_hash_free() {
        let now = FixedOffset::east_opt(0)
            .expect("offset should be valid")
            .with_ymd_and_hms(2026, 1, 1, 0, 0, 0)
            .single()
            .expect("timestamp should be valid");
        let profile = UserProfile::from(user::Model {
            id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            provider: "google".to_string(),
            provider_id: Some("g-123".to_string()),
            first_name: Some("Ann".to_string()),
            last_name: None,
            avatar_url: None,
            role: "user".to_string(),
            onboarding_completed: false,
            password_hash: Some("secret-hash".to_string()),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        });

        let value = serde_json::to_value(&profile).expect("profile should serialize");
        assert_eq!(value["email"], "a@b.com");
        assert_eq!(value["providerId"], "g-123");
        assert_eq!(value["onboardingCompleted"], false);
        assert!(value.get("passwordHash").is_none());
        assert!(value.get("password_hash").is_none());
        assert!(value.get("deletedAt").is_none());
    }
}
