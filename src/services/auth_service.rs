use std::sync::Arc;

use uuid::Uuid;

use crate::{
    auth::{
        IdTokenVerifier, Role, TokenBundle,
        jwt::{JwtKeys, encode_token, make_access_claims},
        password::{hash_password, verify_password},
    },
    config::AuthConfig,
    db::dao::{RefreshTokenDao, user_dao::ExternalProfile},
    db::entities::user,
    error::AppError,
    services::user_service::UserService,
};

pub const GOOGLE_PROVIDER: &str = "google";
pub const EMAIL_PROVIDER: &str = "email";

/// A freshly issued session: the owning user plus its credential pair.
#[derive(Debug)]
pub struct AuthSession {
    pub user: user::Model,
    pub tokens: TokenBundle,
}

/// Converts verified identities into local sessions and runs the
/// refresh-credential rotation protocol.
#[derive(Clone)]
pub struct AuthService {
    user_service: UserService,
    refresh_token_dao: RefreshTokenDao,
    jwt: JwtKeys,
    verifier: Arc<dyn IdTokenVerifier>,
    access_ttl_secs: usize,
    refresh_ttl_days: i64,
}

impl AuthService {
    pub fn new(
        user_service: UserService,
        refresh_token_dao: RefreshTokenDao,
        jwt: JwtKeys,
        verifier: Arc<dyn IdTokenVerifier>,
        cfg: &AuthConfig,
    ) -> Self {
        Self {
            user_service,
            refresh_token_dao,
            jwt,
            verifier,
            access_ttl_secs: cfg.access_ttl_secs,
            refresh_ttl_days: cfg.refresh_ttl_days,
        }
    }

    /// Exchange a Google ID token for a local session. Email is the stable
    /// join key: a returning identity updates its subject id and avatar on
    /// the existing row instead of creating a second account.
    pub async fn login_with_google(&self, id_token: &str) -> Result<AuthSession, AppError> {
        let identity = self.verifier.verify(id_token).await?;

        let user = match self.user_service.find_by_email(&identity.email).await? {
            Some(existing) => {
                self.user_service
                    .update_identity(&existing.id, Some(identity.subject), identity.picture)
                    .await?
            }
            None => {
                self.user_service
                    .create_external_user(
                        &identity.email,
                        GOOGLE_PROVIDER,
                        ExternalProfile {
                            provider_id: Some(identity.subject),
                            first_name: identity.given_name,
                            last_name: identity.family_name,
                            avatar_url: identity.picture,
                        },
                    )
                    .await?
            }
        };

        self.issue_session(user).await
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: Option<String>,
        last_name: Option<String>,
    ) -> Result<AuthSession, AppError> {
        let email = email.trim();
        if email.is_empty() {
            return Err(AppError::bad_request("Email required"));
        }

        // Email uniqueness holds across providers: an address already bound
        // to a Google account cannot be registered with a password.
        if self.user_service.find_by_email(email).await?.is_some() {
            return Err(AppError::conflict("User already exists"));
        }

        let password_hash = hash_password(password)?;
        let user = self
            .user_service
            .create_email_user(email, &password_hash, first_name, last_name)
            .await?;

        self.issue_session(user).await
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, AppError> {
        let user = self
            .user_service
            .find_by_email(email)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid credentials"))?;

        let Some(password_hash) = user.password_hash.as_deref() else {
            return Err(AppError::unauthorized("Invalid credentials"));
        };

        if !verify_password(password, password_hash)? {
            return Err(AppError::unauthorized("Invalid credentials"));
        }

        self.issue_session(user).await
    }

    /// Redeem a refresh credential: the old row is revoked and a brand-new
    /// pair is issued (single use). Missing, revoked and expired tokens all
    /// fail with the same message so callers cannot probe credential state.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AppError> {
        let token = self
            .refresh_token_dao
            .find_active_by_token(refresh_token)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

        if token.expires_at < chrono::Utc::now().fixed_offset() {
            return Err(AppError::unauthorized("Invalid refresh token"));
        }

        let user = self
            .user_service
            .find_live_by_id(&token.user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid refresh token"))?;

        self.refresh_token_dao.revoke_token(refresh_token).await?;

        self.issue_session(user).await
    }

    /// Revokes the credential. Unknown or already-revoked tokens still
    /// succeed so a client can always clear its local state.
    pub async fn logout(&self, refresh_token: &str) -> Result<(), AppError> {
        self.refresh_token_dao.revoke_token(refresh_token).await?;
        Ok(())
    }

    pub async fn complete_onboarding(&self, user_id: &Uuid) -> Result<user::Model, AppError> {
        self.user_service
            .find_live_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid credentials"))?;

        self.user_service.set_onboarding_completed(user_id).await
    }

    pub async fn me(&self, user_id: &Uuid) -> Result<user::Model, AppError> {
        self.user_service
            .find_live_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::unauthorized("Invalid credentials"))
    }

    async fn issue_session(&self, user: user::Model) -> Result<AuthSession, AppError> {
        let role = Role::try_from(user.role.as_str()).unwrap_or(Role::User);
        let claims = make_access_claims(&user.id, &user.email, role, self.access_ttl_secs);
        let access_token = encode_token(&self.jwt, &claims)?;

        let refresh = self
            .refresh_token_dao
            .create_refresh_token(&user.id, Some(self.refresh_ttl_days))
            .await?;

        Ok(AuthSession {
            user,
            tokens: TokenBundle {
                access_token,
                refresh_token: refresh.token,
                token_type: "Bearer",
                expires_in: self.access_ttl_secs,
            },
        })
    }
}
