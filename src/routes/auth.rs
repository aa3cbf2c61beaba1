use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    routing::{get, patch, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::TokenBundle,
    error::AppError,
    middleware::AuthGuard,
    response::{ApiResult, JsonApiResponse},
    services::{AuthService, AuthSession, ServiceContext, UserProfile},
    state::AppState,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleLoginRequest {
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    pub user: UserProfile,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: &'static str,
    pub expires_in: usize,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/google", post(google))
        .route("/login", post(login))
        .route("/register", post(register))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/onboarding", patch(onboarding))
        .with_state(state)
}

async fn google(
    State(state): State<Arc<AppState>>,
    Json(body): Json<GoogleLoginRequest>,
) -> ApiResult<AuthResponse> {
    let session = auth_service(&state).login_with_google(&body.id_token).await?;
    JsonApiResponse::ok(session.into())
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<AuthResponse> {
    let session = auth_service(&state).login(&body.email, &body.password).await?;
    JsonApiResponse::ok(session.into())
}

async fn register(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<AuthResponse> {
    let session = auth_service(&state)
        .register(&body.email, &body.password, body.first_name, body.last_name)
        .await?;
    JsonApiResponse::ok(session.into())
}

async fn refresh(
    State(state): State<Arc<AppState>>,
    Json(body): Json<RefreshRequest>,
) -> ApiResult<TokenResponse> {
    let session = auth_service(&state).refresh(&body.refresh_token).await?;
    JsonApiResponse::ok(session.tokens.into())
}

async fn logout(
    State(state): State<Arc<AppState>>,
    Json(body): Json<LogoutRequest>,
) -> ApiResult<MessageResponse> {
    auth_service(&state).logout(&body.refresh_token).await?;
    JsonApiResponse::ok(MessageResponse {
        message: "Logged out",
    })
}

async fn me(State(state): State<Arc<AppState>>, claims: AuthGuard) -> ApiResult<UserProfile> {
    let user_id = subject_id(&claims.sub)?;
    let user = auth_service(&state).me(&user_id).await?;
    JsonApiResponse::ok(user.into())
}

async fn onboarding(
    State(state): State<Arc<AppState>>,
    claims: AuthGuard,
) -> ApiResult<UserProfile> {
    let user_id = subject_id(&claims.sub)?;
    let user = auth_service(&state).complete_onboarding(&user_id).await?;
    JsonApiResponse::ok(user.into())
}

fn auth_service(state: &Arc<AppState>) -> AuthService {
    ServiceContext::from_state(state.as_ref()).auth(state.as_ref())
}

fn subject_id(sub: &str) -> Result<Uuid, AppError> {
    sub.parse()
        .map_err(|_| AppError::unauthorized("Invalid or expired token: bad subject"))
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: session.user.into(),
            access_token: session.tokens.access_token,
            refresh_token: session.tokens.refresh_token,
            token_type: session.tokens.token_type,
            expires_in: session.tokens.expires_in,
        }
    }
}

impl From<TokenBundle> for TokenResponse {
    fn from(bundle: TokenBundle) -> Self {
        Self {
            access_token: bundle.access_token,
            refresh_token: bundle.refresh_token,
            token_type: bundle.token_type,
            expires_in: bundle.expires_in,
        }
    }
}
