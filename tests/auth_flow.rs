use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::{
    Router,
    body::{self, Body},
    http::{Request, StatusCode},
};
use sea_orm::{ConnectOptions, Database};
use serde_json::{Value, json};
use tower::ServiceExt; // for `oneshot`
use uuid::Uuid;

use authgate::{
    auth::{Claims, IdTokenVerifier, Role, VerifiedIdentity, jwt::now_unix},
    config::AuthConfig,
    db::dao::DaoContext,
    error::AppError,
    routes::router,
    state::AppState,
};

use jsonwebtoken::{Algorithm, Header, encode};

const TEST_SECRET: &[u8] = b"test-secret";

struct StubVerifier {
    identity: Mutex<VerifiedIdentity>,
}

impl StubVerifier {
    fn new(identity: VerifiedIdentity) -> Arc<Self> {
        Arc::new(Self {
            identity: Mutex::new(identity),
        })
    }

    fn set(&self, identity: VerifiedIdentity) {
        *self.identity.lock().expect("verifier mutex poisoned") = identity;
    }
}

#[async_trait]
impl IdTokenVerifier for StubVerifier {
    async fn verify(&self, id_token: &str) -> Result<VerifiedIdentity, AppError> {
        if id_token.is_empty() {
            return Err(AppError::unauthorized("Missing ID token"));
        }
        Ok(self.identity.lock().expect("verifier mutex poisoned").clone())
    }
}

fn ann_identity() -> VerifiedIdentity {
    VerifiedIdentity {
        subject: "g-123".to_string(),
        email: "a@b.com".to_string(),
        email_verified: true,
        given_name: Some("Ann".to_string()),
        family_name: None,
        picture: Some("https://example.com/ann.png".to_string()),
    }
}

// One shared in-memory SQLite database per test, schema synced from entities.
async fn test_state(verifier: Arc<StubVerifier>) -> Arc<AppState> {
    let mut options = ConnectOptions::new("sqlite::memory:".to_string());
    options
        .max_connections(1)
        .connect_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    let db = Database::connect(options).await.expect("connect sqlite");
    db.get_schema_registry("authgate::db::entities::*")
        .sync(&db)
        .await
        .expect("sync schema");

    AppState::new(
        AuthConfig {
            jwt_secret: String::from_utf8_lossy(TEST_SECRET).into_owned(),
            access_ttl_secs: 900,
            refresh_ttl_days: 30,
        },
        db,
        verifier,
    )
}

async fn test_app() -> (Router, Arc<AppState>, Arc<StubVerifier>) {
    let verifier = StubVerifier::new(ann_identity());
    let state = test_state(Arc::clone(&verifier)).await;
    (router(Arc::clone(&state)), state, verifier)
}

async fn send_json(
    app: &Router,
    method: &str,
    uri: &str,
    body: Option<Value>,
    bearer: Option<&str>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }

    let request = match body {
        Some(value) => builder
            .header("content-type", "application/json")
            .body(Body::from(value.to_string())),
        None => builder.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn google_login(app: &Router) -> Value {
    let (status, json) =
        send_json(app, "POST", "/auth/google", Some(json!({"idToken": "stub"})), None).await;
    assert_eq!(status, StatusCode::OK);
    json["data"].clone()
}

fn user_id(data: &Value) -> Uuid {
    data["user"]["id"]
        .as_str()
        .expect("user id should be present")
        .parse()
        .expect("user id should be a uuid")
}

fn access_token_for(sub: &str, email: &str, iat: usize, exp: usize) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        email: email.to_string(),
        role: Role::User,
        iat,
        exp,
    };

    let mut header = Header::new(Algorithm::HS256);
    header.typ = Some("JWT".into());

    encode(
        &header,
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(TEST_SECRET),
    )
    .unwrap()
}

#[tokio::test]
async fn health_route_works() {
    let (app, _, _) = test_app().await;

    let (status, json) = send_json(&app, "GET", "/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["data"]["ok"], true);
}

#[tokio::test]
async fn google_login_creates_user_and_returns_pair() {
    let (app, _, _) = test_app().await;

    let data = google_login(&app).await;

    assert_eq!(data["user"]["email"], "a@b.com");
    assert_eq!(data["user"]["provider"], "google");
    assert_eq!(data["user"]["providerId"], "g-123");
    assert_eq!(data["user"]["firstName"], "Ann");
    assert_eq!(data["tokenType"], "Bearer");
    assert!(data["accessToken"].as_str().is_some());
    assert!(data["refreshToken"].as_str().is_some());
    assert!(data["user"].get("passwordHash").is_none());
}

#[tokio::test]
async fn google_login_twice_reuses_user() {
    let (app, _, _) = test_app().await;

    let first = google_login(&app).await;
    let second = google_login(&app).await;

    assert_eq!(user_id(&first), user_id(&second));
}

#[tokio::test]
async fn google_login_rebinds_subject_and_avatar() {
    let (app, _, verifier) = test_app().await;

    let first = google_login(&app).await;
    verifier.set(VerifiedIdentity {
        subject: "g-456".to_string(),
        picture: Some("https://example.com/new.png".to_string()),
        ..ann_identity()
    });
    let second = google_login(&app).await;

    assert_eq!(user_id(&first), user_id(&second));
    assert_eq!(second["user"]["providerId"], "g-456");
    assert_eq!(second["user"]["avatarUrl"], "https://example.com/new.png");
}

#[tokio::test]
async fn refresh_rotates_and_rejects_replay() {
    let (app, _, _) = test_app().await;

    let login = google_login(&app).await;
    let first_refresh = login["refreshToken"].as_str().unwrap().to_string();

    let (status, json) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        Some(json!({"refreshToken": first_refresh})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let rotated = json["data"]["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, first_refresh);

    // The redeemed credential is single use.
    let (status, json) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        Some(json!({"refreshToken": first_refresh})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(json["success"], false);

    // The rotated credential still works.
    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        Some(json!({"refreshToken": rotated})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn refresh_rejects_expired_token() {
    let (app, state, _) = test_app().await;

    let login = google_login(&app).await;
    let expired = DaoContext::new(&state.db)
        .refresh_token()
        .create_refresh_token(&user_id(&login), Some(-1))
        .await
        .expect("insert expired token");

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        Some(json!({"refreshToken": expired.token})),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_returns_profile_for_valid_token() {
    let (app, _, _) = test_app().await;

    let login = google_login(&app).await;
    let access = login["accessToken"].as_str().unwrap();

    let (status, json) = send_json(&app, "GET", "/auth/me", None, Some(access)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["email"], "a@b.com");
    assert!(json["data"].get("passwordHash").is_none());
}

#[tokio::test]
async fn me_without_token_is_rejected() {
    let (app, _, _) = test_app().await;

    let (status, _) = send_json(&app, "GET", "/auth/me", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn me_rejects_expired_access_token() {
    let (app, _, _) = test_app().await;

    let login = google_login(&app).await;
    let sub = user_id(&login).to_string();
    let now = now_unix();
    let expired = access_token_for(&sub, "a@b.com", now - 7200, now - 3600);

    let (status, _) = send_json(&app, "GET", "/auth/me", None, Some(&expired)).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn soft_deleted_user_is_unreachable() {
    let (app, state, _) = test_app().await;

    let login = google_login(&app).await;
    let id = user_id(&login);
    let access = login["accessToken"].as_str().unwrap().to_string();
    let refresh = login["refreshToken"].as_str().unwrap().to_string();

    DaoContext::new(&state.db)
        .user()
        .soft_delete(&id)
        .await
        .expect("soft delete user");

    let (status, _) = send_json(&app, "GET", "/auth/me", None, Some(&access)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        Some(json!({"refreshToken": refresh})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_twice_succeeds() {
    let (app, _, _) = test_app().await;

    let login = google_login(&app).await;
    let refresh = login["refreshToken"].as_str().unwrap().to_string();

    for _ in 0..2 {
        let (status, json) = send_json(
            &app,
            "POST",
            "/auth/logout",
            Some(json!({"refreshToken": refresh})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["message"], "Logged out");
    }

    // The credential really is gone.
    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/refresh",
        Some(json!({"refreshToken": refresh})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn register_rejects_email_bound_to_google_account() {
    let (app, _, _) = test_app().await;

    google_login(&app).await;

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/register",
        Some(json!({"email": "a@b.com", "password": "password123"})),
        None,
    )
    .await;

    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_then_login_email_flow() {
    let (app, _, _) = test_app().await;

    let (status, json) = send_json(
        &app,
        "POST",
        "/auth/register",
        Some(json!({
            "email": "bob@example.com",
            "password": "password123",
            "firstName": "Bob"
        })),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["user"]["provider"], "email");

    let (status, json) = send_json(
        &app,
        "POST",
        "/auth/login",
        Some(json!({"email": "bob@example.com", "password": "password123"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = json["data"]["accessToken"].as_str().unwrap();

    let (status, json) = send_json(&app, "GET", "/auth/me", None, Some(access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["firstName"], "Bob");

    let (status, _) = send_json(
        &app,
        "POST",
        "/auth/login",
        Some(json!({"email": "bob@example.com", "password": "wrong-password"})),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn onboarding_completes_flag() {
    let (app, _, _) = test_app().await;

    let login = google_login(&app).await;
    let access = login["accessToken"].as_str().unwrap().to_string();
    assert_eq!(login["user"]["onboardingCompleted"], false);

    let (status, json) = send_json(&app, "PATCH", "/auth/onboarding", None, Some(&access)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["data"]["onboardingCompleted"], true);
}
