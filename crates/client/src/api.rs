use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use crate::{
    error::ClientError,
    session::SessionStore,
    types::{AuthPayload, TokenPair, UserProfile},
};

/// A request is replayed after a silent refresh at most this many times.
pub const MAX_AUTH_RETRIES: u8 = 1;

const UNAUTHORIZED: u16 = 401;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

/// An outgoing request. The attempt counter travels with the value, so the
/// at-most-once-replay rule is enforced by construction instead of by a
/// mutable marker on shared config.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
    pub requires_auth: bool,
    attempt: u8,
}

impl ApiRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path, None)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::Post, path, Some(body))
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::Patch, path, None)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path, None)
    }

    fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Self {
        Self {
            method,
            path: path.into(),
            body,
            requires_auth: true,
            attempt: 0,
        }
    }

    /// Marks the request as not needing a bearer credential (login, refresh,
    /// logout). Public requests are never silently refreshed.
    pub fn public(mut self) -> Self {
        self.requires_auth = false;
        self
    }

    pub fn attempt(&self) -> u8 {
        self.attempt
    }

    fn retried(mut self) -> Self {
        self.attempt += 1;
        self
    }
}

#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: Value,
}

/// Wire seam under the pipeline; tests substitute a scripted transport.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<TransportResponse, ClientError>;
}

pub struct HttpTransport {
    http: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> Result<TransportResponse, ClientError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.http.get(&url),
            Method::Post => self.http.post(&url),
            Method::Patch => self.http.patch(&url),
            Method::Delete => self.http.delete(&url),
        };

        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|err| ClientError::Transport(err.to_string()))?;

        let status = response.status().as_u16();
        let body = response.json().await.unwrap_or(Value::Null);

        Ok(TransportResponse { status, body })
    }
}

/// HTTP client wrapper making credential rotation invisible to feature code:
/// attaches the access token, and on a 401 refreshes once and replays.
///
/// Refreshes are not coalesced across concurrent in-flight requests; two
/// simultaneous 401s can race on the same refresh token and the loser falls
/// back to a full sign-in.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    session: Arc<SessionStore>,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: Arc<SessionStore>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Arc<SessionStore> {
        &self.session
    }

    pub async fn execute(&self, request: ApiRequest) -> Result<Value, ClientError> {
        let mut request = request;
        loop {
            let bearer = if request.requires_auth {
                self.session.access_token()
            } else {
                None
            };

            let response = self.transport.send(&request, bearer.as_deref()).await?;

            if response.status != UNAUTHORIZED || !request.requires_auth {
                return unwrap_envelope(response);
            }

            if request.attempt >= MAX_AUTH_RETRIES {
                return Err(ClientError::Unauthorized);
            }

            self.refresh_session().await?;
            request = request.retried();
        }
    }

    pub async fn login_with_google(&self, id_token: &str) -> Result<UserProfile, ClientError> {
        let data = self
            .execute(ApiRequest::post("/auth/google", json!({"idToken": id_token})).public())
            .await?;
        self.store_session(data)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserProfile, ClientError> {
        let data = self
            .execute(
                ApiRequest::post("/auth/login", json!({"email": email, "password": password}))
                    .public(),
            )
            .await?;
        self.store_session(data)
    }

    pub async fn register(
        &self,
        email: &str,
        password: &str,
        first_name: Option<&str>,
        last_name: Option<&str>,
    ) -> Result<UserProfile, ClientError> {
        let data = self
            .execute(
                ApiRequest::post(
                    "/auth/register",
                    json!({
                        "email": email,
                        "password": password,
                        "firstName": first_name,
                        "lastName": last_name,
                    }),
                )
                .public(),
            )
            .await?;
        self.store_session(data)
    }

    pub async fn me(&self) -> Result<UserProfile, ClientError> {
        let data = self.execute(ApiRequest::get("/auth/me")).await?;
        decode(data)
    }

    pub async fn complete_onboarding(&self) -> Result<UserProfile, ClientError> {
        let data = self.execute(ApiRequest::patch("/auth/onboarding")).await?;
        decode(data)
    }

    /// Best-effort server-side revocation; local state is cleared no matter
    /// what the server answered so signing out can never get stuck.
    pub async fn logout(&self) {
        if let Some(refresh_token) = self.session.refresh_token() {
            let request =
                ApiRequest::post("/auth/logout", json!({"refreshToken": refresh_token})).public();
            if let Err(err) = self.execute(request).await {
                tracing::warn!(error = %err, "server logout failed, clearing local session");
            }
        }

        self.session.clear();
    }

    fn store_session(&self, data: Value) -> Result<UserProfile, ClientError> {
        let payload: AuthPayload = decode(data)?;
        self.session.set_session(
            payload.user.clone(),
            payload.access_token,
            payload.refresh_token,
        );
        Ok(payload.user)
    }

    async fn refresh_session(&self) -> Result<(), ClientError> {
        let Some(refresh_token) = self.session.refresh_token() else {
            self.session.clear();
            return Err(ClientError::SessionExpired);
        };

        let request =
            ApiRequest::post("/auth/refresh", json!({"refreshToken": refresh_token})).public();

        let pair: Result<TokenPair, ClientError> = match self.transport.send(&request, None).await {
            Ok(response) if (200..300).contains(&response.status) => {
                unwrap_envelope(response).and_then(decode)
            }
            Ok(response) => Err(ClientError::Api {
                status: response.status,
                message: error_message(&response.body, response.status),
            }),
            Err(err) => Err(err),
        };

        match pair {
            Ok(pair) => {
                self.session.set_tokens(pair.access_token, pair.refresh_token);
                Ok(())
            }
            Err(err) => {
                tracing::debug!(error = %err, "silent refresh failed, clearing session");
                self.session.clear();
                Err(ClientError::SessionExpired)
            }
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(data: Value) -> Result<T, ClientError> {
    serde_json::from_value(data).map_err(|err| ClientError::Decode(err.to_string()))
}

/// Extracts `data` from the `{data, success, timestamp}` envelope; servers
/// that omit the envelope pass their body through untouched.
fn unwrap_envelope(response: TransportResponse) -> Result<Value, ClientError> {
    if (200..300).contains(&response.status) {
        let is_envelope = response
            .body
            .as_object()
            .is_some_and(|object| object.contains_key("success") && object.contains_key("data"));
        if is_envelope {
            return Ok(response.body["data"].clone());
        }
        return Ok(response.body);
    }

    if response.status == UNAUTHORIZED {
        return Err(ClientError::Unauthorized);
    }

    Err(ClientError::Api {
        status: response.status,
        message: error_message(&response.body, response.status),
    })
}

fn error_message(body: &Value, status: u16) -> String {
    body.get("error")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("request failed with status {status}"))
}
