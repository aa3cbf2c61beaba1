use std::sync::Arc;

use axum::{extract::FromRequestParts, http::header};
use jsonwebtoken::{Algorithm, Validation, decode};

use crate::{auth::Claims, error::AppError, state::AppState};

// Auth guard: validate the bearer JWT and expose its claims to handlers.
impl FromRequestParts<Arc<AppState>> for Claims {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        if let Some(claims) = parts.extensions.get::<Claims>().cloned() {
            return Ok(claims);
        }

        let auth = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .unwrap_or("");

        let token = auth
            .strip_prefix("Bearer ")
            .ok_or_else(|| AppError::unauthorized("Missing/invalid Authorization header"))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;

        let data = decode::<Claims>(token, &state.jwt.dec, &validation)?;

        parts.extensions.insert(data.claims.clone());
        Ok(data.claims)
    }
}

pub type AuthGuard = Claims;
