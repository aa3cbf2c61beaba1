use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;

pub type ApiResult<T> = Result<JsonApiResponse<T>, AppError>;

/// Success envelope: `{ data, success, timestamp }`. Clients unwrap `data`
/// before the payload reaches feature code, so every success response must
/// carry the same shape.
#[derive(Debug, Serialize)]
pub struct JsonApiResponse<T: Serialize> {
    pub data: T,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl<T: Serialize> JsonApiResponse<T> {
    pub fn ok(data: T) -> ApiResult<T> {
        Ok(Self {
            data,
            success: true,
            timestamp: Utc::now(),
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub error: String,
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

impl ErrorEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
            success: false,
            timestamp: Utc::now(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = status_for(&self);
        (status, Json(ErrorEnvelope::new(self.message()))).into_response()
    }
}

impl<T: Serialize> IntoResponse for JsonApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
        AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AppError::Forbidden(_) => StatusCode::FORBIDDEN,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Conflict(_) => StatusCode::CONFLICT,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_carries_data_and_flag() {
        let response =
            JsonApiResponse::ok(serde_json::json!({"ok": true})).expect("ok should never fail");
        let value = serde_json::to_value(&response).expect("envelope should serialize");

        assert_eq!(value["success"], true);
        assert_eq!(value["data"]["ok"], true);
        assert!(value["timestamp"].is_string());
    }

    #[test]
    fn error_statuses_match_variants() {
        assert_eq!(
            status_for(&AppError::unauthorized("x")),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(status_for(&AppError::conflict("x")), StatusCode::CONFLICT);
        assert_eq!(
            status_for(&AppError::internal("x")),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
