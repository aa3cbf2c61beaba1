use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The request was rejected even after the refresh-and-replay attempt.
    #[error("request unauthorized")]
    Unauthorized,

    /// The refresh credential is gone or was rejected; the local session has
    /// been cleared and the user must sign in again.
    #[error("session expired")]
    SessionExpired,

    #[error("api error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("invalid response payload: {0}")]
    Decode(String),
}
