//! Client-side session plumbing for an `authgate` backend: a persisted,
//! observable session cache and an HTTP pipeline that attaches the access
//! credential and silently refreshes it once on authorization failure.

pub mod api;
pub mod error;
pub mod session;
pub mod storage;
pub mod types;

pub use api::{ApiClient, ApiRequest, HttpTransport, Method, Transport, TransportResponse};
pub use error::ClientError;
pub use session::{SessionSnapshot, SessionStore, SubscriptionId, STORAGE_KEY};
pub use storage::{FileStorage, KeyringStorage, MemoryStorage, SessionStorage, StorageError};
pub use types::{AuthPayload, TokenPair, UserProfile};
