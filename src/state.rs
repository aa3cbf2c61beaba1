use std::sync::Arc;

use sea_orm::DatabaseConnection;

use crate::{
    auth::{IdTokenVerifier, jwt::JwtKeys},
    config::AuthConfig,
};

#[derive(Clone)]
pub struct AppState {
    pub auth: AuthConfig,
    pub jwt: JwtKeys,
    pub db: DatabaseConnection,
    pub verifier: Arc<dyn IdTokenVerifier>,
}

impl AppState {
    pub fn new(
        auth: AuthConfig,
        db: DatabaseConnection,
        verifier: Arc<dyn IdTokenVerifier>,
    ) -> Arc<Self> {
        let jwt = JwtKeys::from_secret(auth.jwt_secret.as_bytes());
        Arc::new(Self {
            auth,
            jwt,
            db,
            verifier,
        })
    }
}
