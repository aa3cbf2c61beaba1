use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use axum::{Router, middleware};
use tower_http::trace::TraceLayer;

use authgate::{
    auth::GoogleIdTokenVerifier,
    config::AppConfig,
    db::connection,
    logging::init_tracing,
    middleware::{catch_panic_layer, json_error_middleware},
    routes::router,
    state::AppState,
};

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        tracing::error!("server failed: {err:?}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cfg = AppConfig::from_env().expect("failed to load config");
    init_tracing(&cfg.logging.rust_log);

    let db_cfg = cfg
        .database
        .as_ref()
        .context("APP_DATABASE__URL is required")?;
    let auth_cfg = cfg
        .auth
        .clone()
        .context("APP_AUTH__JWT_SECRET is required")?;
    let google_cfg = cfg
        .google
        .as_ref()
        .context("APP_GOOGLE__AUDIENCES is required")?;

    let db = connection::connect(db_cfg).await?;
    let verifier = Arc::new(GoogleIdTokenVerifier::new(google_cfg)?);

    let state = AppState::new(auth_cfg, db, verifier);

    let app = Router::new()
        .merge(router(Arc::clone(&state)))
        .layer(middleware::from_fn(json_error_middleware))
        .layer(catch_panic_layer())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", cfg.general.host, cfg.general.port)
        .parse()
        .expect("invalid host/port");
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
