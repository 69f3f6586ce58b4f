//! Smart Agriculture Exchange server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use agrex_api::{
    AppState, RateLimiterState, auth_middleware, rate_limit_middleware, router as api_router,
};
use agrex_common::Config;
use axum::{Json, Router, http::StatusCode, middleware, routing::get};
use serde_json::{Value, json};
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// The full HTTP application: API under `/api` plus the health check.
fn app(state: AppState, rate_limiter: RateLimiterState, request_timeout: Duration) -> Router {
    Router::new()
        .nest("/api", api_router())
        .layer(middleware::from_fn_with_state(
            rate_limiter,
            rate_limit_middleware,
        ))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .route("/healthz", get(healthz))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods(Any)
                        .allow_headers(Any),
                )
                .map_response(|res: axum::response::Response<_>| res.map(axum::body::Body::new))
                .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
                .layer(TimeoutLayer::with_status_code(
                    StatusCode::REQUEST_TIMEOUT,
                    request_timeout,
                )),
        )
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "agrex=debug,tower_http=debug".into()),
        )
        .init();

    info!("Starting agrex server...");

    let config = Config::load()?;

    let db = agrex_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    agrex_db::migrate(&db).await?;
    info!("Migrations completed");

    let db = Arc::new(db);
    let state = AppState::new(&db);

    if let Some(username) = config.admin.bootstrap_username.as_deref()
        && let Some(admin) = state.user_service.bootstrap_admin(username).await?
    {
        info!(user_id = %admin.id, username = %admin.username, "Bootstrap admin ready");
    }

    let rate_limiter =
        RateLimiterState::default().with_trusted_proxies(config.server.trusted_proxies.clone());
    let app = app(
        state,
        rate_limiter,
        Duration::from_secs(config.server.request_timeout_secs),
    );

    let addr: SocketAddr = config.bind_address().parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shutdown complete");
    Ok(())
}
