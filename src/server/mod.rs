//! HTTP server
//!
//! Shared state is built once at startup and injected into every handler
//! through axum's `State` extractor.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    http::{header::CONTENT_TYPE, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};

use crate::config::{EngineConfig, ServerConfig};
use crate::error::AppError;
use crate::search::EngineClient;

pub mod ratelimit;
pub mod routes;


use ratelimit::RateLimiter;
use routes::{fuzzy_handler, health_handler, search_handler};

/// Everything a handler needs, built once per process
pub struct AppState {
    pub engine: EngineClient,
    pub limiter: RateLimiter,
    pub config: ServerConfig,
}

impl AppState {
    pub fn new(engine_config: &EngineConfig, config: ServerConfig) -> Result<Arc<Self>, AppError> {
        let engine = EngineClient::new(engine_config)?;
        let limiter = RateLimiter::new(config.rate_limit, config.rate_window);

        Ok(Arc::new(Self {
            engine,
            limiter,
            config,
        }))
    }
}

/// Build the application router
pub fn router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.allowed_origins);

    Router::new()
        .route("/api/search", post(search_handler))
        .route("/api/search/fuzzy", post(fuzzy_handler))
        .route("/health", get(health_handler))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    if allowed_origins.is_empty() || allowed_origins.iter().any(|o| o == "*") {
        return base.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("Ignoring invalid CORS origin {}", origin);
                None
            }
        })
        .collect();

    base.allow_origin(AllowOrigin::list(origins))
}

/// Bind and serve until Ctrl+C or SIGTERM
pub async fn serve(engine_config: EngineConfig, config: ServerConfig) -> anyhow::Result<()> {
    info!("Initializing state...");
    let address = config.address;
    let state = AppState::new(&engine_config, config)?;

    if !state.engine.ping().await {
        warn!("Search engine not reachable yet, searches will fail until it is");
    }

    let app = router(state);

    info!("Binding to {address}");
    let listener = TcpListener::bind(address).await?;
    info!("Server running on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
