//! Core server implementation

use crate::{
    backend::load_backend,
    config::{CorsConfig, ServerConfig},
    error::{ServerError, ServerResult},
    handlers,
    middleware::{concurrency_middleware, logging_middleware, timeout_middleware, ConcurrencyLimiter},
};

use axum::{
    http::{header, HeaderValue, Method},
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};
use decodex_core::{MetricsEngine, ModelHandle, StrategyComparator};
use std::{sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    services::{ServeDir, ServeFile},
    trace::TraceLayer,
};
use tracing::{info, warn};

/// Main server state
#[derive(Clone)]
pub struct ServerState {
    pub config: Arc<ServerConfig>,
    pub models: ModelHandle,
    pub comparator: Arc<StrategyComparator>,
    pub metrics: Arc<MetricsEngine>,
    pub concurrency_limiter: Arc<ConcurrencyLimiter>,
}

impl ServerState {
    pub fn new(config: ServerConfig, models: ModelHandle) -> Self {
        handlers::health::started_at();
        let comparator = Arc::new(StrategyComparator::new(&config.engine));
        let metrics = Arc::new(MetricsEngine::new(&config.engine));
        let concurrency_limiter = Arc::new(ConcurrencyLimiter::new(
            config.limits.max_concurrent_requests,
        ));

        Self {
            config: Arc::new(config),
            models,
            comparator,
            metrics,
            concurrency_limiter,
        }
    }
}

/// Build the router with all routes and middleware
pub fn create_router(state: ServerState) -> Router {
    let config = Arc::clone(&state.config);
    let limits = Arc::new(config.limits.clone());
    let static_dir = &config.frontend.static_dir;

    // Timeout wraps the permit wait as well as the comparison
    let generate = post(handlers::generate::generate)
        .layer(from_fn_with_state(
            Arc::clone(&state.concurrency_limiter),
            concurrency_middleware,
        ))
        .layer(from_fn_with_state(limits, timeout_middleware));

    let mut router = Router::new()
        .route("/generate", generate)
        .route("/health", get(handlers::health::health_check))
        .route("/health/ready", get(handlers::health::readiness_check))
        .route("/health/live", get(handlers::health::liveness_check))
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(RequestBodyLimitLayer::new(config.limits.max_body_size))
        .layer(from_fn(logging_middleware))
        .layer(TraceLayer::new_for_http());

    if config.cors.enabled {
        router = router.layer(cors_layer(&config.cors));
    }

    router.with_state(state)
}

fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let origins = if cors.allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        AllowOrigin::list(
            cors.allowed_origins
                .iter()
                .filter_map(|origin| HeaderValue::from_str(origin).ok()),
        )
    };

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(cors.max_age))
}

/// Decodex HTTP server
pub struct DecodexServer {
    config: Arc<ServerConfig>,
    state: ServerState,
}

impl DecodexServer {
    /// Create a server around an existing model handle
    pub fn new(config: ServerConfig, models: ModelHandle) -> ServerResult<Self> {
        config.validate().map_err(ServerError::Config)?;
        let state = ServerState::new(config, models);
        Ok(Self {
            config: Arc::clone(&state.config),
            state,
        })
    }

    /// Create a server, building the bigram backend from `config.backend`
    pub fn from_config(config: ServerConfig) -> ServerResult<Self> {
        let models = load_backend(&config.backend)
            .map_err(|e| ServerError::Config(format!("{e:#}")))?;
        Self::new(config, models)
    }

    /// Build the router with all routes and middleware
    fn build_router(&self) -> Router {
        create_router(self.state.clone())
    }

    /// Serve until the shutdown signal resolves
    pub async fn start<F>(self, shutdown: F) -> ServerResult<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let app = self.build_router();
        let addr = self.config.bind;

        info!("Starting Decodex server on {}", addr);

        let listener = TcpListener::bind(addr).await.map_err(ServerError::Io)?;

        info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get server configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Get server state
    pub fn state(&self) -> &ServerState {
        &self.state
    }
}

/// Resolves on Ctrl-C
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, draining in-flight requests");
}

/// Run server with graceful shutdown handling
pub async fn run_server(server: DecodexServer) -> ServerResult<()> {
    server.start(shutdown_signal()).await
}
