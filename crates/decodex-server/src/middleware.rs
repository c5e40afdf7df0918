//! Middleware components for the server

use crate::{config::RequestLimits, error::ServerError};
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use std::{sync::Arc, time::Duration};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

/// Request timeout middleware
pub async fn timeout_middleware(
    State(limits): State<Arc<RequestLimits>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let timeout_duration = Duration::from_secs(limits.request_timeout);

    match tokio::time::timeout(timeout_duration, next.run(request)).await {
        Ok(response) => Ok(response),
        Err(_) => Err(ServerError::Timeout(format!(
            "comparison did not finish within {}s",
            limits.request_timeout
        ))),
    }
}

/// Logging middleware
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = std::time::Instant::now();

    debug!(method = %method, uri = %uri, "Request started");

    let response = next.run(request).await;
    let elapsed = start.elapsed();

    info!(
        method = %method,
        uri = %uri,
        status = %response.status(),
        elapsed_ms = %elapsed.as_millis(),
        "Request completed"
    );

    response
}

/// Bounds the number of comparisons running at once
pub struct ConcurrencyLimiter {
    semaphore: Arc<Semaphore>,
    max_concurrent: usize,
}

impl ConcurrencyLimiter {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            max_concurrent,
        }
    }

    /// Wait for a free slot
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, ServerError> {
        Arc::clone(&self.semaphore)
            .acquire_owned()
            .await
            .map_err(|_| ServerError::Internal("Failed to acquire concurrency permit".to_string()))
    }

    /// Slots not currently in use
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }
}

/// Concurrency limiting middleware
pub async fn concurrency_middleware(
    State(limiter): State<Arc<ConcurrencyLimiter>>,
    request: Request,
    next: Next,
) -> Result<Response, ServerError> {
    let _permit = limiter.acquire().await?;
    Ok(next.run(request).await)
}
