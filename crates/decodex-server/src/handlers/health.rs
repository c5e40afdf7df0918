//! Health check handlers

use crate::{error::ServerResult, server::ServerState};
use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::OnceLock;
use std::time::Instant;

/// Time the server state was first built
pub(crate) fn started_at() -> Instant {
    static STARTED: OnceLock<Instant> = OnceLock::new();
    *STARTED.get_or_init(Instant::now)
}

/// Basic health check
pub async fn health_check() -> ServerResult<Json<Value>> {
    Ok(Json(json!({
        "status": "ok",
        "service": "decodex-server",
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}

/// Readiness check - checks if server is ready to serve requests
pub async fn readiness_check(State(state): State<ServerState>) -> ServerResult<Json<Value>> {
    let mut ready = true;
    let mut checks = serde_json::Map::new();

    let vocab_size = state.models.tokenizer().vocab_size();
    if vocab_size > 0 {
        checks.insert("model".to_string(), json!({
            "status": "ok",
            "name": state.models.model_name(),
            "vocab_size": vocab_size
        }));
    } else {
        ready = false;
        checks.insert("model".to_string(), json!({
            "status": "error",
            "message": "Tokenizer has an empty vocabulary"
        }));
    }

    let limiter = &state.concurrency_limiter;
    checks.insert("capacity".to_string(), json!({
        "status": if limiter.available() > 0 { "ok" } else { "saturated" },
        "available": limiter.available(),
        "max_concurrent": limiter.max_concurrent()
    }));

    // The page is optional; a missing one does not block the API
    let index = state.config.frontend.static_dir.join("index.html");
    checks.insert("frontend".to_string(), json!({
        "status": if index.is_file() { "ok" } else { "missing" },
        "path": index.display().to_string()
    }));

    let status = if ready { "ready" } else { "not_ready" };

    Ok(Json(json!({
        "status": status,
        "service": "decodex-server",
        "version": crate::VERSION,
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "checks": checks
    })))
}

/// Liveness check - checks if server is alive
pub async fn liveness_check(State(state): State<ServerState>) -> ServerResult<Json<Value>> {
    Ok(Json(json!({
        "status": "alive",
        "service": "decodex-server",
        "version": crate::VERSION,
        "bind": state.config.bind.to_string(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "uptime_seconds": started_at().elapsed().as_secs()
    })))
}
