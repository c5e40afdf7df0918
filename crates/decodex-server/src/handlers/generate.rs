//! Strategy comparison handler

use crate::{
    error::{ServerError, ServerResult},
    server::ServerState,
};
use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use decodex_core::{validation::Validator, GenerationResult, StrategyMap, TextMetrics};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

/// Comparison request
#[derive(Debug, Deserialize, Serialize)]
pub struct GenerateRequest {
    pub prompt: Option<String>,
    /// Total sequence length, prompt included
    pub max_length: Option<usize>,
    /// Partial per-strategy parameters, judged by the normalizer
    pub params: Option<Value>,
}

/// Comparison response
#[derive(Debug, Serialize, Deserialize)]
pub struct GenerateResponse {
    pub results: GenerationResult,
    pub metrics: StrategyMap<TextMetrics>,
}

/// Generate with all five strategies and score every output
pub async fn generate(
    State(state): State<ServerState>,
    payload: Result<Json<GenerateRequest>, JsonRejection>,
) -> ServerResult<Json<GenerateResponse>> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected request body");
        ServerError::InvalidRequest(rejection.body_text())
    })?;

    let prompt = Validator::validate_prompt(request.prompt.as_deref())?;
    let engine = &state.config.engine;
    let max_length = Validator::validate_max_length(
        request.max_length.unwrap_or(engine.default_max_length),
        engine.max_length_limit,
    )?;

    let comparison = state
        .comparator
        .compare(&state.models, prompt, max_length, request.params.as_ref())
        .await;

    let prompt_token_ids = comparison.prompt_token_ids.as_deref().map(Vec::as_slice);
    let metrics = state
        .metrics
        .score_all(&state.models, &comparison.results, prompt_token_ids)
        .await;

    let (slowest_strategy, slowest_ms) = comparison.slowest();
    info!(
        prompt_chars = prompt.chars().count(),
        max_length,
        failures = comparison.failures(),
        slowest_strategy = %slowest_strategy,
        slowest_ms,
        "Generation request served"
    );

    Ok(Json(GenerateResponse {
        results: comparison.results,
        metrics,
    }))
}
