//! Integration tests for decodex-server
//!
//! These tests verify end-to-end functionality of the server including
//! HTTP handlers, validation, error bodies and the request/response flow.

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use decodex_core::{
    generation::GenerationConfig, CoreError, LanguageModel, ModelHandle, Result, Tokenizer,
};
use decodex_ngram::BigramConfig;
use decodex_server::{
    backend::load_backend,
    config::ServerConfig,
    server::{create_router, ServerState},
};
use serde_json::{json, Value};
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

const STRATEGIES: [&str; 5] = ["greedy", "beam_search", "top_k", "top_p", "temperature"];
const METRIC_FIELDS: [&str; 10] = [
    "perplexity", "rep_1", "rep_2", "rep_3", "distinct_1", "distinct_2", "distinct_3", "entropy",
    "length", "novelty",
];

fn test_config() -> ServerConfig {
    let mut config = ServerConfig::default();
    config.backend = BigramConfig {
        seed: Some(3),
        ..BigramConfig::default()
    };
    config
}

fn bigram_router(config: ServerConfig) -> Router {
    let models = load_backend(&config.backend).unwrap();
    create_router(ServerState::new(config, models))
}

async fn send_request(router: Router, method: Method, uri: &str, body: Option<Body>) -> Response {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            body
        }
        None => Body::empty(),
    };
    router.oneshot(request.body(body).unwrap()).await.unwrap()
}

async fn post_json(router: Router, body: Value) -> Response {
    send_request(router, Method::POST, "/generate", Some(Body::from(body.to_string()))).await
}

async fn body_json(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

/// Object keys, sorted
fn keys(value: &Value) -> Vec<String> {
    let mut keys: Vec<String> = value.as_object().unwrap().keys().cloned().collect();
    keys.sort();
    keys
}

fn sorted_strategies() -> Vec<String> {
    let mut strategies: Vec<String> = STRATEGIES.iter().map(|s| s.to_string()).collect();
    strategies.sort();
    strategies
}

#[tokio::test]
async fn test_health_endpoints() {
    let router = bigram_router(test_config());

    let response = send_request(router.clone(), Method::GET, "/health", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["service"], "decodex-server");

    let response = send_request(router.clone(), Method::GET, "/health/ready", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ready");
    assert!(json["checks"]["model"].is_object());

    let response = send_request(router, Method::GET, "/health/live", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "alive");
}

#[tokio::test]
async fn test_generate_hello_world() {
    let router = bigram_router(test_config());

    let response = post_json(router, json!({ "prompt": "Hello world", "max_length": 100 })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(keys(&json["results"]), sorted_strategies());
    assert_eq!(keys(&json["metrics"]), sorted_strategies());

    for strategy in STRATEGIES {
        assert!(json["results"][strategy].is_string());
        let metrics = &json["metrics"][strategy];
        let fields = keys(metrics);
        let mut expected: Vec<_> = METRIC_FIELDS.iter().map(|f| f.to_string()).collect();
        expected.sort();
        assert_eq!(fields, expected, "{strategy}");
        assert!(metrics["length"].is_u64(), "{strategy}");
    }
}

#[tokio::test]
async fn test_known_prompt_is_continued() {
    let router = bigram_router(test_config());
    let response = post_json(router, json!({ "prompt": "the fox" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    for strategy in STRATEGIES {
        let text = json["results"][strategy].as_str().unwrap();
        assert!(text.starts_with("the fox"), "{strategy}: {text:?}");
        assert!(json["metrics"][strategy]["length"].as_u64().unwrap() >= 2);
        assert!(json["metrics"][strategy]["perplexity"].as_f64().unwrap() >= 1.0);
    }
}

#[tokio::test]
async fn test_missing_or_empty_prompt() {
    let router = bigram_router(test_config());

    for body in [json!({}), json!({ "prompt": "" }), json!({ "prompt": null, "max_length": 20 })] {
        let response = post_json(router.clone(), body).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await, json!({ "error": "Prompt is required" }));
    }
}

#[tokio::test]
async fn test_malformed_json_is_400() {
    let router = bigram_router(test_config());

    let response = send_request(
        router,
        Method::POST,
        "/generate",
        Some(Body::from("{\"prompt\": \"unterminated")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(keys(&json), ["error"]);
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_max_length_bounds() {
    let config = test_config();
    let limit = config.engine.max_length_limit;
    let router = bigram_router(config);

    for max_length in [0, limit + 1] {
        let response = post_json(
            router.clone(),
            json!({ "prompt": "the fox", "max_length": max_length }),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(keys(&json), ["error"]);
    }
}

#[tokio::test]
async fn test_corrupt_params_still_succeed() {
    let router = bigram_router(test_config());

    let body = json!({
        "prompt": "the river",
        "max_length": 20,
        "params": { "beam": { "num_beams": "abc" }, "creative": { "temperature": 5 } }
    });
    let response = post_json(router, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(keys(&json["results"]), sorted_strategies());
}

#[tokio::test]
async fn test_enormous_beam_width_is_served() {
    let router = bigram_router(test_config());

    let body = json!({
        "prompt": "the fox",
        "max_length": 15,
        "params": { "beam": { "num_beams": 1e15 } }
    });
    let response = post_json(router, body).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["results"]["beam_search"].as_str().unwrap().starts_with("the fox"));
}

#[tokio::test]
async fn test_frontend_page() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.html"), "<h1>Decodex</h1>").unwrap();
    std::fs::create_dir(dir.path().join("js")).unwrap();
    std::fs::write(dir.path().join("js").join("app.js"), "// app").unwrap();

    let mut config = test_config();
    config.frontend.static_dir = dir.path().to_path_buf();
    let router = bigram_router(config);

    let response = send_request(router.clone(), Method::GET, "/", None).await;
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"<h1>Decodex</h1>");

    let response = send_request(router, Method::GET, "/static/js/app.js", None).await;
    assert_eq!(response.status(), StatusCode::OK);
}

/// Tokenizer over numbers: every word becomes its length
struct LengthTokenizer;

#[async_trait]
impl Tokenizer for LengthTokenizer {
    async fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(text.split_whitespace().map(|w| w.len() as u32).collect())
    }

    async fn decode_skip_special_tokens(&self, tokens: &[u32]) -> Result<String> {
        Ok(tokens.iter().map(|t| format!("w{t}")).collect::<Vec<_>>().join(" "))
    }

    fn vocab_size(&self) -> usize {
        100
    }

    fn eos_token_id(&self) -> Option<u32> {
        Some(0)
    }

    fn pad_token_id(&self) -> Option<u32> {
        None
    }
}

/// Model that sleeps before echoing, or always fails
struct StubModel {
    delay: Duration,
    fail: bool,
}

impl LanguageModel for StubModel {
    fn name(&self) -> &str {
        "stub"
    }

    fn generate(&self, input_ids: &[u32], _config: &GenerationConfig) -> Result<Vec<u32>> {
        std::thread::sleep(self.delay);
        if self.fail {
            return Err(CoreError::generation("GENERATION_FAILED", "stub failure", "test", "none"));
        }
        Ok(input_ids.to_vec())
    }

    fn score_sequence(&self, _token_ids: &[u32]) -> Result<f32> {
        Ok(0.0)
    }
}

fn stub_router(config: ServerConfig, delay: Duration, fail: bool) -> Router {
    let models = ModelHandle::new(Arc::new(StubModel { delay, fail }), Arc::new(LengthTokenizer));
    create_router(ServerState::new(config, models))
}

#[tokio::test]
async fn test_failing_model_yields_empty_results() {
    let router = stub_router(test_config(), Duration::ZERO, true);

    let response = post_json(router, json!({ "prompt": "hello world" })).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    for strategy in STRATEGIES {
        assert_eq!(json["results"][strategy], "");
        assert_eq!(json["metrics"][strategy]["length"], 0);
        assert_eq!(json["metrics"][strategy]["perplexity"], 0.0);
    }
}

#[tokio::test]
async fn test_slow_comparison_times_out() {
    let mut config = test_config();
    config.limits.request_timeout = 1;
    let router = stub_router(config, Duration::from_millis(1500), false);

    let response = post_json(router, json!({ "prompt": "hello world" })).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert!(body_json(response).await["error"].is_string());
}
