//! Runs every decoding strategy against one prompt

use crate::{
    config::EngineConfig,
    generation::GenerationConfig,
    model::ModelHandle,
    params::{NormalizationOutcome, ParameterNormalizer},
    strategy::{GenerationResult, Strategy, StrategyMap},
    CoreError, Result,
};
use serde::Serialize;
use serde_json::Value;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// How a single strategy's generation ended
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StrategyOutcome {
    /// The model produced a sequence of `tokens` tokens
    Generated { tokens: usize },
    /// Generation or decoding failed; the result text is empty
    Failed { reason: String },
}

impl StrategyOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

/// Everything produced by one [`StrategyComparator::compare`] call
#[derive(Debug, Clone)]
pub struct Comparison {
    /// Decoded text per strategy, empty for failed strategies
    pub results: GenerationResult,
    /// Success or failure per strategy
    pub outcomes: StrategyMap<StrategyOutcome>,
    /// Wall-clock time spent generating, per strategy
    pub timings_ms: StrategyMap<f64>,
    /// The tokenized prompt shared by all strategies, if tokenization worked
    pub prompt_token_ids: Option<Arc<Vec<u32>>>,
    /// Whether the caller's parameters were used
    pub normalization: NormalizationOutcome,
}

impl Comparison {
    fn all_failed(reason: &str, normalization: NormalizationOutcome) -> Self {
        Self {
            results: StrategyMap::default(),
            outcomes: StrategyMap::from_fn(|_| StrategyOutcome::Failed {
                reason: reason.to_string(),
            }),
            timings_ms: StrategyMap::default(),
            prompt_token_ids: None,
            normalization,
        }
    }

    /// Number of strategies that failed
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|(_, o)| o.is_failed()).count()
    }

    /// The strategy that took longest to generate, with its time in ms
    pub fn slowest(&self) -> (Strategy, f64) {
        self.timings_ms
            .iter()
            .map(|(strategy, &ms)| (strategy, ms))
            .max_by(|a, b| a.1.total_cmp(&b.1))
            .unwrap_or((Strategy::Greedy, 0.0))
    }
}

/// Output of one generation call and the milliseconds it took
type Timed = (Result<Vec<u32>>, f64);

/// Orchestrates the five generation calls for a prompt
#[derive(Debug, Clone)]
pub struct StrategyComparator {
    parallel: bool,
}

impl StrategyComparator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            parallel: config.parallel_strategies,
        }
    }

    /// Generate text for `prompt` with every strategy.
    ///
    /// `prompt` must be non-empty; request validation happens before this
    /// point. Collaborator failures never abort the comparison: a failing
    /// strategy yields an empty string and a [`StrategyOutcome::Failed`].
    pub async fn compare(
        &self,
        handle: &ModelHandle,
        prompt: &str,
        max_length: usize,
        raw_params: Option<&Value>,
    ) -> Comparison {
        let normalized = ParameterNormalizer::normalize(raw_params);
        debug!(outcome = ?normalized.outcome, "Normalized strategy parameters");

        let tokenizer = handle.tokenizer();
        let prompt_ids = match tokenizer.encode(prompt).await {
            Ok(ids) => Arc::new(ids),
            Err(e) => {
                warn!(code = e.code(), error = %e, "Prompt tokenization failed, no strategy can run");
                return Comparison::all_failed(
                    &format!("prompt tokenization failed: {}", e.message()),
                    normalized.outcome,
                );
            }
        };

        let Some(pad_token_id) = tokenizer.resolve_pad_token_id() else {
            warn!("Tokenizer declares neither a pad nor an end-of-sequence token");
            let mut comparison = Comparison::all_failed(
                "tokenizer has no pad or end-of-sequence token",
                normalized.outcome,
            );
            comparison.prompt_token_ids = Some(prompt_ids);
            return comparison;
        };

        let configs = GenerationConfig::resolve_all(&normalized.params, max_length, pad_token_id);

        let generated = if self.parallel {
            Self::generate_parallel(handle, &prompt_ids, configs).await
        } else {
            Self::generate_sequential(handle, &prompt_ids, &configs)
        };

        let mut results = GenerationResult::default();
        let mut timings_ms = StrategyMap::default();
        let mut outcomes = Vec::with_capacity(Strategy::ALL.len());

        let StrategyMap {
            greedy,
            beam_search,
            top_k,
            top_p,
            temperature,
        } = generated;
        let ordered = [greedy, beam_search, top_k, top_p, temperature];

        for (strategy, (output, elapsed_ms)) in Strategy::ALL.into_iter().zip(ordered) {
            *timings_ms.get_mut(strategy) = elapsed_ms;

            let decoded = match output {
                Ok(ids) => tokenizer
                    .decode_skip_special_tokens(&ids)
                    .await
                    .map(|text| (text, ids.len())),
                Err(e) => Err(e),
            };

            let outcome = match decoded {
                Ok((text, tokens)) => {
                    debug!(strategy = %strategy, tokens, elapsed_ms, "Strategy finished");
                    *results.get_mut(strategy) = text;
                    StrategyOutcome::Generated { tokens }
                }
                Err(e) => {
                    warn!(strategy = %strategy, code = e.code(), error = %e, "Strategy failed");
                    StrategyOutcome::Failed {
                        reason: e.message().to_string(),
                    }
                }
            };
            outcomes.push(outcome);
        }

        let outcomes = StrategyMap::from_ordered(outcomes).unwrap_or_else(|| {
            StrategyMap::from_fn(|_| StrategyOutcome::Failed {
                reason: "missing outcome".to_string(),
            })
        });

        let comparison = Comparison {
            results,
            outcomes,
            timings_ms,
            prompt_token_ids: Some(prompt_ids),
            normalization: normalized.outcome,
        };

        info!(
            model = handle.model_name(),
            max_length,
            failures = comparison.failures(),
            timings_ms = ?comparison.timings_ms,
            "Compared decoding strategies"
        );

        comparison
    }

    /// One blocking task per strategy; the model and prompt are shared read-only
    async fn generate_parallel(
        handle: &ModelHandle,
        prompt_ids: &Arc<Vec<u32>>,
        configs: StrategyMap<GenerationConfig>,
    ) -> StrategyMap<Timed> {
        let tasks: StrategyMap<JoinHandle<Timed>> = configs.map(|strategy, config| {
            let model = Arc::clone(handle.model());
            let ids = Arc::clone(prompt_ids);
            tokio::task::spawn_blocking(move || {
                let start = Instant::now();
                let output = model
                    .generate(&ids, &config)
                    .map_err(|e| e.with_strategy(strategy.as_str()));
                (output, elapsed_ms(start))
            })
        });

        StrategyMap {
            greedy: join_generation(Strategy::Greedy, tasks.greedy).await,
            beam_search: join_generation(Strategy::BeamSearch, tasks.beam_search).await,
            top_k: join_generation(Strategy::TopK, tasks.top_k).await,
            top_p: join_generation(Strategy::TopP, tasks.top_p).await,
            temperature: join_generation(Strategy::Temperature, tasks.temperature).await,
        }
    }

    fn generate_sequential(
        handle: &ModelHandle,
        prompt_ids: &[u32],
        configs: &StrategyMap<GenerationConfig>,
    ) -> StrategyMap<Timed> {
        let model = handle.model();
        StrategyMap::from_fn(|strategy| {
            let config = configs.get(strategy);
            let start = Instant::now();
            let output =
                panic::catch_unwind(AssertUnwindSafe(|| model.generate(prompt_ids, config)))
                    .unwrap_or_else(|_| Err(panicked(strategy)))
                    .map_err(|e| e.with_strategy(strategy.as_str()));
            (output, elapsed_ms(start))
        })
    }
}

async fn join_generation(strategy: Strategy, task: JoinHandle<Timed>) -> Timed {
    match task.await {
        Ok(timed) => timed,
        Err(e) => {
            warn!(strategy = %strategy, error = %e, "Generation task did not complete");
            (Err(panicked(strategy)), 0.0)
        }
    }
}

fn panicked(strategy: Strategy) -> CoreError {
    CoreError::generation(
        "GENERATION_PANICKED",
        format!("generation for {strategy} panicked"),
        "Language model generate call",
        "Check the inference backend logs",
    )
    .with_strategy(strategy.as_str())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::DecodingStrategy;
    use crate::model::{LanguageModel, Tokenizer};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every call the model receives
    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(Vec<u32>, GenerationConfig)>>,
    }

    impl Recorder {
        fn snapshot(&self) -> Vec<(Vec<u32>, GenerationConfig)> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }
    }

    struct EchoModel {
        recorder: Arc<Recorder>,
        fail_beam: bool,
        panic_top_p: bool,
        beam_delay: Duration,
    }

    impl LanguageModel for EchoModel {
        fn name(&self) -> &str {
            "echo"
        }

        fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> Result<Vec<u32>> {
            if let Ok(mut calls) = self.recorder.calls.lock() {
                calls.push((input_ids.to_vec(), config.clone()));
            }
            if matches!(config.decoding, DecodingStrategy::BeamSearch { .. }) {
                std::thread::sleep(self.beam_delay);
            }
            match config.decoding {
                DecodingStrategy::BeamSearch { .. } if self.fail_beam => Err(CoreError::model(
                    "MODEL_EXECUTION_FAILED",
                    "beam search exploded",
                    "test",
                    "none",
                )),
                DecodingStrategy::TopP { .. } if self.panic_top_p => panic!("top-p panic"),
                _ => {
                    let mut out = input_ids.to_vec();
                    out.push(99);
                    Ok(out)
                }
            }
        }

        fn score_sequence(&self, _token_ids: &[u32]) -> Result<f32> {
            Ok(0.0)
        }
    }

    struct CountingTokenizer {
        pad: Option<u32>,
        eos: Option<u32>,
        fail_encode: bool,
    }

    #[async_trait]
    impl Tokenizer for CountingTokenizer {
        async fn encode(&self, text: &str) -> Result<Vec<u32>> {
            if self.fail_encode {
                return Err(CoreError::tokenizer("TOKENIZER_FAILED", "no vocab", "test", "none"));
            }
            Ok(text.split_whitespace().map(|w| w.len() as u32).collect())
        }

        async fn decode_skip_special_tokens(&self, tokens: &[u32]) -> Result<String> {
            Ok(tokens
                .iter()
                .map(|t| t.to_string())
                .collect::<Vec<_>>()
                .join(" "))
        }

        fn vocab_size(&self) -> usize {
            100
        }

        fn eos_token_id(&self) -> Option<u32> {
            self.eos
        }

        fn pad_token_id(&self) -> Option<u32> {
            self.pad
        }
    }

    fn handle(model: EchoModel, tokenizer: CountingTokenizer) -> ModelHandle {
        ModelHandle::new(Arc::new(model), Arc::new(tokenizer))
    }

    fn tokenizer() -> CountingTokenizer {
        CountingTokenizer {
            pad: None,
            eos: Some(0),
            fail_encode: false,
        }
    }

    fn model(recorder: &Arc<Recorder>) -> EchoModel {
        EchoModel {
            recorder: Arc::clone(recorder),
            fail_beam: false,
            panic_top_p: false,
            beam_delay: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_all_strategies_share_prompt_ids() {
        for parallel in [true, false] {
            let recorder = Arc::new(Recorder::default());
            let handle = handle(model(&recorder), tokenizer());
            let comparator = StrategyComparator::new(&EngineConfig {
                parallel_strategies: parallel,
                ..EngineConfig::default()
            });

            let comparison = comparator.compare(&handle, "hello world", 100, None).await;

            assert_eq!(comparison.failures(), 0);
            assert_eq!(comparison.results.greedy, "5 5 99");
            assert_eq!(comparison.prompt_token_ids.as_deref(), Some(&vec![5, 5]));

            let calls = recorder.snapshot();
            assert_eq!(calls.len(), 5);
            for (ids, config) in calls {
                assert_eq!(ids, vec![5, 5]);
                assert_eq!(config.max_length, 100);
                // No pad token declared, so EOS is used
                assert_eq!(config.pad_token_id, 0);
            }
        }
    }

    #[tokio::test]
    async fn test_failed_strategy_is_isolated() {
        for parallel in [true, false] {
            let recorder = Arc::new(Recorder::default());
            let mut model = model(&recorder);
            model.fail_beam = true;
            model.panic_top_p = true;
            let handle = handle(model, tokenizer());
            let comparator = StrategyComparator::new(&EngineConfig {
                parallel_strategies: parallel,
                ..EngineConfig::default()
            });

            let comparison = comparator.compare(&handle, "a b c", 20, None).await;

            assert_eq!(comparison.failures(), 2);
            assert_eq!(comparison.results.beam_search, "");
            assert_eq!(comparison.results.top_p, "");
            assert!(comparison.outcomes.beam_search.is_failed());
            assert!(comparison.outcomes.top_p.is_failed());
            assert_eq!(comparison.results.greedy, "1 1 1 99");
            assert_eq!(comparison.results.temperature, "1 1 1 99");
            assert_eq!(
                comparison.outcomes.top_k,
                StrategyOutcome::Generated { tokens: 4 }
            );
        }
    }

    #[tokio::test]
    async fn test_timings_name_the_slowest_strategy() {
        for parallel in [true, false] {
            let recorder = Arc::new(Recorder::default());
            let mut model = model(&recorder);
            model.beam_delay = Duration::from_millis(40);
            let handle = handle(model, tokenizer());
            let comparator = StrategyComparator::new(&EngineConfig {
                parallel_strategies: parallel,
                ..EngineConfig::default()
            });

            let comparison = comparator.compare(&handle, "a b", 20, None).await;

            let (strategy, ms) = comparison.slowest();
            assert_eq!(strategy, Strategy::BeamSearch);
            assert!(ms >= 40.0, "{ms}");
            for (_, &elapsed) in comparison.timings_ms.iter() {
                assert!(elapsed >= 0.0 && elapsed <= ms);
            }
        }
    }

    #[tokio::test]
    async fn test_tokenization_failure_fails_every_strategy() {
        let recorder = Arc::new(Recorder::default());
        let mut tokenizer = tokenizer();
        tokenizer.fail_encode = true;
        let handle = handle(model(&recorder), tokenizer);
        let comparator = StrategyComparator::new(&EngineConfig::default());

        let comparison = comparator.compare(&handle, "hello", 10, None).await;

        assert_eq!(comparison.failures(), 5);
        assert!(comparison.prompt_token_ids.is_none());
        assert_eq!(comparison.results, GenerationResult::default());
        assert!(recorder.snapshot().is_empty());
        assert_eq!(comparison.slowest().1, 0.0);
    }

    #[tokio::test]
    async fn test_missing_pad_and_eos_fails_every_strategy() {
        let recorder = Arc::new(Recorder::default());
        let handle = handle(
            model(&recorder),
            CountingTokenizer {
                pad: None,
                eos: None,
                fail_encode: false,
            },
        );
        let comparator = StrategyComparator::new(&EngineConfig::default());

        let comparison = comparator.compare(&handle, "hello", 10, None).await;
        assert_eq!(comparison.failures(), 5);
        assert!(comparison.prompt_token_ids.is_some());
    }

    #[tokio::test]
    async fn test_corrupt_params_use_defaults_everywhere() {
        let recorder = Arc::new(Recorder::default());
        let handle = handle(model(&recorder), tokenizer());
        let comparator = StrategyComparator::new(&EngineConfig {
            parallel_strategies: false,
            ..EngineConfig::default()
        });

        let params = json!({ "greedy": { "repetition_penalty": 3.0 }, "beam": { "num_beams": "abc" } });
        let comparison = comparator.compare(&handle, "x", 10, Some(&params)).await;

        assert!(matches!(
            comparison.normalization,
            NormalizationOutcome::DefaultsSubstituted(_)
        ));
        let calls = recorder.snapshot();
        assert_eq!(
            calls[0].1.decoding,
            DecodingStrategy::Greedy {
                no_repeat_ngram_size: 2,
                repetition_penalty: 1.2,
            }
        );
    }
}
