//! Resolved generation configurations, one per strategy

use crate::{params::StrategyParams, strategy::Strategy, StrategyMap};
use serde::{Deserialize, Serialize};

/// Decoding settings handed to the language model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum DecodingStrategy {
    /// Deterministic decoding, best token at each step
    Greedy {
        no_repeat_ngram_size: usize,
        repetition_penalty: f32,
    },

    /// Deterministic beam search
    BeamSearch {
        num_beams: usize,
        early_stopping: bool,
        no_repeat_ngram_size: usize,
        length_penalty: f32,
    },

    /// Sampling restricted to the `top_k` most likely tokens
    TopK { top_k: usize, temperature: f32 },

    /// Sampling restricted to the smallest token set whose cumulative
    /// probability reaches `top_p`
    TopP { top_p: f32, temperature: f32 },

    /// Temperature scaling, top-p and top-k applied together
    Temperature {
        temperature: f32,
        top_p: f32,
        top_k: usize,
    },
}

impl DecodingStrategy {
    /// Whether the model should sample (`do_sample`) for this strategy
    pub fn do_sample(&self) -> bool {
        matches!(
            self,
            Self::TopK { .. } | Self::TopP { .. } | Self::Temperature { .. }
        )
    }
}

/// Fully resolved configuration for one generation call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// Maximum length of the whole sequence, prompt included
    pub max_length: usize,

    /// Token used to pad finished sequences
    pub pad_token_id: u32,

    /// Strategy-specific settings
    pub decoding: DecodingStrategy,
}

impl GenerationConfig {
    /// Resolve the configuration for one strategy from normalized parameters.
    /// Options the caller's block leaves out take their hard-coded default.
    pub fn for_strategy(
        strategy: Strategy,
        params: &StrategyParams,
        max_length: usize,
        pad_token_id: u32,
    ) -> Self {
        let key = strategy.param_key();
        let get = |option: &str| params.get_or_default(key, option);

        let decoding = match strategy {
            Strategy::Greedy => DecodingStrategy::Greedy {
                no_repeat_ngram_size: to_count(get("no_repeat_ngram_size"), 0),
                repetition_penalty: get("repetition_penalty") as f32,
            },
            Strategy::BeamSearch => DecodingStrategy::BeamSearch {
                num_beams: to_count(get("num_beams"), 2),
                early_stopping: true,
                no_repeat_ngram_size: to_count(get("no_repeat_ngram_size"), 0),
                length_penalty: get("length_penalty") as f32,
            },
            Strategy::TopK => DecodingStrategy::TopK {
                top_k: to_count(get("top_k"), 1),
                temperature: get("temperature") as f32,
            },
            Strategy::TopP => DecodingStrategy::TopP {
                top_p: get("top_p") as f32,
                temperature: get("temperature") as f32,
            },
            Strategy::Temperature => DecodingStrategy::Temperature {
                temperature: get("temperature") as f32,
                top_p: get("top_p") as f32,
                top_k: to_count(get("top_k"), 1),
            },
        };

        Self {
            max_length,
            pad_token_id,
            decoding,
        }
    }

    /// Resolve all five configurations
    pub fn resolve_all(
        params: &StrategyParams,
        max_length: usize,
        pad_token_id: u32,
    ) -> StrategyMap<Self> {
        StrategyMap::from_fn(|strategy| {
            Self::for_strategy(strategy, params, max_length, pad_token_id)
        })
    }
}

/// Round to the nearest integer (ties to even) with a lower bound
fn to_count(value: f64, min: usize) -> usize {
    let rounded = value.round_ties_even();
    if rounded <= min as f64 {
        min
    } else {
        rounded as usize
    }
}
