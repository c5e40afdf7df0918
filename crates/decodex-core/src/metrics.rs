//! Quality and diversity metrics for generated text
//!
//! Every metric except perplexity works on a plain word list: maximal runs of
//! word characters taken from the lower-cased text. Perplexity re-tokenizes the
//! text with the model's own tokenizer and asks the model to score it.
//!
//! All reported values are percentages or bits rounded half-to-even to two
//! decimals.

use crate::{
    config::EngineConfig,
    model::ModelHandle,
    strategy::{GenerationResult, StrategyMap},
    CoreError,
};
use futures::future::join_all;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, warn};

lazy_static! {
    static ref WORD_PATTERN: Regex = Regex::new(r"\w+").expect("word pattern is valid");
}

/// Scores for one generated text
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TextMetrics {
    pub perplexity: f64,
    pub rep_1: f64,
    pub rep_2: f64,
    pub rep_3: f64,
    pub distinct_1: f64,
    pub distinct_2: f64,
    pub distinct_3: f64,
    pub entropy: f64,
    pub length: usize,
    pub novelty: f64,
}

/// Why perplexity could not be computed
#[derive(Debug, Error)]
pub enum PerplexityError {
    #[error("re-tokenizing the text failed: {0}")]
    Tokenization(#[source] CoreError),

    #[error("the text produced no tokens to score")]
    EmptySequence,

    #[error("the model could not score the sequence: {0}")]
    Scoring(#[source] CoreError),

    #[error("perplexity is not finite (mean loss {0})")]
    NonFinite(f64),
}

impl PerplexityError {
    /// Short label for logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Tokenization(_) => "tokenization",
            Self::EmptySequence => "empty_sequence",
            Self::Scoring(_) => "scoring",
            Self::NonFinite(_) => "non_finite",
        }
    }
}

/// Scores generated text
#[derive(Debug, Clone)]
pub struct MetricsEngine {
    compute_perplexity: bool,
}

impl MetricsEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            compute_perplexity: config.compute_perplexity,
        }
    }

    /// Score one text.
    ///
    /// Perplexity is only attempted when the prompt's token ids are given;
    /// any failure while computing it reports 0.
    pub async fn score(
        &self,
        handle: &ModelHandle,
        text: &str,
        prompt_token_ids: Option<&[u32]>,
    ) -> TextMetrics {
        let mut metrics = text_statistics(text);
        if metrics.length == 0 {
            return metrics;
        }

        if self.compute_perplexity && prompt_token_ids.is_some() {
            metrics.perplexity = match perplexity(handle, text).await {
                Ok(value) => value,
                Err(e) => {
                    warn!(kind = e.kind(), error = %e, "Perplexity unavailable, reporting 0");
                    0.0
                }
            };
        }

        metrics
    }

    /// Score every strategy's output concurrently
    pub async fn score_all(
        &self,
        handle: &ModelHandle,
        results: &GenerationResult,
        prompt_token_ids: Option<&[u32]>,
    ) -> StrategyMap<TextMetrics> {
        let scored = join_all(
            results
                .iter()
                .map(|(_, text)| self.score(handle, text, prompt_token_ids)),
        )
        .await;

        StrategyMap::from_ordered(scored).unwrap_or_default()
    }
}

/// Every metric except perplexity, which is left at 0
pub fn text_statistics(text: &str) -> TextMetrics {
    let words = word_tokens(text);
    if words.is_empty() {
        return TextMetrics::default();
    }

    TextMetrics {
        perplexity: 0.0,
        rep_1: rep_n(&words, 1),
        rep_2: rep_n(&words, 2),
        rep_3: rep_n(&words, 3),
        distinct_1: distinct_n(&words, 1),
        distinct_2: distinct_n(&words, 2),
        distinct_3: distinct_n(&words, 3),
        entropy: shannon_entropy(&words),
        length: words.len(),
        novelty: novelty(&words),
    }
}

/// Lower-cased maximal runs of word characters
pub fn word_tokens(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    WORD_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Share of n-grams that are distinct, or `None` with fewer than `n` words
fn distinct_ratio(words: &[String], n: usize) -> Option<f64> {
    if n == 0 || words.len() < n {
        return None;
    }
    let total = words.len() - n + 1;
    let distinct: HashSet<&[String]> = words.windows(n).collect();
    Some(distinct.len() as f64 / total as f64)
}

/// Percentage of n-grams that repeat an earlier one
pub fn rep_n(words: &[String], n: usize) -> f64 {
    distinct_ratio(words, n)
        .map(|ratio| round2((1.0 - ratio) * 100.0))
        .unwrap_or(0.0)
}

/// Percentage of n-grams that are distinct
pub fn distinct_n(words: &[String], n: usize) -> f64 {
    distinct_ratio(words, n)
        .map(|ratio| round2(ratio * 100.0))
        .unwrap_or(0.0)
}

/// Shannon entropy in bits of the word frequency distribution
pub fn shannon_entropy(words: &[String]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for word in words {
        *counts.entry(word.as_str()).or_default() += 1;
    }

    let total = words.len() as f64;
    let entropy: f64 = counts
        .values()
        .map(|&count| {
            let p = count as f64 / total;
            -p * p.log2()
        })
        .sum();

    // A single-symbol distribution sums to -0.0
    if entropy <= 0.0 {
        0.0
    } else {
        round2(entropy)
    }
}

/// Percentage of words that are distinct
pub fn novelty(words: &[String]) -> f64 {
    if words.is_empty() {
        return 0.0;
    }
    let distinct: HashSet<&String> = words.iter().collect();
    round2(distinct.len() as f64 / words.len() as f64 * 100.0)
}

/// Round half-to-even to two decimals
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round_ties_even() / 100.0
}

/// Perplexity of `text` under the model, rounded to two decimals
pub async fn perplexity(handle: &ModelHandle, text: &str) -> Result<f64, PerplexityError> {
    let token_ids = handle
        .tokenizer()
        .encode(text)
        .await
        .map_err(PerplexityError::Tokenization)?;
    if token_ids.is_empty() {
        return Err(PerplexityError::EmptySequence);
    }

    let loss = handle
        .model()
        .score_sequence(&token_ids)
        .map_err(PerplexityError::Scoring)?;
    let loss = f64::from(loss);
    let value = loss.exp();
    if !value.is_finite() {
        return Err(PerplexityError::NonFinite(loss));
    }

    debug!(tokens = token_ids.len(), loss, "Scored sequence");
    Ok(round2(value))
}
