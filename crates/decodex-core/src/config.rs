//! Configuration for the comparison engine

use serde::{Deserialize, Serialize};

/// Main configuration for the comparison engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// `max_length` used when a request does not supply one
    pub default_max_length: usize,

    /// Largest `max_length` a request may ask for
    pub max_length_limit: usize,

    /// Run the five generation calls on the blocking pool instead of one after another.
    /// Requires a model that tolerates concurrent read-only inference.
    pub parallel_strategies: bool,

    /// Score each output with the model to report perplexity
    pub compute_perplexity: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_length: 100,
            max_length_limit: 2048,
            parallel_strategies: true,
            compute_perplexity: true,
        }
    }
}
