//! Decodex Core - decoding strategy comparator and text metrics engine
//!
//! This crate turns a prompt and a partial set of decoding parameters into five
//! complete generation configurations, runs each of them against a
//! [`LanguageModel`](model::LanguageModel), and scores every output on
//! repetition, lexical diversity, entropy, novelty and perplexity.

// Module declarations
pub mod comparator;
pub mod config;
pub mod generation;
pub mod metrics;
pub mod model;
pub mod params;
pub mod strategy;
pub mod validation;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// Language model execution errors
    #[error("Model error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Model {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
    },

    /// Tokenizer operation errors
    #[error("Tokenizer error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Tokenizer {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
    },

    /// Text generation errors
    #[error("Generation error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Generation {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        strategy: Option<String>,
    },

    /// Input validation and parameter errors
    #[error("Invalid input [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    InvalidInput {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        parameter_name: Option<String>,
        value: Option<String>,
        valid_range: Option<String>,
    },

    /// Configuration parsing and validation errors
    #[error("Configuration error [{code}]: {message}\nContext: {context}\nSuggestion: {suggestion}")]
    Configuration {
        code: &'static str,
        message: String,
        context: String,
        suggestion: String,
        field_name: Option<String>,
    },

    /// Other unexpected errors
    #[error("Internal error [{code}]: {message}\nContext: {context}")]
    Internal {
        code: &'static str,
        message: String,
        context: String,
        #[source]
        source: Option<anyhow::Error>,
    },
}

pub type Result<T> = std::result::Result<T, CoreError>;

impl CoreError {
    /// Create a model error with context
    pub fn model<S1, S2, S3>(code: &'static str, message: S1, context: S2, suggestion: S3) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Model {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a tokenizer error with context
    pub fn tokenizer<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Tokenizer {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Create a generation error with context
    pub fn generation<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Generation {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            strategy: None,
        }
    }

    /// Create an invalid input error
    pub fn invalid_input<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::InvalidInput {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            parameter_name: None,
            value: None,
            valid_range: None,
        }
    }

    /// Create an invalid input error with parameter validation details
    pub fn invalid_parameter<S1, S2, S3, S4, S5, S6>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
        param_name: S4,
        value: S5,
        valid_range: S6,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
        S4: Into<String>,
        S5: Into<String>,
        S6: Into<String>,
    {
        Self::InvalidInput {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            parameter_name: Some(param_name.into()),
            value: Some(value.into()),
            valid_range: Some(valid_range.into()),
        }
    }

    /// Create a configuration error
    pub fn configuration<S1, S2, S3>(
        code: &'static str,
        message: S1,
        context: S2,
        suggestion: S3,
    ) -> Self
    where
        S1: Into<String>,
        S2: Into<String>,
        S3: Into<String>,
    {
        Self::Configuration {
            code,
            message: message.into(),
            context: context.into(),
            suggestion: suggestion.into(),
            field_name: None,
        }
    }

    /// Attach the name of the strategy that failed to a generation error
    pub fn with_strategy(self, name: impl Into<String>) -> Self {
        match self {
            Self::Generation {
                code,
                message,
                context,
                suggestion,
                ..
            } => Self::Generation {
                code,
                message,
                context,
                suggestion,
                strategy: Some(name.into()),
            },
            other => other,
        }
    }

    /// Get the error code for programmatic handling
    pub fn code(&self) -> &'static str {
        match self {
            Self::Model { code, .. } => code,
            Self::Tokenizer { code, .. } => code,
            Self::Generation { code, .. } => code,
            Self::InvalidInput { code, .. } => code,
            Self::Configuration { code, .. } => code,
            Self::Internal { code, .. } => code,
        }
    }

    /// Get the bare error message, without code, context or suggestion
    pub fn message(&self) -> &str {
        match self {
            Self::Model { message, .. }
            | Self::Tokenizer { message, .. }
            | Self::Generation { message, .. }
            | Self::InvalidInput { message, .. }
            | Self::Configuration { message, .. }
            | Self::Internal { message, .. } => message,
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            code: "INTERNAL_UNKNOWN",
            message: err.to_string(),
            context: "An unexpected error occurred".to_string(),
            source: Some(err),
        }
    }
}

/// Prelude module for common imports
pub mod prelude {
    pub use crate::{
        comparator::{Comparison, StrategyComparator, StrategyOutcome},
        config::EngineConfig,
        generation::{DecodingStrategy, GenerationConfig},
        metrics::{MetricsEngine, PerplexityError, TextMetrics},
        model::{LanguageModel, ModelHandle, Tokenizer},
        params::{NormalizationOutcome, ParameterNormalizer, ParamsCorruption, StrategyParams},
        strategy::{GenerationResult, Strategy, StrategyMap},
        validation::Validator,
        CoreError, Result,
    };
}

// Re-export key types at the crate root
pub use comparator::{Comparison, StrategyComparator};
pub use config::EngineConfig;
pub use metrics::{MetricsEngine, TextMetrics};
pub use model::{LanguageModel, ModelHandle, Tokenizer};
pub use strategy::{GenerationResult, Strategy, StrategyMap};
