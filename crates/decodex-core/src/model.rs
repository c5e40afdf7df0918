//! Language model and tokenizer collaborators
//!
//! The comparison engine never runs a decoder itself. It drives a
//! [`LanguageModel`] and a [`Tokenizer`] supplied by an inference backend,
//! bundled in an explicitly constructed [`ModelHandle`].

use crate::{generation::GenerationConfig, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Causal language model capable of generation and sequence scoring.
///
/// Methods take `&self` and implementations must tolerate concurrent
/// read-only calls: the comparator may run all five strategies at once.
pub trait LanguageModel: Send + Sync {
    /// Get the model name
    fn name(&self) -> &str;

    /// Continue `input_ids` according to `config`.
    ///
    /// Returns the whole sequence, prompt included, of at most
    /// `config.max_length` tokens.
    fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> Result<Vec<u32>>;

    /// Mean per-token negative log-likelihood of `token_ids`, using the
    /// sequence as its own label
    fn score_sequence(&self, token_ids: &[u32]) -> Result<f32>;
}

/// Tokenizer matching a [`LanguageModel`]'s vocabulary
#[async_trait]
pub trait Tokenizer: Send + Sync {
    /// Encode text into a sequence of token IDs
    async fn encode(&self, text: &str) -> Result<Vec<u32>>;

    /// Decode a sequence of token IDs, skipping special tokens
    async fn decode_skip_special_tokens(&self, tokens: &[u32]) -> Result<String>;

    /// Get the vocabulary size
    fn vocab_size(&self) -> usize;

    /// Get the end of sequence token ID
    fn eos_token_id(&self) -> Option<u32>;

    /// Get the padding token ID
    fn pad_token_id(&self) -> Option<u32>;

    /// Padding token for generation: the declared pad token, else end of sequence
    fn resolve_pad_token_id(&self) -> Option<u32> {
        self.pad_token_id().or_else(|| self.eos_token_id())
    }
}

/// Immutable pairing of a model with its tokenizer.
///
/// Cheap to clone; both halves are shared.
#[derive(Clone)]
pub struct ModelHandle {
    model: Arc<dyn LanguageModel>,
    tokenizer: Arc<dyn Tokenizer>,
}

impl ModelHandle {
    pub fn new(model: Arc<dyn LanguageModel>, tokenizer: Arc<dyn Tokenizer>) -> Self {
        Self { model, tokenizer }
    }

    pub fn model(&self) -> &Arc<dyn LanguageModel> {
        &self.model
    }

    pub fn tokenizer(&self) -> &Arc<dyn Tokenizer> {
        &self.tokenizer
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }
}

impl std::fmt::Debug for ModelHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelHandle")
            .field("model", &self.model.name())
            .field("vocab_size", &self.tokenizer.vocab_size())
            .finish()
    }
}
