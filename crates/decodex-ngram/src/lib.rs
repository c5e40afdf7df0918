//! Decodex Ngram - a small bigram language model backend
//!
//! Provides a [`LanguageModel`](decodex_core::LanguageModel) and
//! [`Tokenizer`](decodex_core::Tokenizer) pair that runs entirely on the CPU
//! from a plain-text corpus. It implements all five decoding strategies, so
//! the comparison server works without model weights.

pub mod corpus;
pub mod error;
pub mod model;
pub mod sampling;
pub mod tokenizer;
pub mod vocab;

pub use error::{NgramError, Result};
pub use model::{BigramConfig, BigramModel};
pub use tokenizer::WordTokenizer;
pub use vocab::Vocabulary;

use decodex_core::ModelHandle;
use std::sync::Arc;
use tracing::info;

/// Train a model on `corpus` and pair it with its tokenizer
pub fn build_handle(corpus: &str, config: &BigramConfig) -> Result<ModelHandle> {
    let model = BigramModel::train(corpus, config)?;
    let tokenizer = model.tokenizer();
    Ok(ModelHandle::new(Arc::new(model), Arc::new(tokenizer)))
}

/// Load the configured corpus (or the built-in one) and build a handle
pub fn load_handle(config: &BigramConfig) -> Result<ModelHandle> {
    let corpus = match &config.corpus_path {
        Some(path) => corpus::load_corpus(path)?,
        None => {
            info!("No corpus configured, using the built-in corpus");
            corpus::DEFAULT_CORPUS.to_string()
        }
    };
    build_handle(&corpus, config)
}
