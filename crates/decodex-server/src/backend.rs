//! Language model backend construction

use anyhow::Context;
use decodex_core::ModelHandle;
use decodex_ngram::BigramConfig;
use tracing::info;

/// Build the model handle the server compares strategies with
pub fn load_backend(config: &BigramConfig) -> anyhow::Result<ModelHandle> {
    let handle = decodex_ngram::load_handle(config).with_context(|| match &config.corpus_path {
        Some(path) => format!("Failed to build bigram backend from {}", path.display()),
        None => "Failed to build bigram backend from the built-in corpus".to_string(),
    })?;

    info!(
        model = handle.model_name(),
        vocab_size = handle.tokenizer().vocab_size(),
        seeded = config.seed.is_some(),
        "Backend ready"
    );
    Ok(handle)
}
