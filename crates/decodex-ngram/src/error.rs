//! Error types for the bigram backend

use decodex_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NgramError {
    #[error("corpus contains no tokens")]
    EmptyCorpus,

    #[error("failed to read corpus {path}: {source}")]
    CorpusRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("smoothing must be a positive finite number, got {0}")]
    InvalidSmoothing(f64),

    #[error("cannot generate from an empty prompt")]
    EmptyInput,

    #[error("token id {0} is outside the vocabulary")]
    UnknownTokenId(u32),

    #[error("need at least two tokens to score a sequence, got {0}")]
    SequenceTooShort(usize),

    #[error("no token can be sampled: {0}")]
    Sampling(String),
}

pub type Result<T> = std::result::Result<T, NgramError>;

impl From<NgramError> for CoreError {
    fn from(err: NgramError) -> Self {
        let message = err.to_string();
        match err {
            NgramError::EmptyCorpus | NgramError::CorpusRead { .. } => CoreError::configuration(
                "NGRAM_CORPUS_INVALID",
                message,
                "Building the bigram backend",
                "Point backend.corpus_path at a readable, non-empty text file",
            ),
            NgramError::InvalidSmoothing(_) => CoreError::configuration(
                "NGRAM_SMOOTHING_INVALID",
                message,
                "Building the bigram backend",
                "Set backend.smoothing to a small positive value such as 0.1",
            ),
            NgramError::EmptyInput | NgramError::Sampling(_) => CoreError::generation(
                "NGRAM_GENERATION_FAILED",
                message,
                "Bigram decoding",
                "Provide a prompt containing at least one word or punctuation mark",
            ),
            NgramError::UnknownTokenId(_) => CoreError::tokenizer(
                "NGRAM_UNKNOWN_TOKEN",
                message,
                "Token id lookup",
                "Use token ids produced by the matching WordTokenizer",
            ),
            NgramError::SequenceTooShort(_) => CoreError::model(
                "NGRAM_SEQUENCE_TOO_SHORT",
                message,
                "Sequence scoring",
                "Score sequences of two or more tokens",
            ),
        }
    }
}
