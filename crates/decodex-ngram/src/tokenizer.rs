//! Word-level tokenizer
//!
//! Text is lower-cased and split into runs of word characters and single
//! punctuation characters. Whitespace is not a token; decoding puts a space
//! between tokens except in front of punctuation.

use crate::vocab::Vocabulary;
use async_trait::async_trait;
use decodex_core::{Result, Tokenizer};
use lazy_static::lazy_static;
use regex::Regex;
use std::sync::Arc;

lazy_static! {
    static ref TOKEN_PATTERN: Regex = Regex::new(r"\w+|[^\w\s]").expect("token pattern is valid");
}

/// Split text into lower-cased word and punctuation pieces
pub fn pre_tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

fn is_punctuation(token: &str) -> bool {
    !token.chars().any(|c| c.is_alphanumeric() || c == '_')
}

/// Tokenizer over a corpus-derived [`Vocabulary`].
///
/// Declares an end of sequence token but no padding token.
#[derive(Debug, Clone)]
pub struct WordTokenizer {
    vocab: Arc<Vocabulary>,
}

impl WordTokenizer {
    pub fn new(vocab: Arc<Vocabulary>) -> Self {
        Self { vocab }
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocab
    }

    /// Token ids for `text`, unknown words mapped to `<unk>`
    pub fn encode_sync(&self, text: &str) -> Vec<u32> {
        pre_tokenize(text)
            .iter()
            .map(|piece| self.vocab.lookup(piece))
            .collect()
    }

    /// Text for `tokens` with special tokens left out
    pub fn decode_sync(&self, tokens: &[u32]) -> String {
        let mut text = String::new();
        for &id in tokens {
            if self.vocab.is_special_id(id) {
                continue;
            }
            let Some(token) = self.vocab.id_to_token(id) else {
                continue;
            };
            if !text.is_empty() && !is_punctuation(token) {
                text.push(' ');
            }
            text.push_str(token);
        }
        text
    }
}

#[async_trait]
impl Tokenizer for WordTokenizer {
    async fn encode(&self, text: &str) -> Result<Vec<u32>> {
        Ok(self.encode_sync(text))
    }

    async fn decode_skip_special_tokens(&self, tokens: &[u32]) -> Result<String> {
        Ok(self.decode_sync(tokens))
    }

    fn vocab_size(&self) -> usize {
        self.vocab.size()
    }

    fn eos_token_id(&self) -> Option<u32> {
        Some(self.vocab.eos_token_id())
    }

    fn pad_token_id(&self) -> Option<u32> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenizer(words: &[&str]) -> WordTokenizer {
        let mut vocab = Vocabulary::new();
        for word in words {
            vocab.insert(word);
        }
        WordTokenizer::new(Arc::new(vocab))
    }

    #[test]
    fn test_pre_tokenize() {
        assert_eq!(pre_tokenize("Hello, World!"), ["hello", ",", "world", "!"]);
        assert_eq!(pre_tokenize("  it's  "), ["it", "'", "s"]);
        assert!(pre_tokenize(" \n\t").is_empty());
    }

    #[test]
    fn test_encode_maps_unknown_words() {
        let tokenizer = tokenizer(&["hello", "world", ","]);
        assert_eq!(tokenizer.encode_sync("Hello, there world"), [2, 4, 0, 3]);
    }

    #[test]
    fn test_decode_spacing_and_specials() {
        let tokenizer = tokenizer(&["hello", ",", "world", "."]);
        // hello , <unk> world . <eos>
        assert_eq!(tokenizer.decode_sync(&[2, 3, 0, 4, 5, 1]), "hello, world.");
        assert_eq!(tokenizer.decode_sync(&[1, 1]), "");
        assert_eq!(tokenizer.decode_sync(&[99]), "");
    }

    #[tokio::test]
    async fn test_pad_resolves_to_eos() {
        let tokenizer = tokenizer(&[]);
        assert_eq!(tokenizer.pad_token_id(), None);
        assert_eq!(tokenizer.resolve_pad_token_id(), Some(1));
        assert_eq!(tokenizer.encode("").await.unwrap(), Vec::<u32>::new());
    }
}
