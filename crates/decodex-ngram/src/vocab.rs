//! Vocabulary built from a training corpus

use std::collections::HashMap;

/// Unknown word marker
pub const UNK_TOKEN: &str = "<unk>";

/// End of text marker, also used as the end of sequence token
pub const EOS_TOKEN: &str = "<|endoftext|>";

/// Token to id and id to token mappings.
///
/// Special tokens take the first ids; ordinary tokens follow in the order
/// they were first seen, so the same corpus always gives the same ids.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    token_to_id: HashMap<String, u32>,
    id_to_token: Vec<String>,
    unk_token_id: u32,
    eos_token_id: u32,
}

impl Vocabulary {
    /// Create a vocabulary holding only the special tokens
    pub fn new() -> Self {
        let mut vocab = Self {
            token_to_id: HashMap::new(),
            id_to_token: Vec::new(),
            unk_token_id: 0,
            eos_token_id: 0,
        };
        vocab.unk_token_id = vocab.insert(UNK_TOKEN);
        vocab.eos_token_id = vocab.insert(EOS_TOKEN);
        vocab
    }

    /// Add a token if it is new, returning its id either way
    pub fn insert(&mut self, token: &str) -> u32 {
        if let Some(&id) = self.token_to_id.get(token) {
            return id;
        }
        let id = self.id_to_token.len() as u32;
        self.token_to_id.insert(token.to_string(), id);
        self.id_to_token.push(token.to_string());
        id
    }

    pub fn token_to_id(&self, token: &str) -> Option<u32> {
        self.token_to_id.get(token).copied()
    }

    pub fn id_to_token(&self, id: u32) -> Option<&str> {
        self.id_to_token.get(id as usize).map(String::as_str)
    }

    /// Id of `token`, or the unknown token id
    pub fn lookup(&self, token: &str) -> u32 {
        self.token_to_id(token).unwrap_or(self.unk_token_id)
    }

    pub fn size(&self) -> usize {
        self.id_to_token.len()
    }

    pub fn is_special_id(&self, id: u32) -> bool {
        id == self.unk_token_id || id == self.eos_token_id
    }

    pub fn unk_token_id(&self) -> u32 {
        self.unk_token_id
    }

    pub fn eos_token_id(&self) -> u32 {
        self.eos_token_id
    }
}

impl Default for Vocabulary {
    fn default() -> Self {
        Self::new()
    }
}
