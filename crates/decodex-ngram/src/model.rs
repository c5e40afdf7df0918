//! Add-k smoothed bigram language model

use crate::{
    corpus::documents,
    error::{NgramError, Result},
    sampling::{
        apply_repetition_penalty, argmax, banned_ngram_tokens, log_softmax_in_place, mask_tokens,
        sample_token,
    },
    tokenizer::{pre_tokenize, WordTokenizer},
    vocab::Vocabulary,
};
use decodex_core::{
    generation::{DecodingStrategy, GenerationConfig},
    LanguageModel,
};
use rand::{rngs::StdRng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Settings for building a [`BigramModel`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BigramConfig {
    /// Training text; the built-in corpus is used when unset
    pub corpus_path: Option<PathBuf>,

    /// Pseudo-count added to every bigram
    pub smoothing: f64,

    /// Base seed for sampling strategies. Unset means fresh entropy per call.
    pub seed: Option<u64>,
}

impl Default for BigramConfig {
    fn default() -> Self {
        Self {
            corpus_path: None,
            smoothing: 0.1,
            seed: None,
        }
    }
}

/// A partially decoded beam
#[derive(Debug, Clone)]
struct Hypothesis {
    tokens: Vec<u32>,
    log_prob: f32,
}

/// Bigram model over a [`Vocabulary`].
///
/// Every document starts from the end of text token, so the model also
/// learns how texts begin.
#[derive(Debug)]
pub struct BigramModel {
    vocab: Arc<Vocabulary>,
    transitions: Vec<HashMap<u32, u32>>,
    row_totals: Vec<u32>,
    smoothing: f32,
    seed: Option<u64>,
}

impl BigramModel {
    /// Build the vocabulary and bigram counts from `corpus`
    pub fn train(corpus: &str, config: &BigramConfig) -> Result<Self> {
        if !(config.smoothing.is_finite() && config.smoothing > 0.0) {
            return Err(NgramError::InvalidSmoothing(config.smoothing));
        }

        let mut vocab = Vocabulary::new();
        let eos = vocab.eos_token_id();
        let mut sequences = Vec::new();
        for document in documents(corpus) {
            let mut ids = vec![eos];
            ids.extend(pre_tokenize(document).iter().map(|piece| vocab.insert(piece)));
            ids.push(eos);
            sequences.push(ids);
        }
        if vocab.size() <= 2 {
            return Err(NgramError::EmptyCorpus);
        }

        let vocab_size = vocab.size();
        let mut transitions = vec![HashMap::new(); vocab_size];
        let mut row_totals = vec![0u32; vocab_size];
        for ids in &sequences {
            for pair in ids.windows(2) {
                *transitions[pair[0] as usize].entry(pair[1]).or_insert(0) += 1;
                row_totals[pair[0] as usize] += 1;
            }
        }

        info!(
            documents = sequences.len(),
            vocab_size,
            smoothing = config.smoothing,
            "Trained bigram model"
        );

        Ok(Self {
            vocab: Arc::new(vocab),
            transitions,
            row_totals,
            smoothing: config.smoothing as f32,
            seed: config.seed,
        })
    }

    /// Tokenizer sharing this model's vocabulary
    pub fn tokenizer(&self) -> WordTokenizer {
        WordTokenizer::new(Arc::clone(&self.vocab))
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.size()
    }

    /// Smoothed log-probability of `next` following `prev`
    pub fn log_prob(&self, prev: u32, next: u32) -> f32 {
        let count = self.transitions[prev as usize]
            .get(&next)
            .copied()
            .unwrap_or(0);
        let total = self.row_totals[prev as usize] as f32;
        let denominator = total + self.smoothing * self.vocab_size() as f32;
        ((count as f32 + self.smoothing) / denominator).ln()
    }

    /// Log-probabilities of every next token after `prev`
    fn next_log_probs(&self, prev: u32) -> Vec<f32> {
        let total = self.row_totals[prev as usize] as f32;
        let denominator = total + self.smoothing * self.vocab_size() as f32;
        let mut logits = vec![(self.smoothing / denominator).ln(); self.vocab_size()];
        for (&next, &count) in &self.transitions[prev as usize] {
            logits[next as usize] = ((count as f32 + self.smoothing) / denominator).ln();
        }
        logits
    }

    /// Next-token logits for generation; `<unk>` is never produced
    fn step_logits(&self, sequence: &[u32]) -> Vec<f32> {
        let prev = sequence.last().copied().unwrap_or(self.vocab.eos_token_id());
        let mut logits = self.next_log_probs(prev);
        logits[self.vocab.unk_token_id() as usize] = f32::NEG_INFINITY;
        logits
    }

    fn check_ids(&self, token_ids: &[u32]) -> Result<()> {
        match token_ids.iter().find(|&&id| id as usize >= self.vocab_size()) {
            Some(&id) => Err(NgramError::UnknownTokenId(id)),
            None => Ok(()),
        }
    }

    /// Random source for one sampling call.
    ///
    /// With a configured seed each sampling strategy gets its own stream, so a
    /// request replays identically regardless of the order strategies run in.
    fn rng_for(&self, stream: u64) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(stream)),
            None => StdRng::from_entropy(),
        }
    }

    /// Continue `input_ids` up to `config.max_length` tokens in total
    pub fn generate_tokens(&self, input_ids: &[u32], config: &GenerationConfig) -> Result<Vec<u32>> {
        if input_ids.is_empty() {
            return Err(NgramError::EmptyInput);
        }
        self.check_ids(input_ids)?;
        if input_ids.len() >= config.max_length {
            debug!(
                prompt_tokens = input_ids.len(),
                max_length = config.max_length,
                "Prompt already fills max_length"
            );
            return Ok(input_ids.to_vec());
        }

        let output = match config.decoding {
            DecodingStrategy::Greedy {
                no_repeat_ngram_size,
                repetition_penalty,
            } => self.greedy(input_ids, config.max_length, no_repeat_ngram_size, repetition_penalty),
            DecodingStrategy::BeamSearch {
                num_beams,
                early_stopping,
                no_repeat_ngram_size,
                length_penalty,
            } => self.beam_search(
                input_ids,
                config.max_length,
                num_beams,
                early_stopping,
                no_repeat_ngram_size,
                length_penalty,
            ),
            DecodingStrategy::TopK { top_k, temperature } => {
                self.sample(input_ids, config.max_length, temperature, Some(top_k), None, 1)?
            }
            DecodingStrategy::TopP { top_p, temperature } => {
                self.sample(input_ids, config.max_length, temperature, None, Some(top_p), 2)?
            }
            DecodingStrategy::Temperature {
                temperature,
                top_p,
                top_k,
            } => self.sample(input_ids, config.max_length, temperature, Some(top_k), Some(top_p), 3)?,
        };

        trace!(
            prompt_tokens = input_ids.len(),
            new_tokens = output.len() - input_ids.len(),
            "Generated continuation"
        );
        Ok(output)
    }

    fn greedy(
        &self,
        input_ids: &[u32],
        max_length: usize,
        no_repeat_ngram_size: usize,
        repetition_penalty: f32,
    ) -> Vec<u32> {
        let eos = self.vocab.eos_token_id();
        let mut sequence = input_ids.to_vec();
        while sequence.len() < max_length {
            let mut logits = self.step_logits(&sequence);
            apply_repetition_penalty(&mut logits, &sequence, repetition_penalty);
            mask_tokens(&mut logits, &banned_ngram_tokens(&sequence, no_repeat_ngram_size));
            let next = argmax(&logits).unwrap_or(eos);
            sequence.push(next);
            if next == eos {
                break;
            }
        }
        sequence
    }

    fn sample(
        &self,
        input_ids: &[u32],
        max_length: usize,
        temperature: f32,
        top_k: Option<usize>,
        top_p: Option<f32>,
        stream: u64,
    ) -> Result<Vec<u32>> {
        let eos = self.vocab.eos_token_id();
        let mut rng = self.rng_for(stream);
        let mut sequence = input_ids.to_vec();
        while sequence.len() < max_length {
            let logits = self.step_logits(&sequence);
            let next = sample_token(logits, temperature, top_k, top_p, &mut rng)?;
            sequence.push(next);
            if next == eos {
                break;
            }
        }
        Ok(sequence)
    }

    fn beam_search(
        &self,
        input_ids: &[u32],
        max_length: usize,
        num_beams: usize,
        early_stopping: bool,
        no_repeat_ngram_size: usize,
        length_penalty: f32,
    ) -> Vec<u32> {
        let eos = self.vocab.eos_token_id();
        let num_beams = num_beams.clamp(1, self.vocab_size().max(1));
        let prompt_len = input_ids.len();
        let score = |hypothesis: &Hypothesis| {
            let generated = (hypothesis.tokens.len() - prompt_len).max(1) as f32;
            hypothesis.log_prob / generated.powf(length_penalty)
        };

        let mut beams = vec![Hypothesis {
            tokens: input_ids.to_vec(),
            log_prob: 0.0,
        }];
        let mut finished: Vec<Hypothesis> = Vec::new();

        while beams.first().is_some_and(|b| b.tokens.len() < max_length) {
            let mut candidates: Vec<(usize, u32, f32)> = Vec::new();
            for (index, beam) in beams.iter().enumerate() {
                let mut logits = self.step_logits(&beam.tokens);
                mask_tokens(&mut logits, &banned_ngram_tokens(&beam.tokens, no_repeat_ngram_size));
                log_softmax_in_place(&mut logits);

                let mut ranked: Vec<(u32, f32)> = logits
                    .iter()
                    .enumerate()
                    .filter(|(_, lp)| lp.is_finite())
                    .map(|(token, &lp)| (token as u32, lp))
                    .collect();
                ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
                candidates.extend(
                    ranked
                        .into_iter()
                        .take(num_beams.saturating_mul(2))
                        .map(|(token, lp)| (index, token, beam.log_prob + lp)),
                );
            }
            candidates.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(Ordering::Equal));

            let mut next_beams = Vec::new();
            for (rank, (index, token, log_prob)) in candidates.into_iter().enumerate() {
                let mut tokens = beams[index].tokens.clone();
                tokens.push(token);
                let hypothesis = Hypothesis { tokens, log_prob };
                if token == eos {
                    if rank < num_beams {
                        finished.push(hypothesis);
                    }
                } else {
                    next_beams.push(hypothesis);
                }
                if next_beams.len() == num_beams {
                    break;
                }
            }
            beams = next_beams;

            if early_stopping && finished.len() >= num_beams {
                break;
            }
        }

        finished.extend(beams);
        finished
            .into_iter()
            .max_by(|a, b| score(a).partial_cmp(&score(b)).unwrap_or(Ordering::Equal))
            .map(|best| best.tokens)
            .unwrap_or_else(|| input_ids.to_vec())
    }

    /// Mean negative log-likelihood of positions 1..n given their predecessor
    pub fn mean_nll(&self, token_ids: &[u32]) -> Result<f32> {
        if token_ids.len() < 2 {
            return Err(NgramError::SequenceTooShort(token_ids.len()));
        }
        self.check_ids(token_ids)?;
        let total: f32 = token_ids
            .windows(2)
            .map(|pair| -self.log_prob(pair[0], pair[1]))
            .sum();
        Ok(total / (token_ids.len() - 1) as f32)
    }
}

impl LanguageModel for BigramModel {
    fn name(&self) -> &str {
        "bigram"
    }

    fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> decodex_core::Result<Vec<u32>> {
        self.generate_tokens(input_ids, config).map_err(Into::into)
    }

    fn score_sequence(&self, token_ids: &[u32]) -> decodex_core::Result<f32> {
        self.mean_nll(token_ids).map_err(Into::into)
    }
}
