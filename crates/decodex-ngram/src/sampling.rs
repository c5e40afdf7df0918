//! Logit processing and token selection
//!
//! All functions work on a full-vocabulary slice indexed by token id.
//! Masked tokens are `f32::NEG_INFINITY` in logit space and `0.0` in
//! probability space.

use crate::error::{NgramError, Result};
use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;
use std::cmp::Ordering;

fn descending(a: f32, b: f32) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal)
}

/// Divide logits by `temperature`; 1.0 and non-positive values are no-ops
pub fn apply_temperature(logits: &mut [f32], temperature: f32) {
    if temperature <= 0.0 || temperature == 1.0 {
        return;
    }
    let inv = 1.0 / temperature;
    for logit in logits.iter_mut() {
        *logit *= inv;
    }
}

/// Mask every logit outside the `top_k` highest
pub fn apply_top_k(logits: &mut [f32], top_k: usize) {
    if top_k == 0 || top_k >= logits.len() {
        return;
    }
    let mut sorted_indices: Vec<usize> = (0..logits.len()).collect();
    sorted_indices.sort_by(|&a, &b| descending(logits[a], logits[b]));

    for &idx in sorted_indices.iter().skip(top_k) {
        logits[idx] = f32::NEG_INFINITY;
    }
}

/// Zero every probability outside the smallest set whose cumulative
/// probability reaches `top_p`. Operates on post-softmax values.
pub fn apply_top_p(probs: &mut [f32], top_p: f32) {
    if top_p >= 1.0 || probs.is_empty() {
        return;
    }
    let mut indexed: Vec<(usize, f32)> = probs
        .iter()
        .copied()
        .enumerate()
        .filter(|&(_, p)| p > 0.0)
        .collect();
    indexed.sort_by(|a, b| descending(a.1, b.1));

    let mut cumulative = 0.0f32;
    let mut cutoff = indexed.len();
    for (rank, &(_, p)) in indexed.iter().enumerate() {
        cumulative += p;
        if cumulative >= top_p {
            cutoff = rank + 1;
            break;
        }
    }
    for &(idx, _) in indexed.iter().skip(cutoff) {
        probs[idx] = 0.0;
    }
}

/// Convert logits to probabilities in place.
///
/// Falls back to a uniform distribution when every logit is masked.
pub fn softmax_in_place(logits: &mut [f32]) {
    if logits.is_empty() {
        return;
    }
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let mut sum = 0.0f32;
    for logit in logits.iter_mut() {
        if *logit == f32::NEG_INFINITY {
            *logit = 0.0;
        } else {
            *logit = (*logit - max).exp();
            sum += *logit;
        }
    }
    if sum > 0.0 {
        for p in logits.iter_mut() {
            *p /= sum;
        }
    } else {
        let uniform = 1.0 / logits.len() as f32;
        logits.fill(uniform);
    }
}

/// Normalize logits to log-probabilities in place, keeping masked entries masked
pub fn log_softmax_in_place(logits: &mut [f32]) {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if max == f32::NEG_INFINITY {
        return;
    }
    let log_sum = logits
        .iter()
        .filter(|l| l.is_finite())
        .map(|&l| (l - max).exp())
        .sum::<f32>()
        .ln()
        + max;
    for logit in logits.iter_mut() {
        if logit.is_finite() {
            *logit -= log_sum;
        }
    }
}

/// Penalize every token already present in `previous`.
///
/// Positive logits are divided by `penalty`, negative ones multiplied.
pub fn apply_repetition_penalty(logits: &mut [f32], previous: &[u32], penalty: f32) {
    if penalty <= 0.0 || !penalty.is_finite() || penalty == 1.0 {
        return;
    }
    for &token in previous {
        if let Some(logit) = logits.get_mut(token as usize) {
            if *logit > 0.0 {
                *logit /= penalty;
            } else {
                *logit *= penalty;
            }
        }
    }
}

/// Tokens that would complete an n-gram of size `n` already present in `sequence`
pub fn banned_ngram_tokens(sequence: &[u32], n: usize) -> Vec<u32> {
    if n == 0 || sequence.len() + 1 < n {
        return Vec::new();
    }
    let prefix = &sequence[sequence.len() + 1 - n..];
    sequence
        .windows(n)
        .filter(|window| &window[..n - 1] == prefix)
        .map(|window| window[n - 1])
        .collect()
}

/// Mask the given token ids
pub fn mask_tokens(logits: &mut [f32], tokens: &[u32]) {
    for &token in tokens {
        if let Some(logit) = logits.get_mut(token as usize) {
            *logit = f32::NEG_INFINITY;
        }
    }
}

/// Index of the highest logit, `None` when every entry is masked
pub fn argmax(logits: &[f32]) -> Option<u32> {
    logits
        .iter()
        .enumerate()
        .filter(|(_, l)| **l > f32::NEG_INFINITY)
        .max_by(|(ia, a), (ib, b)| a.partial_cmp(b).unwrap_or(Ordering::Equal).then(ib.cmp(ia)))
        .map(|(idx, _)| idx as u32)
}

/// Draw a token id from a probability distribution
pub fn sample_from_distribution<R: Rng + ?Sized>(probs: &[f32], rng: &mut R) -> Result<u32> {
    let distribution =
        WeightedIndex::new(probs).map_err(|e| NgramError::Sampling(e.to_string()))?;
    Ok(distribution.sample(rng) as u32)
}

/// Temperature, then top-k, then softmax, then top-p, then a draw
pub fn sample_token<R: Rng + ?Sized>(
    mut logits: Vec<f32>,
    temperature: f32,
    top_k: Option<usize>,
    top_p: Option<f32>,
    rng: &mut R,
) -> Result<u32> {
    apply_temperature(&mut logits, temperature);
    if let Some(top_k) = top_k {
        apply_top_k(&mut logits, top_k);
    }
    softmax_in_place(&mut logits);
    if let Some(top_p) = top_p {
        apply_top_p(&mut logits, top_p);
    }
    sample_from_distribution(&logits, rng)
}
