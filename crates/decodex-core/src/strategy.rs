//! The five decoding strategies and a map keyed by all of them

use serde::{Deserialize, Serialize};
use std::fmt;

/// A decoding strategy compared by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Deterministic, one token at a time
    Greedy,
    /// Deterministic, keeps the `num_beams` best partial sequences
    BeamSearch,
    /// Sampling from the k most likely tokens
    TopK,
    /// Nucleus sampling
    TopP,
    /// Sampling with temperature, top-p and top-k combined
    Temperature,
}

impl Strategy {
    /// All strategies in response order
    pub const ALL: [Strategy; 5] = [
        Strategy::Greedy,
        Strategy::BeamSearch,
        Strategy::TopK,
        Strategy::TopP,
        Strategy::Temperature,
    ];

    /// Key used in generation results and metrics
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Greedy => "greedy",
            Strategy::BeamSearch => "beam_search",
            Strategy::TopK => "top_k",
            Strategy::TopP => "top_p",
            Strategy::Temperature => "temperature",
        }
    }

    /// Key of the parameter block that configures this strategy
    pub fn param_key(&self) -> &'static str {
        match self {
            Strategy::Greedy => "greedy",
            Strategy::BeamSearch => "beam",
            Strategy::TopK => "topk",
            Strategy::TopP => "topp",
            Strategy::Temperature => "temperature",
        }
    }

    /// Whether the strategy samples instead of searching
    pub fn is_stochastic(&self) -> bool {
        matches!(
            self,
            Strategy::TopK | Strategy::TopP | Strategy::Temperature
        )
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One value per strategy.
///
/// Every strategy always has an entry, so any two maps built from the same
/// comparison share the exact same key set. Serializes as a JSON object in
/// response order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StrategyMap<T> {
    pub greedy: T,
    pub beam_search: T,
    pub top_k: T,
    pub top_p: T,
    pub temperature: T,
}

/// Generated text per strategy
pub type GenerationResult = StrategyMap<String>;

impl<T> StrategyMap<T> {
    /// Build a map by computing the value for each strategy in order
    pub fn from_fn(mut f: impl FnMut(Strategy) -> T) -> Self {
        Self {
            greedy: f(Strategy::Greedy),
            beam_search: f(Strategy::BeamSearch),
            top_k: f(Strategy::TopK),
            top_p: f(Strategy::TopP),
            temperature: f(Strategy::Temperature),
        }
    }

    pub fn get(&self, strategy: Strategy) -> &T {
        match strategy {
            Strategy::Greedy => &self.greedy,
            Strategy::BeamSearch => &self.beam_search,
            Strategy::TopK => &self.top_k,
            Strategy::TopP => &self.top_p,
            Strategy::Temperature => &self.temperature,
        }
    }

    pub fn get_mut(&mut self, strategy: Strategy) -> &mut T {
        match strategy {
            Strategy::Greedy => &mut self.greedy,
            Strategy::BeamSearch => &mut self.beam_search,
            Strategy::TopK => &mut self.top_k,
            Strategy::TopP => &mut self.top_p,
            Strategy::Temperature => &mut self.temperature,
        }
    }

    /// Iterate over `(strategy, value)` pairs in response order
    pub fn iter(&self) -> impl Iterator<Item = (Strategy, &T)> {
        Strategy::ALL.into_iter().map(move |s| (s, self.get(s)))
    }

    /// Transform every value, keeping the strategy alongside
    pub fn map<U>(self, mut f: impl FnMut(Strategy, T) -> U) -> StrategyMap<U> {
        StrategyMap {
            greedy: f(Strategy::Greedy, self.greedy),
            beam_search: f(Strategy::BeamSearch, self.beam_search),
            top_k: f(Strategy::TopK, self.top_k),
            top_p: f(Strategy::TopP, self.top_p),
            temperature: f(Strategy::Temperature, self.temperature),
        }
    }

    /// Rebuild a map from exactly five values given in response order.
    /// Returns `None` for any other length.
    pub fn from_ordered(values: Vec<T>) -> Option<Self> {
        let [greedy, beam_search, top_k, top_p, temperature]: [T; 5] = values.try_into().ok()?;
        Some(Self {
            greedy,
            beam_search,
            top_k,
            top_p,
            temperature,
        })
    }
}
