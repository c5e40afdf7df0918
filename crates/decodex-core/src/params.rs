//! Strategy parameter normalization
//!
//! Callers send a partial, loosely typed parameter object:
//!
//! ```json
//! { "beam": { "num_beams": 3 }, "topp": { "top_p": "0.8" } }
//! ```
//!
//! [`ParameterNormalizer::normalize`] merges it over the defaults one strategy
//! block at a time and clamps every numeric option into its safe range. A
//! value that cannot be read as a number invalidates the whole parameter set,
//! and the full defaults are used for all five strategies instead.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Key accepted as a synonym for the `temperature` parameter block
pub const CREATIVE_ALIAS: &str = "creative";

/// Parameter block keys in response order
pub const STRATEGY_KEYS: [&str; 5] = ["greedy", "beam", "topk", "topp", "temperature"];

/// Options of one strategy block
pub type OptionBlock = BTreeMap<String, f64>;

/// Default options per strategy block
pub fn default_block(strategy_key: &str) -> &'static [(&'static str, f64)] {
    match strategy_key {
        "greedy" => &[("no_repeat_ngram_size", 2.0), ("repetition_penalty", 1.2)],
        "beam" => &[
            ("num_beams", 5.0),
            ("no_repeat_ngram_size", 3.0),
            ("length_penalty", 1.0),
        ],
        "topk" => &[("top_k", 50.0), ("temperature", 1.0)],
        "topp" => &[("top_p", 0.9), ("temperature", 1.0)],
        "temperature" => &[("temperature", 0.9), ("top_p", 0.9), ("top_k", 50.0)],
        _ => &[],
    }
}

/// Look up the default value of a single option
pub fn default_option(strategy_key: &str, option: &str) -> Option<f64> {
    default_block(strategy_key)
        .iter()
        .find(|(name, _)| *name == option)
        .map(|(_, value)| *value)
}

/// Normalized parameters for all five strategy blocks.
///
/// A block supplied by the caller is kept as the caller wrote it (after
/// clamping); options it leaves out are not filled in here but read through
/// [`StrategyParams::get`] with a default.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategyParams {
    blocks: BTreeMap<String, OptionBlock>,
}

impl StrategyParams {
    /// The hard-coded default set
    pub fn defaults() -> Self {
        let blocks = STRATEGY_KEYS
            .iter()
            .map(|key| ((*key).to_string(), Self::default_options(key)))
            .collect();
        Self { blocks }
    }

    fn default_options(strategy_key: &str) -> OptionBlock {
        default_block(strategy_key)
            .iter()
            .map(|(name, value)| ((*name).to_string(), *value))
            .collect()
    }

    /// Options of one strategy block, if present
    pub fn block(&self, strategy_key: &str) -> Option<&OptionBlock> {
        self.blocks.get(strategy_key)
    }

    /// Read an option, falling back to `default` when the block or option is absent
    pub fn get(&self, strategy_key: &str, option: &str, default: f64) -> f64 {
        self.blocks
            .get(strategy_key)
            .and_then(|block| block.get(option))
            .copied()
            .unwrap_or(default)
    }

    /// Read an option, falling back to its hard-coded default
    pub fn get_or_default(&self, strategy_key: &str, option: &str) -> f64 {
        let default = default_option(strategy_key, option).unwrap_or_default();
        self.get(strategy_key, option, default)
    }
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self::defaults()
    }
}

/// Why a caller-supplied parameter set was discarded
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value for {location}: {reason}")]
pub struct ParamsCorruption {
    /// Where the bad value sits, e.g. `beam.num_beams` or `params`
    pub location: String,
    /// What was wrong with it
    pub reason: String,
}

impl ParamsCorruption {
    fn new(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            reason: reason.into(),
        }
    }
}

/// Whether the caller's parameters were used or replaced
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizationOutcome {
    /// No parameters were supplied
    Defaults,
    /// The caller's parameters were merged and clamped
    Accepted,
    /// The caller's parameters were discarded for the full default set
    DefaultsSubstituted(ParamsCorruption),
}

/// Result of [`ParameterNormalizer::normalize`]
#[derive(Debug, Clone)]
pub struct Normalized {
    pub params: StrategyParams,
    pub outcome: NormalizationOutcome,
}

/// Merges caller parameters over the defaults and clamps them into range
pub struct ParameterNormalizer;

impl ParameterNormalizer {
    /// Normalize a raw parameter object. Never fails: corruption anywhere in
    /// the input yields the full default set.
    pub fn normalize(raw: Option<&Value>) -> Normalized {
        let raw = match raw {
            None | Some(Value::Null) => {
                return Normalized {
                    params: StrategyParams::defaults(),
                    outcome: NormalizationOutcome::Defaults,
                }
            }
            Some(raw) => raw,
        };

        match Self::try_normalize(raw) {
            Ok(params) => Normalized {
                params,
                outcome: NormalizationOutcome::Accepted,
            },
            Err(corruption) => {
                warn!(
                    location = %corruption.location,
                    reason = %corruption.reason,
                    "Parameter validation error, using defaults for every strategy"
                );
                Normalized {
                    params: StrategyParams::defaults(),
                    outcome: NormalizationOutcome::DefaultsSubstituted(corruption),
                }
            }
        }
    }

    fn try_normalize(raw: &Value) -> Result<StrategyParams, ParamsCorruption> {
        let supplied = raw
            .as_object()
            .ok_or_else(|| ParamsCorruption::new("params", "expected an object"))?;

        for key in supplied.keys() {
            if !STRATEGY_KEYS.contains(&key.as_str()) && key != CREATIVE_ALIAS {
                debug!(strategy = %key, "Ignoring unknown strategy block");
            }
        }

        let creative = supplied
            .get(CREATIVE_ALIAS)
            .map(|value| Self::coerce_block("temperature", CREATIVE_ALIAS, value))
            .transpose()?;

        let mut blocks = BTreeMap::new();
        for key in STRATEGY_KEYS {
            let block = match supplied.get(key) {
                Some(value) => Self::coerce_block(key, key, value)?,
                None => StrategyParams::default_options(key),
            };
            blocks.insert(key.to_string(), block);
        }

        // `temperature` wins over its synonym once both have coerced cleanly
        if let Some(creative) = creative {
            if supplied.contains_key("temperature") {
                debug!("Both `temperature` and `creative` supplied, using `temperature`");
            } else {
                blocks.insert("temperature".to_string(), creative);
            }
        }

        let mut params = StrategyParams { blocks };
        Self::clamp(&mut params);
        Ok(params)
    }

    fn coerce_block(
        key: &str,
        source_key: &str,
        value: &Value,
    ) -> Result<OptionBlock, ParamsCorruption> {
        let options = value
            .as_object()
            .ok_or_else(|| ParamsCorruption::new(source_key, "expected an object"))?;

        let mut block = OptionBlock::new();
        for (option, value) in options {
            if default_option(key, option).is_none() {
                debug!(strategy = %source_key, option = %option, "Ignoring unknown option");
                continue;
            }
            let number = coerce_number(value)
                .map_err(|reason| ParamsCorruption::new(format!("{source_key}.{option}"), reason))?;
            block.insert(option.clone(), number);
        }
        Ok(block)
    }

    /// Apply the range rules to options that are present
    fn clamp(params: &mut StrategyParams) {
        if let Some(beam) = params.blocks.get_mut("beam") {
            update(beam, "num_beams", |v| v.round_ties_even().max(2.0));
        }

        for key in ["topk", "topp", "temperature"] {
            if let Some(block) = params.blocks.get_mut(key) {
                update(block, "temperature", |v| v.clamp(0.1, 2.0));
            }
        }

        for key in ["topp", "temperature"] {
            if let Some(block) = params.blocks.get_mut(key) {
                update(block, "top_p", |v| v.clamp(0.01, 1.0));
            }
        }

        for key in ["topk", "temperature"] {
            if let Some(block) = params.blocks.get_mut(key) {
                update(block, "top_k", |v| v.round_ties_even().max(1.0));
            }
        }

        if let Some(greedy) = params.blocks.get_mut("greedy") {
            update(greedy, "repetition_penalty", |v| v.max(1.0));
        }
    }
}

fn update(block: &mut OptionBlock, option: &str, f: impl FnOnce(f64) -> f64) {
    if let Some(value) = block.get_mut(option) {
        *value = f(*value);
    }
}

/// Read a JSON value as a finite number.
///
/// Numbers are taken as-is, numeric strings are parsed and booleans count as
/// 1 and 0. Anything else is rejected with a short reason.
pub fn coerce_number(value: &Value) -> Result<f64, String> {
    let number = match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| format!("{n} is not representable as a float"))?,
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("could not convert string to number: {s:?}"))?,
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::Null => return Err("expected a number, got null".to_string()),
        Value::Array(_) => return Err("expected a number, got an array".to_string()),
        Value::Object(_) => return Err("expected a number, got an object".to_string()),
    };

    if number.is_finite() {
        Ok(number)
    } else {
        Err(format!("{number} is not a finite number"))
    }
}
