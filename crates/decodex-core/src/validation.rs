//! Request validation for the comparison engine
//!
//! Checks run before any tokenization or generation; a request that fails
//! here never reaches the comparator.

use crate::{CoreError, Result};

/// Validation utilities for incoming requests
pub struct Validator;

impl Validator {
    /// Validate the prompt, returning it on success.
    ///
    /// Only a missing or empty prompt is rejected; whitespace is a prompt like
    /// any other.
    pub fn validate_prompt(prompt: Option<&str>) -> Result<&str> {
        match prompt {
            Some(prompt) if !prompt.is_empty() => Ok(prompt),
            _ => Err(CoreError::invalid_input(
                "INVALID_PROMPT",
                "Prompt is required",
                "Request validation",
                "Provide a non-empty prompt string",
            )),
        }
    }

    /// Validate the total sequence length
    pub fn validate_max_length(max_length: usize, limit: usize) -> Result<usize> {
        if max_length == 0 {
            return Err(CoreError::invalid_parameter(
                "INVALID_MAX_LENGTH",
                "max_length cannot be zero",
                "Request validation",
                "Use a positive length that leaves room for the prompt",
                "max_length",
                "0",
                format!("1 to {}", limit),
            ));
        }

        if max_length > limit {
            return Err(CoreError::invalid_parameter(
                "MAX_LENGTH_TOO_LARGE",
                format!("max_length {} exceeds the limit of {}", max_length, limit),
                "Request validation",
                "Request a shorter sequence or raise engine.max_length_limit",
                "max_length",
                max_length.to_string(),
                format!("1 to {}", limit),
            ));
        }

        Ok(max_length)
    }
}
