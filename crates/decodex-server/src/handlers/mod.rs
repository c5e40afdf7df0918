//! HTTP request handlers

pub mod generate;
pub mod health;

pub use generate::*;
pub use health::*;
