//! Core domain types and logic.

pub mod quarter;
pub mod holding;
pub mod delta;
pub mod exposure;
pub mod quarter_close;
pub mod alignment;
pub mod special;
pub mod stats;
pub mod pipeline;
pub mod config_validation;
pub mod error;
