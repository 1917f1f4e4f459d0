//! CLI command implementations.

pub mod clean;
pub mod languages;
pub mod pull;
pub mod run;
