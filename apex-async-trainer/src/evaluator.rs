//! Evaluator of published weights.
mod base;
mod config;
pub use base::Evaluator;
pub use config::EvaluatorConfig;
