//! Async runtime for chargelog.
//!
//! Runs the independent parts of the analysis pipeline on a bounded pool of
//! blocking tasks.

pub mod orchestrator;

pub use orchestrator::AnalysisOrchestrator;
