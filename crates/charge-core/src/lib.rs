//! Shared building blocks for chargelog.
//!
//! Holds the error type, the raw and canonical charging-session models,
//! analysis configuration, timestamp helpers, CLI settings and the
//! formatting helpers used by the text report.

pub mod config;
pub mod error;
pub mod formatting;
pub mod models;
pub mod settings;
pub mod time_utils;
