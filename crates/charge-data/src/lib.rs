//! Data layer for chargelog.
//!
//! Reads the exported charging history, normalizes its records into
//! sessions, reconciles provider names, computes aggregate statistics and
//! clusters charging locations into places.

pub mod aggregator;
pub mod analysis;
pub mod battery;
pub mod clustering;
pub mod fuzzy;
pub mod normalizer;
pub mod providers;
pub mod reader;

#[cfg(test)]
mod test_support;

pub use charge_core as core;
