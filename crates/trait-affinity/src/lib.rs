//! Scoring engine that turns per-character VNDB ratings into a ranked trait
//! affinity profile, plus the session, sampling and persistence plumbing that
//! feeds it.

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
