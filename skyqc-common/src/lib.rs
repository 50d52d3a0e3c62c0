//! Shared types for SkyQC services
//!
//! Carries the pieces every service needs: the common error type, the
//! analysis configuration with its environment overrides, and small
//! formatting helpers.

pub mod config;
pub mod error;
pub mod human_size;

pub use config::AnalysisConfig;
pub use error::{Error, Result};
