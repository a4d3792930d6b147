//! Core types and utilities for the ticker averaging service
//!
//! This crate provides shared types used across all components:
//! - Price samples and symbol normalization
//! - Per-source average results and query outcomes
//! - Service and source configuration
//! - Error kinds for discovery, fetching, storage and registration

pub mod types;
pub mod config;
pub mod errors;

pub use types::*;
pub use config::*;
pub use errors::*;
