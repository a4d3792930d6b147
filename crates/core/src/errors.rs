//! Error types

use thiserror::Error;

/// Symbol discovery errors. Fatal for the affected source only.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Discovery request failed: {0}")]
    Request(String),

    #[error("Discovery returned HTTP {0}")]
    Status(u16),

    #[error("Invalid discovery response: {0}")]
    Decode(String),

    #[error("Discovery timed out after {0}ms")]
    Timeout(u64),

    #[error("Discovery returned no symbols")]
    Empty,

    #[error("Discovery interrupted by shutdown")]
    Cancelled,
}

/// Ticker fetch errors. Recovered by skipping the poll cycle.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Ticker request failed: {0}")]
    Request(String),

    #[error("Ticker returned HTTP {0}")]
    Status(u16),

    #[error("Invalid ticker response: {0}")]
    Decode(String),

    #[error("Ticker timed out after {0}ms")]
    Timeout(u64),

    #[error("Source has not completed discovery")]
    NotDiscovered,
}

/// Symbol store errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
}

/// Registry lifecycle errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Source {0} is already registered")]
    DuplicateSource(String),

    #[error("Sources cannot be registered after polling has started")]
    AlreadyStarted,
}

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Result type alias
pub type DiscoveryResult<T> = Result<T, DiscoveryError>;
pub type FetchResult<T> = Result<T, FetchError>;
pub type StoreResult<T> = Result<T, StoreError>;
pub type ConfigResult<T> = Result<T, ConfigError>;
