//! Upstream quote source adapters
//!
//! Each adapter speaks one exchange's HTTP API and hands back raw symbols;
//! normalization into store keys happens in the poller.

pub mod binance;
pub mod wex;

use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use ticker_core::{
    DiscoveryError, DiscoveryResult, FetchError, FetchResult, SourceConfig, SourceKind,
};

pub use binance::BinanceSource;
pub use wex::WexSource;

/// Discovery and ticker contract for one upstream
#[async_trait::async_trait]
pub trait QuoteSource: Send + Sync {
    /// All symbols the upstream lists, in its own notation
    async fn discover_symbols(&self) -> DiscoveryResult<HashSet<String>>;

    /// Current price per raw symbol
    async fn fetch_ticker(&self) -> FetchResult<HashMap<String, Decimal>>;

    fn name(&self) -> &str;
}

/// Build the adapter matching a source's configured kind
pub fn build_source(config: &SourceConfig) -> anyhow::Result<Arc<dyn QuoteSource>> {
    let source: Arc<dyn QuoteSource> = match config.kind {
        SourceKind::Wex => Arc::new(WexSource::new(
            &config.name,
            &config.base_url,
            config.request_timeout(),
        )?),
        SourceKind::Binance => Arc::new(BinanceSource::new(
            &config.name,
            &config.base_url,
            config.request_timeout(),
        )?),
    };
    Ok(source)
}

/// HTTP failure before it is attributed to discovery or ticker fetching
#[derive(Debug)]
pub(crate) enum HttpFailure {
    Request(String),
    Status(StatusCode),
    Decode(String),
    Timeout(u64),
}

impl From<HttpFailure> for DiscoveryError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Request(e) => DiscoveryError::Request(e),
            HttpFailure::Status(s) => DiscoveryError::Status(s.as_u16()),
            HttpFailure::Decode(e) => DiscoveryError::Decode(e),
            HttpFailure::Timeout(ms) => DiscoveryError::Timeout(ms),
        }
    }
}

impl From<HttpFailure> for FetchError {
    fn from(failure: HttpFailure) -> Self {
        match failure {
            HttpFailure::Request(e) => FetchError::Request(e),
            HttpFailure::Status(s) => FetchError::Status(s.as_u16()),
            HttpFailure::Decode(e) => FetchError::Decode(e),
            HttpFailure::Timeout(ms) => FetchError::Timeout(ms),
        }
    }
}

pub(crate) fn build_client(timeout: Duration) -> reqwest::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("ticker-avg/", env!("CARGO_PKG_VERSION")))
        .build()
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// GET a JSON document; the body is read fully before decoding
pub(crate) async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: &str,
    timeout: Duration,
) -> Result<T, HttpFailure> {
    let timeout_ms = timeout.as_millis() as u64;
    let classify = |e: reqwest::Error| {
        if e.is_timeout() {
            HttpFailure::Timeout(timeout_ms)
        } else {
            HttpFailure::Request(e.to_string())
        }
    };

    let response = client.get(url).send().await.map_err(classify)?;

    let status = response.status();
    if !status.is_success() {
        return Err(HttpFailure::Status(status));
    }

    let body = response.bytes().await.map_err(classify)?;
    serde_json::from_slice(&body).map_err(|e| HttpFailure::Decode(e.to_string()))
}
