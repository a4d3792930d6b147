//! JSON bodies returned by the read API

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;

use ticker_core::{round_average, SourceAverage};
use ticker_price_feed::{PollerState, SourceHealth};

/// One source's average, rendered with four decimal places
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceAverageBody {
    pub source: String,
    pub average: String,
}

impl From<&SourceAverage> for SourceAverageBody {
    fn from(avg: &SourceAverage) -> Self {
        Self {
            source: avg.source.clone(),
            average: round_average(avg.average).to_string(),
        }
    }
}

pub fn average_bodies(averages: &[SourceAverage]) -> Vec<SourceAverageBody> {
    averages.iter().map(SourceAverageBody::from).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TickerStatus {
    Ok,
    NoData,
}

/// `GET /ticker/{symbol}`
#[derive(Debug, Serialize)]
pub struct TickerResponse {
    pub symbol: String,
    pub status: TickerStatus,
    pub sources: Vec<SourceAverageBody>,
}

impl TickerResponse {
    pub fn found(symbol: String, averages: &[SourceAverage]) -> Self {
        Self {
            symbol,
            status: TickerStatus::Ok,
            sources: average_bodies(averages),
        }
    }

    pub fn no_data(symbol: String) -> Self {
        Self {
            symbol,
            status: TickerStatus::NoData,
            sources: vec![],
        }
    }
}

/// `GET /`
pub type SnapshotResponse = BTreeMap<String, Vec<SourceAverageBody>>;

pub fn snapshot_body(snapshot: &BTreeMap<String, Vec<SourceAverage>>) -> SnapshotResponse {
    snapshot
        .iter()
        .map(|(symbol, averages)| (symbol.clone(), average_bodies(averages)))
        .collect()
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct SourceHealthBody {
    pub name: String,
    pub answerable: bool,
    pub state: PollerState,
    pub consecutive_failures: u64,
    pub total_cycles: u64,
    pub total_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
    pub symbols: usize,
    pub symbols_with_data: usize,
}

impl From<&SourceHealth> for SourceHealthBody {
    fn from(health: &SourceHealth) -> Self {
        Self {
            name: health.name.clone(),
            answerable: health.answerable,
            state: health.poller.state,
            consecutive_failures: health.poller.consecutive_failures,
            total_cycles: health.poller.total_cycles,
            total_failures: health.poller.total_failures,
            last_success: health.poller.last_success,
            symbols: health.store.symbol_count,
            symbols_with_data: health.store.symbols_with_data,
        }
    }
}

/// `GET /health`
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub sources: Vec<SourceHealthBody>,
}

impl HealthResponse {
    pub fn from_sources(health: &[SourceHealth]) -> Self {
        let sources: Vec<SourceHealthBody> = health.iter().map(SourceHealthBody::from).collect();
        let degraded = sources
            .iter()
            .any(|s| !s.answerable || s.consecutive_failures > 0);

        Self {
            status: if degraded { "degraded" } else { "ok" },
            sources,
        }
    }
}
