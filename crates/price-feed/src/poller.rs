//! Recurring poller for one upstream source

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use ticker_core::{
    normalize_symbol, DiscoveryError, DiscoveryResult, FetchError, FetchResult, SourceConfig,
    StoreError,
};

use crate::sources::QuoteSource;
use crate::store::SymbolStore;

/// Poller lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PollerState {
    Idle,
    Discovering,
    Polling,
    /// Discovery gave up; the source stays out of aggregation
    Failed,
    Stopped,
}

impl PollerState {
    pub fn name(&self) -> &'static str {
        match self {
            PollerState::Idle => "idle",
            PollerState::Discovering => "discovering",
            PollerState::Polling => "polling",
            PollerState::Failed => "failed",
            PollerState::Stopped => "stopped",
        }
    }
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Poller health, shared with readers
#[derive(Debug)]
pub struct PollerStatus {
    state: RwLock<PollerState>,
    consecutive_failures: AtomicU64,
    total_cycles: AtomicU64,
    total_failures: AtomicU64,
    last_success: RwLock<Option<DateTime<Utc>>>,
}

impl PollerStatus {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(PollerState::Idle),
            consecutive_failures: AtomicU64::new(0),
            total_cycles: AtomicU64::new(0),
            total_failures: AtomicU64::new(0),
            last_success: RwLock::new(None),
        }
    }

    pub fn state(&self) -> PollerState {
        *self.state.read()
    }

    pub fn consecutive_failures(&self) -> u64 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn snapshot(&self) -> PollerStatusSnapshot {
        PollerStatusSnapshot {
            state: self.state(),
            consecutive_failures: self.consecutive_failures(),
            total_cycles: self.total_cycles.load(Ordering::Relaxed),
            total_failures: self.total_failures.load(Ordering::Relaxed),
            last_success: *self.last_success.read(),
        }
    }

    fn set_state(&self, state: PollerState) {
        *self.state.write() = state;
    }

    fn record_success(&self, at: DateTime<Utc>) {
        self.total_cycles.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.store(0, Ordering::Relaxed);
        *self.last_success.write() = Some(at);
    }

    /// Returns the new consecutive failure count
    fn record_failure(&self) -> u64 {
        self.total_cycles.fetch_add(1, Ordering::Relaxed);
        self.total_failures.fetch_add(1, Ordering::Relaxed);
        self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl Default for PollerStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of a poller's status
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PollerStatusSnapshot {
    pub state: PollerState,
    pub consecutive_failures: u64,
    pub total_cycles: u64,
    pub total_failures: u64,
    pub last_success: Option<DateTime<Utc>>,
}

/// Drives discovery and the polling loop for one source
pub struct SourcePoller {
    config: SourceConfig,
    adapter: Arc<dyn QuoteSource>,
    store: Arc<SymbolStore>,
    status: Arc<PollerStatus>,
}

impl SourcePoller {
    pub fn new(
        config: SourceConfig,
        adapter: Arc<dyn QuoteSource>,
        store: Arc<SymbolStore>,
        status: Arc<PollerStatus>,
    ) -> Self {
        Self {
            config,
            adapter,
            store,
            status,
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Discover, then poll until `shutdown` flips to `true`
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        if self.start(&mut shutdown).await.is_err() {
            return;
        }

        let mut interval = tokio::time::interval(self.config.poll_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = interval.tick() => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }

            // Failures are logged and counted inside; the loop keeps going.
            let _ = self.poll_once().await;
        }

        self.status.set_state(PollerState::Stopped);
        info!("Poller for {} stopped", self.name());
    }

    /// Run discovery and seed the store.
    ///
    /// On failure the poller ends in `Failed` and the store is never
    /// initialized. A shutdown during the retry backoff ends it in `Stopped`
    /// with `DiscoveryError::Cancelled`.
    pub async fn start(&self, shutdown: &mut watch::Receiver<bool>) -> DiscoveryResult<usize> {
        self.status.set_state(PollerState::Discovering);
        info!("Discovering symbols on {}", self.name());

        match self.discover(shutdown).await {
            Ok(raw) => {
                let symbols: HashSet<String> = raw
                    .iter()
                    .map(|s| normalize_symbol(s))
                    .filter(|s| !s.is_empty())
                    .collect();
                let count = symbols.len();

                self.store.initialize(symbols);
                self.status.set_state(PollerState::Polling);
                info!(
                    "{} discovered {} symbols, polling every {:?}",
                    self.name(),
                    count,
                    self.config.poll_interval()
                );
                Ok(count)
            }
            Err(DiscoveryError::Cancelled) => {
                self.status.set_state(PollerState::Stopped);
                info!("Discovery for {} interrupted by shutdown", self.name());
                Err(DiscoveryError::Cancelled)
            }
            Err(e) => {
                self.status.set_state(PollerState::Failed);
                error!("Discovery failed for {}, source excluded: {}", self.name(), e);
                Err(e)
            }
        }
    }

    /// One fetch-and-record cycle. Returns the number of samples stored.
    pub async fn poll_once(&self) -> FetchResult<usize> {
        match self.fetch().await {
            Ok(prices) => {
                // Locks are only taken from here on, after the body is decoded.
                let now = Utc::now();
                let mut recorded = 0;

                for (raw, price) in prices {
                    let symbol = normalize_symbol(&raw);
                    if symbol.is_empty() {
                        debug!("{} sent an empty symbol {:?}", self.name(), raw);
                        continue;
                    }

                    match self.store.record_sample(&symbol, price, now) {
                        Ok(()) => recorded += 1,
                        Err(StoreError::UnknownSymbol(symbol)) => {
                            warn!("{} reported unknown symbol {}, ignoring", self.name(), symbol);
                        }
                    }
                }

                self.status.record_success(now);
                debug!("{} poll stored {} samples", self.name(), recorded);
                Ok(recorded)
            }
            Err(e) => {
                let failures = self.status.record_failure();
                warn!(
                    "{} poll failed ({} consecutive), skipping cycle: {}",
                    self.name(),
                    failures,
                    e
                );
                Err(e)
            }
        }
    }

    async fn fetch(&self) -> FetchResult<HashMap<String, Decimal>> {
        let timeout = self.config.request_timeout();

        tokio::time::timeout(timeout, self.adapter.fetch_ticker())
            .await
            .map_err(|_| FetchError::Timeout(timeout.as_millis() as u64))?
    }

    async fn discover(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> DiscoveryResult<HashSet<String>> {
        let timeout = self.config.request_timeout();
        let attempts = self.config.discovery_retries.saturating_add(1);
        let mut backoff = self.config.discovery_backoff();
        let mut attempt = 1;

        loop {
            let result = tokio::time::timeout(timeout, self.adapter.discover_symbols())
                .await
                .map_err(|_| DiscoveryError::Timeout(timeout.as_millis() as u64))
                .and_then(|r| r);

            match result {
                Ok(symbols) => return Ok(symbols),
                Err(e) if attempt < attempts => {
                    warn!(
                        "Discovery attempt {}/{} for {} failed: {}. Retrying in {:?}",
                        attempt,
                        attempts,
                        self.name(),
                        e,
                        backoff
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(backoff) => {}
                        _ = shutdown.changed() => {
                            debug!("Dropping discovery retry for {}: {}", self.name(), e);
                            return Err(DiscoveryError::Cancelled);
                        }
                    }

                    backoff = backoff.saturating_mul(2);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
