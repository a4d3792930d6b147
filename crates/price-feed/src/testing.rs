//! Scripted quote source for poller and registry tests

use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use ticker_core::{DiscoveryError, DiscoveryResult, FetchError, FetchResult};

use crate::sources::QuoteSource;

pub(crate) struct ScriptedSource {
    name: String,
    symbols: HashSet<String>,
    discovery_failures: AtomicU32,
    /// Queued ticker responses; `None` is a failed fetch
    script: Mutex<VecDeque<Option<HashMap<String, Decimal>>>>,
    /// Returned once the script runs out
    steady: Mutex<Option<HashMap<String, Decimal>>>,
    ticker_delay: Option<Duration>,
    discovery_delay: Option<Duration>,
    pub(crate) discovery_calls: AtomicU32,
    pub(crate) ticker_calls: AtomicU32,
}

impl ScriptedSource {
    pub(crate) fn new(name: &str, symbols: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            discovery_failures: AtomicU32::new(0),
            script: Mutex::new(VecDeque::new()),
            steady: Mutex::new(None),
            ticker_delay: None,
            discovery_delay: None,
            discovery_calls: AtomicU32::new(0),
            ticker_calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn failing_discovery(self, times: u32) -> Self {
        self.discovery_failures.store(times, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_ticker_delay(mut self, delay: Duration) -> Self {
        self.ticker_delay = Some(delay);
        self
    }

    pub(crate) fn with_discovery_delay(mut self, delay: Duration) -> Self {
        self.discovery_delay = Some(delay);
        self
    }

    pub(crate) fn then_prices(self, prices: &[(&str, i64)]) -> Self {
        self.script.lock().push_back(Some(price_map(prices)));
        self
    }

    pub(crate) fn then_failure(self) -> Self {
        self.script.lock().push_back(None);
        self
    }

    pub(crate) fn steady_prices(self, prices: &[(&str, i64)]) -> Self {
        *self.steady.lock() = Some(price_map(prices));
        self
    }
}

fn price_map(prices: &[(&str, i64)]) -> HashMap<String, Decimal> {
    prices
        .iter()
        .map(|(symbol, price)| (symbol.to_string(), Decimal::from(*price)))
        .collect()
}

#[async_trait::async_trait]
impl QuoteSource for ScriptedSource {
    async fn discover_symbols(&self) -> DiscoveryResult<HashSet<String>> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.discovery_delay {
            tokio::time::sleep(delay).await;
        }

        let remaining = self.discovery_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.discovery_failures.store(remaining - 1, Ordering::SeqCst);
            return Err(DiscoveryError::Status(503));
        }
        Ok(self.symbols.clone())
    }

    async fn fetch_ticker(&self) -> FetchResult<HashMap<String, Decimal>> {
        self.ticker_calls.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = self.ticker_delay {
            tokio::time::sleep(delay).await;
        }

        let next = self.script.lock().pop_front();
        match next {
            Some(Some(prices)) => Ok(prices),
            Some(None) => Err(FetchError::Status(503)),
            None => self
                .steady
                .lock()
                .clone()
                .ok_or_else(|| FetchError::Request("connection refused".to_string())),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}
