//! WEX-style public API (`info` + `ticker/<pair-pair-...>`)

use parking_lot::RwLock;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::time::Duration;
use tracing::{debug, warn};

use ticker_core::{DiscoveryError, DiscoveryResult, FetchError, FetchResult};

use super::{build_client, get_json, join_url, QuoteSource};

pub struct WexSource {
    name: String,
    base_url: String,
    timeout: Duration,
    client: Client,
    /// Raw pair names from discovery, joined into the ticker request path
    pairs: RwLock<Vec<String>>,
}

impl WexSource {
    pub fn new(name: &str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            timeout,
            client: build_client(timeout)?,
            pairs: RwLock::new(Vec::new()),
        })
    }

    fn ticker_path(&self) -> Option<String> {
        let pairs = self.pairs.read();
        if pairs.is_empty() {
            return None;
        }
        Some(format!("ticker/{}", pairs.join("-")))
    }
}

#[async_trait::async_trait]
impl QuoteSource for WexSource {
    async fn discover_symbols(&self) -> DiscoveryResult<HashSet<String>> {
        let url = join_url(&self.base_url, "info");
        let info: InfoResponse = get_json(&self.client, &url, self.timeout).await?;

        if info.pairs.is_empty() {
            return Err(DiscoveryError::Empty);
        }

        let mut pairs: Vec<String> = info.pairs.into_keys().collect();
        pairs.sort();
        debug!("{} lists {} pairs", self.name, pairs.len());

        let symbols = pairs.iter().cloned().collect();
        *self.pairs.write() = pairs;
        Ok(symbols)
    }

    async fn fetch_ticker(&self) -> FetchResult<HashMap<String, Decimal>> {
        let path = self.ticker_path().ok_or(FetchError::NotDiscovered)?;
        let url = join_url(&self.base_url, &path);
        let tickers: HashMap<String, PairTicker> =
            get_json(&self.client, &url, self.timeout).await?;

        let mut prices = HashMap::with_capacity(tickers.len());
        for (pair, ticker) in tickers {
            let Some(last) = ticker.last else {
                debug!("{} ticker for {} has no last price", self.name, pair);
                continue;
            };
            match Decimal::try_from(last) {
                Ok(price) => {
                    prices.insert(pair, price);
                }
                Err(e) => warn!("{} sent unusable price {} for {}: {}", self.name, last, pair, e),
            }
        }

        Ok(prices)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Deserialize)]
struct InfoResponse {
    #[serde(default)]
    pairs: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct PairTicker {
    #[serde(default)]
    last: Option<f64>,
}
