//! Binance spot REST API (`exchangeInfo` + `ticker/price`)

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, warn};

use ticker_core::{DiscoveryError, DiscoveryResult, FetchResult};

use super::{build_client, get_json, join_url, QuoteSource};

const EXCHANGE_INFO_PATH: &str = "api/v3/exchangeInfo";
const TICKER_PRICE_PATH: &str = "api/v3/ticker/price";
const TRADING_STATUS: &str = "TRADING";

pub struct BinanceSource {
    name: String,
    base_url: String,
    timeout: Duration,
    client: Client,
}

impl BinanceSource {
    pub fn new(name: &str, base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            name: name.to_string(),
            base_url: base_url.to_string(),
            timeout,
            client: build_client(timeout)?,
        })
    }
}

#[async_trait::async_trait]
impl QuoteSource for BinanceSource {
    async fn discover_symbols(&self) -> DiscoveryResult<HashSet<String>> {
        let url = join_url(&self.base_url, EXCHANGE_INFO_PATH);
        let info: ExchangeInfo = get_json(&self.client, &url, self.timeout).await?;

        let symbols: HashSet<String> = info
            .symbols
            .into_iter()
            .filter(|s| s.status.as_deref().map_or(true, |st| st == TRADING_STATUS))
            .map(|s| s.symbol)
            .collect();

        if symbols.is_empty() {
            return Err(DiscoveryError::Empty);
        }

        debug!("{} lists {} trading symbols", self.name, symbols.len());
        Ok(symbols)
    }

    async fn fetch_ticker(&self) -> FetchResult<HashMap<String, Decimal>> {
        let url = join_url(&self.base_url, TICKER_PRICE_PATH);
        let tickers: Vec<TickerPrice> = get_json(&self.client, &url, self.timeout).await?;

        let mut prices = HashMap::with_capacity(tickers.len());
        for ticker in tickers {
            match Decimal::from_str(&ticker.price) {
                Ok(price) => {
                    prices.insert(ticker.symbol, price);
                }
                Err(e) => warn!(
                    "{} sent unusable price {:?} for {}: {}",
                    self.name, ticker.price, ticker.symbol, e
                ),
            }
        }

        Ok(prices)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    #[serde(default)]
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    symbol: String,
    price: String,
}
