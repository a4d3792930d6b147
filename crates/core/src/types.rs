//! Core type definitions

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Fractional digits kept in any external representation of an average
pub const AVERAGE_DECIMALS: u32 = 4;

/// Characters upstreams use to split base and quote assets
const SYMBOL_SEPARATORS: [char; 5] = ['_', '-', '/', ':', '.'];

/// Normalize an upstream symbol into a store key.
///
/// Uppercases and strips separators, so `btc_usd`, `BTC-USD` and `btcusd`
/// all become `BTCUSD`.
pub fn normalize_symbol(raw: &str) -> String {
    raw.chars()
        .filter(|c| !SYMBOL_SEPARATORS.contains(c) && !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// Round an average to the fixed external precision.
///
/// The result always carries exactly four fractional digits, so its
/// `Display` reads `115.0000` rather than `115`.
pub fn round_average(value: Decimal) -> Decimal {
    let mut rounded = value.round_dp_with_strategy(
        AVERAGE_DECIMALS,
        RoundingStrategy::MidpointAwayFromZero,
    );
    rounded.rescale(AVERAGE_DECIMALS);
    rounded
}

/// A single observed price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub price: Decimal,
    pub observed_at: DateTime<Utc>,
}

impl Sample {
    pub fn new(price: Decimal, observed_at: DateTime<Utc>) -> Self {
        Self { price, observed_at }
    }

    /// Age relative to `now`. Negative if the clock stepped backwards.
    pub fn age(&self, now: DateTime<Utc>) -> TimeDelta {
        now - self.observed_at
    }
}

/// Moving average reported by one source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAverage {
    pub source: String,
    pub average: Decimal,
}

impl SourceAverage {
    pub fn new(source: impl Into<String>, average: Decimal) -> Self {
        Self {
            source: source.into(),
            average,
        }
    }
}

/// Outcome of a cross-source symbol query
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolQuery {
    /// No answerable source knows the symbol
    NotFound,
    /// Known to at least one source, but no fresh samples anywhere
    NoData,
    /// Averages from every source with data, ordered by source name
    Found(Vec<SourceAverage>),
}

impl SymbolQuery {
    pub fn averages(&self) -> &[SourceAverage] {
        match self {
            SymbolQuery::Found(averages) => averages,
            _ => &[],
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, SymbolQuery::Found(_))
    }
}
