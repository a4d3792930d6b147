//! Sliding time window of price samples for one (source, symbol) pair

use chrono::{DateTime, TimeDelta, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;

use ticker_core::Sample;

/// Default retention for samples
pub fn default_window() -> TimeDelta {
    TimeDelta::minutes(10)
}

/// Ordered samples plus their cached mean.
///
/// The average is recomputed only by [`PriceWindow::update`]; reads return
/// the cached value.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceWindow {
    samples: VecDeque<Sample>,
    duration: TimeDelta,
    average: Option<Decimal>,
}

impl PriceWindow {
    pub fn new(duration: TimeDelta) -> Self {
        Self {
            samples: VecDeque::new(),
            duration,
            average: None,
        }
    }

    /// Append a sample observed at `now`, evict everything at least one
    /// window old and recompute the mean of what remains.
    ///
    /// A `now` earlier than the latest sample is raised to it, so samples
    /// stay ordered by `observed_at` when the wall clock steps back.
    pub fn update(&mut self, price: Decimal, now: DateTime<Utc>) {
        let now = match self.samples.back() {
            Some(last) if last.observed_at > now => last.observed_at,
            _ => now,
        };
        self.samples.push_back(Sample::new(price, now));

        let duration = self.duration;
        self.samples.retain(|s| s.age(now) < duration);

        self.average = Self::mean(&self.samples);
    }

    /// Cached moving average, `None` while the window is empty
    pub fn current_average(&self) -> Option<Decimal> {
        self.average
    }

    pub fn samples(&self) -> impl ExactSizeIterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn window_duration(&self) -> TimeDelta {
        self.duration
    }

    fn mean(samples: &VecDeque<Sample>) -> Option<Decimal> {
        if samples.is_empty() {
            return None;
        }
        let sum: Decimal = samples.iter().map(|s| s.price).sum();
        Some(sum / Decimal::from(samples.len()))
    }
}

impl Default for PriceWindow {
    fn default() -> Self {
        Self::new(default_window())
    }
}
