//! Per-source symbol store
//!
//! The symbol map sits behind one read/write lock that is only taken for
//! writing when a new symbol appears. Each symbol owns its own cell holding
//! an `Arc<PriceWindow>`: the poller updates a window under that cell's write
//! lock (copy-on-write when readers still hold the previous snapshot), so a
//! reader sees either the old window or the fully updated one.

use chrono::{DateTime, TimeDelta, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use ticker_core::{StoreError, StoreResult, WindowConfig};

use crate::window::PriceWindow;

type WindowCell = Arc<RwLock<Arc<PriceWindow>>>;

/// Store settings
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub window_duration: TimeDelta,
    pub lazy_symbol_creation: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            window_duration: crate::window::default_window(),
            lazy_symbol_creation: true,
        }
    }
}

impl From<&WindowConfig> for StoreConfig {
    fn from(config: &WindowConfig) -> Self {
        Self {
            window_duration: config.window_duration(),
            lazy_symbol_creation: config.lazy_symbol_creation,
        }
    }
}

/// Symbol -> price window map for one source
#[derive(Debug)]
pub struct SymbolStore {
    config: StoreConfig,
    windows: RwLock<HashMap<String, WindowCell>>,
    initialized: AtomicBool,

    /// Stats
    sample_count: AtomicU64,
    unknown_symbol_count: AtomicU64,
}

impl SymbolStore {
    pub fn new(config: StoreConfig) -> Self {
        Self {
            config,
            windows: RwLock::new(HashMap::new()),
            initialized: AtomicBool::new(false),
            sample_count: AtomicU64::new(0),
            unknown_symbol_count: AtomicU64::new(0),
        }
    }

    /// Seed an empty window for every discovered symbol.
    ///
    /// Symbols already present keep their windows; the set never shrinks.
    pub fn initialize<I, S>(&self, symbols: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let duration = self.config.window_duration;
        let mut windows = self.windows.write();

        for symbol in symbols {
            windows
                .entry(symbol.into())
                .or_insert_with(|| Arc::new(RwLock::new(Arc::new(PriceWindow::new(duration)))));
        }

        self.initialized.store(true, Ordering::Release);
        debug!("Symbol store initialized with {} symbols", windows.len());
    }

    /// Whether discovery has completed for this store
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Push a new sample into a symbol's window.
    ///
    /// Unknown symbols get a fresh window when lazy creation is enabled,
    /// otherwise the sample is dropped with `UnknownSymbol`.
    pub fn record_sample(
        &self,
        symbol: &str,
        price: Decimal,
        now: DateTime<Utc>,
    ) -> StoreResult<()> {
        let cell = match self.cell(symbol) {
            Some(cell) => cell,
            None if self.config.lazy_symbol_creation => self.create_cell(symbol),
            None => {
                self.unknown_symbol_count.fetch_add(1, Ordering::Relaxed);
                return Err(StoreError::UnknownSymbol(symbol.to_string()));
            }
        };

        // Read-modify-write of the window happens under one lock acquisition.
        let mut window = cell.write();
        Arc::make_mut(&mut *window).update(price, now);
        drop(window);

        self.sample_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Moving average for a symbol, `None` if unknown or empty
    pub fn lookup(&self, symbol: &str) -> Option<Decimal> {
        self.cell(symbol).and_then(|cell| cell.read().current_average())
    }

    /// Immutable snapshot of one symbol's window
    pub fn window(&self, symbol: &str) -> Option<Arc<PriceWindow>> {
        self.cell(symbol).map(|cell| Arc::clone(&cell.read()))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.windows.read().contains_key(symbol)
    }

    pub fn symbols(&self) -> HashSet<String> {
        self.windows.read().keys().cloned().collect()
    }

    /// Averages for every symbol that currently has one
    pub fn all_averages(&self) -> HashMap<String, Decimal> {
        let windows = self.windows.read();

        windows
            .iter()
            .filter_map(|(symbol, cell)| {
                cell.read()
                    .current_average()
                    .map(|avg| (symbol.clone(), avg))
            })
            .collect()
    }

    /// Stats
    pub fn stats(&self) -> SymbolStoreStats {
        let windows = self.windows.read();
        let with_data = windows
            .values()
            .filter(|cell| !cell.read().is_empty())
            .count();

        SymbolStoreStats {
            symbol_count: windows.len(),
            symbols_with_data: with_data,
            sample_count: self.sample_count.load(Ordering::Relaxed),
            unknown_symbol_count: self.unknown_symbol_count.load(Ordering::Relaxed),
        }
    }

    fn cell(&self, symbol: &str) -> Option<WindowCell> {
        self.windows.read().get(symbol).cloned()
    }

    fn create_cell(&self, symbol: &str) -> WindowCell {
        let duration = self.config.window_duration;
        let mut windows = self.windows.write();

        let cell = windows
            .entry(symbol.to_string())
            .or_insert_with(|| {
                debug!("Creating window for undiscovered symbol {}", symbol);
                Arc::new(RwLock::new(Arc::new(PriceWindow::new(duration))))
            });
        Arc::clone(cell)
    }
}

impl Default for SymbolStore {
    fn default() -> Self {
        Self::new(StoreConfig::default())
    }
}

/// Statistics about a symbol store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolStoreStats {
    pub symbol_count: usize,
    pub symbols_with_data: usize,
    pub sample_count: u64,
    pub unknown_symbol_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn strict_store() -> SymbolStore {
        SymbolStore::new(StoreConfig {
            lazy_symbol_creation: false,
            ..Default::default()
        })
    }

    #[test]
    fn test_discovered_symbols_without_samples_have_no_average() {
        let store = SymbolStore::default();
        store.initialize(["BTCUSD", "ETHUSD"]);

        assert!(store.is_initialized());
        assert!(store.contains("BTCUSD"));
        assert_eq!(store.lookup("BTCUSD"), None);
        assert_eq!(store.lookup("ETHUSD"), None);
        assert!(store.all_averages().is_empty());
    }

    #[test]
    fn test_record_and_lookup() {
        let store = SymbolStore::default();
        store.initialize(["BTCUSD"]);

        let now = Utc::now();
        store.record_sample("BTCUSD", Decimal::from(100), now).unwrap();
        store
            .record_sample("BTCUSD", Decimal::from(200), now + TimeDelta::seconds(2))
            .unwrap();

        assert_eq!(store.lookup("BTCUSD"), Some(Decimal::from(150)));
        assert_eq!(store.all_averages().get("BTCUSD"), Some(&Decimal::from(150)));
        assert_eq!(store.window("BTCUSD").unwrap().len(), 2);
    }

    #[test]
    fn test_lazy_creation_of_unknown_symbol() {
        let store = SymbolStore::default();
        store.initialize(["BTCUSD"]);

        store.record_sample("DOGEUSD", Decimal::ONE, Utc::now()).unwrap();

        assert!(store.contains("DOGEUSD"));
        assert_eq!(store.lookup("DOGEUSD"), Some(Decimal::ONE));
        assert_eq!(store.stats().symbol_count, 2);
    }

    #[test]
    fn test_unknown_symbol_rejected_without_lazy_creation() {
        let store = strict_store();
        store.initialize(["BTCUSD"]);

        let err = store
            .record_sample("DOGEUSD", Decimal::ONE, Utc::now())
            .unwrap_err();

        assert_eq!(err, StoreError::UnknownSymbol("DOGEUSD".to_string()));
        assert!(!store.contains("DOGEUSD"));
        assert_eq!(store.stats().unknown_symbol_count, 1);
        assert_eq!(store.stats().sample_count, 0);
    }

    #[test]
    fn test_initialize_never_shrinks() {
        let store = SymbolStore::default();
        store.initialize(["BTCUSD", "ETHUSD"]);
        store.record_sample("BTCUSD", Decimal::TEN, Utc::now()).unwrap();

        store.initialize(["LTCUSD"]);

        let symbols = store.symbols();
        assert_eq!(symbols.len(), 3);
        assert_eq!(store.lookup("BTCUSD"), Some(Decimal::TEN));
    }

    #[test]
    fn test_reader_snapshot_is_not_affected_by_later_updates() {
        let store = SymbolStore::default();
        let now = Utc::now();
        store.record_sample("BTCUSD", Decimal::from(10), now).unwrap();

        let before = store.window("BTCUSD").unwrap();
        store
            .record_sample("BTCUSD", Decimal::from(30), now + TimeDelta::seconds(1))
            .unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(before.current_average(), Some(Decimal::from(10)));
        assert_eq!(store.lookup("BTCUSD"), Some(Decimal::from(20)));
    }

    #[test]
    fn test_no_torn_reads_under_concurrent_access() {
        let store = Arc::new(SymbolStore::new(StoreConfig {
            window_duration: TimeDelta::seconds(30),
            lazy_symbol_creation: true,
        }));
        store.initialize(["BTCUSD", "ETHUSD"]);

        let writer = {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let start = Utc::now();
                for i in 0..5_000i64 {
                    let now = start + TimeDelta::milliseconds(i * 10);
                    let symbol = if i % 2 == 0 { "BTCUSD" } else { "ETHUSD" };
                    store
                        .record_sample(symbol, Decimal::new(i % 977 + 1, 2), now)
                        .unwrap();
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..5_000 {
                        for symbol in ["BTCUSD", "ETHUSD"] {
                            let window = store.window(symbol).unwrap();
                            match window.current_average() {
                                None => assert!(window.is_empty()),
                                Some(avg) => {
                                    let sum: Decimal = window.samples().map(|s| s.price).sum();
                                    assert_eq!(avg, sum / Decimal::from(window.len()));
                                }
                            }
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        assert_eq!(store.stats().sample_count, 5_000);
    }

    #[test]
    fn test_concurrent_writers_do_not_lose_updates() {
        let store = Arc::new(SymbolStore::default());
        store.initialize(["BTCUSD"]);
        let now = Utc::now();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for _ in 0..250 {
                        store.record_sample("BTCUSD", Decimal::ONE, now).unwrap();
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(store.window("BTCUSD").unwrap().len(), 1_000);
    }
}
