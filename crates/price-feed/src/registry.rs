//! Source registry - owns every source and merges their averages

use futures::future::join_all;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use ticker_core::{
    normalize_symbol, RegistryError, ServiceConfig, SourceAverage, SourceConfig, SymbolQuery,
};

use crate::poller::{PollerStatus, PollerStatusSnapshot, SourcePoller};
use crate::sources::{build_source, QuoteSource};
use crate::store::{StoreConfig, SymbolStore, SymbolStoreStats};

/// One upstream with its store and poller status
pub struct Source {
    config: SourceConfig,
    adapter: Arc<dyn QuoteSource>,
    store: Arc<SymbolStore>,
    status: Arc<PollerStatus>,
}

impl Source {
    pub fn new(config: SourceConfig, adapter: Arc<dyn QuoteSource>, store: StoreConfig) -> Self {
        Self {
            config,
            adapter,
            store: Arc::new(SymbolStore::new(store)),
            status: Arc::new(PollerStatus::new()),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &SourceConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<SymbolStore> {
        &self.store
    }

    pub fn status(&self) -> &Arc<PollerStatus> {
        &self.status
    }

    /// Only sources whose discovery succeeded take part in aggregation
    pub fn is_answerable(&self) -> bool {
        self.store.is_initialized()
    }

    pub fn poller(&self) -> SourcePoller {
        SourcePoller::new(
            self.config.clone(),
            Arc::clone(&self.adapter),
            Arc::clone(&self.store),
            Arc::clone(&self.status),
        )
    }
}

/// Health summary for one source
#[derive(Debug, Clone)]
pub struct SourceHealth {
    pub name: String,
    pub answerable: bool,
    pub poller: PollerStatusSnapshot,
    pub store: SymbolStoreStats,
}

/// Registry of all sources; read-only once polling starts
pub struct AggregationRegistry {
    sources: BTreeMap<String, Arc<Source>>,
    started: AtomicBool,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl AggregationRegistry {
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            sources: BTreeMap::new(),
            started: AtomicBool::new(false),
            shutdown_tx,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// Build a registry with an HTTP adapter for every enabled source
    pub fn from_config(config: &ServiceConfig) -> anyhow::Result<Self> {
        let store = StoreConfig::from(&config.window);
        let mut registry = Self::new();

        for source in config.enabled_sources() {
            let adapter = build_source(source)?;
            registry.register(Source::new(source.clone(), adapter, store.clone()))?;
        }

        Ok(registry)
    }

    /// Add a source. Only allowed before [`AggregationRegistry::start`].
    pub fn register(&mut self, source: Source) -> Result<(), RegistryError> {
        if self.is_started() {
            return Err(RegistryError::AlreadyStarted);
        }
        if self.sources.contains_key(source.name()) {
            return Err(RegistryError::DuplicateSource(source.name().to_string()));
        }

        info!("Registered source {} ({})", source.name(), source.config().kind);
        self.sources.insert(source.name().to_string(), Arc::new(source));
        Ok(())
    }

    /// Spawn one poller task per source
    pub fn start(&self) {
        if self.started.swap(true, Ordering::SeqCst) {
            warn!("Registry already started");
            return;
        }

        let mut handles = self.handles.lock();
        for source in self.sources.values() {
            let poller = source.poller();
            let shutdown = self.shutdown_tx.subscribe();

            handles.push(tokio::spawn(async move {
                poller.run(shutdown).await;
            }));
            info!("Started poller for {}", source.name());
        }
    }

    /// Signal every poller and wait for them to finish their current cycle
    pub async fn stop(&self) {
        info!("Stopping {} pollers", self.sources.len());
        self.shutdown_tx.send_replace(true);

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for result in join_all(handles).await {
            if let Err(e) = result {
                error!("Poller task ended abnormally: {}", e);
            }
        }
    }

    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    pub fn source(&self, name: &str) -> Option<&Arc<Source>> {
        self.sources.get(name)
    }

    pub fn source_names(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// Averages for `symbol` from every source that has one, by source name
    pub fn lookup(&self, symbol: &str) -> Vec<SourceAverage> {
        let symbol = normalize_symbol(symbol);

        self.answerable()
            .filter_map(|source| {
                source
                    .store
                    .lookup(&symbol)
                    .map(|avg| SourceAverage::new(source.name(), avg))
            })
            .collect()
    }

    /// Like [`AggregationRegistry::lookup`] but tells "unknown" from "no data yet"
    pub fn query(&self, symbol: &str) -> SymbolQuery {
        let averages = self.lookup(symbol);
        if !averages.is_empty() {
            return SymbolQuery::Found(averages);
        }

        let symbol = normalize_symbol(symbol);
        if self.answerable().any(|source| source.store.contains(&symbol)) {
            SymbolQuery::NoData
        } else {
            SymbolQuery::NotFound
        }
    }

    /// Every known symbol with its per-source averages.
    ///
    /// Symbols without any fresh average map to an empty list.
    pub fn snapshot_all(&self) -> BTreeMap<String, Vec<SourceAverage>> {
        let mut merged: BTreeMap<String, Vec<SourceAverage>> = BTreeMap::new();

        // Sources are visited in name order, so each list comes out sorted.
        for source in self.answerable() {
            let averages = source.store.all_averages();

            for symbol in source.store.symbols() {
                let entry = merged.entry(symbol.clone()).or_default();
                if let Some(avg) = averages.get(&symbol) {
                    entry.push(SourceAverage::new(source.name(), *avg));
                }
            }
        }

        merged
    }

    /// Union of symbols known to answerable sources
    pub fn symbols(&self) -> BTreeSet<String> {
        self.answerable()
            .flat_map(|source| source.store.symbols())
            .collect()
    }

    pub fn source_health(&self) -> Vec<SourceHealth> {
        self.sources
            .values()
            .map(|source| SourceHealth {
                name: source.name().to_string(),
                answerable: source.is_answerable(),
                poller: source.status.snapshot(),
                store: source.store.stats(),
            })
            .collect()
    }

    fn answerable(&self) -> impl Iterator<Item = &Arc<Source>> {
        self.sources.values().filter(|source| source.is_answerable())
    }
}

impl Default for AggregationRegistry {
    fn default() -> Self {
        Self::new()
    }
}
