//! Windowed multi-source price averages
//!
//! Features:
//! - Per-symbol sliding windows with cached moving averages
//! - Copy-on-write window updates, so readers never see a half-pruned window
//! - One polling task per upstream with graceful shutdown
//! - Cross-source lookups merged at read time

pub mod poller;
pub mod registry;
pub mod sources;
pub mod store;
pub mod window;

#[cfg(test)]
pub(crate) mod testing;

pub use poller::{PollerState, PollerStatus, PollerStatusSnapshot, SourcePoller};
pub use registry::{AggregationRegistry, Source, SourceHealth};
pub use sources::{build_source, BinanceSource, QuoteSource, WexSource};
pub use store::{StoreConfig, SymbolStore, SymbolStoreStats};
pub use window::PriceWindow;
