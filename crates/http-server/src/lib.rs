//! HTTP read API for the ticker averager
//!
//! Serves per-source moving averages out of an `AggregationRegistry`

pub mod responses;
pub mod routes;
pub mod server;

pub use routes::router;
pub use server::{HttpServer, HttpServerBuilder, HttpServerConfig};
