//! HTTP server configuration and startup

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use ticker_core::HttpConfig;
use ticker_price_feed::AggregationRegistry;

use crate::routes::router;

/// Server configuration
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for HttpServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

impl From<&HttpConfig> for HttpServerConfig {
    fn from(config: &HttpConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Read API server over a shared registry
pub struct HttpServer {
    config: HttpServerConfig,
    registry: Arc<AggregationRegistry>,
}

impl HttpServer {
    pub fn new(config: HttpServerConfig, registry: Arc<AggregationRegistry>) -> Self {
        Self { config, registry }
    }

    pub fn registry(&self) -> &Arc<AggregationRegistry> {
        &self.registry
    }

    /// Start with graceful shutdown
    pub async fn start_with_shutdown(
        &self,
        shutdown: tokio::sync::oneshot::Receiver<()>,
    ) -> anyhow::Result<()> {
        let addr = self.socket_addr()?;
        let listener = TcpListener::bind(addr).await?;

        info!("Starting HTTP server on {} (with graceful shutdown)", addr);

        axum::serve(listener, router(self.registry.clone()))
            .with_graceful_shutdown(async {
                shutdown.await.ok();
                info!("Shutdown signal received");
            })
            .await?;

        Ok(())
    }

    /// Get server address
    pub fn address(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.address().parse()?)
    }
}

/// Builder for server configuration
pub struct HttpServerBuilder {
    config: HttpServerConfig,
    registry: Option<Arc<AggregationRegistry>>,
}

impl HttpServerBuilder {
    pub fn new() -> Self {
        Self {
            config: HttpServerConfig::default(),
            registry: None,
        }
    }

    pub fn config(mut self, config: HttpServerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn registry(mut self, registry: Arc<AggregationRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Without a registry the server answers from an empty one
    pub fn build(self) -> HttpServer {
        let registry = self
            .registry
            .unwrap_or_else(|| Arc::new(AggregationRegistry::new()));
        HttpServer::new(self.config, registry)
    }
}

impl Default for HttpServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
