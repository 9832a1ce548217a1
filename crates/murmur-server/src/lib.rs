mod health;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use murmur_config::Config;
use tower_http::trace::TraceLayer;
use tts::PluginRegistry;

/// Assembled server with all routes and middleware
pub struct Server {
    router: Router,
    listen_address: SocketAddr,
    tts: Arc<tts::Server>,
}

impl Server {
    /// Build the server from configuration with the built-in engine plugins
    ///
    /// # Errors
    ///
    /// Returns an error if the TTS subsystem cannot be built or a preload
    /// language fails to construct
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        Self::with_registry(config, PluginRegistry::builtin()).await
    }

    /// Build the server from configuration with a custom plugin registry
    ///
    /// # Errors
    ///
    /// Returns an error if the TTS subsystem cannot be built or a preload
    /// language fails to construct
    pub async fn with_registry(config: Config, registry: PluginRegistry) -> anyhow::Result<Self> {
        let listen_address = config.server.listen_address();

        let tts_state = tts::build_server_with_registry(&config, registry)?;

        // Warm engines before accepting traffic
        tts_state
            .preload()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to preload TTS engines: {e}"))?;

        let mut app = Router::new();

        // Health check
        if config.server.health.enabled {
            app = app.route(
                &config.server.health.path,
                axum::routing::get(health::health_handler).with_state(Arc::clone(&tts_state)),
            );
        }

        // TTS routes
        app = app.merge(tts::endpoint_router().with_state(Arc::clone(&tts_state)));

        // Tracing
        app = app.layer(TraceLayer::new_for_http());

        Ok(Self {
            router: app,
            listen_address,
            tts: tts_state,
        })
    }

    /// Get the configured listen address
    #[must_use]
    pub const fn listen_address(&self) -> SocketAddr {
        self.listen_address
    }

    /// Shared TTS state, for inspecting loaded engines
    #[must_use]
    pub fn tts_state(&self) -> Arc<tts::Server> {
        Arc::clone(&self.tts)
    }

    /// Consume the server and return the inner router
    ///
    /// Useful for testing when the caller manages the listener
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Start serving requests
    ///
    /// Blocks until the cancellation token is triggered, then releases every
    /// loaded engine.
    ///
    /// # Errors
    ///
    /// Returns an error if binding the TCP listener or serving fails
    pub async fn serve(self, shutdown: tokio_util::sync::CancellationToken) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.listen_address).await?;
        let local_addr = listener.local_addr()?;
        tracing::info!(%local_addr, "server listening");

        self.serve_on(listener, shutdown).await
    }

    /// Serve on an already bound listener
    ///
    /// # Errors
    ///
    /// Returns an error if serving fails
    pub async fn serve_on(
        self,
        listener: tokio::net::TcpListener,
        shutdown: tokio_util::sync::CancellationToken,
    ) -> anyhow::Result<()> {
        let Self { router, tts, .. } = self;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.cancelled().await;
                tracing::info!("graceful shutdown initiated");
            })
            .await?;

        tts.shutdown().await;

        Ok(())
    }
}
