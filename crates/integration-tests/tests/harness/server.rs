//! Test server wrapper that starts murmur on a random port

use std::net::SocketAddr;
use std::sync::Arc;

use murmur_config::Config;
use murmur_server::Server;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tts::PluginRegistry;

/// A running test server instance
pub struct TestServer {
    addr: SocketAddr,
    shutdown: CancellationToken,
    client: reqwest::Client,
    tts: Arc<tts::Server>,
    task: Option<JoinHandle<anyhow::Result<()>>>,
}

impl TestServer {
    /// Start a test server with the given configuration
    ///
    /// Binds to port 0 for automatic port assignment
    pub async fn start(config: Config) -> anyhow::Result<Self> {
        Self::start_with_registry(config, PluginRegistry::builtin()).await
    }

    /// Start a test server with a custom plugin registry
    pub async fn start_with_registry(config: Config, registry: PluginRegistry) -> anyhow::Result<Self> {
        let server = Server::with_registry(config, registry).await?;
        let tts = server.tts_state();
        let shutdown = CancellationToken::new();

        // Bind the listener here so we know the actual port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let task = tokio::spawn(server.serve_on(listener, shutdown.clone()));

        let client = reqwest::Client::new();

        Ok(Self {
            addr,
            shutdown,
            client,
            tts,
            task: Some(task),
        })
    }

    /// Base URL of the running test server
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    /// Get a reference to the HTTP client
    pub fn client(&self) -> &reqwest::Client {
        &self.client
    }

    /// Server address
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// TTS state shared with the running server
    pub fn tts(&self) -> &tts::Server {
        &self.tts
    }

    /// Owned handle that outlives the server, for checking shutdown effects
    pub fn tts_handle(&self) -> Arc<tts::Server> {
        Arc::clone(&self.tts)
    }

    /// `GET /tts` with the given query pairs
    pub async fn speak(&self, query: &[(&str, &str)]) -> reqwest::Response {
        self.client
            .get(self.url("/tts"))
            .query(query)
            .send()
            .await
            .expect("request reaches the server")
    }

    /// Trigger graceful shutdown and wait for the server to finish
    pub async fn stop(mut self) -> anyhow::Result<()> {
        self.shutdown.cancel();
        match self.task.take() {
            Some(task) => task.await?,
            None => Ok(()),
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
