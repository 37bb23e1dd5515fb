use crate::error::{Error, Result};
use crate::host::{Host, Listener};
use crate::transport::Listen;
use crate::PROTOCOL_ID;
use std::convert::Infallible;
use std::future::Future;
use std::mem;
use std::sync::Arc;
use std::time::Duration;
use tonic::body::BoxBody;
use tonic::codegen::http::{Request, Response};
use tonic::server::NamedService;
use tonic::service::Routes;
use tonic::transport::server::Router;
use tower::Service;

/// Rpc server settings. Everything except `protocol` is handed to tonic as is.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub protocol: String,
    /// Per-request deadline.
    pub timeout: Option<Duration>,
    pub concurrency_limit_per_connection: Option<usize>,
    pub http2_keepalive_interval: Option<Duration>,
    pub http2_keepalive_timeout: Option<Duration>,
    pub max_concurrent_streams: Option<u32>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            protocol: PROTOCOL_ID.to_string(),
            timeout: None,
            concurrency_limit_per_connection: None,
            http2_keepalive_interval: None,
            http2_keepalive_timeout: None,
            max_concurrent_streams: None,
        }
    }
}

impl ServerConfig {
    fn builder(&self) -> tonic::transport::Server {
        let mut builder = tonic::transport::Server::builder()
            .http2_keepalive_interval(self.http2_keepalive_interval)
            .http2_keepalive_timeout(self.http2_keepalive_timeout)
            .max_concurrent_streams(self.max_concurrent_streams);

        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(limit) = self.concurrency_limit_per_connection {
            builder = builder.concurrency_limit_per_connection(limit);
        }

        builder
    }
}

/// Non-owning handle to a [`Server`], for a client in the same process that
/// should talk the same protocol tag.
#[derive(Debug, Clone)]
pub struct ServerRef {
    protocol: Arc<str>,
}

impl ServerRef {
    pub fn protocol(&self) -> &str {
        &self.protocol
    }
}

/// An rpc server fed by substrate streams for one protocol tag.
///
/// Construction only allocates; nothing is accepted until [`serve`](Server::serve),
/// so every service can be registered first. Services added after `serve` has
/// started are not possible: `serve` consumes the server.
pub struct Server<L = Host> {
    listen: L,
    config: ServerConfig,
    routes: Routes,
}

impl Server<Host> {
    pub fn new(host: Host, config: ServerConfig) -> Self {
        Self::with_listener(host, config)
    }
}

impl<L: Listen> Server<L> {
    /// Like [`Server::new`] but with a caller supplied listening primitive.
    pub fn with_listener(listen: L, config: ServerConfig) -> Self {
        Self {
            listen,
            config,
            routes: Routes::default(),
        }
    }

    pub fn protocol(&self) -> &str {
        &self.config.protocol
    }

    pub fn server_ref(&self) -> ServerRef {
        ServerRef {
            protocol: self.config.protocol.as_str().into(),
        }
    }

    /// Registers a tonic generated service, e.g. `EchoServer::new(svc)`.
    pub fn add_service<S>(&mut self, svc: S) -> &mut Self
    where
        S: Service<Request<BoxBody>, Response = Response<BoxBody>, Error = Infallible>
            + NamedService
            + Clone
            + Send
            + 'static,
        S::Future: Send + 'static,
    {
        log::debug!("registering {} on {}", S::NAME, self.config.protocol);
        self.routes = mem::take(&mut self.routes).add_service(svc);
        self
    }

    fn start(self) -> Result<(Router, Listener, String)> {
        let listener = self
            .listen
            .listen(&self.config.protocol)
            .map_err(Error::Listen)?;

        let mut builder = self.config.builder();
        let router = builder.add_routes(self.routes);

        log::info!("serving rpc on {}", self.config.protocol);
        Ok((router, listener, self.config.protocol))
    }

    /// Runs the accept loop until the listener closes, blocking the calling task.
    ///
    /// Fails right away if the protocol tag cannot be listened on. A closed
    /// listener (e.g. the host shut down) ends serving with `Ok(())`.
    pub async fn serve(self) -> Result<()> {
        let (router, listener, protocol) = self.start()?;
        let r = router.serve_with_incoming(listener).await;
        log::info!("rpc server on {} stopped", protocol);
        r.map_err(Error::Serve)
    }

    /// Like [`serve`](Server::serve), and also stops gracefully once `signal`
    /// completes.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let (router, listener, protocol) = self.start()?;
        let r = router.serve_with_incoming_shutdown(listener, signal).await;
        log::info!("rpc server on {} stopped", protocol);
        r.map_err(Error::Serve)
    }
}
