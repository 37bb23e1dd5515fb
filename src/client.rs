use crate::dialer::Dialer;
use crate::error::{Error, Result};
use crate::host::Host;
use crate::peer::PeerId;
use crate::server::ServerRef;
use crate::transport::Dial;
use crate::PROTOCOL_ID;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tonic::transport::{Channel, Endpoint};

/// Rpc client settings, applied to every endpoint before caller overrides.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub protocol: String,
    pub connect_timeout: Option<Duration>,
    /// Per-request deadline.
    pub timeout: Option<Duration>,
    pub http2_keep_alive_interval: Option<Duration>,
    pub keep_alive_timeout: Option<Duration>,
    pub concurrency_limit: Option<usize>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            protocol: PROTOCOL_ID.to_string(),
            connect_timeout: None,
            timeout: None,
            http2_keep_alive_interval: None,
            keep_alive_timeout: None,
            concurrency_limit: None,
        }
    }
}

/// Opens rpc channels to peers by identity.
///
/// ```no_run
/// # async fn run(host: p2pgrpc::host::Host, peer: p2pgrpc::peer::PeerId) -> p2pgrpc::Result<()> {
/// use p2pgrpc::client::{Client, ClientConfig};
/// use p2pgrpc::service::echo::{EchoClient, EchoRequest};
///
/// let channel = Client::new(host, ClientConfig::default()).dial(&peer)?;
/// let mut echo = EchoClient::new(channel);
///
/// let mut req = EchoRequest::new();
/// req.message = "hello".into();
/// let reply = echo.echo(req).await.map_err(|e| std::io::Error::other(e.to_string()))?;
/// println!("{}", reply.get_ref().message);
/// # Ok(())
/// # }
/// ```
pub struct Client<D = Host> {
    dialer: Dialer<D>,
    config: ClientConfig,
    server: Option<ServerRef>,
}

impl Client<Host> {
    pub fn new(host: Host, config: ClientConfig) -> Self {
        Self::with_transport(host, config)
    }
}

impl<D: Dial> Client<D> {
    pub fn with_transport(transport: D, config: ClientConfig) -> Self {
        Self {
            dialer: Dialer::new(transport, config.protocol.as_str()),
            config,
            server: None,
        }
    }

    /// Associates a server running in this process; the client then dials with
    /// that server's protocol tag. Only the tag is shared: timeouts, keepalive
    /// and limits still come from this client's [`ClientConfig`].
    pub fn with_server(mut self, server: ServerRef) -> Self {
        self.dialer = self.dialer.with_protocol(server.protocol());
        self.config.protocol = server.protocol().to_string();
        self.server = Some(server);
        self
    }

    pub fn server(&self) -> Option<&ServerRef> {
        self.server.as_ref()
    }

    pub fn protocol(&self) -> &str {
        self.dialer.protocol()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The tonic endpoint for `peer` with this client's settings applied. Its
    /// authority is the peer id, which is what the dialer receives.
    pub fn endpoint(&self, peer: &PeerId) -> Result<Endpoint> {
        let mut endpoint =
            Endpoint::from_shared(format!("http://{}", peer)).map_err(Error::Connect)?;

        if let Some(timeout) = self.config.connect_timeout {
            endpoint = endpoint.connect_timeout(timeout);
        }
        if let Some(timeout) = self.config.timeout {
            endpoint = endpoint.timeout(timeout);
        }
        if let Some(interval) = self.config.http2_keep_alive_interval {
            endpoint = endpoint.http2_keep_alive_interval(interval);
        }
        if let Some(timeout) = self.config.keep_alive_timeout {
            endpoint = endpoint.keep_alive_timeout(timeout);
        }
        if let Some(limit) = self.config.concurrency_limit {
            endpoint = endpoint.concurrency_limit(limit);
        }

        Ok(endpoint)
    }

    /// Returns a channel to `peer` without touching the network. Stream
    /// failures (unreachable peer, protocol not supported) surface on the first
    /// call as `Unavailable`.
    pub fn dial(&self, peer: &PeerId) -> Result<Channel> {
        self.dial_with(&CancellationToken::new(), peer, |endpoint| endpoint)
    }

    /// Like [`dial`](Client::dial). `configure` adjusts the endpoint on top of
    /// the client's settings; the transport is always the peer dialer. Once
    /// `cancel` fires every connection attempt of the channel fails.
    pub fn dial_with<F>(&self, cancel: &CancellationToken, peer: &PeerId, configure: F) -> Result<Channel>
    where
        F: FnOnce(Endpoint) -> Endpoint,
    {
        let endpoint = configure(self.endpoint(peer)?);
        let connector = self.dialer.clone().with_cancel(cancel.clone()).connector();

        log::debug!("dialing {} over {}", peer.fmt_short(), self.protocol());
        Ok(endpoint.connect_with_connector_lazy(connector))
    }

    /// Opens the stream and the rpc connection right away.
    pub async fn connect(&self, peer: &PeerId) -> Result<Channel> {
        self.endpoint(peer)?
            .connect_with_connector(self.dialer.connector())
            .await
            .map_err(Error::Connect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::new_host;
    use crate::server::{Server, ServerConfig};

    #[tokio::test]
    async fn test_endpoint_authority() {
        let host = new_host().await;
        let client = Client::new(host.clone(), ClientConfig::default());

        let endpoint = client.endpoint(&host.id()).unwrap();
        assert_eq!(endpoint.uri().host(), Some(host.id().to_string().as_str()));
        assert_eq!(client.protocol(), PROTOCOL_ID);
        assert!(client.server().is_none());
    }

    #[tokio::test]
    async fn test_with_server() {
        let host = new_host().await;
        let srv = Server::new(
            host.clone(),
            ServerConfig {
                protocol: "/grpc/custom".into(),
                timeout: Some(Duration::from_secs(30)),
                ..Default::default()
            },
        );

        let config = ClientConfig {
            timeout: Some(Duration::from_secs(2)),
            ..Default::default()
        };
        let client = Client::new(host, config).with_server(srv.server_ref());
        assert_eq!(client.protocol(), "/grpc/custom");
        assert_eq!(client.server().unwrap().protocol(), "/grpc/custom");
        assert_eq!(client.config().timeout, Some(Duration::from_secs(2)));
        assert_eq!(client.config().protocol, "/grpc/custom");
    }
}
