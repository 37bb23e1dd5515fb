//!Run gRPC over peer-to-peer streams instead of raw tcp sockets.
//!
//!A gRPC stack wants to dial a `host:port` and get a byte stream back. A peer-to-peer network
//!addresses participants by a cryptographic identity instead, and separates the many streams
//!between two participants by a protocol tag such as [`PROTOCOL_ID`].
//!This crate bridges the two, so tonic clients and servers talk over identity addressed,
//!protocol tagged streams without knowing about either.
//!
//!## How it works
//!On the client side, [`client::Client`] hands tonic a connector ([`dialer::Dialer`]) for
//!endpoints whose authority is a peer id, e.g. `http://<64 hex chars>`. Each connection
//!tonic makes decodes that id and opens a stream to the peer for the client's protocol tag.
//!
//!On the server side, [`server::Server`] registers a listener for its tag on a [`host::Host`]
//!and feeds the accepted streams to tonic's server loop. Services are added before
//![`serve`](server::Server::serve) starts accepting, so no request can reach a
//!service that is not registered yet.
//!
//!The substrate itself is reached only through the [`transport::Dial`] and
//![`transport::Listen`] traits. [`host::Host`] implements both on an iroh endpoint: peers are
//!iroh node ids, each pair of peers shares one authenticated QUIC connection, and every stream
//!on it opens with a header that names the protocol tag. A stream for a tag the remote does not
//!listen on is rejected with `protocol not supported`.
//!
//!```no_run
//!use p2pgrpc::client::{Client, ClientConfig};
//!use p2pgrpc::host::{Host, HostConfig};
//!use p2pgrpc::peer::Keypair;
//!use p2pgrpc::server::{Server, ServerConfig};
//!use p2pgrpc::service::echo::{EchoClient, EchoRequest, EchoServer};
//!use p2pgrpc::service::EchoService;
//!
//!# async fn run() -> Result<(), Box<dyn std::error::Error>> {
//!let server_host = Host::new(Keypair::generate(), HostConfig::default()).await?;
//!let client_host = Host::new(Keypair::generate(), HostConfig::default()).await?;
//!client_host.peerstore().add_addr(server_host.id(), server_host.addrs()[0]);
//!
//!let mut srv = Server::new(server_host.clone(), ServerConfig::default());
//!srv.add_service(EchoServer::new(EchoService::new()));
//!tokio::spawn(srv.serve());
//!
//!let channel = Client::new(client_host, ClientConfig::default()).dial(&server_host.id())?;
//!let mut req = EchoRequest::new();
//!req.message = "hello".into();
//!let reply = EchoClient::new(channel).echo(req).await?;
//!assert_eq!(reply.get_ref().message, "hello");
//!# Ok(())
//!# }
//!```

pub mod client;
pub mod codec;
pub mod dialer;
pub mod error;
pub mod host;
pub mod peer;
#[doc(hidden)]
pub mod proto;
pub mod server;
pub mod service;
pub mod transport;

pub use error::{Error, Result};

/// Protocol tag of gRPC streams unless configured otherwise.
pub const PROTOCOL_ID: &str = "/grpc/0.0.1";
