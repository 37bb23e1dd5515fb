//! A minimal peer-to-peer substrate on top of iroh.
//!
//! A [`Host`] owns an iroh endpoint. All streams to one peer share a single QUIC
//! connection, which iroh authenticates against the peer id on both ends. Every
//! stream starts with an `OpenStream` frame naming the protocol tag; the receiving
//! host routes it to the [`Listener`] registered for that tag, or rejects it.

mod listener;
mod stream;
pub(crate) mod wire;

pub use listener::Listener;
pub use stream::{PeerStream, StreamInfo};

use crate::peer::{Keypair, PeerId};
use crate::proto::p2pgrpc::{OpenReply, OpenStream};
use iroh::endpoint::{Connection, Incoming, RecvStream, SendStream};
use iroh::{Endpoint, NodeAddr, RelayMode};
use listener::{ProtocolMap, Registration};
use std::collections::HashMap;
use std::fmt::Display;
use std::io::{Error, ErrorKind, ErrorKind::Other, Result};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::{io::AsyncWriteExt, select, sync::mpsc::channel, task, time::timeout};
use tokio_util::sync::CancellationToken;

/// ALPN of the host's QUIC connections. Protocol tags are negotiated per stream.
pub const ALPN: &[u8] = b"/p2pgrpc/streams/1";

#[derive(Debug, Clone)]
pub struct HostConfig {
    pub listen_addr: SocketAddr,
    /// Upper bound for connecting to a peer and opening one stream.
    pub dial_timeout: Duration,
    /// How long an inbound stream may take to name its protocol tag, and then
    /// wait for room in the listener's backlog.
    pub handshake_timeout: Duration,
    /// Streams queued per protocol tag before new ones wait for `accept`.
    pub accept_backlog: usize,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 0).into(),
            dial_timeout: Duration::from_secs(10),
            handshake_timeout: Duration::from_secs(5),
            accept_backlog: 16,
        }
    }
}

/// Known direct addresses of remote peers.
#[derive(Debug, Clone, Default)]
pub struct Peerstore {
    addrs: Arc<Mutex<HashMap<PeerId, Vec<SocketAddr>>>>,
}

impl Peerstore {
    pub fn add_addr(&self, peer: PeerId, addr: SocketAddr) {
        let mut addrs = self.addrs.lock().unwrap();
        let known = addrs.entry(peer).or_default();
        if !known.contains(&addr) {
            log::trace!("peer {} at {}", peer.fmt_short(), addr);
            known.push(addr);
        }
    }

    pub fn addrs(&self, peer: &PeerId) -> Vec<SocketAddr> {
        self.addrs
            .lock()
            .unwrap()
            .get(peer)
            .cloned()
            .unwrap_or_default()
    }

    pub fn peers(&self) -> Vec<PeerId> {
        let mut peers: Vec<_> = self.addrs.lock().unwrap().keys().copied().collect();
        peers.sort();
        peers
    }
}

/// The local participant: identity, endpoint and address book.
///
/// Cloning is cheap and shares the same host. The host stops accepting when
/// [`close`](Host::close) is called or the last clone is dropped.
#[derive(Clone)]
pub struct Host {
    inner: Arc<Inner>,
}

struct Inner {
    id: PeerId,
    endpoint: Endpoint,
    addrs: Vec<SocketAddr>,
    config: HostConfig,
    peers: Peerstore,
    protocols: ProtocolMap,
    connections: Mutex<HashMap<PeerId, Connection>>,
    next_listener: AtomicU64,
    exit: CancellationToken,
}

impl Drop for Inner {
    fn drop(&mut self) {
        self.exit.cancel();
    }
}

fn other<E: Display>(e: E) -> Error {
    Error::new(Other, e.to_string())
}

impl Host {
    pub async fn new(keypair: Keypair, config: HostConfig) -> Result<Self> {
        let builder = Endpoint::builder()
            .secret_key(keypair.secret().clone())
            .alpns(vec![ALPN.to_vec()])
            .relay_mode(RelayMode::Disabled);
        let builder = match config.listen_addr {
            SocketAddr::V4(addr) => builder.bind_addr_v4(addr),
            SocketAddr::V6(addr) => builder.bind_addr_v6(addr),
        };
        let endpoint = builder.bind().await.map_err(other)?;

        let (v4, v6) = endpoint.bound_sockets();
        let addrs: Vec<_> = std::iter::once(v4).chain(v6).collect();
        let id = endpoint.node_id();

        let inner = Arc::new(Inner {
            id,
            endpoint: endpoint.clone(),
            addrs,
            config: config.clone(),
            peers: Default::default(),
            protocols: Default::default(),
            connections: Default::default(),
            next_listener: AtomicU64::new(1),
            exit: CancellationToken::new(),
        });

        let acceptor = Acceptor {
            config,
            protocols: inner.protocols.clone(),
            exit: inner.exit.clone(),
        };
        task::spawn(acceptor.run(endpoint));

        log::debug!("host {} listening on {:?}", id.fmt_short(), inner.addrs);

        Ok(Self { inner })
    }

    pub fn id(&self) -> PeerId {
        self.inner.id
    }

    pub fn addrs(&self) -> Vec<SocketAddr> {
        self.inner.addrs.clone()
    }

    pub fn peerstore(&self) -> &Peerstore {
        &self.inner.peers
    }

    /// Protocol tags with a registered listener, sorted.
    pub fn protocols(&self) -> Vec<String> {
        let mut protocols: Vec<_> = self.inner.protocols.lock().unwrap().keys().cloned().collect();
        protocols.sort();
        protocols
    }

    pub fn is_closed(&self) -> bool {
        self.inner.exit.is_cancelled()
    }

    /// Stops accepting streams, closes every listener and shuts the endpoint
    /// down.
    pub async fn close(&self) {
        {
            let mut protocols = self.inner.protocols.lock().unwrap();
            if !self.inner.exit.is_cancelled() {
                log::debug!("closing host {}", self.inner.id.fmt_short());
            }
            self.inner.exit.cancel();
            protocols.clear();
        }
        self.inner.connections.lock().unwrap().clear();
        self.inner.endpoint.close().await;
    }

    /// Opens a stream to `peer` for `protocol`. The remote must prove it holds
    /// the key behind `peer`; a different node at a known address is refused.
    pub async fn dial(&self, peer: &PeerId, protocol: &str) -> Result<PeerStream> {
        if self.is_closed() {
            return Err(Error::new(Other, "host closed"));
        }

        timeout(self.inner.config.dial_timeout, self.open_stream(peer, protocol))
            .await
            .map_err(|_| Error::new(ErrorKind::TimedOut, "dial timeout"))?
    }

    async fn open_stream(&self, peer: &PeerId, protocol: &str) -> Result<PeerStream> {
        let conn = self.connection(peer).await?;
        let (mut send, mut recv) = match conn.open_bi().await {
            Ok(s) => s,
            Err(e) => {
                log::debug!("connection to {} unusable: {}", peer.fmt_short(), e);
                self.forget(peer, &conn);
                self.connection(peer).await?.open_bi().await.map_err(other)?
            }
        };

        wire::write_msg(&mut send, &wire::new_open(protocol)).await?;
        let reply: OpenReply = wire::read_msg(&mut recv).await?;
        if !reply.accepted {
            return Err(Error::new(Other, reply.reason));
        }

        log::debug!("opened {} stream to {}", protocol, peer.fmt_short());
        Ok(PeerStream::new(send, recv, *peer, protocol.into()))
    }

    /// The live connection to `peer`, connecting over its known addresses if
    /// there is none.
    async fn connection(&self, peer: &PeerId) -> Result<Connection> {
        if let Some(conn) = self.inner.connections.lock().unwrap().get(peer) {
            if conn.close_reason().is_none() {
                return Ok(conn.clone());
            }
        }

        let addrs = self.inner.peers.addrs(peer);
        if addrs.is_empty() {
            return Err(Error::new(
                Other,
                format!("no addresses for peer {}", peer.fmt_short()),
            ));
        }

        let addr = NodeAddr::new(*peer).with_direct_addresses(addrs);
        let conn = self.inner.endpoint.connect(addr, ALPN).await.map_err(other)?;
        log::debug!("connected to {}", peer.fmt_short());

        self.inner
            .connections
            .lock()
            .unwrap()
            .insert(*peer, conn.clone());
        Ok(conn)
    }

    fn forget(&self, peer: &PeerId, conn: &Connection) {
        let mut connections = self.inner.connections.lock().unwrap();
        if let Some(c) = connections.get(peer) {
            if c.stable_id() == conn.stable_id() {
                connections.remove(peer);
            }
        }
    }

    /// Registers `protocol` and returns the listener that receives its streams.
    /// Fails if the tag already has a listener on this host.
    pub fn listen(&self, protocol: &str) -> Result<Listener> {
        if protocol.is_empty() {
            return Err(Error::new(ErrorKind::InvalidInput, "empty protocol"));
        }

        let mut protocols = self.inner.protocols.lock().unwrap();
        if self.is_closed() {
            return Err(Error::new(Other, "host closed"));
        }
        if protocols.contains_key(protocol) {
            return Err(Error::new(
                ErrorKind::AlreadyExists,
                format!("protocol {} already registered", protocol),
            ));
        }

        let (tx, rx) = channel(self.inner.config.accept_backlog.max(1));
        let id = self.inner.next_listener.fetch_add(1, Ordering::Relaxed);
        protocols.insert(protocol.to_string(), Registration { id, tx });

        log::debug!("host {} listening for {}", self.inner.id.fmt_short(), protocol);
        Ok(Listener::new(
            protocol.to_string(),
            id,
            self.inner.protocols.clone(),
            rx,
        ))
    }
}

#[derive(Clone)]
struct Acceptor {
    config: HostConfig,
    protocols: ProtocolMap,
    exit: CancellationToken,
}

impl Acceptor {
    async fn run(self, endpoint: Endpoint) {
        loop {
            let incoming = select! {
                _ = self.exit.cancelled() => break,
                r = endpoint.accept() => match r {
                    Some(incoming) => incoming,
                    None => break,
                },
            };

            let acceptor = self.clone();
            task::spawn(async move {
                if let Err(e) = acceptor.handle_connection(incoming).await {
                    log::debug!("inbound connection failed: {}", e);
                }
            });
        }

        self.protocols.lock().unwrap().clear();
    }

    async fn handle_connection(&self, incoming: Incoming) -> Result<()> {
        let conn = incoming.await.map_err(other)?;
        let remote = conn.remote_node_id().map_err(other)?;
        log::debug!("connection from {}", remote.fmt_short());

        loop {
            let (send, recv) = select! {
                _ = self.exit.cancelled() => return Ok(()),
                r = conn.accept_bi() => match r {
                    Ok(s) => s,
                    Err(e) => {
                        log::debug!("connection from {} closed: {}", remote.fmt_short(), e);
                        return Ok(());
                    }
                },
            };

            let acceptor = self.clone();
            task::spawn(async move {
                if let Err(e) = acceptor.handle_stream(remote, send, recv).await {
                    log::debug!("inbound stream from {} failed: {}", remote.fmt_short(), e);
                }
            });
        }
    }

    async fn handle_stream(&self, remote: PeerId, mut send: SendStream, mut recv: RecvStream) -> Result<()> {
        let open: OpenStream = timeout(self.config.handshake_timeout, wire::read_msg(&mut recv))
            .await
            .map_err(|_| Error::new(ErrorKind::TimedOut, "handshake timeout"))??;
        log::trace!("open {} from {}", open.protocol, remote.fmt_short());

        let tx = self
            .protocols
            .lock()
            .unwrap()
            .get(&open.protocol)
            .map(|r| r.tx.clone());
        let permit = match tx {
            None => Err(wire::PROTOCOL_NOT_SUPPORTED),
            Some(tx) => match timeout(self.config.handshake_timeout, tx.reserve_owned()).await {
                Ok(Ok(permit)) => Ok(permit),
                // listener closed while waiting
                Ok(Err(_)) => Err(wire::PROTOCOL_NOT_SUPPORTED),
                Err(_) => Err(wire::LISTENER_BUSY),
            },
        };

        let permit = match permit {
            Ok(permit) => permit,
            Err(reason) => {
                log::debug!("rejecting {} stream from {}: {}", open.protocol, remote.fmt_short(), reason);
                wire::write_msg(&mut send, &wire::new_reply(Some(reason))).await?;
                return send.shutdown().await;
            }
        };

        wire::write_msg(&mut send, &wire::new_reply(None)).await?;

        log::debug!("accepted {} stream from {}", open.protocol, remote.fmt_short());
        permit.send(PeerStream::new(send, recv, remote, open.protocol.into()));
        Ok(())
    }
}
