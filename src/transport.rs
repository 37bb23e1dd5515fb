//! The two substrate primitives the rpc bindings are built on.
//!
//! [`Host`] implements both. Tests and alternative substrates can plug in their
//! own implementations, e.g. a listener that always fails.

use crate::host::{Host, Listener, PeerStream};
use crate::peer::PeerId;
use async_trait::async_trait;
use std::io::Result;

/// Opens outbound streams by peer identity.
#[async_trait]
pub trait Dial: Clone + Send + Sync + 'static {
    async fn dial(&self, peer: &PeerId, protocol: &str) -> Result<PeerStream>;
}

/// Registers interest in inbound streams for a protocol tag.
pub trait Listen: Send + Sync {
    fn listen(&self, protocol: &str) -> Result<Listener>;
}

#[async_trait]
impl Dial for Host {
    async fn dial(&self, peer: &PeerId, protocol: &str) -> Result<PeerStream> {
        Host::dial(self, peer, protocol).await
    }
}

impl Listen for Host {
    fn listen(&self, protocol: &str) -> Result<Listener> {
        Host::listen(self, protocol)
    }
}
