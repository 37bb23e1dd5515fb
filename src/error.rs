use std::io;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    /// The dial address is not the canonical encoding of a peer id.
    #[error("invalid peer address {addr:?}: {reason}")]
    InvalidPeerAddress { addr: String, reason: String },

    /// The substrate could not open a stream to the peer.
    #[error("dial failure: {0}")]
    Dial(#[source] io::Error),

    #[error("dial cancelled")]
    Cancelled,

    /// `serve` could not register a listener for its protocol tag.
    #[error("listener creation failure: {0}")]
    Listen(#[source] io::Error),

    #[error("listener closed")]
    ListenerClosed,

    /// The rpc server's accept loop stopped with an error.
    #[error("serve terminated: {0}")]
    Serve(#[source] tonic::transport::Error),

    /// Rpc level connection setup failed.
    #[error("connect: {0}")]
    Connect(#[source] tonic::transport::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn invalid_peer_address(addr: &str, reason: impl ToString) -> Self {
        Error::InvalidPeerAddress {
            addr: addr.to_owned(),
            reason: reason.to_string(),
        }
    }
}
