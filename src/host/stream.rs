use crate::peer::PeerId;
use iroh::endpoint::{RecvStream, SendStream};
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tonic::transport::server::Connected;

/// Who is on the other end of a [`PeerStream`].
///
/// The rpc server attaches this to every request arriving over the stream, so
/// handlers can read it with `request.extensions().get::<StreamInfo>()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamInfo {
    pub remote: PeerId,
    pub protocol: Arc<str>,
}

/// A bidirectional byte stream to one peer, opened for one protocol tag.
///
/// Backed by one QUIC stream; all streams to the same peer share a connection.
#[derive(Debug)]
pub struct PeerStream {
    send: SendStream,
    recv: RecvStream,
    remote: PeerId,
    protocol: Arc<str>,
}

impl PeerStream {
    pub(crate) fn new(send: SendStream, recv: RecvStream, remote: PeerId, protocol: Arc<str>) -> Self {
        Self {
            send,
            recv,
            remote,
            protocol,
        }
    }

    pub fn remote(&self) -> &PeerId {
        &self.remote
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub fn info(&self) -> StreamInfo {
        StreamInfo {
            remote: self.remote,
            protocol: self.protocol.clone(),
        }
    }
}

impl Connected for PeerStream {
    type ConnectInfo = StreamInfo;

    fn connect_info(&self) -> Self::ConnectInfo {
        self.info()
    }
}

impl AsyncRead for PeerStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        AsyncRead::poll_read(Pin::new(&mut self.get_mut().recv), cx, buf)
    }
}

impl AsyncWrite for PeerStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        AsyncWrite::poll_write(Pin::new(&mut self.get_mut().send), cx, buf)
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncWrite::poll_flush(Pin::new(&mut self.get_mut().send), cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        AsyncWrite::poll_shutdown(Pin::new(&mut self.get_mut().send), cx)
    }
}
