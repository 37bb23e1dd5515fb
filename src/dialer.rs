use crate::error::{Error, Result};
use crate::host::{Host, PeerStream};
use crate::peer::{parse_peer_id, PeerId};
use crate::transport::Dial;
use futures::future::BoxFuture;
use hyper_util::rt::TokioIo;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::select;
use tokio_util::sync::CancellationToken;
use tonic::transport::Uri;
use tower::Service;

/// Turns an rpc-level address (a peer id string) into a stream for a fixed
/// protocol tag.
#[derive(Clone)]
pub struct Dialer<D = Host> {
    transport: D,
    protocol: Arc<str>,
    cancel: CancellationToken,
}

impl<D: Dial> Dialer<D> {
    pub fn new(transport: D, protocol: impl Into<Arc<str>>) -> Self {
        Self {
            transport,
            protocol: protocol.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Aborts in-flight and future dials once `cancel` fires.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    pub(crate) fn with_protocol(mut self, protocol: &str) -> Self {
        self.protocol = protocol.into();
        self
    }

    pub async fn dial(&self, addr: &str) -> Result<PeerStream> {
        let peer = parse_peer_id(addr)?;

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        select! {
            biased;
            _ = self.cancel.cancelled() => {
                log::debug!("dial {} cancelled", peer.fmt_short());
                Err(Error::Cancelled)
            }
            r = self.transport.dial(&peer, &self.protocol) => r.map_err(Error::Dial),
        }
    }

    /// The dialer as a tonic connector. The uri host must be a peer id.
    pub fn connector(&self) -> Connector<D> {
        Connector {
            dialer: self.clone(),
        }
    }
}

#[derive(Clone)]
pub struct Connector<D = Host> {
    dialer: Dialer<D>,
}

impl<D: Dial> Service<Uri> for Connector<D> {
    type Response = TokioIo<PeerStream>;
    type Error = Error;
    type Future = BoxFuture<'static, Result<Self::Response>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, uri: Uri) -> Self::Future {
        let dialer = self.dialer.clone();
        Box::pin(async move {
            let addr = uri.host().unwrap_or_default();
            log::trace!("connecting {} over {}", addr, dialer.protocol());
            dialer.dial(addr).await.map(TokioIo::new)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::testing::pair;
    use crate::peer::Keypair;
    use async_trait::async_trait;
    use std::io;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::time::timeout;

    const PROTO: &str = "/test/1.0.0";

    #[derive(Clone, Default)]
    struct Unreachable {
        calls: Arc<AtomicUsize>,
        hang: bool,
    }

    #[async_trait]
    impl Dial for Unreachable {
        async fn dial(&self, _peer: &PeerId, _protocol: &str) -> io::Result<PeerStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                futures::future::pending::<()>().await;
            }
            Err(io::Error::new(io::ErrorKind::Other, "unreachable"))
        }
    }

    #[tokio::test]
    async fn test_invalid_address() {
        let transport = Unreachable::default();
        let dialer = Dialer::new(transport.clone(), PROTO);

        for addr in ["127.0.0.1:5000", "not-a-peer", ""] {
            match dialer.dial(addr).await {
                Err(Error::InvalidPeerAddress { addr: a, .. }) => assert_eq!(a, addr),
                r => panic!("unexpected {:?}", r.map(|_| ())),
            }
        }
        assert_eq!(transport.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_dial_failure() {
        let dialer = Dialer::new(Unreachable::default(), PROTO);
        let peer = Keypair::generate().public();

        let err = dialer.dial(&peer.to_string()).await.unwrap_err();
        assert!(matches!(err, Error::Dial(_)));
        assert_eq!(err.to_string(), "dial failure: unreachable");
    }

    #[tokio::test]
    async fn test_cancelled_before_dial() {
        let (a, b) = pair().await;
        let mut listener = b.listen(PROTO).unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let dialer = Dialer::new(a, PROTO).with_cancel(cancel);

        let err = timeout(Duration::from_secs(1), dialer.dial(&b.id().to_string()))
            .await
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));

        assert!(timeout(Duration::from_millis(200), listener.accept())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_cancelled_during_dial() {
        let transport = Unreachable {
            hang: true,
            ..Default::default()
        };
        let cancel = CancellationToken::new();
        let dialer = Dialer::new(transport.clone(), PROTO).with_cancel(cancel.clone());
        let addr = Keypair::generate().public().to_string();

        let dial = tokio::spawn(async move { dialer.dial(&addr).await.map(|_| ()) });
        while transport.calls.load(Ordering::SeqCst) == 0 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let r = timeout(Duration::from_secs(1), dial).await.unwrap().unwrap();
        assert!(matches!(r, Err(Error::Cancelled)));
    }

    #[tokio::test]
    async fn test_protocol_mismatch() {
        let (a, b) = pair().await;
        let _listener = b.listen(PROTO).unwrap();

        let err = Dialer::new(a, "/bad/proto")
            .dial(&b.id().to_string())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Dial(_)));
        assert_eq!(err.to_string(), "dial failure: protocol not supported");
    }

    #[tokio::test]
    async fn test_connector() {
        let (a, b) = pair().await;
        let mut listener = b.listen(PROTO).unwrap();

        let mut connector = Dialer::new(a.clone(), PROTO).connector();
        let uri: Uri = format!("http://{}", b.id()).parse().unwrap();
        let mut io = connector.call(uri).await.unwrap().into_inner();
        assert_eq!(io.remote(), &b.id());

        let mut inbound = listener.accept().await.unwrap();
        assert_eq!(inbound.remote(), &a.id());

        io.write_all(b"ping").await.unwrap();
        let mut buf = [0; 4];
        inbound.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ping");
    }
}
