use super::stream::PeerStream;
use crate::error::{Error, Result};
use futures::Stream;
use std::collections::HashMap;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::sync::mpsc::{Receiver, Sender};

#[derive(Debug)]
pub(crate) struct Registration {
    pub(crate) id: u64,
    pub(crate) tx: Sender<PeerStream>,
}

pub(crate) type ProtocolMap = Arc<Mutex<HashMap<String, Registration>>>;

/// Inbound streams for one protocol tag on a [`Host`](super::Host).
///
/// Closing (or dropping) the listener unregisters the tag; dialers then get
/// `protocol not supported`. Streams already queued but not yet accepted are
/// dropped on close.
#[derive(Debug)]
pub struct Listener {
    protocol: String,
    id: u64,
    protocols: ProtocolMap,
    rx: Receiver<PeerStream>,
    closed: bool,
}

impl Listener {
    pub(crate) fn new(
        protocol: String,
        id: u64,
        protocols: ProtocolMap,
        rx: Receiver<PeerStream>,
    ) -> Self {
        Self {
            protocol,
            id,
            protocols,
            rx,
            closed: false,
        }
    }

    pub fn protocol(&self) -> &str {
        &self.protocol
    }

    /// Waits for the next inbound stream. Returns [`Error::ListenerClosed`] once
    /// the listener or its host has been closed.
    pub async fn accept(&mut self) -> Result<PeerStream> {
        if self.closed {
            return Err(Error::ListenerClosed);
        }
        self.rx.recv().await.ok_or(Error::ListenerClosed)
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        {
            let mut protocols = self.protocols.lock().unwrap();
            if let Some(r) = protocols.get(&self.protocol) {
                if r.id == self.id {
                    protocols.remove(&self.protocol);
                }
            }
        }

        self.rx.close();
        while let Ok(s) = self.rx.try_recv() {
            log::debug!("dropping pending {} stream from {}", self.protocol, s.remote().fmt_short());
        }

        log::debug!("listener for {} closed", self.protocol);
    }
}

impl Drop for Listener {
    fn drop(&mut self) {
        self.close();
    }
}

impl Stream for Listener {
    type Item = io::Result<PeerStream>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.closed {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx).map(|s| s.map(Ok))
    }
}
