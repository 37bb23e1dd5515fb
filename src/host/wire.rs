//! Stream header: every stream starts with a u16 big-endian length prefixed
//! `OpenStream` from the dialer, answered by an `OpenReply` from the listener.

use crate::proto::p2pgrpc::{OpenReply, OpenStream};
use protobuf::Message;
use std::io::{Error, ErrorKind::Other, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

const MAX_FRAME_SIZE: usize = 1500;

pub(crate) const PROTOCOL_NOT_SUPPORTED: &str = "protocol not supported";
pub(crate) const LISTENER_BUSY: &str = "listener busy";

pub(crate) fn new_open(protocol: &str) -> OpenStream {
    let mut open = OpenStream::new();
    open.protocol = protocol.to_string();
    open
}

pub(crate) fn new_reply(rejection: Option<&str>) -> OpenReply {
    let mut reply = OpenReply::new();
    reply.accepted = rejection.is_none();
    reply.reason = rejection.unwrap_or_default().to_string();
    reply
}

pub(crate) async fn write_msg<M, W>(w: &mut W, msg: &M) -> Result<()>
where
    M: Message,
    W: AsyncWrite + Unpin,
{
    let buf = msg.write_to_bytes()?;
    if buf.len() > MAX_FRAME_SIZE {
        return Err(Error::new(Other, "message too large"));
    }

    w.write_all(&(buf.len() as u16).to_be_bytes()).await?;
    w.write_all(&buf).await?;
    w.flush().await
}

pub(crate) async fn read_msg<M, R>(r: &mut R) -> Result<M>
where
    M: Message,
    R: AsyncRead + Unpin,
{
    let mut buf = [0; 2];
    r.read_exact(&mut buf).await?;

    let size = u16::from_be_bytes(buf).into();
    if size > MAX_FRAME_SIZE {
        return Err(Error::new(Other, "invalid message size"));
    }
    let mut buf = vec![0; size];
    r.read_exact(&mut buf).await?;

    M::parse_from_bytes(&buf).map_err(|_| Error::new(Other, "invalid message"))
}
