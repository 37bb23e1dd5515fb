use crate::host::StreamInfo;
use tonic::{Request, Response, Status};

pub use crate::proto::p2pgrpc::{EchoReply, EchoRequest};
pub use generated::echo_client::EchoClient;
pub use generated::echo_server::{Echo, EchoServer};

mod generated {
    include!(concat!(env!("OUT_DIR"), "/p2pgrpc.echo.Echo.rs"));
}

/// Replies with the request message, followed by a fixed suffix, and the
/// caller's peer id.
#[derive(Debug, Default, Clone)]
pub struct EchoService {
    suffix: String,
}

impl EchoService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_suffix<S: Into<String>>(suffix: S) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

#[tonic::async_trait]
impl Echo for EchoService {
    async fn echo(&self, request: Request<EchoRequest>) -> Result<Response<EchoReply>, Status> {
        let caller = request.extensions().get::<StreamInfo>().map(|info| info.remote);
        if let Some(caller) = caller {
            log::trace!("echo from {}", caller.fmt_short());
        }

        let mut reply = EchoReply::new();
        reply.message = format!("{}{}", request.get_ref().message, self.suffix);
        reply.peer_id = caller.map(|id| id.to_string()).unwrap_or_default();
        Ok(Response::new(reply))
    }
}
