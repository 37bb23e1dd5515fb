use crate::host::Host;
use tonic::{Request, Response, Status};

pub use crate::proto::p2pgrpc::{NodeInfoRequest, NodeInfoResponse};
pub use generated::node_info_client::NodeInfoClient;
pub use generated::node_info_server::{NodeInfo, NodeInfoServer};

mod generated {
    include!(concat!(env!("OUT_DIR"), "/p2pgrpc.node.NodeInfo.rs"));
}

/// Describes the host it runs on: id, listen addresses, protocol tags with a
/// listener, and known peers.
#[derive(Clone)]
pub struct NodeInfoService {
    host: Host,
}

impl NodeInfoService {
    pub fn new(host: Host) -> Self {
        Self { host }
    }
}

#[tonic::async_trait]
impl NodeInfo for NodeInfoService {
    async fn info(
        &self,
        _request: Request<NodeInfoRequest>,
    ) -> Result<Response<NodeInfoResponse>, Status> {
        let mut resp = NodeInfoResponse::new();
        resp.id = self.host.id().to_string();
        resp.addresses = self.host.addrs().iter().map(|a| a.to_string()).collect();
        resp.protocols = self.host.protocols();

        let mut peers: Vec<_> = self.host.peerstore().peers().iter().map(|p| p.fmt_short().to_string()).collect();
        peers.sort();
        resp.peers = peers;

        Ok(Response::new(resp))
    }
}
