use p2pgrpc::client::{Client, ClientConfig};
use p2pgrpc::host::{Host, HostConfig};
use p2pgrpc::peer::Keypair;
use p2pgrpc::server::{Server, ServerConfig};
use p2pgrpc::service::node_info::{NodeInfoClient, NodeInfoRequest, NodeInfoServer};
use p2pgrpc::service::NodeInfoService;
use std::error::Error;

/// Two hosts each serving node info and querying the other.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let h1 = Host::new(Keypair::generate(), HostConfig::default()).await?;
    let h2 = Host::new(Keypair::generate(), HostConfig::default()).await?;

    h1.peerstore().add_addr(h2.id(), ([127, 0, 0, 1], h2.addrs()[0].port()).into());
    h2.peerstore().add_addr(h1.id(), ([127, 0, 0, 1], h1.addrs()[0].port()).into());

    let mut tasks = Vec::new();
    for (local, remote) in [(h1.clone(), h2.clone()), (h2.clone(), h1.clone())] {
        let mut srv = Server::new(local.clone(), ServerConfig::default());
        srv.add_service(NodeInfoServer::new(NodeInfoService::new(local.clone())));
        tokio::spawn(srv.serve());

        tasks.push(tokio::spawn(async move {
            let client = Client::new(local, ClientConfig::default());
            let mut c = NodeInfoClient::new(client.dial(&remote.id())?);

            let info = c.info(NodeInfoRequest::new()).await?.into_inner();
            println!(
                "node={} addresses={:?} protocols={:?} peers={:?}",
                info.id, info.addresses, info.protocols, info.peers
            );
            Ok::<_, Box<dyn Error + Send + Sync>>(())
        }));
    }

    for t in tasks {
        t.await?.map_err(|e| e as Box<dyn Error>)?;
    }

    h1.close().await;
    h2.close().await;
    Ok(())
}
