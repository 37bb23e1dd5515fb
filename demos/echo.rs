use p2pgrpc::client::{Client, ClientConfig};
use p2pgrpc::host::{Host, HostConfig};
use p2pgrpc::peer::Keypair;
use p2pgrpc::server::{Server, ServerConfig};
use p2pgrpc::service::echo::{EchoClient, EchoRequest, EchoServer};
use p2pgrpc::service::EchoService;
use std::error::Error;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let config = HostConfig {
        listen_addr: "127.0.0.1:10000".parse()?,
        ..Default::default()
    };
    let server_host = Host::new(Keypair::generate(), config).await?;

    let config = HostConfig {
        listen_addr: "127.0.0.1:10001".parse()?,
        ..Default::default()
    };
    let client_host = Host::new(Keypair::generate(), config).await?;

    server_host
        .peerstore()
        .add_addr(client_host.id(), client_host.addrs()[0]);
    client_host
        .peerstore()
        .add_addr(server_host.id(), server_host.addrs()[0]);

    let mut srv = Server::new(server_host.clone(), ServerConfig::default());
    srv.add_service(EchoServer::new(EchoService::with_suffix(" (heyo!)")));
    let client = Client::new(client_host.clone(), ClientConfig::default()).with_server(srv.server_ref());

    let serving = tokio::spawn(srv.serve());

    let mut echo = EchoClient::new(client.dial(&server_host.id())?);
    let mut req = EchoRequest::new();
    req.message = "give me something".into();
    let reply = echo.echo(req).await?.into_inner();

    println!("{} from {}", reply.message, server_host.id().fmt_short());

    server_host.close().await;
    client_host.close().await;
    serving.await??;

    Ok(())
}
