use p2pgrpc::client::{Client, ClientConfig};
use p2pgrpc::host::{Host, HostConfig};
use p2pgrpc::peer::{Keypair, PeerId};
use p2pgrpc::server::{Server, ServerConfig};
use p2pgrpc::service::echo::{EchoClient, EchoRequest, EchoServer};
use p2pgrpc::service::node_info::{NodeInfoClient, NodeInfoRequest, NodeInfoServer};
use p2pgrpc::service::{EchoService, NodeInfoService};
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;
use structopt::StructOpt;
use tonic::transport::Channel;

#[derive(StructOpt, Debug)]
#[structopt(name = "p2pgrpc")]
enum Opt {
    /// Serve the echo and node info services
    Serve(ServeOpt),
    /// Call echo on a remote peer
    Echo(EchoOpt),
    /// Ask a remote peer to describe itself
    Info(InfoOpt),
}

#[derive(StructOpt, Debug)]
struct ServeOpt {
    #[structopt(long = "listen-addr", default_value = "0.0.0.0:9000")]
    listen_addr: SocketAddr,

    /// Hex secret key, created if missing. A fresh identity is used otherwise.
    #[structopt(long = "key-file", parse(from_os_str))]
    key_file: Option<PathBuf>,

    #[structopt(long = "protocol", default_value = "/grpc/0.0.1")]
    protocol: String,

    /// Appended to every echo reply
    #[structopt(long = "suffix", default_value = "")]
    suffix: String,
}

#[derive(StructOpt, Debug)]
struct PeerOpt {
    #[structopt(long = "peer")]
    peer: PeerId,

    #[structopt(long = "peer-addr")]
    peer_addr: SocketAddr,

    #[structopt(long = "protocol", default_value = "/grpc/0.0.1")]
    protocol: String,

    /// Seconds
    #[structopt(long = "timeout", default_value = "10")]
    timeout: u64,
}

#[derive(StructOpt, Debug)]
struct EchoOpt {
    #[structopt(flatten)]
    peer: PeerOpt,

    message: String,
}

#[derive(StructOpt, Debug)]
struct InfoOpt {
    #[structopt(flatten)]
    peer: PeerOpt,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();

    let opt: Opt = StructOpt::from_args();

    match opt {
        Opt::Serve(opt) => run_server(opt).await,
        Opt::Echo(opt) => run_echo(opt).await,
        Opt::Info(opt) => run_info(opt).await,
    }
}

async fn run_server(opt: ServeOpt) -> Result<(), Box<dyn Error>> {
    let keypair = match opt.key_file {
        Some(path) => Keypair::load_or_generate(path)?,
        None => Keypair::generate(),
    };

    let config = HostConfig {
        listen_addr: opt.listen_addr,
        ..Default::default()
    };
    let host = Host::new(keypair, config).await?;

    println!("id {}", host.id());
    for addr in host.addrs() {
        println!("listening on {}", addr);
    }

    let config = ServerConfig {
        protocol: opt.protocol,
        ..Default::default()
    };
    let mut srv = Server::new(host.clone(), config);
    srv.add_service(EchoServer::new(EchoService::with_suffix(opt.suffix)))
        .add_service(NodeInfoServer::new(NodeInfoService::new(host.clone())));

    srv.serve_with_shutdown(async {
        let _ = tokio::signal::ctrl_c().await;
    })
    .await?;

    host.close().await;
    Ok(())
}

async fn connect(opt: &PeerOpt) -> Result<Channel, Box<dyn Error>> {
    let host = Host::new(Keypair::generate(), HostConfig::default()).await?;
    host.peerstore().add_addr(opt.peer, opt.peer_addr);

    let timeout = Duration::from_secs(opt.timeout);
    let config = ClientConfig {
        protocol: opt.protocol.clone(),
        connect_timeout: Some(timeout),
        timeout: Some(timeout),
        ..Default::default()
    };

    Ok(Client::new(host, config).connect(&opt.peer).await?)
}

async fn run_echo(opt: EchoOpt) -> Result<(), Box<dyn Error>> {
    let mut client = EchoClient::new(connect(&opt.peer).await?);

    let mut req = EchoRequest::new();
    req.message = opt.message;
    let reply = client.echo(req).await?.into_inner();

    println!("{}", reply.message);
    Ok(())
}

async fn run_info(opt: InfoOpt) -> Result<(), Box<dyn Error>> {
    let mut client = NodeInfoClient::new(connect(&opt.peer).await?);
    let info = client.info(NodeInfoRequest::new()).await?.into_inner();

    println!("id {}", info.id);
    for addr in info.addresses {
        println!("addr {}", addr);
    }
    for protocol in info.protocols {
        println!("protocol {}", protocol);
    }
    for peer in info.peers {
        println!("peer {}", peer);
    }
    Ok(())
}
