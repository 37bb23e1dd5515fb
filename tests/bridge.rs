use p2pgrpc::client::{Client, ClientConfig};
use p2pgrpc::host::{Host, HostConfig};
use p2pgrpc::peer::Keypair;
use p2pgrpc::server::{Server, ServerConfig};
use p2pgrpc::service::echo::{EchoClient, EchoRequest, EchoServer};
use p2pgrpc::service::node_info::{NodeInfoClient, NodeInfoRequest, NodeInfoServer};
use p2pgrpc::service::{EchoService, NodeInfoService};
use p2pgrpc::PROTOCOL_ID;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tonic::transport::Channel;
use tonic::Code;

async fn new_host() -> Host {
    let config = HostConfig {
        listen_addr: "127.0.0.1:0".parse().unwrap(),
        dial_timeout: Duration::from_secs(3),
        ..Default::default()
    };
    Host::new(Keypair::generate(), config).await.unwrap()
}

async fn pair() -> (Host, Host) {
    let a = new_host().await;
    let b = new_host().await;
    a.peerstore().add_addr(b.id(), b.addrs()[0]);
    b.peerstore().add_addr(a.id(), a.addrs()[0]);
    (a, b)
}

fn echo_server(host: &Host, protocol: &str, suffix: &str) -> JoinHandle<p2pgrpc::Result<()>> {
    let config = ServerConfig {
        protocol: protocol.into(),
        ..Default::default()
    };
    let mut srv = Server::new(host.clone(), config);
    srv.add_service(EchoServer::new(EchoService::with_suffix(suffix)));
    tokio::spawn(srv.serve())
}

async fn wait_listening(host: &Host, protocol: &str) {
    while !host.protocols().iter().any(|p| p == protocol) {
        tokio::task::yield_now().await;
    }
}

async fn echo(channel: Channel, message: &str) -> Result<(String, String), tonic::Status> {
    let mut req = EchoRequest::new();
    req.message = message.into();
    let reply = EchoClient::new(channel).echo(req).await?.into_inner();
    Ok((reply.message, reply.peer_id))
}

#[tokio::test]
async fn test_echo_round_trip() {
    let (server_host, client_host) = pair().await;
    let serving = echo_server(&server_host, PROTOCOL_ID, " (heyo!)");
    wait_listening(&server_host, PROTOCOL_ID).await;

    let channel = Client::new(client_host.clone(), ClientConfig::default())
        .dial(&server_host.id())
        .unwrap();
    let (message, peer_id) = echo(channel, "hello").await.unwrap();
    assert_eq!(message, "hello (heyo!)");
    assert_eq!(peer_id, client_host.id().to_string());

    server_host.close().await;
    let r = timeout(Duration::from_secs(5), serving).await.unwrap().unwrap();
    assert!(r.is_ok());
}

#[tokio::test]
async fn test_protocol_not_supported_surfaces_on_first_call() {
    let (server_host, client_host) = pair().await;
    let _serving = echo_server(&server_host, PROTOCOL_ID, "");
    wait_listening(&server_host, PROTOCOL_ID).await;

    let config = ClientConfig {
        protocol: "/bad/proto".into(),
        ..Default::default()
    };
    let client = Client::new(client_host, config);
    let channel = client.dial(&server_host.id()).unwrap();

    let status = timeout(Duration::from_secs(5), echo(channel, "hello"))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert!(status.message().contains("protocol not supported"), "{}", status.message());

    let err = client.connect(&server_host.id()).await.unwrap_err();
    assert!(matches!(err, p2pgrpc::Error::Connect(_)));
}

#[tokio::test]
async fn test_unknown_peer() {
    let client_host = new_host().await;
    let stranger = Keypair::generate().public();

    let channel = Client::new(client_host, ClientConfig::default())
        .dial(&stranger)
        .unwrap();
    let status = echo(channel, "hello").await.unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert!(status.message().contains("no addresses for peer"), "{}", status.message());
}

#[tokio::test]
async fn test_add_service_then_serve() {
    let (server_host, client_host) = pair().await;

    let shutdown = CancellationToken::new();
    let srv = Server::new(server_host.clone(), ServerConfig::default());
    let token = shutdown.clone();
    let empty = tokio::spawn(srv.serve_with_shutdown(async move { token.cancelled().await }));
    wait_listening(&server_host, PROTOCOL_ID).await;

    // no services registered: calls reach the server and are rejected
    let channel = Client::new(client_host.clone(), ClientConfig::default())
        .dial(&server_host.id())
        .unwrap();
    let status = echo(channel, "hello").await.unwrap_err();
    assert_eq!(status.code(), Code::Unimplemented);

    shutdown.cancel();
    assert!(timeout(Duration::from_secs(5), empty).await.unwrap().unwrap().is_ok());
    while !server_host.protocols().is_empty() {
        tokio::task::yield_now().await;
    }

    let _serving = echo_server(&server_host, PROTOCOL_ID, "!");
    wait_listening(&server_host, PROTOCOL_ID).await;

    let channel = Client::new(client_host, ClientConfig::default())
        .dial(&server_host.id())
        .unwrap();
    let (message, _) = echo(channel, "hello").await.unwrap();
    assert_eq!(message, "hello!");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_clients() {
    let server_host = new_host().await;
    let _serving = echo_server(&server_host, PROTOCOL_ID, "");
    wait_listening(&server_host, PROTOCOL_ID).await;

    let mut calls = Vec::new();
    for i in 0..8 {
        let server_id = server_host.id();
        let server_addr = server_host.addrs()[0];
        calls.push(tokio::spawn(async move {
            let host = new_host().await;
            host.peerstore().add_addr(server_id, server_addr);

            let channel = Client::new(host.clone(), ClientConfig::default())
                .dial(&server_id)
                .unwrap();
            let payload = format!("payload-{}", i);
            let (message, peer_id) = echo(channel, &payload).await.unwrap();
            assert_eq!(message, payload);
            assert_eq!(peer_id, host.id().to_string());
        }));
    }

    for call in calls {
        timeout(Duration::from_secs(10), call).await.unwrap().unwrap();
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_dials_from_one_client() {
    let (server_host, client_host) = pair().await;
    let _serving = echo_server(&server_host, PROTOCOL_ID, "");
    wait_listening(&server_host, PROTOCOL_ID).await;

    let client = Arc::new(Client::new(client_host.clone(), ClientConfig::default()));
    let server_id = server_host.id();

    let mut calls = Vec::new();
    for i in 0..8 {
        let client = client.clone();
        calls.push(tokio::spawn(async move {
            let channel = if i % 2 == 0 {
                client.dial(&server_id).unwrap()
            } else {
                client.connect(&server_id).await.unwrap()
            };
            let payload = format!("call-{}", i);
            let (message, _) = echo(channel, &payload).await.unwrap();
            assert_eq!(message, payload);
        }));
    }

    for call in calls {
        timeout(Duration::from_secs(10), call).await.unwrap().unwrap();
    }
}

#[tokio::test]
async fn test_servers_on_distinct_protocols() {
    let (server_host, client_host) = pair().await;
    let _a = echo_server(&server_host, "/grpc/a", " from a");
    let _b = echo_server(&server_host, "/grpc/b", " from b");
    wait_listening(&server_host, "/grpc/a").await;
    wait_listening(&server_host, "/grpc/b").await;

    for tag in ["a", "b"] {
        let config = ClientConfig {
            protocol: format!("/grpc/{}", tag),
            ..Default::default()
        };
        let channel = Client::new(client_host.clone(), config)
            .dial(&server_host.id())
            .unwrap();
        let (message, _) = echo(channel, "hi").await.unwrap();
        assert_eq!(message, format!("hi from {}", tag));
    }
}

#[tokio::test]
async fn test_cancelled_dial() {
    let (server_host, client_host) = pair().await;
    let _serving = echo_server(&server_host, PROTOCOL_ID, "");
    wait_listening(&server_host, PROTOCOL_ID).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let channel = Client::new(client_host, ClientConfig::default())
        .dial_with(&cancel, &server_host.id(), |endpoint| endpoint)
        .unwrap();

    let status = timeout(Duration::from_secs(5), echo(channel, "hello"))
        .await
        .unwrap()
        .unwrap_err();
    assert_eq!(status.code(), Code::Unavailable);
    assert!(status.message().contains("dial cancelled"), "{}", status.message());
}

#[tokio::test]
async fn test_client_follows_server_protocol() {
    let (server_host, client_host) = pair().await;
    let config = ServerConfig {
        protocol: "/grpc/custom".into(),
        ..Default::default()
    };
    let mut srv = Server::new(server_host.clone(), config);
    srv.add_service(EchoServer::new(EchoService::new()));
    let client = Client::new(client_host, ClientConfig::default()).with_server(srv.server_ref());
    let _serving = tokio::spawn(srv.serve());
    wait_listening(&server_host, "/grpc/custom").await;

    let (message, _) = echo(client.dial(&server_host.id()).unwrap(), "same tag")
        .await
        .unwrap();
    assert_eq!(message, "same tag");
}

#[tokio::test]
async fn test_node_info() {
    let (server_host, client_host) = pair().await;
    let mut srv = Server::new(server_host.clone(), ServerConfig::default());
    srv.add_service(NodeInfoServer::new(NodeInfoService::new(server_host.clone())));
    let _serving = tokio::spawn(srv.serve());
    wait_listening(&server_host, PROTOCOL_ID).await;

    let channel = Client::new(client_host.clone(), ClientConfig::default())
        .connect(&server_host.id())
        .await
        .unwrap();
    let info = NodeInfoClient::new(channel)
        .info(NodeInfoRequest::new())
        .await
        .unwrap()
        .into_inner();

    assert_eq!(info.id, server_host.id().to_string());
    assert_eq!(info.protocols, vec![PROTOCOL_ID.to_string()]);
    assert_eq!(info.peers, vec![client_host.id().fmt_short().to_string()]);
}
