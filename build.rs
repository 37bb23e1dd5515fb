use tonic_build::manual::{Builder, Method, Service};

fn main() {
    protobuf_codegen::Codegen::new()
        .pure()
        .include("proto")
        .input("proto/p2pgrpc.proto")
        .cargo_out_dir("proto")
        .run_from_script();

    let echo = Service::builder()
        .name("Echo")
        .package("p2pgrpc.echo")
        .method(
            Method::builder()
                .name("echo")
                .route_name("Echo")
                .input_type("crate::proto::p2pgrpc::EchoRequest")
                .output_type("crate::proto::p2pgrpc::EchoReply")
                .codec_path("crate::codec::ProtobufCodec")
                .build(),
        )
        .build();

    let node_info = Service::builder()
        .name("NodeInfo")
        .package("p2pgrpc.node")
        .method(
            Method::builder()
                .name("info")
                .route_name("Info")
                .input_type("crate::proto::p2pgrpc::NodeInfoRequest")
                .output_type("crate::proto::p2pgrpc::NodeInfoResponse")
                .codec_path("crate::codec::ProtobufCodec")
                .build(),
        )
        .build();

    Builder::new().compile(&[echo, node_info]);
}
