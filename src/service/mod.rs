//! Services bundled with the crate, usable over any [`Server`](crate::server::Server).

pub mod echo;
pub mod node_info;

pub use echo::EchoService;
pub use node_info::NodeInfoService;
