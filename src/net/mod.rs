//! 网络模拟模块
//!
//! 拓扑图、请求、路由、节点流水线与逐跳统计。

// 子模块声明
mod channel;
mod compute;
mod context;
mod deliver_request;
mod forwarding;
mod graph;
mod id;
mod kind;
mod net_world;
mod network;
mod node;
mod node_wake;
mod request;
mod routing;
mod sink;
mod stage;
mod stats;
mod storage;
mod switch;

// 重新导出公共接口
pub use channel::{Channel, Transmission};
pub use compute::ComputeNode;
pub use context::SimContext;
pub use deliver_request::DeliverRequest;
pub use forwarding::candidates as forwarding_candidates;
pub use graph::{ChannelSpec, GraphBuilder, KindSpec, Port, TopologyGraph};
pub use id::{NodeId, Token};
pub use kind::{LinkTier, NodeKind, Tier};
pub use net_world::NetWorld;
pub use network::Network;
pub use node::{LinkRelay, MemoryRelay, MetadataNode, Node};
pub use node_wake::{NodeWake, Wake};
pub use request::{Request, RequestKind};
pub use routing::{PathFinder, RouteSet, RouteTable};
pub use sink::{Sink, SinkReport};
pub use stage::{BufferStage, Stage};
pub use stats::{Signal, SignalRow, Stats, Summary};
pub use storage::{StorageServer, StorageTarget};
pub use switch::SwitchNode;
