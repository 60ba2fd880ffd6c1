//! 由 JSON 邻接描述构建拓扑
//!
//! ```json
//! {
//!   "nodes": [ { "name": "cn0", "kind": "compute_node" }, { "name": "l0", "kind": "link" } ],
//!   "edges": [ { "a": "cn0", "b": "l0", "latency_ns": 1000, "gbps": 100 } ]
//! }
//! ```
//!
//! 省略 `gbps` 的边是理想信道（无串行化时延）。

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::net::{ChannelSpec, KindSpec, NodeKind, Tier, TopologyGraph};
use crate::sim::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutKind {
    ComputeNode,
    EdgeSwitch,
    AggregationSwitch,
    CoreSwitch,
    StorageServer,
    StorageTarget,
    MetadataServer,
    MemoryBuffer,
    Link,
}

impl LayoutKind {
    fn spec(self) -> KindSpec {
        let kind = match self {
            LayoutKind::ComputeNode => NodeKind::ComputeNode,
            LayoutKind::EdgeSwitch => NodeKind::Switch(Tier::Edge),
            LayoutKind::AggregationSwitch => NodeKind::Switch(Tier::Aggregation),
            LayoutKind::CoreSwitch => NodeKind::Switch(Tier::Core),
            LayoutKind::StorageServer => NodeKind::StorageServer,
            LayoutKind::StorageTarget => NodeKind::StorageTarget,
            LayoutKind::MetadataServer => NodeKind::MetadataServer,
            LayoutKind::MemoryBuffer => NodeKind::MemoryBuffer,
            LayoutKind::Link => return KindSpec::Link,
        };
        KindSpec::Node(kind)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeSpec {
    pub name: String,
    pub kind: LayoutKind,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeSpec {
    pub a: String,
    pub b: String,
    #[serde(default)]
    pub latency_ns: u64,
    #[serde(default)]
    pub gbps: Option<u64>,
}

impl EdgeSpec {
    fn channel(&self) -> ChannelSpec {
        let latency = SimTime::from_nanos(self.latency_ns);
        match self.gbps {
            Some(gbps) => ChannelSpec::new(latency, gbps),
            None => ChannelSpec {
                latency,
                bandwidth_bps: None,
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopologyLayout {
    pub nodes: Vec<NodeSpec>,
    pub edges: Vec<EdgeSpec>,
}

impl TopologyLayout {
    pub fn from_json_str(raw: &str) -> SimResult<Self> {
        serde_json::from_str(raw)
            .map_err(|e| SimError::InvalidTopology(format!("parse topology: {e}")))
    }

    pub fn build(&self) -> SimResult<TopologyGraph> {
        let mut b = TopologyGraph::builder();
        for node in &self.nodes {
            b.add(node.name.clone(), node.kind.spec())?;
        }
        for edge in &self.edges {
            let a = b
                .id_of(&edge.a)
                .ok_or_else(|| SimError::UnknownNode(edge.a.clone()))?;
            let z = b
                .id_of(&edge.b)
                .ok_or_else(|| SimError::UnknownNode(edge.b.clone()))?;
            b.connect(a, z, edge.channel())?;
        }
        b.build()
    }
}
