//! 静态拓扑图
//!
//! 节点 id → {邻居 id → 端口}。构图一次，之后只读。
//! 端口同时记录"对端"：若邻居是链路节点，对端是链路另一侧的节点，
//! 交换机的转发决策按对端类型选择端口。

use std::collections::HashMap;

use super::id::NodeId;
use super::kind::{LinkTier, NodeKind, Tier};
use crate::error::{SimError, SimResult};
use crate::sim::SimTime;

/// 信道参数：传播时延与（可选的）串行化带宽。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelSpec {
    pub latency: SimTime,
    /// None 表示理想信道，不产生串行化时延
    pub bandwidth_bps: Option<u64>,
}

impl ChannelSpec {
    pub const IDEAL: ChannelSpec = ChannelSpec {
        latency: SimTime::ZERO,
        bandwidth_bps: None,
    };

    pub fn new(latency: SimTime, bandwidth_gbps: u64) -> Self {
        Self {
            latency,
            bandwidth_bps: Some(bandwidth_gbps.saturating_mul(1_000_000_000)),
        }
    }
}

/// 出端口
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Port {
    pub neighbor: NodeId,
    pub peer: NodeId,
    pub channel: ChannelSpec,
}

#[derive(Debug, Clone)]
struct NodeInfo {
    name: String,
    kind: NodeKind,
    ports: Vec<Port>,
}

/// 拓扑图（只读）
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    nodes: Vec<NodeInfo>,
    by_name: HashMap<String, NodeId>,
}

impl TopologyGraph {
    pub fn builder() -> GraphBuilder {
        GraphBuilder::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> NodeKind {
        self.nodes[id.0].kind
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.0].name
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    pub fn ports(&self, id: NodeId) -> &[Port] {
        &self.nodes[id.0].ports
    }

    pub fn neighbors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.ports(id).iter().map(|p| p.neighbor)
    }

    pub fn is_neighbor(&self, id: NodeId, other: NodeId) -> bool {
        self.ports(id).iter().any(|p| p.neighbor == other)
    }

    pub fn port_to(&self, from: NodeId, neighbor: NodeId) -> Option<&Port> {
        self.ports(from).iter().find(|p| p.neighbor == neighbor)
    }

    /// 所有某类型的节点，按 id 升序。
    pub fn nodes_of(&self, pred: impl Fn(NodeKind) -> bool) -> Vec<NodeId> {
        self.ids().filter(|&id| pred(self.kind(id))).collect()
    }

    pub fn compute_nodes(&self) -> Vec<NodeId> {
        self.nodes_of(NodeKind::is_compute)
    }

    pub fn storage_servers(&self) -> Vec<NodeId> {
        self.nodes_of(NodeKind::is_storage_server)
    }

    /// 存储服务器挂载的存储目标（按 id 升序，即条带下标顺序）。
    pub fn storage_targets_of(&self, oss: NodeId) -> Vec<NodeId> {
        let mut v: Vec<NodeId> = self
            .ports(oss)
            .iter()
            .map(|p| p.peer)
            .filter(|&n| self.kind(n) == NodeKind::StorageTarget)
            .collect();
        v.sort();
        v.dedup();
        v
    }

    /// `node` 是否直接（或经一条链路）连着 `endpoint`。
    pub fn attached(&self, node: NodeId, endpoint: NodeId) -> bool {
        self.ports(node).iter().any(|p| p.peer == endpoint)
    }

    /// 对端为 `peer` 的出端口（邻居 id）。
    pub fn port_to_peer(&self, from: NodeId, peer: NodeId) -> Option<NodeId> {
        self.ports(from)
            .iter()
            .find(|p| p.peer == peer)
            .map(|p| p.neighbor)
    }

    /// 对端为某层交换机的全部出端口。
    pub fn ports_to_tier(&self, from: NodeId, tier: Tier) -> Vec<NodeId> {
        self.ports(from)
            .iter()
            .filter(|p| self.kind(p.peer) == NodeKind::Switch(tier))
            .map(|p| p.neighbor)
            .collect()
    }

    /// 对端为某类节点的全部出端口。
    pub fn ports_to_kind(&self, from: NodeId, kind: NodeKind) -> Vec<NodeId> {
        self.ports(from)
            .iter()
            .filter(|p| self.kind(p.peer) == kind)
            .map(|p| p.neighbor)
            .collect()
    }

    /// 通向"挂着 `endpoint` 的边缘交换机"的端口（汇聚层用）。
    pub fn ports_to_edge_serving(&self, from: NodeId, endpoint: NodeId) -> Vec<NodeId> {
        self.ports(from)
            .iter()
            .filter(|p| {
                self.kind(p.peer) == NodeKind::Switch(Tier::Edge) && self.attached(p.peer, endpoint)
            })
            .map(|p| p.neighbor)
            .collect()
    }

    /// 通向"其下有边缘交换机挂着 `endpoint`"的汇聚交换机的端口（核心层用）。
    pub fn ports_to_aggregation_serving(&self, from: NodeId, endpoint: NodeId) -> Vec<NodeId> {
        self.ports(from)
            .iter()
            .filter(|p| {
                self.kind(p.peer) == NodeKind::Switch(Tier::Aggregation)
                    && !self.ports_to_edge_serving(p.peer, endpoint).is_empty()
            })
            .map(|p| p.neighbor)
            .collect()
    }
}

/// 拓扑图构建器
#[derive(Debug, Default)]
pub struct GraphBuilder {
    nodes: Vec<(String, Option<NodeKind>)>,
    by_name: HashMap<String, NodeId>,
    edges: Vec<(NodeId, NodeId, ChannelSpec)>,
}

/// 构图输入中的节点类型：链路层级由两端推出，因此输入只说"link"。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindSpec {
    Node(NodeKind),
    Link,
}

impl GraphBuilder {
    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> SimResult<NodeId> {
        self.add(name.into(), KindSpec::Node(kind))
    }

    pub fn add_link(&mut self, name: impl Into<String>) -> SimResult<NodeId> {
        self.add(name.into(), KindSpec::Link)
    }

    pub fn add(&mut self, name: String, kind: KindSpec) -> SimResult<NodeId> {
        if self.by_name.contains_key(&name) {
            return Err(SimError::InvalidTopology(format!("duplicate node name {name}")));
        }
        let id = NodeId(self.nodes.len());
        let kind = match kind {
            KindSpec::Node(k) => Some(k),
            KindSpec::Link => None,
        };
        self.by_name.insert(name.clone(), id);
        self.nodes.push((name, kind));
        Ok(id)
    }

    pub fn id_of(&self, name: &str) -> Option<NodeId> {
        self.by_name.get(name).copied()
    }

    /// 双向连接两个节点
    pub fn connect(&mut self, a: NodeId, b: NodeId, channel: ChannelSpec) -> SimResult {
        if a == b {
            return Err(SimError::InvalidTopology(format!(
                "self-loop on {}",
                self.nodes[a.0].0
            )));
        }
        for id in [a, b] {
            if id.0 >= self.nodes.len() {
                return Err(SimError::UnknownNode(id.to_string()));
            }
        }
        self.edges.push((a, b, channel));
        Ok(())
    }

    /// 经由一个新建链路节点连接 `a` 与 `b`：a —— link —— b。
    ///
    /// 信道参数只加在 a 一侧，link→b 为理想信道，使每个方向只串行化一次。
    pub fn connect_via_link(
        &mut self,
        a: NodeId,
        b: NodeId,
        link_name: impl Into<String>,
        channel: ChannelSpec,
    ) -> SimResult<NodeId> {
        let link = self.add_link(link_name)?;
        self.connect(a, link, channel)?;
        self.connect(link, b, ChannelSpec::IDEAL)?;
        Ok(link)
    }

    pub fn build(self) -> SimResult<TopologyGraph> {
        let GraphBuilder {
            nodes,
            by_name,
            edges,
        } = self;

        let mut adj: Vec<Vec<(NodeId, ChannelSpec)>> = vec![Vec::new(); nodes.len()];
        for &(a, b, ch) in &edges {
            if adj[a.0].iter().any(|(n, _)| *n == b) {
                return Err(SimError::InvalidTopology(format!(
                    "duplicate edge {} - {}",
                    nodes[a.0].0, nodes[b.0].0
                )));
            }
            adj[a.0].push((b, ch));
            adj[b.0].push((a, ch));
        }

        // 链路节点：恰好两个邻居，层级由两端类型决定。
        let mut kinds = Vec::with_capacity(nodes.len());
        for (idx, (name, kind)) in nodes.iter().enumerate() {
            let kind = match kind {
                Some(k) => *k,
                None => {
                    let ends = &adj[idx];
                    if ends.len() != 2 {
                        return Err(SimError::InvalidTopology(format!(
                            "link {name} must join exactly two nodes, found {}",
                            ends.len()
                        )));
                    }
                    let (ka, kb) = (nodes[ends[0].0.0].1, nodes[ends[1].0.0].1);
                    match (ka, kb) {
                        (Some(ka), Some(kb)) => NodeKind::Link(LinkTier::between(ka, kb)),
                        _ => {
                            return Err(SimError::InvalidTopology(format!(
                                "link {name} is chained to another link"
                            )));
                        }
                    }
                }
            };
            kinds.push(kind);
        }

        let mut infos = Vec::with_capacity(nodes.len());
        for (idx, (name, _)) in nodes.into_iter().enumerate() {
            let ports = adj[idx]
                .iter()
                .map(|&(neighbor, channel)| {
                    let peer = if kinds[neighbor.0].is_link() {
                        adj[neighbor.0]
                            .iter()
                            .map(|(n, _)| *n)
                            .find(|&n| n.0 != idx)
                            .unwrap_or(neighbor)
                    } else {
                        neighbor
                    };
                    Port {
                        neighbor,
                        peer,
                        channel,
                    }
                })
                .collect();
            infos.push(NodeInfo {
                name,
                kind: kinds[idx],
                ports,
            });
        }

        Ok(TopologyGraph {
            nodes: infos,
            by_name,
        })
    }
}
