//! 节点类型标签
//!
//! 节点类型在构图时一次性确定，之后的路径搜索与转发决策都只按标签分派。

use serde::{Deserialize, Serialize};

/// 交换机层级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Edge,
    Aggregation,
    Core,
}

/// 链路节点所连接的两类节点；由构图时的两端类型推出。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkTier {
    HostEdge,
    EdgeAggregation,
    AggregationCore,
    CoreStorage,
    Other,
}

/// 节点类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    ComputeNode,
    Switch(Tier),
    StorageServer,
    StorageTarget,
    MetadataServer,
    MemoryBuffer,
    Link(LinkTier),
}

/// 规范胖树遍历中各类节点的上行位置（0 起）。
/// 下行位置由上行位置按拐点（交换机层）镜像得到。
const APEX_RANKS: [usize; 3] = [2, 4, 6];

impl NodeKind {
    pub fn is_compute(self) -> bool {
        matches!(self, NodeKind::ComputeNode)
    }

    pub fn is_storage_server(self) -> bool {
        matches!(self, NodeKind::StorageServer)
    }

    pub fn is_link(self) -> bool {
        matches!(self, NodeKind::Link(_))
    }

    pub fn tier(self) -> Option<Tier> {
        match self {
            NodeKind::Switch(t) => Some(t),
            _ => None,
        }
    }

    /// 路由终点：计算节点或存储服务器。
    pub fn is_endpoint(self) -> bool {
        self.is_compute() || self.is_storage_server()
    }

    /// 路径搜索中的死胡同：永远不会通向目的端点。
    pub fn is_route_dead_end(self) -> bool {
        matches!(
            self,
            NodeKind::StorageTarget
                | NodeKind::MetadataServer
                | NodeKind::MemoryBuffer
                | NodeKind::Link(LinkTier::Other)
        )
    }

    fn ladder_rank(self) -> Option<usize> {
        match self {
            NodeKind::ComputeNode => Some(0),
            NodeKind::Link(LinkTier::HostEdge) => Some(1),
            NodeKind::Switch(Tier::Edge) => Some(2),
            NodeKind::Link(LinkTier::EdgeAggregation) => Some(3),
            NodeKind::Switch(Tier::Aggregation) => Some(4),
            NodeKind::Link(LinkTier::AggregationCore) => Some(5),
            NodeKind::Switch(Tier::Core) => Some(6),
            NodeKind::Link(LinkTier::CoreStorage) => Some(7),
            NodeKind::StorageServer => Some(8),
            _ => None,
        }
    }

    /// 该类节点能否出现在路径的第 `depth` 个位置（1 起）。
    ///
    /// 上行段位置为 rank+1；若在拐点 a 处折返，则下行位置为 2a+1-rank。
    /// 存储侧（rank ≥ 7）只在上行段出现。
    pub fn allowed_at_depth(self, depth: usize) -> bool {
        let Some(rank) = self.ladder_rank() else {
            return false;
        };
        if depth == rank + 1 {
            return true;
        }
        if rank >= 7 {
            return false;
        }
        APEX_RANKS
            .iter()
            .any(|&apex| apex > rank && depth == 2 * apex + 1 - rank)
    }

    pub fn label(self) -> &'static str {
        match self {
            NodeKind::ComputeNode => "compute_node",
            NodeKind::Switch(Tier::Edge) => "edge_switch",
            NodeKind::Switch(Tier::Aggregation) => "aggregation_switch",
            NodeKind::Switch(Tier::Core) => "core_switch",
            NodeKind::StorageServer => "storage_server",
            NodeKind::StorageTarget => "storage_target",
            NodeKind::MetadataServer => "metadata_server",
            NodeKind::MemoryBuffer => "memory_buffer",
            NodeKind::Link(_) => "link",
        }
    }
}

impl LinkTier {
    /// 由链路两端的类型推出链路层级（与端点顺序无关）。
    pub fn between(a: NodeKind, b: NodeKind) -> LinkTier {
        use NodeKind::*;
        use Tier::*;
        match (a, b) {
            (ComputeNode, Switch(Edge)) | (Switch(Edge), ComputeNode) => LinkTier::HostEdge,
            (Switch(Edge), Switch(Aggregation)) | (Switch(Aggregation), Switch(Edge)) => {
                LinkTier::EdgeAggregation
            }
            (Switch(Aggregation), Switch(Core)) | (Switch(Core), Switch(Aggregation)) => {
                LinkTier::AggregationCore
            }
            (Switch(Core), StorageServer) | (StorageServer, Switch(Core)) => LinkTier::CoreStorage,
            _ => LinkTier::Other,
        }
    }
}
