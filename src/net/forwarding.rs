//! 逐层转发决策
//!
//! 决策只依赖到达分片的字段（方向、checkpoint 标志、读写类型、是否带数据、
//! 上一个非链路发送者的类型）与拓扑图，不持有状态。返回候选出端口集合，
//! 由交换机结合路径提示从中选一个。
//!
//! | 层 | 情形 | 候选 |
//! |----|------|------|
//! | edge | checkpoint 或目的为 CN | 挂着目标 CN 的端口，否则任一 aggregation |
//! | edge | 存储：读带数据 / 写确认 | 源 CN 端口 |
//! | edge | 存储：读请求 / 写数据 | 任一 aggregation |
//! | aggregation | checkpoint | 服务目标的 edge，否则任一 core |
//! | aggregation | 目的为 CN，来自 edge | 服务目标的 edge，否则任一 core |
//! | aggregation | 目的为 CN，来自 core | 服务目标的 edge |
//! | aggregation | 存储，来自 edge / core | 任一 core / 服务源 CN 的 edge |
//! | core | checkpoint 去程 | 服务目的 CN 的 aggregation |
//! | core | 目的为 CN | 服务目标的 aggregation |
//! | core | 存储，来自 aggregation | 元数据服务（不存在时直达目的 OSS） |
//! | core | 存储，来自元数据服务 | 去程：目的 OSS；返程：服务源 CN 的 aggregation |
//! | core | 存储，来自 OSS | 服务源 CN 的 aggregation |
//!
//! "目标"在去程指 `dest`，在返程指 `source`。

use super::graph::TopologyGraph;
use super::id::NodeId;
use super::kind::{NodeKind, Tier};
use super::request::{Request, RequestKind};
use crate::error::{SimError, SimResult};

/// 在交换机 `at` 上为 `req` 求候选出端口（邻居 id），保证非空。
pub fn candidates(graph: &TopologyGraph, at: NodeId, req: &Request) -> SimResult<Vec<NodeId>> {
    let decided = match graph.kind(at).tier() {
        Some(Tier::Edge) => edge(graph, at, req),
        Some(Tier::Aggregation) => aggregation(graph, at, req),
        Some(Tier::Core) => core(graph, at, req),
        None => Err("node is not a switch"),
    };
    match decided {
        Ok(ports) if !ports.is_empty() => Ok(ports),
        Ok(_) => Err(no_port(graph, at, req, "no port of the required kind")),
        Err(reason) => Err(no_port(graph, at, req, reason)),
    }
}

fn no_port(graph: &TopologyGraph, at: NodeId, req: &Request, reason: &str) -> SimError {
    SimError::NoPort {
        node: graph.name(at).to_string(),
        master_id: req.master_id,
        id: req.id,
        reason: format!(
            "{reason} ({} {} -> {}, return={}, sender={})",
            req.kind,
            graph.name(req.source),
            graph.name(req.dest),
            req.is_return_leg,
            req.sender.map_or("none", |s| graph.name(s)),
        ),
    }
}

fn target(req: &Request) -> NodeId {
    if req.is_return_leg {
        req.source
    } else {
        req.dest
    }
}

fn sender_kind(graph: &TopologyGraph, req: &Request) -> Option<NodeKind> {
    req.sender.map(|s| graph.kind(s))
}

fn prefer(primary: Vec<NodeId>, fallback: impl FnOnce() -> Vec<NodeId>) -> Vec<NodeId> {
    if primary.is_empty() { fallback() } else { primary }
}

fn edge(graph: &TopologyGraph, at: NodeId, req: &Request) -> Result<Vec<NodeId>, &'static str> {
    let up = || graph.ports_to_tier(at, Tier::Aggregation);
    if req.is_checkpoint_leg || graph.kind(req.dest).is_compute() {
        let local: Vec<NodeId> = graph.port_to_peer(at, target(req)).into_iter().collect();
        return Ok(prefer(local, up));
    }
    match (req.kind, req.is_control()) {
        (RequestKind::Read, false) | (RequestKind::Write, true) => graph
            .port_to_peer(at, req.source)
            .map(|p| vec![p])
            .ok_or("source compute node is not attached to this edge switch"),
        (RequestKind::Read, true) | (RequestKind::Write, false) => Ok(up()),
    }
}

fn aggregation(
    graph: &TopologyGraph,
    at: NodeId,
    req: &Request,
) -> Result<Vec<NodeId>, &'static str> {
    let cores = || graph.ports_to_tier(at, Tier::Core);
    if req.is_checkpoint_leg {
        return Ok(prefer(graph.ports_to_edge_serving(at, target(req)), cores));
    }
    let from = sender_kind(graph, req);
    if graph.kind(req.dest).is_compute() {
        return match from {
            Some(NodeKind::Switch(Tier::Edge)) => {
                Ok(prefer(graph.ports_to_edge_serving(at, target(req)), cores))
            }
            Some(NodeKind::Switch(Tier::Core)) => Ok(graph.ports_to_edge_serving(at, target(req))),
            _ => Err("unexpected sender for compute traffic"),
        };
    }
    match from {
        Some(NodeKind::Switch(Tier::Edge)) => Ok(cores()),
        Some(NodeKind::Switch(Tier::Core)) => Ok(graph.ports_to_edge_serving(at, req.source)),
        _ => Err("unexpected sender for storage traffic"),
    }
}

fn core(graph: &TopologyGraph, at: NodeId, req: &Request) -> Result<Vec<NodeId>, &'static str> {
    if req.is_checkpoint_leg && !req.is_return_leg {
        return Ok(graph.ports_to_aggregation_serving(at, req.dest));
    }
    if graph.kind(req.dest).is_compute() {
        return Ok(graph.ports_to_aggregation_serving(at, target(req)));
    }
    let to_dest = || graph.port_to_peer(at, req.dest).into_iter().collect::<Vec<_>>();
    match sender_kind(graph, req) {
        Some(NodeKind::Switch(Tier::Aggregation)) => {
            Ok(prefer(graph.ports_to_kind(at, NodeKind::MetadataServer), to_dest))
        }
        Some(NodeKind::MetadataServer) if !req.is_return_leg => Ok(to_dest()),
        Some(NodeKind::MetadataServer) | Some(NodeKind::StorageServer) => {
            Ok(graph.ports_to_aggregation_serving(at, req.source))
        }
        _ => Err("unexpected sender for storage traffic"),
    }
}
