mod config_json;
mod network_integration;
mod queues;
mod simulator;

use crate::config::SimConfig;
use crate::net::{NetWorld, Network, NodeId, Request, RequestKind, SimContext, TopologyGraph};
use crate::sim::SimTime;
use crate::topo::layout::TopologyLayout;

/// cn0 — e0 — a0 — c0 — oss0 — ost0..ostN（每段交换机连接经链路节点）
pub(crate) fn minimal_layout(targets: usize) -> TopologyGraph {
    let mut nodes = vec![
        r#"{ "name": "cn0", "kind": "compute_node" }"#.to_string(),
        r#"{ "name": "l0", "kind": "link" }"#.to_string(),
        r#"{ "name": "e0", "kind": "edge_switch" }"#.to_string(),
        r#"{ "name": "l1", "kind": "link" }"#.to_string(),
        r#"{ "name": "a0", "kind": "aggregation_switch" }"#.to_string(),
        r#"{ "name": "l2", "kind": "link" }"#.to_string(),
        r#"{ "name": "c0", "kind": "core_switch" }"#.to_string(),
        r#"{ "name": "l3", "kind": "link" }"#.to_string(),
        r#"{ "name": "oss0", "kind": "storage_server" }"#.to_string(),
    ];
    let mut edges = vec![
        r#"{ "a": "cn0", "b": "l0", "latency_ns": 1000, "gbps": 100 }"#.to_string(),
        r#"{ "a": "l0", "b": "e0", "latency_ns": 0 }"#.to_string(),
        r#"{ "a": "e0", "b": "l1", "latency_ns": 1000, "gbps": 100 }"#.to_string(),
        r#"{ "a": "l1", "b": "a0" }"#.to_string(),
        r#"{ "a": "a0", "b": "l2", "latency_ns": 1000, "gbps": 100 }"#.to_string(),
        r#"{ "a": "l2", "b": "c0" }"#.to_string(),
        r#"{ "a": "c0", "b": "l3", "latency_ns": 1000, "gbps": 100 }"#.to_string(),
        r#"{ "a": "l3", "b": "oss0" }"#.to_string(),
    ];
    for t in 0..targets {
        nodes.push(format!(r#"{{ "name": "ost{t}", "kind": "storage_target" }}"#));
        edges.push(format!(
            r#"{{ "a": "oss0", "b": "ost{t}", "latency_ns": 500, "gbps": 100 }}"#
        ));
    }
    let raw = format!(
        r#"{{ "nodes": [{}], "edges": [{}] }}"#,
        nodes.join(","),
        edges.join(",")
    );
    TopologyLayout::from_json_str(&raw)
        .expect("parse layout")
        .build()
        .expect("build layout")
}

pub(crate) fn world_for(graph: TopologyGraph, cfg: SimConfig) -> NetWorld {
    let ctx = SimContext::build(graph, cfg).expect("build context");
    NetWorld::new(Network::new(ctx))
}

pub(crate) fn id(world: &NetWorld, name: &str) -> NodeId {
    world.net.graph().lookup(name).expect("node exists")
}

/// 沿路由表中的第一条路径构造一个待注入的请求。
pub(crate) fn request_between(
    world: &mut NetWorld,
    src: NodeId,
    dst: NodeId,
    kind: RequestKind,
    bytes: u64,
) -> Request {
    let ctx = world.net.context();
    let mut send = ctx.routes.get(src, dst).expect("route").routes()[0].clone();
    send.push(dst);
    let mut back = ctx.routes.get(dst, src).expect("route back").routes()[0].clone();
    back.push(src);
    let master = world.net.next_request_id();
    let id = world.net.next_request_id();
    Request::new(id, master, kind, bytes, src, dst, SimTime::ZERO).with_paths(&send, &back)
}
