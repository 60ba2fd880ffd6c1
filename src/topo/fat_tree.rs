//! 存储集群 fat-tree 拓扑构建
//!
//! 标准 k 叉 fat-tree（k 个 pod，每 pod k/2 个 edge 与 k/2 个 aggregation，
//! (k/2)² 个 core，每个 edge 挂 k/2 个计算节点），每个 core 上再挂一个元数据服务
//! 与 `oss_per_core` 个存储服务器，每个存储服务器挂 `ost_per_oss` 个存储目标。
//! 交换机之间、计算节点与 edge 之间、core 与存储服务器之间经链路节点相连。

use crate::error::{SimError, SimResult};
use crate::net::{ChannelSpec, GraphBuilder, NodeId, NodeKind, Tier, TopologyGraph};
use crate::sim::SimTime;
use tracing::info;

#[derive(Debug, Clone)]
pub struct FatTreeOpts {
    pub k: usize,
    pub oss_per_core: usize,
    pub ost_per_oss: usize,
    pub link_gbps: u64,
    pub link_latency: SimTime,
}

impl Default for FatTreeOpts {
    fn default() -> Self {
        Self {
            k: 4,
            oss_per_core: 1,
            ost_per_oss: 3,
            link_gbps: 100,
            link_latency: SimTime::from_micros(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FatTreeTopology {
    pub k: usize,
    pub hosts: Vec<NodeId>,
    pub edge_switches: Vec<NodeId>,
    pub agg_switches: Vec<NodeId>,
    pub core_switches: Vec<NodeId>,
    pub metadata_servers: Vec<NodeId>,
    pub storage_servers: Vec<NodeId>,
    pub storage_targets: Vec<NodeId>,
}

impl FatTreeTopology {
    fn half(&self) -> usize {
        self.k / 2
    }

    pub fn host(&self, pod: usize, edge: usize, host: usize) -> NodeId {
        let half = self.half();
        let idx = (pod * half + edge) * half + host;
        self.hosts[idx]
    }

    pub fn edge(&self, pod: usize, edge: usize) -> NodeId {
        let half = self.half();
        let idx = pod * half + edge;
        self.edge_switches[idx]
    }

    pub fn agg(&self, pod: usize, agg: usize) -> NodeId {
        let half = self.half();
        let idx = pod * half + agg;
        self.agg_switches[idx]
    }

    pub fn core(&self, group: usize, index: usize) -> NodeId {
        let half = self.half();
        let idx = group * half + index;
        self.core_switches[idx]
    }
}

pub fn build_fat_tree(opts: &FatTreeOpts) -> SimResult<(TopologyGraph, FatTreeTopology)> {
    let k = opts.k;
    if k < 2 || k % 2 != 0 {
        return Err(SimError::InvalidTopology(format!(
            "fat-tree k must be even and >= 2, got {k}"
        )));
    }

    let half = k / 2;
    let channel = ChannelSpec::new(opts.link_latency, opts.link_gbps);
    let mut b = GraphBuilder::default();

    let mut core_switches = Vec::with_capacity(half * half);
    for group in 0..half {
        for index in 0..half {
            let name = format!("c{}_{}", group, index);
            core_switches.push(b.add_node(name, NodeKind::Switch(Tier::Core))?);
        }
    }

    let mut hosts = Vec::with_capacity(k * half * half);
    let mut edge_switches = Vec::with_capacity(k * half);
    let mut agg_switches = Vec::with_capacity(k * half);
    let mut pod_edges: Vec<Vec<NodeId>> = Vec::with_capacity(k);
    let mut pod_aggs: Vec<Vec<NodeId>> = Vec::with_capacity(k);

    for pod in 0..k {
        let mut edges = Vec::with_capacity(half);
        let mut aggs = Vec::with_capacity(half);

        for edge in 0..half {
            let name = format!("p{}_e{}", pod, edge);
            edges.push(b.add_node(name, NodeKind::Switch(Tier::Edge))?);
        }
        for agg in 0..half {
            let name = format!("p{}_a{}", pod, agg);
            aggs.push(b.add_node(name, NodeKind::Switch(Tier::Aggregation))?);
        }

        for (edge_idx, edge_id) in edges.iter().enumerate() {
            for host in 0..half {
                let name = format!("cn{}_{}_{}", pod, edge_idx, host);
                let host_id = b.add_node(name.clone(), NodeKind::ComputeNode)?;
                b.connect_via_link(host_id, *edge_id, format!("l_{name}"), channel)?;
                hosts.push(host_id);
            }
        }

        edge_switches.extend(edges.iter().copied());
        agg_switches.extend(aggs.iter().copied());
        pod_edges.push(edges);
        pod_aggs.push(aggs);
    }

    for pod in 0..k {
        for edge in 0..half {
            for agg in 0..half {
                let edge_id = pod_edges[pod][edge];
                let agg_id = pod_aggs[pod][agg];
                let name = format!("l_p{pod}_e{edge}_a{agg}");
                b.connect_via_link(edge_id, agg_id, name, channel)?;
            }
        }
    }

    for pod in 0..k {
        for agg in 0..half {
            let agg_id = pod_aggs[pod][agg];
            for index in 0..half {
                let core_id = core_switches[agg * half + index];
                let name = format!("l_p{pod}_a{agg}_c{agg}_{index}");
                b.connect_via_link(agg_id, core_id, name, channel)?;
            }
        }
    }

    let mut metadata_servers = Vec::with_capacity(core_switches.len());
    let mut storage_servers = Vec::with_capacity(core_switches.len() * opts.oss_per_core);
    let mut storage_targets =
        Vec::with_capacity(core_switches.len() * opts.oss_per_core * opts.ost_per_oss);
    for (ci, &core_id) in core_switches.iter().enumerate() {
        let (group, index) = (ci / half, ci % half);
        let mds = b.add_node(format!("mds{group}_{index}"), NodeKind::MetadataServer)?;
        b.connect(core_id, mds, channel)?;
        metadata_servers.push(mds);

        for s in 0..opts.oss_per_core {
            let name = format!("oss{group}_{index}_{s}");
            let oss = b.add_node(name.clone(), NodeKind::StorageServer)?;
            b.connect_via_link(core_id, oss, format!("l_{name}"), channel)?;
            storage_servers.push(oss);
            for t in 0..opts.ost_per_oss {
                let ost = b.add_node(format!("ost{group}_{index}_{s}_{t}"), NodeKind::StorageTarget)?;
                b.connect(oss, ost, channel)?;
                storage_targets.push(ost);
            }
        }
    }

    let graph = b.build()?;
    info!(
        k,
        hosts = hosts.len(),
        storage_servers = storage_servers.len(),
        storage_targets = storage_targets.len(),
        nodes = graph.len(),
        "🌲 fat-tree 构建完成"
    );

    Ok((
        graph,
        FatTreeTopology {
            k,
            hosts,
            edge_switches,
            agg_switches,
            core_switches,
            metadata_servers,
            storage_servers,
            storage_targets,
        },
    ))
}
