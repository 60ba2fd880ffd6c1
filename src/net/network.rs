//! 网络
//!
//! 持有全部节点、逐方向信道、随机源与统计。节点处理请求时暂时从
//! `nodes` 中取出，处理完再放回，避免 `&mut self` 与 `&mut node` 重叠借用。

use std::collections::HashMap;
use std::sync::Arc;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_xoshiro::Xoshiro256PlusPlus;

use super::channel::Channel;
use super::compute::ComputeNode;
use super::context::SimContext;
use super::deliver_request::DeliverRequest;
use super::graph::TopologyGraph;
use super::id::{NodeId, Token};
use super::kind::NodeKind;
use super::node::{LinkRelay, MemoryRelay, MetadataNode, Node};
use super::node_wake::Wake;
use super::request::Request;
use super::sink::Sink;
use super::stats::Stats;
use super::storage::{StorageServer, StorageTarget};
use super::switch::SwitchNode;
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::sim::{SimTime, Simulator};
use tracing::{debug, info, trace};

pub struct Network {
    ctx: Arc<SimContext>,
    nodes: Vec<Option<Box<dyn Node>>>,
    channels: HashMap<(NodeId, NodeId), Channel>,
    rng: Xoshiro256PlusPlus,
    next_token: u64,
    next_request_id: u64,
    pub stats: Stats,
    pub sink: Sink,
}

fn build_node(id: NodeId, ctx: &Arc<SimContext>) -> Box<dyn Node> {
    let name = ctx.graph.name(id).to_string();
    match ctx.graph.kind(id) {
        NodeKind::ComputeNode => Box::new(ComputeNode::new(id, name, ctx)),
        NodeKind::Switch(tier) => Box::new(SwitchNode::new(id, name, tier, &ctx.config)),
        NodeKind::StorageServer => Box::new(StorageServer::new(id, name, ctx)),
        NodeKind::StorageTarget => Box::new(StorageTarget::new(id, name, &ctx.config)),
        NodeKind::MetadataServer => Box::new(MetadataNode::new(id, name, &ctx.config)),
        NodeKind::MemoryBuffer => Box::new(MemoryRelay::new(id, name, &ctx.config)),
        NodeKind::Link(_) => Box::new(LinkRelay::new(id, name)),
    }
}

impl Network {
    /// 按拓扑图中的类型标签实例化全部节点，并为每个出端口建立信道。
    #[tracing::instrument(skip(ctx))]
    pub fn new(ctx: SimContext) -> Self {
        let ctx = Arc::new(ctx);
        let mut nodes = Vec::with_capacity(ctx.graph.len());
        let mut channels = HashMap::new();
        for id in ctx.graph.ids() {
            nodes.push(Some(build_node(id, &ctx)));
            for port in ctx.graph.ports(id) {
                channels.insert((id, port.neighbor), Channel::new(port.channel));
            }
        }
        info!(
            nodes = nodes.len(),
            channels = channels.len(),
            seed = ctx.config.seed,
            "🌐 网络构建完成"
        );
        Self {
            rng: Xoshiro256PlusPlus::seed_from_u64(ctx.config.seed),
            ctx,
            nodes,
            channels,
            next_token: 0,
            next_request_id: 0,
            stats: Stats::default(),
            sink: Sink::default(),
        }
    }

    pub fn context(&self) -> Arc<SimContext> {
        Arc::clone(&self.ctx)
    }

    pub fn graph(&self) -> &TopologyGraph {
        &self.ctx.graph
    }

    pub fn config(&self) -> &SimConfig {
        &self.ctx.config
    }

    pub fn node_name(&self, id: NodeId) -> &str {
        if self.ctx.graph.contains(id) {
            self.ctx.graph.name(id)
        } else {
            "<unknown>"
        }
    }

    /// 分配队列完成令牌（全局单调递增）
    pub fn next_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token = self.next_token.wrapping_add(1);
        token
    }

    /// 分配请求 id（master id 与分支 id 共用同一序列）
    pub fn next_request_id(&mut self) -> u64 {
        let id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        id
    }

    pub fn rng(&mut self) -> &mut Xoshiro256PlusPlus {
        &mut self.rng
    }

    /// 候选端口中优先选路径提示，否则均匀随机。
    pub fn choose(&mut self, candidates: &[NodeId], hint: Option<NodeId>) -> Option<NodeId> {
        if let Some(h) = hint.filter(|h| candidates.contains(h)) {
            return Some(h);
        }
        candidates.choose(&mut self.rng).copied()
    }

    pub fn channel(&self, from: NodeId, to: NodeId) -> Option<&Channel> {
        self.channels.get(&(from, to))
    }

    pub fn signal_queue_len(&mut self, node: NodeId, stage: &'static str, len: usize) {
        let name = self.ctx.graph.name(node);
        self.stats.record_queue_len(name, stage, len);
    }

    pub fn signal_departure(
        &mut self,
        node: NodeId,
        stage: &'static str,
        arrived: SimTime,
        now: SimTime,
        proc: SimTime,
    ) {
        let name = self.ctx.graph.name(node);
        self.stats.record_departure(name, stage, arrived, now, proc);
    }

    /// 已重组完成的传输交给汇点。
    pub fn complete_transfer(&mut self, req: &Request, now: SimTime) -> SimResult {
        let name = self.ctx.graph.name(req.source);
        self.sink.accept(req, name, now)
    }

    fn take_node(&mut self, id: NodeId) -> SimResult<Box<dyn Node>> {
        self.nodes
            .get_mut(id.0)
            .and_then(Option::take)
            .ok_or_else(|| SimError::UnknownNode(id.to_string()))
    }

    /// 将分片交付给节点处理
    #[tracing::instrument(skip(self, req, sim), fields(master_id = req.master_id, id = req.id, to = ?to))]
    pub fn deliver(&mut self, to: NodeId, req: Request, sim: &mut Simulator) -> SimResult {
        let mut node = self.take_node(to)?;
        trace!(node_name = node.name(), "取出节点");
        let res = node.on_request(req, sim, self);
        self.nodes[to.0] = Some(node);
        res
    }

    /// 唤醒节点处理一个到期的队列条目
    pub fn wake(&mut self, to: NodeId, wake: Wake, sim: &mut Simulator) -> SimResult {
        let mut node = self.take_node(to)?;
        let res = node.on_wake(wake, sim, self);
        self.nodes[to.0] = Some(node);
        res
    }

    /// 经 `from → to` 信道发出分片：最早在 `max(now, busy_until)` 开始串行化，
    /// 再加上传播时延到达 `to`。
    #[tracing::instrument(skip(self, req, sim), fields(master_id = req.master_id, id = req.id, from = ?from, to = ?to))]
    pub fn transmit(
        &mut self,
        from: NodeId,
        to: NodeId,
        mut req: Request,
        sim: &mut Simulator,
    ) -> SimResult {
        let Some(channel) = self.channels.get_mut(&(from, to)) else {
            return Err(SimError::NoPort {
                node: self.node_name(from).to_string(),
                master_id: req.master_id,
                id: req.id,
                reason: format!("no channel towards {}", self.node_name(to)),
            });
        };
        let tx = channel.transmit(sim.now(), req.fragment_bytes);
        req.depart_time = tx.depart;
        req.last_hop = Some(from);
        if !self.ctx.graph.kind(from).is_link() {
            req.sender = Some(from);
        }
        self.stats.transmitted_fragments += 1;
        self.stats.transmitted_bytes += req.fragment_bytes;
        debug!(
            start = ?tx.start,
            depart = ?tx.depart,
            arrive = ?tx.arrive,
            bytes = req.fragment_bytes,
            "🚀 发出分片"
        );
        sim.schedule(tx.arrive, DeliverRequest { to, req });
        Ok(())
    }
}
