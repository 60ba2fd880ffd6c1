//! 负载生成
//!
//! 每个计算节点按固定间隔发起 `ops_per_node` 个操作。普通操作随机选择
//! 存储服务器、读写类型、基准条带下标与去/回路径；每 `checkpoint_every`
//! 个操作插入一次 checkpoint：把数据写给 `checkpoint_fanout` 个其它计算节点，
//! 各分支共享一个 master id。

use rand::Rng;
use rand::seq::SliceRandom;

use crate::error::{SimError, SimResult};
use crate::net::{NetWorld, Network, NodeId, Request, RequestKind, SimContext};
use crate::sim::{Event, SimTime, Simulator, World};
use tracing::{debug, info};

/// 事件：某个计算节点发起第 `issued` 个操作。
#[derive(Debug)]
pub struct GenerateRequest {
    pub node: NodeId,
    pub issued: u64,
}

/// 为每个计算节点调度第一次生成，返回参与的节点数。
pub fn schedule_workload(sim: &mut Simulator, world: &NetWorld) -> usize {
    if world.net.config().workload.ops_per_node == 0 {
        return 0;
    }
    let nodes = world.net.graph().compute_nodes();
    for &node in &nodes {
        sim.schedule(SimTime::ZERO, GenerateRequest { node, issued: 0 });
    }
    info!(compute_nodes = nodes.len(), "🧪 负载已调度");
    nodes.len()
}

/// 从路由表中均匀随机选出去程与返程路径（都以对端结尾）。
fn pick_paths(
    net: &mut Network,
    ctx: &SimContext,
    src: NodeId,
    dst: NodeId,
) -> SimResult<(Vec<NodeId>, Vec<NodeId>)> {
    let mut pick = |from: NodeId, to: NodeId| -> SimResult<Vec<NodeId>> {
        let set = ctx.routes.require(&ctx.graph, from, to)?;
        let mut path = set
            .routes()
            .choose(net.rng())
            .cloned()
            .ok_or_else(|| SimError::NoRoute {
                src: ctx.graph.name(from).to_string(),
                dst: ctx.graph.name(to).to_string(),
            })?;
        path.push(to);
        Ok(path)
    };
    let send = pick(src, dst)?;
    let back = pick(dst, src)?;
    Ok((send, back))
}

fn issue_storage_op(
    net: &mut Network,
    ctx: &SimContext,
    node: NodeId,
    sim: &mut Simulator,
) -> SimResult {
    let cfg = &ctx.config.workload;
    let servers = ctx.graph.storage_servers();
    let oss = *servers
        .choose(net.rng())
        .ok_or_else(|| SimError::InvalidTopology("no storage server to address".to_string()))?;
    let kind = if net.rng().gen_bool(cfg.read_probability) {
        RequestKind::Read
    } else {
        RequestKind::Write
    };
    let targets = ctx.graph.storage_targets_of(oss).len().max(1);
    let base = net.rng().gen_range(0..targets);
    let (send, back) = pick_paths(net, ctx, node, oss)?;

    let master_id = net.next_request_id();
    let id = net.next_request_id();
    let mut req = Request::new(id, master_id, kind, cfg.data_bytes, node, oss, sim.now())
        .with_paths(&send, &back);
    req.target_storage_index = base;
    debug!(master_id, kind = %kind, oss = %ctx.graph.name(oss), base, "生成存储请求");
    net.deliver(node, req, sim)
}

/// 返回 false 表示没有可用的对端，调用方改发普通存储操作。
fn issue_checkpoint(
    net: &mut Network,
    ctx: &SimContext,
    node: NodeId,
    sim: &mut Simulator,
) -> SimResult<bool> {
    let cfg = &ctx.config.workload;
    let peers: Vec<NodeId> = ctx
        .graph
        .compute_nodes()
        .into_iter()
        .filter(|&n| n != node)
        .collect();
    let fanout = cfg.checkpoint_fanout.min(peers.len());
    if fanout == 0 {
        return Ok(false);
    }
    let chosen: Vec<NodeId> = peers.choose_multiple(net.rng(), fanout).copied().collect();

    let master_id = net.next_request_id();
    debug!(master_id, fanout, "生成 checkpoint");
    for peer in chosen {
        let (send, back) = pick_paths(net, ctx, node, peer)?;
        let id = net.next_request_id();
        let mut leg = Request::new(
            id,
            master_id,
            RequestKind::Write,
            cfg.data_bytes,
            node,
            peer,
            sim.now(),
        )
        .with_paths(&send, &back);
        leg.is_checkpoint_leg = true;
        net.deliver(node, leg, sim)?;
    }
    Ok(true)
}

impl Event for GenerateRequest {
    #[tracing::instrument(skip(self, sim, world), fields(node = ?self.node, issued = self.issued))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) -> SimResult {
        let GenerateRequest { node, issued } = *self;
        let w = NetWorld::from_world(world)?;
        let ctx = w.net.context();
        let cfg = &ctx.config.workload;
        if issued >= cfg.ops_per_node {
            return Ok(());
        }

        let checkpoint = cfg.checkpoint_every > 0 && (issued + 1) % cfg.checkpoint_every == 0;
        if !(checkpoint && issue_checkpoint(&mut w.net, &ctx, node, sim)?) {
            issue_storage_op(&mut w.net, &ctx, node, sim)?;
        }

        if issued + 1 < cfg.ops_per_node {
            let next_at = sim.now().saturating_add(SimTime::from_micros(cfg.interval_us));
            sim.schedule(
                next_at,
                GenerateRequest {
                    node,
                    issued: issued + 1,
                },
            );
        }
        Ok(())
    }
}
