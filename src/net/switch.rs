//! 交换机节点
//!
//! 交换机缓冲 → 转发决策 → 并行度受限的服务队列 → 出端口信道。
//! 服务队列条目的完成以令牌唤醒表示：入队时调度唤醒，唤醒时才真正发出。
//! core 发往元数据服务的去程分片不进服务队列，只延迟处理时间后发出。

use std::collections::HashMap;

use super::forwarding;
use super::id::{NodeId, Token};
use super::kind::{NodeKind, Tier};
use super::network::Network;
use super::node::Node;
use super::node_wake::{NodeWake, Wake};
use super::request::Request;
use super::stage::{BufferStage, Stage};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::queue::{BufferClass, ServiceQueue};
use crate::sim::{SimTime, Simulator};
use tracing::{debug, trace};

const SERVICE: &str = "service";

#[derive(Debug)]
pub struct SwitchNode {
    id: NodeId,
    name: String,
    tier: Tier,
    latency: SimTime,
    buffer: BufferStage,
    service: ServiceQueue<(Request, NodeId)>,
    /// 绕过服务队列、等待延迟发出的分片
    detours: HashMap<Token, (Request, NodeId)>,
}

impl SwitchNode {
    pub fn new(id: NodeId, name: impl Into<String>, tier: Tier, cfg: &SimConfig) -> Self {
        let (params, class) = match tier {
            Tier::Edge => (cfg.switches.edge, BufferClass::Switch),
            Tier::Aggregation => (cfg.switches.aggregation, BufferClass::Switch),
            Tier::Core => (cfg.switches.core, BufferClass::Sram),
        };
        Self {
            id,
            name: name.into(),
            tier,
            latency: params.latency(),
            buffer: BufferStage::new(Stage::Switch, class, &cfg.buffers),
            service: ServiceQueue::new(params.parallelism),
            detours: HashMap::new(),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// 选出端口：优先路径提示，选中提示时弹出路径队首。
    fn decide(&self, req: &mut Request, net: &mut Network) -> SimResult<NodeId> {
        let candidates = forwarding::candidates(net.graph(), self.id, req)?;
        let chosen = net
            .choose(&candidates, req.path_hint())
            .ok_or_else(|| SimError::NoPort {
                node: self.name.clone(),
                master_id: req.master_id,
                id: req.id,
                reason: "empty candidate set".to_string(),
            })?;
        let on_path = req.consume_hop(chosen);
        trace!(chosen = ?chosen, on_path, candidates = candidates.len(), "转发决策");
        Ok(chosen)
    }

    fn on_buffered(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let mut req = self.buffer.finish(self.id, token, sim, net)?;
        let next = self.decide(&mut req, net)?;

        let now = sim.now();
        // 纯控制分片不占处理时间
        let proc = if req.is_control() {
            SimTime::ZERO
        } else {
            self.latency
        };
        req.arrive_time = now;
        req.proc_time = proc;
        let token = net.next_token();

        if self.is_metadata_detour(next, net) {
            let leave_at = now.saturating_add(proc);
            self.detours.insert(token, (req, next));
            sim.schedule(
                leave_at,
                NodeWake {
                    node: self.id,
                    wake: Wake::Service { token },
                },
            );
            debug!(leave_at = ?leave_at, "转往元数据服务");
            self.buffer.drain(self.id, sim, net);
            return Ok(());
        }

        let leave_at = self.service.push(token, (req, next), now, proc);
        sim.schedule(
            leave_at,
            NodeWake {
                node: self.id,
                wake: Wake::Service { token },
            },
        );
        net.signal_queue_len(self.id, SERVICE, self.service.len());
        debug!(leave_at = ?leave_at, in_flight = self.service.len(), "进入服务队列");

        self.buffer.drain(self.id, sim, net);
        Ok(())
    }

    fn is_metadata_detour(&self, next: NodeId, net: &Network) -> bool {
        self.tier == Tier::Core
            && net
                .graph()
                .port_to(self.id, next)
                .is_some_and(|p| net.graph().kind(p.peer) == NodeKind::MetadataServer)
    }

    fn on_served(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        if let Some((req, next)) = self.detours.remove(&token) {
            return net.transmit(self.id, next, req, sim);
        }
        let (req, next) = self
            .service
            .complete(token)
            .map(|(item, _)| item)
            .ok_or_else(|| SimError::OrphanCompletion {
                node: self.name.clone(),
                token: token.0,
            })?;
        net.signal_departure(self.id, SERVICE, req.arrive_time, sim.now(), req.proc_time);
        net.transmit(self.id, next, req, sim)
    }
}

impl Node for SwitchNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self, req, sim, net), fields(node_name = %self.name, tier = ?self.tier, master_id = req.master_id, id = req.id))]
    fn on_request(&mut self, req: Request, sim: &mut Simulator, net: &mut Network) -> SimResult {
        debug!("🔀 交换机收到分片");
        self.buffer.offer(self.id, req, true, sim, net)?;
        Ok(())
    }

    fn on_wake(&mut self, wake: Wake, sim: &mut Simulator, net: &mut Network) -> SimResult {
        match wake {
            Wake::Stage {
                stage: Stage::Switch,
                token,
            } => self.on_buffered(token, sim, net),
            Wake::Service { token } => self.on_served(token, sim, net),
            other => Err(SimError::OrphanCompletion {
                node: self.name.clone(),
                token: other.token().0,
            }),
        }
    }
}
