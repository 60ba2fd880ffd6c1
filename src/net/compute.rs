//! 计算节点
//!
//! 出站：DRAM → 按 MTU 分段 → NIC-TX（SRAM）→ 沿发送路径的第一跳。
//! 入站：NIC-RX（SRAM）→ 按方向分流：
//! - 自己发起的传输的返程分片进入全分支重组，完成后交给汇点；
//! - 其它计算节点发来的传输按分支重组，完成后沿返程路径回一个确认分支。

use std::sync::Arc;

use super::context::SimContext;
use super::id::{NodeId, Token};
use super::network::Network;
use super::node::Node;
use super::node_wake::Wake;
use super::request::Request;
use super::stage::{BufferStage, Stage};
use crate::error::{SimError, SimResult};
use crate::queue::BufferClass;
use crate::sim::Simulator;
use crate::stripe::{ArrivalTracker, Completion, StripeRouter};
use tracing::{debug, info};

#[derive(Debug)]
pub struct ComputeNode {
    id: NodeId,
    name: String,
    router: StripeRouter,
    memory: BufferStage,
    nic_tx: BufferStage,
    nic_rx: BufferStage,
    /// 自己发起的传输：所有分支都确认后才算完成
    legs: ArrivalTracker,
    /// 别的计算节点发来的传输
    inbound: ArrivalTracker,
}

impl ComputeNode {
    pub fn new(id: NodeId, name: impl Into<String>, ctx: &Arc<SimContext>) -> Self {
        let buffers = &ctx.config.buffers;
        Self {
            id,
            name: name.into(),
            router: StripeRouter::new(&ctx.config.striping),
            memory: BufferStage::new(Stage::Memory, BufferClass::Dram, buffers),
            nic_tx: BufferStage::new(Stage::NicTx, BufferClass::Sram, buffers),
            nic_rx: BufferStage::new(Stage::NicRx, BufferClass::Sram, buffers),
            legs: ArrivalTracker::new(Completion::AllFragments),
            inbound: ArrivalTracker::new(Completion::PerFragment),
        }
    }

    fn on_memory(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let req = self.memory.finish(self.id, token, sim, net)?;
        for piece in self.router.segment(req) {
            self.nic_tx.offer(self.id, piece, true, sim, net)?;
        }
        self.memory.drain(self.id, sim, net);
        Ok(())
    }

    fn on_nic_tx(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let mut req = self.nic_tx.finish(self.id, token, sim, net)?;
        let next = req
            .pop_next_hop(net.graph(), self.id)
            .ok_or_else(|| SimError::NoPort {
                node: self.name.clone(),
                master_id: req.master_id,
                id: req.id,
                reason: "path does not start at a neighbor of this compute node".to_string(),
            })?;
        net.transmit(self.id, next, req, sim)?;
        self.nic_tx.drain(self.id, sim, net);
        Ok(())
    }

    fn on_nic_rx(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let req = self.nic_rx.finish(self.id, token, sim, net)?;
        if req.is_return_leg && req.source == self.id {
            if let Some(done) = self.legs.record(&self.name, req)? {
                net.complete_transfer(&done, sim.now())?;
            }
        } else if !req.is_return_leg && req.dest == self.id {
            if let Some(mut ack) = self.inbound.record(&self.name, req)? {
                info!(master_id = ack.master_id, id = ack.id, "📥 收齐一个分支，回送确认");
                ack.fragment_bytes = 0;
                ack.extent_bytes = ack.total_bytes;
                ack.turn_around();
                self.nic_tx.offer(self.id, ack, true, sim, net)?;
            }
        } else {
            return Err(SimError::Invariant {
                node: self.name.clone(),
                master_id: req.master_id,
                id: req.id,
                reason: format!(
                    "fragment for {} -> {} arrived at the wrong compute node",
                    net.node_name(req.source),
                    net.node_name(req.dest)
                ),
            });
        }
        self.nic_rx.drain(self.id, sim, net);
        Ok(())
    }
}

impl Node for ComputeNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self, req, sim, net), fields(node_name = %self.name, master_id = req.master_id, id = req.id))]
    fn on_request(&mut self, req: Request, sim: &mut Simulator, net: &mut Network) -> SimResult {
        if req.last_hop.is_none() {
            debug!(kind = %req.kind, bytes = req.total_bytes, dest = %net.node_name(req.dest), "🖥️  发起请求");
            self.legs
                .expect(self.id, req.master_id, req.id, req.total_bytes);
            self.memory.offer(self.id, req, true, sim, net)?;
        } else {
            self.nic_rx.offer(self.id, req, true, sim, net)?;
        }
        Ok(())
    }

    fn on_wake(&mut self, wake: Wake, sim: &mut Simulator, net: &mut Network) -> SimResult {
        match wake {
            Wake::Stage {
                stage: Stage::Memory,
                token,
            } => self.on_memory(token, sim, net),
            Wake::Stage {
                stage: Stage::NicTx,
                token,
            } => self.on_nic_tx(token, sim, net),
            Wake::Stage {
                stage: Stage::NicRx,
                token,
            } => self.on_nic_rx(token, sim, net),
            other => Err(SimError::OrphanCompletion {
                node: self.name.clone(),
                token: other.token().0,
            }),
        }
    }
}
