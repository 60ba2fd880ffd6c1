//! 节点内的缓冲阶段
//!
//! 把 [`CapacityBuffer`] 与事件调度、逐跳信号上报绑在一起：
//! 入队后若立即开始服务，就在离开时刻给所属节点调度一次唤醒；
//! 唤醒时归还容量，再由节点决定是否重试等待队列。

use super::id::{NodeId, Token};
use super::network::Network;
use super::node_wake::NodeWake;
use super::request::Request;
use crate::config::BufferConfig;
use crate::error::{SimError, SimResult};
use crate::queue::{Admission, BufferClass, CapacityBuffer};
use crate::sim::Simulator;
use tracing::trace;

/// 节点内的阶段名（同一节点可有多个同类缓冲）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Switch,
    Memory,
    NicTx,
    NicRx,
    HbaTx,
    HbaRx,
    Flash,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Switch => "switch_buffer",
            Stage::Memory => "memory",
            Stage::NicTx => "nic_tx",
            Stage::NicRx => "nic_rx",
            Stage::HbaTx => "hba_tx",
            Stage::HbaRx => "hba_rx",
            Stage::Flash => "flash",
        }
    }
}

#[derive(Debug)]
pub struct BufferStage {
    stage: Stage,
    buf: CapacityBuffer,
}

impl BufferStage {
    pub fn new(stage: Stage, class: BufferClass, cfg: &BufferConfig) -> Self {
        Self {
            stage,
            buf: CapacityBuffer::new(class, class.params(cfg)),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn buffer(&self) -> &CapacityBuffer {
        &self.buf
    }

    fn occupancy(&self) -> usize {
        self.buf.queue_len() + self.buf.in_service()
    }

    /// 分片进入本阶段。`downstream_free` 为 false 时排队等待。
    pub fn offer(
        &mut self,
        owner: NodeId,
        mut req: Request,
        downstream_free: bool,
        sim: &mut Simulator,
        net: &mut Network,
    ) -> SimResult<Admission> {
        if !self.buf.fits_at_all(&req) {
            return Err(SimError::Invariant {
                node: net.node_name(owner).to_string(),
                master_id: req.master_id,
                id: req.id,
                reason: format!(
                    "{}B fragment can never fit {} capacity {}B",
                    req.fragment_bytes,
                    self.stage.label(),
                    self.buf.capacity()
                ),
            });
        }
        let now = sim.now();
        req.arrive_time = now;
        let token = net.next_token();
        let admission = self.buf.admit(token, req, now, downstream_free);
        if let Admission::Admitted { depart_at } = admission {
            sim.schedule(depart_at, NodeWake::stage(owner, self.stage, token));
        }
        trace!(node = ?owner, stage = self.stage.label(), ?admission, "进入缓冲");
        net.signal_queue_len(owner, self.stage.label(), self.occupancy());
        Ok(admission)
    }

    /// 服务完成：归还容量、上报停留/等待时间并交还分片。
    pub fn finish(
        &mut self,
        owner: NodeId,
        token: Token,
        sim: &Simulator,
        net: &mut Network,
    ) -> SimResult<Request> {
        let req = self.buf.release(token).ok_or_else(|| SimError::OrphanCompletion {
            node: format!("{}.{}", net.node_name(owner), self.stage.label()),
            token: token.0,
        })?;
        net.signal_departure(
            owner,
            self.stage.label(),
            req.arrive_time,
            sim.now(),
            req.proc_time,
        );
        Ok(req)
    }

    /// 按顺序重试等待队列，`gate` 为下游放行条件。
    pub fn drain_with(
        &mut self,
        owner: NodeId,
        sim: &mut Simulator,
        net: &mut Network,
        gate: impl FnMut(&Request) -> bool,
    ) {
        let started = self.buf.drain(sim.now(), gate);
        if started.is_empty() {
            return;
        }
        for (token, depart_at) in started {
            sim.schedule(depart_at, NodeWake::stage(owner, self.stage, token));
        }
        net.signal_queue_len(owner, self.stage.label(), self.occupancy());
    }

    pub fn drain(&mut self, owner: NodeId, sim: &mut Simulator, net: &mut Network) {
        self.drain_with(owner, sim, net, |_| true);
    }
}
