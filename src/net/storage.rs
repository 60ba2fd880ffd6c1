//! 存储服务器（OSS）与存储目标（OST）
//!
//! OSS 去程：NIC-RX → 按分支重组 → DRAM → 条带化 → HBA-TX → 各 OST。
//! OSS 返程：HBA-RX → 按分支重组条带 → DRAM → 按 MTU 分段 → NIC-TX → 返程路径。
//!
//! OST：闪存缓冲（放行受磁盘队列空位约束）→ 磁盘 → 闪存 → OSS。

use std::sync::Arc;

use super::context::SimContext;
use super::id::{NodeId, Token};
use super::kind::NodeKind;
use super::network::Network;
use super::node::Node;
use super::node_wake::{NodeWake, Wake};
use super::request::Request;
use super::stage::{BufferStage, Stage};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::queue::{Admission, BufferClass, StorageDeviceQueue};
use crate::sim::Simulator;
use crate::stripe::{ArrivalTracker, Completion, StripeRouter};
use tracing::{debug, trace};

#[derive(Debug)]
pub struct StorageServer {
    id: NodeId,
    name: String,
    /// 按条带下标排列的存储目标
    targets: Vec<NodeId>,
    router: StripeRouter,
    nic_rx: BufferStage,
    nic_tx: BufferStage,
    memory: BufferStage,
    hba_tx: BufferStage,
    hba_rx: BufferStage,
    inbound: ArrivalTracker,
    stripes: ArrivalTracker,
}

impl StorageServer {
    pub fn new(id: NodeId, name: impl Into<String>, ctx: &Arc<SimContext>) -> Self {
        let buffers = &ctx.config.buffers;
        Self {
            id,
            name: name.into(),
            targets: ctx.graph.storage_targets_of(id),
            router: StripeRouter::new(&ctx.config.striping),
            nic_rx: BufferStage::new(Stage::NicRx, BufferClass::Sram, buffers),
            nic_tx: BufferStage::new(Stage::NicTx, BufferClass::Sram, buffers),
            memory: BufferStage::new(Stage::Memory, BufferClass::Dram, buffers),
            hba_tx: BufferStage::new(Stage::HbaTx, BufferClass::Sram, buffers),
            hba_rx: BufferStage::new(Stage::HbaRx, BufferClass::Sram, buffers),
            inbound: ArrivalTracker::new(Completion::PerFragment),
            stripes: ArrivalTracker::new(Completion::PerFragment),
        }
    }

    pub fn targets(&self) -> &[NodeId] {
        &self.targets
    }

    fn no_port(&self, req: &Request, reason: impl Into<String>) -> SimError {
        SimError::NoPort {
            node: self.name.clone(),
            master_id: req.master_id,
            id: req.id,
            reason: reason.into(),
        }
    }

    fn on_nic_rx(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let req = self.nic_rx.finish(self.id, token, sim, net)?;
        if let Some(whole) = self.inbound.record(&self.name, req)? {
            debug!(master_id = whole.master_id, kind = %whole.kind, "📦 请求收齐");
            self.memory.offer(self.id, whole, true, sim, net)?;
        }
        self.nic_rx.drain(self.id, sim, net);
        Ok(())
    }

    fn on_memory(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let req = self.memory.finish(self.id, token, sim, net)?;
        if req.is_return_leg {
            for piece in self.router.segment(req) {
                self.nic_tx.offer(self.id, piece, true, sim, net)?;
            }
        } else {
            for piece in self.router.stripe(req, self.targets.len()) {
                trace!(piece = piece.piece, target = piece.target_storage_index, "条带分片");
                self.hba_tx.offer(self.id, piece, true, sim, net)?;
            }
        }
        self.memory.drain(self.id, sim, net);
        Ok(())
    }

    fn on_hba_tx(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let req = self.hba_tx.finish(self.id, token, sim, net)?;
        let target = self
            .targets
            .get(req.target_storage_index)
            .copied()
            .ok_or_else(|| self.no_port(&req, format!("no storage target #{}", req.target_storage_index)))?;
        let port = net
            .graph()
            .port_to_peer(self.id, target)
            .ok_or_else(|| self.no_port(&req, "storage target is not attached"))?;
        net.transmit(self.id, port, req, sim)?;
        self.hba_tx.drain(self.id, sim, net);
        Ok(())
    }

    fn on_hba_rx(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let req = self.hba_rx.finish(self.id, token, sim, net)?;
        if let Some(whole) = self.stripes.record(&self.name, req)? {
            debug!(master_id = whole.master_id, "📦 条带收齐，准备返回");
            self.memory.offer(self.id, whole, true, sim, net)?;
        }
        self.hba_rx.drain(self.id, sim, net);
        Ok(())
    }

    fn on_nic_tx(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let mut req = self.nic_tx.finish(self.id, token, sim, net)?;
        let next = match req.pop_next_hop(net.graph(), self.id) {
            Some(next) => next,
            None => {
                let graph = net.graph();
                let uplinks: Vec<NodeId> = graph
                    .ports(self.id)
                    .iter()
                    .filter(|p| graph.kind(p.peer).tier().is_some())
                    .map(|p| p.neighbor)
                    .collect();
                net.choose(&uplinks, None)
                    .ok_or_else(|| self.no_port(&req, "no switch-facing port"))?
            }
        };
        net.transmit(self.id, next, req, sim)?;
        self.nic_tx.drain(self.id, sim, net);
        Ok(())
    }
}

impl Node for StorageServer {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self, req, sim, net), fields(node_name = %self.name, master_id = req.master_id, id = req.id))]
    fn on_request(&mut self, req: Request, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let from_target = req
            .last_hop
            .is_some_and(|h| net.graph().kind(h) == NodeKind::StorageTarget);
        if from_target {
            self.hba_rx.offer(self.id, req, true, sim, net)?;
        } else {
            self.nic_rx.offer(self.id, req, true, sim, net)?;
        }
        Ok(())
    }

    fn on_wake(&mut self, wake: Wake, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let Wake::Stage { stage, token } = wake else {
            return Err(SimError::OrphanCompletion {
                node: self.name.clone(),
                token: wake.token().0,
            });
        };
        match stage {
            Stage::NicRx => self.on_nic_rx(token, sim, net),
            Stage::Memory => self.on_memory(token, sim, net),
            Stage::HbaTx => self.on_hba_tx(token, sim, net),
            Stage::HbaRx => self.on_hba_rx(token, sim, net),
            Stage::NicTx => self.on_nic_tx(token, sim, net),
            _ => Err(SimError::OrphanCompletion {
                node: self.name.clone(),
                token: token.0,
            }),
        }
    }
}

const DISK: &str = "disk";

#[derive(Debug)]
pub struct StorageTarget {
    id: NodeId,
    name: String,
    flash: BufferStage,
    disk: StorageDeviceQueue,
    /// 已放行进闪存、尚未提交给磁盘的去程分片数
    reserved: usize,
}

impl StorageTarget {
    pub fn new(id: NodeId, name: impl Into<String>, cfg: &SimConfig) -> Self {
        Self {
            id,
            name: name.into(),
            flash: BufferStage::new(Stage::Flash, BufferClass::Flash, &cfg.buffers),
            disk: StorageDeviceQueue::new(&cfg.storage),
            reserved: 0,
        }
    }

    pub fn disk(&self) -> &StorageDeviceQueue {
        &self.disk
    }

    fn invariant(&self, req: &Request, reason: impl Into<String>) -> SimError {
        SimError::Invariant {
            node: self.name.clone(),
            master_id: req.master_id,
            id: req.id,
            reason: reason.into(),
        }
    }

    /// 返程分片总是放行；去程分片要求磁盘队列计入预留后仍有空位。
    fn drain_flash(&mut self, sim: &mut Simulator, net: &mut Network) {
        let disk = &self.disk;
        let reserved = &mut self.reserved;
        self.flash.drain_with(self.id, sim, net, |r| {
            if r.is_return_leg {
                return true;
            }
            if disk.has_room(*reserved) {
                *reserved += 1;
                true
            } else {
                false
            }
        });
    }

    fn on_flash(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let req = self.flash.finish(self.id, token, sim, net)?;
        if req.is_return_leg {
            let server = req
                .last_hop
                .ok_or_else(|| self.invariant(&req, "returning fragment has no storage server"))?;
            net.transmit(self.id, server, req, sim)?;
        } else {
            self.reserved = self
                .reserved
                .checked_sub(1)
                .ok_or_else(|| self.invariant(&req, "flash released an unreserved fragment"))?;
            let now = sim.now();
            let token = net.next_token();
            match self.disk.submit(token, req, now) {
                Ok(leave_at) => {
                    sim.schedule(
                        leave_at,
                        NodeWake {
                            node: self.id,
                            wake: Wake::Disk { token },
                        },
                    );
                    net.signal_queue_len(self.id, DISK, self.disk.len());
                }
                Err(req) => {
                    return Err(self.invariant(
                        &req,
                        format!("disk queue over its maximum of {}", self.disk.max_queue_len()),
                    ));
                }
            }
        }
        self.drain_flash(sim, net);
        Ok(())
    }

    fn on_disk(&mut self, token: Token, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let req = self.disk.complete(token).ok_or_else(|| SimError::OrphanCompletion {
            node: self.name.clone(),
            token: token.0,
        })?;
        net.signal_departure(self.id, DISK, req.arrive_time, sim.now(), req.proc_time);
        trace!(kind = %req.kind, bytes = req.fragment_bytes, "💾 磁盘完成");
        self.flash.offer(self.id, req, true, sim, net)?;
        self.drain_flash(sim, net);
        Ok(())
    }
}

impl Node for StorageTarget {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self, req, sim, net), fields(node_name = %self.name, master_id = req.master_id, id = req.id, piece = req.piece))]
    fn on_request(&mut self, req: Request, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let free = self.disk.has_room(self.reserved);
        let admission = self.flash.offer(self.id, req, free, sim, net)?;
        if matches!(admission, Admission::Admitted { .. }) {
            self.reserved += 1;
        }
        Ok(())
    }

    fn on_wake(&mut self, wake: Wake, sim: &mut Simulator, net: &mut Network) -> SimResult {
        match wake {
            Wake::Stage {
                stage: Stage::Flash,
                token,
            } => self.on_flash(token, sim, net),
            Wake::Disk { token } => self.on_disk(token, sim, net),
            other => Err(SimError::OrphanCompletion {
                node: self.name.clone(),
                token: other.token().0,
            }),
        }
    }
}
