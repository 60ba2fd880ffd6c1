//! 节点接口与简单节点
//!
//! 定义节点 trait 以及不带转发决策的中继节点（链路、元数据服务、内存缓冲）。

use std::collections::HashMap;

use super::id::{NodeId, Token};
use super::network::Network;
use super::node_wake::{NodeWake, Wake};
use super::request::Request;
use super::stage::{BufferStage, Stage};
use crate::config::SimConfig;
use crate::error::{SimError, SimResult};
use crate::queue::BufferClass;
use crate::sim::{SimTime, Simulator};
use tracing::{debug, trace};

/// 节点接口
pub trait Node: Send {
    /// 获取节点标识符
    fn id(&self) -> NodeId;

    /// 获取节点名称
    fn name(&self) -> &str;

    /// 处理到达的分片
    fn on_request(&mut self, req: Request, sim: &mut Simulator, net: &mut Network) -> SimResult;

    /// 处理自身调度的唤醒；不排队的节点收到唤醒即为孤立完成。
    fn on_wake(&mut self, wake: Wake, _sim: &mut Simulator, _net: &mut Network) -> SimResult {
        Err(SimError::OrphanCompletion {
            node: self.name().to_string(),
            token: wake.token().0,
        })
    }
}

/// 沿路径前进一跳；路径队首不是邻居时走"不是来处"的那个邻居。
fn relay_next(at: NodeId, name: &str, req: &mut Request, net: &Network) -> SimResult<NodeId> {
    if let Some(next) = req.pop_next_hop(net.graph(), at) {
        return Ok(next);
    }
    net.graph()
        .neighbors(at)
        .find(|&n| Some(n) != req.last_hop)
        .ok_or_else(|| SimError::NoPort {
            node: name.to_string(),
            master_id: req.master_id,
            id: req.id,
            reason: "relay has no onward neighbor".to_string(),
        })
}

/// 链路节点：零时延中继
#[derive(Debug)]
pub struct LinkRelay {
    id: NodeId,
    name: String,
}

impl LinkRelay {
    pub fn new(id: NodeId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

impl Node for LinkRelay {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn on_request(&mut self, mut req: Request, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let next = relay_next(self.id, &self.name, &mut req, net)?;
        trace!(link = %self.name, next = ?next, "链路中继");
        net.transmit(self.id, next, req, sim)
    }
}

/// 元数据服务：固定查询时延后原路返回给发来的核心交换机
#[derive(Debug)]
pub struct MetadataNode {
    id: NodeId,
    name: String,
    latency: SimTime,
    pending: HashMap<Token, Request>,
}

impl MetadataNode {
    pub fn new(id: NodeId, name: impl Into<String>, cfg: &SimConfig) -> Self {
        Self {
            id,
            name: name.into(),
            latency: SimTime::from_nanos(cfg.metadata_latency_ns),
            pending: HashMap::new(),
        }
    }
}

impl Node for MetadataNode {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    #[tracing::instrument(skip(self, req, sim, net), fields(node_name = %self.name, master_id = req.master_id, id = req.id))]
    fn on_request(&mut self, mut req: Request, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let now = sim.now();
        req.arrive_time = now;
        req.proc_time = self.latency;
        let token = net.next_token();
        self.pending.insert(token, req);
        sim.schedule(
            now.saturating_add(self.latency),
            NodeWake {
                node: self.id,
                wake: Wake::Lookup { token },
            },
        );
        net.signal_queue_len(self.id, "lookup", self.pending.len());
        debug!("🔎 元数据查询");
        Ok(())
    }

    fn on_wake(&mut self, wake: Wake, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let token = wake.token();
        let req = match wake {
            Wake::Lookup { .. } => self.pending.remove(&token),
            _ => None,
        };
        let req = req.ok_or_else(|| SimError::OrphanCompletion {
            node: self.name.clone(),
            token: token.0,
        })?;
        net.signal_departure(self.id, "lookup", req.arrive_time, sim.now(), req.proc_time);
        let back = req.last_hop.ok_or_else(|| SimError::NoPort {
            node: self.name.clone(),
            master_id: req.master_id,
            id: req.id,
            reason: "lookup request has no previous hop".to_string(),
        })?;
        net.transmit(self.id, back, req, sim)
    }
}

/// 独立的内存缓冲跳：DRAM 服务后沿路径前进
#[derive(Debug)]
pub struct MemoryRelay {
    id: NodeId,
    name: String,
    memory: BufferStage,
}

impl MemoryRelay {
    pub fn new(id: NodeId, name: impl Into<String>, cfg: &SimConfig) -> Self {
        Self {
            id,
            name: name.into(),
            memory: BufferStage::new(Stage::Memory, BufferClass::Dram, &cfg.buffers),
        }
    }
}

impl Node for MemoryRelay {
    fn id(&self) -> NodeId {
        self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn on_request(&mut self, req: Request, sim: &mut Simulator, net: &mut Network) -> SimResult {
        self.memory.offer(self.id, req, true, sim, net)?;
        Ok(())
    }

    fn on_wake(&mut self, wake: Wake, sim: &mut Simulator, net: &mut Network) -> SimResult {
        let Wake::Stage {
            stage: Stage::Memory,
            token,
        } = wake
        else {
            return Err(SimError::OrphanCompletion {
                node: self.name.clone(),
                token: wake.token().0,
            });
        };
        let mut req = self.memory.finish(self.id, token, sim, net)?;
        let next = relay_next(self.id, &self.name, &mut req, net)?;
        net.transmit(self.id, next, req, sim)?;
        self.memory.drain(self.id, sim, net);
        Ok(())
    }
}
