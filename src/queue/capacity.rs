//! 容量受限缓冲
//!
//! 入队时若剩余容量足够（且下游允许）立即开始服务，否则按 FIFO 等待；
//! 离开时归还容量，并按顺序重试等待队列的队首。

use std::collections::{HashMap, VecDeque};

use super::service_time;
use crate::config::{BufferClassConfig, BufferConfig};
use crate::net::{Request, RequestKind, Token};
use crate::sim::SimTime;

/// 缓冲类别：算法相同，只有容量与带宽不同。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferClass {
    Flash,
    Dram,
    Sram,
    Switch,
}

impl BufferClass {
    pub fn params(self, cfg: &BufferConfig) -> BufferClassConfig {
        match self {
            BufferClass::Flash => cfg.flash,
            BufferClass::Dram => cfg.dram,
            BufferClass::Sram => cfg.sram,
            BufferClass::Switch => cfg.switch,
        }
    }
}

/// 入队结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// 已开始服务，在 `depart_at` 离开
    Admitted { depart_at: SimTime },
    /// 在等待队列中
    Queued,
}

#[derive(Debug)]
pub struct CapacityBuffer {
    class: BufferClass,
    capacity: u64,
    available: u64,
    read_gbps: f64,
    write_gbps: f64,
    in_service: HashMap<Token, Request>,
    pending: VecDeque<(Token, Request)>,
}

impl CapacityBuffer {
    pub fn new(class: BufferClass, params: BufferClassConfig) -> Self {
        Self {
            class,
            capacity: params.capacity_bytes,
            available: params.capacity_bytes,
            read_gbps: params.read_gbps,
            write_gbps: params.write_gbps,
            in_service: HashMap::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn class(&self) -> BufferClass {
        self.class
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn available(&self) -> u64 {
        self.available
    }

    pub fn bytes_in_flight(&self) -> u64 {
        self.capacity - self.available
    }

    /// 等待中的条目数（不含服务中的）
    pub fn queue_len(&self) -> usize {
        self.pending.len()
    }

    pub fn in_service(&self) -> usize {
        self.in_service.len()
    }

    /// 单个分片是否可能被接纳；超过总容量的分片永远无法进入。
    pub fn fits_at_all(&self, req: &Request) -> bool {
        req.fragment_bytes <= self.capacity
    }

    pub fn service_time(&self, req: &Request) -> SimTime {
        let gbps = match req.kind {
            RequestKind::Read => self.read_gbps,
            RequestKind::Write => self.write_gbps,
        };
        service_time(req.fragment_bytes, gbps)
    }

    fn start(&mut self, token: Token, mut req: Request, now: SimTime) -> SimTime {
        self.available -= req.fragment_bytes;
        let proc = self.service_time(&req);
        req.proc_time = proc;
        let depart_at = now.saturating_add(proc);
        req.depart_time = depart_at;
        self.in_service.insert(token, req);
        depart_at
    }

    /// 接纳一个分片。`downstream_free` 为 false、或已有分片在等待时，
    /// 即使容量足够也进入等待队列，保持 FIFO。
    pub fn admit(&mut self, token: Token, req: Request, now: SimTime, downstream_free: bool) -> Admission {
        if downstream_free && self.pending.is_empty() && self.available >= req.fragment_bytes {
            Admission::Admitted {
                depart_at: self.start(token, req, now),
            }
        } else {
            self.pending.push_back((token, req));
            Admission::Queued
        }
    }

    /// 服务完成：归还容量并取出分片。未知令牌返回 None。
    pub fn release(&mut self, token: Token) -> Option<Request> {
        let req = self.in_service.remove(&token)?;
        self.available += req.fragment_bytes;
        Some(req)
    }

    /// 依次重试等待队列队首，直到容量不足或 `gate` 拒绝；返回新开始服务的条目。
    ///
    /// `gate` 只在容量足够时被调用，且返回 true 即表示该条目被接纳。
    pub fn drain(
        &mut self,
        now: SimTime,
        mut gate: impl FnMut(&Request) -> bool,
    ) -> Vec<(Token, SimTime)> {
        let mut started = Vec::new();
        while let Some((_, head)) = self.pending.front() {
            if self.available < head.fragment_bytes || !gate(head) {
                break;
            }
            let Some((token, req)) = self.pending.pop_front() else {
                break;
            };
            started.push((token, self.start(token, req, now)));
        }
        started
    }
}
