//! 完成传输的汇点
//!
//! 每个逻辑传输（按 `(source, master_id)` 区分）恰好被接收一次。

use std::collections::HashSet;

use serde::Serialize;
use tracing::info;

use super::id::NodeId;
use super::request::{Request, RequestKind};
use crate::config::MB;
use crate::error::{SimError, SimResult};
use crate::sim::SimTime;

#[derive(Debug, Default)]
pub struct Sink {
    seen: HashSet<(NodeId, u64)>,
    completed: u64,
    reads: u64,
    writes: u64,
    read_bytes: u64,
    write_bytes: u64,
    latency_sum: u128,
    first_created: Option<SimTime>,
    last_completed: SimTime,
}

/// 汇总报告
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SinkReport {
    pub completed: u64,
    pub reads: u64,
    pub writes: u64,
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub mean_latency_us: f64,
    pub throughput_mbps: f64,
}

impl Sink {
    /// 接收一个已重组完成的传输。同一传输第二次到达是不变量破坏。
    pub fn accept(&mut self, req: &Request, source_name: &str, now: SimTime) -> SimResult {
        if !self.seen.insert((req.source, req.master_id)) {
            return Err(SimError::DuplicateDelivery {
                source_node: source_name.to_string(),
                master_id: req.master_id,
            });
        }
        self.completed += 1;
        match req.kind {
            RequestKind::Read => {
                self.reads += 1;
                self.read_bytes += req.total_bytes;
            }
            RequestKind::Write => {
                self.writes += 1;
                self.write_bytes += req.total_bytes;
            }
        }
        let latency = now.saturating_sub(req.created_at);
        self.latency_sum += latency.as_nanos() as u128;
        self.first_created = Some(match self.first_created {
            Some(t) => t.min(req.created_at),
            None => req.created_at,
        });
        self.last_completed = self.last_completed.max(now);
        info!(
            source = source_name,
            master_id = req.master_id,
            kind = %req.kind,
            bytes = req.total_bytes,
            latency = ?latency,
            "✅ 传输完成"
        );
        Ok(())
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn contains(&self, source: NodeId, master_id: u64) -> bool {
        self.seen.contains(&(source, master_id))
    }

    pub fn read_bytes(&self) -> u64 {
        self.read_bytes
    }

    pub fn write_bytes(&self) -> u64 {
        self.write_bytes
    }

    pub fn mean_latency(&self) -> SimTime {
        if self.completed == 0 {
            return SimTime::ZERO;
        }
        SimTime((self.latency_sum / self.completed as u128) as u64)
    }

    /// 从最早的创建时刻到最后一次完成的平均吞吐（MB/s）。
    pub fn throughput_mbps(&self) -> f64 {
        let Some(start) = self.first_created else {
            return 0.0;
        };
        let span = self.last_completed.saturating_sub(start).as_secs_f64();
        if span <= 0.0 {
            return 0.0;
        }
        (self.read_bytes + self.write_bytes) as f64 / MB as f64 / span
    }

    pub fn report(&self) -> SinkReport {
        SinkReport {
            completed: self.completed,
            reads: self.reads,
            writes: self.writes,
            read_bytes: self.read_bytes,
            write_bytes: self.write_bytes,
            mean_latency_us: self.mean_latency().as_nanos() as f64 / 1_000.0,
            throughput_mbps: self.throughput_mbps(),
        }
    }
}
