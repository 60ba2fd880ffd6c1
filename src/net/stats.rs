//! 统计信息
//!
//! 每个缓冲/交换机事件上报三类逐跳信号：队列长度、停留时间（到达→离开）、
//! 等待时间（停留时间 − 处理时间）。信号只读，不参与控制路径。

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::trace;

use crate::sim::SimTime;

/// 逐跳信号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    QueueLength,
    StayTime,
    WaitingTime,
}

impl Signal {
    pub fn label(self) -> &'static str {
        match self {
            Signal::QueueLength => "queue_length",
            Signal::StayTime => "stay_time_ns",
            Signal::WaitingTime => "waiting_time_ns",
        }
    }
}

/// 单个信号的累计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub count: u64,
    pub sum: u64,
    pub max: u64,
}

impl Summary {
    fn add(&mut self, value: u64) {
        self.count += 1;
        self.sum = self.sum.saturating_add(value);
        self.max = self.max.max(value);
    }

    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum as f64 / self.count as f64
        }
    }
}

/// 导出用的一行
#[derive(Debug, Clone, Serialize)]
pub struct SignalRow {
    pub node: String,
    pub stage: &'static str,
    pub signal: Signal,
    pub count: u64,
    pub mean: f64,
    pub max: u64,
}

/// 网络统计信息
#[derive(Debug, Default)]
pub struct Stats {
    pub transmitted_fragments: u64,
    pub transmitted_bytes: u64,
    signals: BTreeMap<(String, &'static str, Signal), Summary>,
}

impl Stats {
    pub fn record(&mut self, node: &str, stage: &'static str, signal: Signal, value: u64) {
        trace!(node, stage, signal = signal.label(), value, "📈 signal");
        self.signals
            .entry((node.to_string(), stage, signal))
            .or_default()
            .add(value);
    }

    pub fn record_queue_len(&mut self, node: &str, stage: &'static str, len: usize) {
        self.record(node, stage, Signal::QueueLength, len as u64);
    }

    /// 一次离开：停留时间与等待时间一起上报。
    pub fn record_departure(
        &mut self,
        node: &str,
        stage: &'static str,
        arrived: SimTime,
        now: SimTime,
        proc: SimTime,
    ) {
        let stay = now.saturating_sub(arrived);
        self.record(node, stage, Signal::StayTime, stay.as_nanos());
        self.record(
            node,
            stage,
            Signal::WaitingTime,
            stay.saturating_sub(proc).as_nanos(),
        );
    }

    pub fn summary(&self, node: &str, stage: &'static str, signal: Signal) -> Option<Summary> {
        self.signals.get(&(node.to_string(), stage, signal)).copied()
    }

    /// 某个阶段在所有节点上的合计
    pub fn stage_total(&self, stage: &str, signal: Signal) -> Summary {
        let mut total = Summary::default();
        for ((_, s, sig), v) in &self.signals {
            if *s == stage && *sig == signal {
                total.count += v.count;
                total.sum = total.sum.saturating_add(v.sum);
                total.max = total.max.max(v.max);
            }
        }
        total
    }

    pub fn rows(&self) -> Vec<SignalRow> {
        self.signals
            .iter()
            .map(|((node, stage, signal), v)| SignalRow {
                node: node.clone(),
                stage,
                signal: *signal,
                count: v.count,
                mean: v.mean(),
                max: v.max,
            })
            .collect()
    }
}
