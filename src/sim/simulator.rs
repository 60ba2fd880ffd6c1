//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与未来事件表。

use super::event::Event;
use super::time::SimTime;
use super::world::World;
use crate::error::SimResult;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, error, info, trace, warn};

/// 调度事件，包含执行时间、提交序号和事件对象。
pub struct ScheduledEvent {
    pub(crate) at: SimTime,
    pub(crate) seq: u64,
    pub(crate) kind: &'static str,
    pub(crate) ev: Box<dyn Event>,
}

// BinaryHeap 是 max-heap；需要最小时间优先、同一时刻按提交顺序（FIFO），因此反向比较。
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
            .reverse()
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    q: BinaryHeap<ScheduledEvent>,
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 已执行的事件数
    pub fn executed(&self) -> u64 {
        self.executed
    }

    /// 尚未执行的事件数
    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 调度事件在指定时间执行；早于当前时间的请求被钳到 `now`。
    #[tracing::instrument(skip(self, ev), fields(event_type = std::any::type_name::<E>(), schedule_at = ?at))]
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let at = if at < self.now {
            warn!(now = ?self.now, "事件时间早于当前时间，钳到 now");
            self.now
        } else {
            at
        };
        let seq = self.next_seq;
        trace!(now = ?self.now, seq, "调度事件");

        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent {
            at,
            seq,
            kind: std::any::type_name::<E>(),
            ev: Box::new(ev),
        });
    }

    fn step(&mut self, item: ScheduledEvent, world: &mut dyn World) -> SimResult {
        self.now = item.at;
        self.executed = self.executed.saturating_add(1);
        debug!(
            event_num = self.executed,
            now = ?self.now,
            seq = item.seq,
            kind = item.kind,
            remaining_queue = self.q.len(),
            "执行事件"
        );
        if let Err(e) = item.ev.execute(self, world) {
            error!(now = ?self.now, kind = item.kind, error = %e, "❌ 致命错误，终止仿真");
            return Err(e);
        }
        world.on_tick(self);
        Ok(())
    }

    /// 运行直到事件队列为空或到达 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) -> SimResult {
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            let Some(item) = self.q.pop() else { break };
            self.step(item, world)?;
        }
        self.now = self.now.max(until);
        Ok(())
    }

    /// 运行所有事件直到队列为空。
    #[tracing::instrument(skip(self, world))]
    pub fn run(&mut self, world: &mut dyn World) -> SimResult {
        info!("▶️  开始运行仿真");
        while let Some(item) = self.q.pop() {
            self.step(item, world)?;
        }
        info!(
            total_events = self.executed,
            final_time = ?self.now,
            "✅ 仿真完成"
        );
        Ok(())
    }
}
