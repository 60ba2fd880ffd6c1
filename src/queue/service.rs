//! 并行度受限的流水服务队列
//!
//! 在途条目少于并行度时，完成时间 = 到达 + 服务时间；
//! 否则完成时间 = 队尾条目的完成时间 + 服务时间。
//! 每个条目对应唯一的完成令牌，完成事件按令牌取出条目。

use std::collections::BTreeMap;

use crate::net::Token;
use crate::sim::SimTime;

#[derive(Debug)]
struct Entry<T> {
    leave_at: SimTime,
    item: T,
}

#[derive(Debug)]
pub struct ServiceQueue<T> {
    parallelism: usize,
    // 令牌单调递增，BTreeMap 的最后一项即最近入队的队尾
    entries: BTreeMap<Token, Entry<T>>,
}

impl<T> ServiceQueue<T> {
    pub fn new(parallelism: usize) -> Self {
        Self {
            parallelism: parallelism.max(1),
            entries: BTreeMap::new(),
        }
    }

    pub fn parallelism(&self) -> usize {
        self.parallelism
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 计算新条目的完成时间（不入队）。
    pub fn completion_for(&self, now: SimTime, proc: SimTime) -> SimTime {
        if self.entries.len() < self.parallelism {
            return now.saturating_add(proc);
        }
        match self.entries.last_key_value() {
            Some((_, tail)) => tail.leave_at.max(now).saturating_add(proc),
            None => now.saturating_add(proc),
        }
    }

    /// 入队并返回完成时间。
    pub fn push(&mut self, token: Token, item: T, now: SimTime, proc: SimTime) -> SimTime {
        let leave_at = self.completion_for(now, proc);
        self.entries.insert(token, Entry { leave_at, item });
        leave_at
    }

    /// 完成事件：取出令牌对应的条目；条目已不存在则返回 None（孤立完成）。
    pub fn complete(&mut self, token: Token) -> Option<(T, SimTime)> {
        self.entries.remove(&token).map(|e| (e.item, e.leave_at))
    }

    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.entries.values().map(|e| &e.item)
    }
}
