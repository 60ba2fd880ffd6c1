//! 重组的到达计数

use std::collections::{BTreeMap, HashMap};

use crate::error::{SimError, SimResult};
use crate::net::{NodeId, Request};

/// 完成判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// 每个分支 id 单独完成后即被遗忘（服务器侧）
    PerFragment,
    /// 所有已登记的分支 id 都达到总量后 master 才完成
    /// （发起端：一个 master 扇出为多个分支）
    AllFragments,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Progress {
    accumulated: u64,
    total: u64,
}

impl Progress {
    fn is_done(&self) -> bool {
        self.accumulated == self.total
    }
}

/// `(source, master_id) -> (fragment id -> bytes accumulated)`
#[derive(Debug)]
pub struct ArrivalTracker {
    mode: Completion,
    entries: HashMap<(NodeId, u64), BTreeMap<u64, Progress>>,
}

impl ArrivalTracker {
    pub fn new(mode: Completion) -> Self {
        Self {
            mode,
            entries: HashMap::new(),
        }
    }

    pub fn mode(&self) -> Completion {
        self.mode
    }

    /// 在分片返回之前登记一个分支
    pub fn expect(&mut self, source: NodeId, master_id: u64, id: u64, total: u64) {
        self.entries
            .entry((source, master_id))
            .or_default()
            .entry(id)
            .or_insert(Progress {
                accumulated: 0,
                total,
            });
    }

    pub fn is_tracking(&self, source: NodeId, master_id: u64) -> bool {
        self.entries.contains_key(&(source, master_id))
    }

    pub fn accumulated(&self, source: NodeId, master_id: u64, id: u64) -> Option<u64> {
        self.entries
            .get(&(source, master_id))
            .and_then(|legs| legs.get(&id))
            .map(|p| p.accumulated)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 计入一个到达的分片。若本次到达使传输完成则返回重组后的请求，
    /// 否则分片被吸收，返回 None。
    pub fn record(&mut self, owner: &str, mut req: Request) -> SimResult<Option<Request>> {
        let key = (req.source, req.master_id);
        let legs = self.entries.entry(key).or_default();
        let progress = legs.entry(req.id).or_insert(Progress {
            accumulated: 0,
            total: req.total_bytes,
        });
        progress.accumulated = progress.accumulated.saturating_add(req.extent_bytes);
        if progress.accumulated > progress.total {
            return Err(SimError::Invariant {
                node: owner.to_string(),
                master_id: req.master_id,
                id: req.id,
                reason: format!(
                    "reassembly counter {} exceeds declared total {}",
                    progress.accumulated, progress.total
                ),
            });
        }
        if !progress.is_done() {
            return Ok(None);
        }

        let carries_data = req.fragment_bytes > 0;
        let total = match self.mode {
            Completion::PerFragment => {
                let total = progress.total;
                legs.remove(&req.id);
                if legs.is_empty() {
                    self.entries.remove(&key);
                }
                total
            }
            Completion::AllFragments => {
                if !legs.values().all(Progress::is_done) {
                    return Ok(None);
                }
                let sum = legs.values().map(|p| p.accumulated).sum();
                self.entries.remove(&key);
                sum
            }
        };

        req.total_bytes = total;
        req.extent_bytes = total;
        req.fragment_bytes = if carries_data { total } else { 0 };
        req.piece = 0;
        Ok(Some(req))
    }
}
