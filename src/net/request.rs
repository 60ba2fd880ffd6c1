//! 读写请求
//!
//! 一个逻辑读写操作在途中被切成若干分片，每个分片都是一个 `Request`。
//! 同一操作的所有分片共享 `master_id`；同一扇出分支的分片共享 `id`，
//! 以 `piece` 区分。

use std::collections::VecDeque;
use std::fmt;

use super::graph::TopologyGraph;
use super::id::NodeId;
use crate::sim::SimTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Read,
    Write,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestKind::Read => write!(f, "read"),
            RequestKind::Write => write!(f, "write"),
        }
    }
}

/// 读写请求（分片）
#[derive(Debug, Clone)]
pub struct Request {
    /// 扇出分支 id（同一分支的分片共享）
    pub id: u64,
    pub master_id: u64,
    /// 分支内的分片序号
    pub piece: u32,
    pub kind: RequestKind,
    /// 线路上携带的字节数；0 表示控制/确认分片
    pub fragment_bytes: u64,
    /// 本分片在重组时计入的逻辑字节数（写确认虽不带数据，仍计入其覆盖的范围）
    pub extent_bytes: u64,
    /// 本分支声明的总字节数
    pub total_bytes: u64,
    pub source: NodeId,
    pub dest: NodeId,
    pub target_storage_index: usize,
    pub is_checkpoint_leg: bool,
    pub is_return_leg: bool,
    pub send_path: VecDeque<NodeId>,
    pub back_path: VecDeque<NodeId>,
    /// 最近一个发出它的非链路节点（交换机按它判断来自哪一层）
    pub sender: Option<NodeId>,
    /// 紧邻的上一跳（含链路节点）；None 表示刚由负载生成器注入
    pub last_hop: Option<NodeId>,
    pub created_at: SimTime,
    pub arrive_time: SimTime,
    pub depart_time: SimTime,
    pub proc_time: SimTime,
}

impl Request {
    /// 新建一个尚未分片的请求；写请求携带数据，读请求出发时不带数据。
    pub fn new(
        id: u64,
        master_id: u64,
        kind: RequestKind,
        total_bytes: u64,
        source: NodeId,
        dest: NodeId,
        now: SimTime,
    ) -> Self {
        let fragment_bytes = match kind {
            RequestKind::Write => total_bytes,
            RequestKind::Read => 0,
        };
        Self {
            id,
            master_id,
            piece: 0,
            kind,
            fragment_bytes,
            extent_bytes: total_bytes,
            total_bytes,
            source,
            dest,
            target_storage_index: 0,
            is_checkpoint_leg: false,
            is_return_leg: false,
            send_path: VecDeque::new(),
            back_path: VecDeque::new(),
            sender: None,
            last_hop: None,
            created_at: now,
            arrive_time: now,
            depart_time: now,
            proc_time: SimTime::ZERO,
        }
    }

    pub fn with_paths(mut self, send: &[NodeId], back: &[NodeId]) -> Self {
        self.send_path = send.iter().copied().collect();
        self.back_path = back.iter().copied().collect();
        self
    }

    /// 控制/确认分片（不携带数据）
    pub fn is_control(&self) -> bool {
        self.fragment_bytes == 0
    }

    /// 当前方向上使用的路径
    pub fn active_path(&self) -> &VecDeque<NodeId> {
        if self.is_return_leg {
            &self.back_path
        } else {
            &self.send_path
        }
    }

    fn active_path_mut(&mut self) -> &mut VecDeque<NodeId> {
        if self.is_return_leg {
            &mut self.back_path
        } else {
            &mut self.send_path
        }
    }

    /// 路径上的下一跳提示（不弹出）
    pub fn path_hint(&self) -> Option<NodeId> {
        self.active_path().front().copied()
    }

    /// 若选定的下一跳正是路径队首则弹出；返回是否弹出。
    pub fn consume_hop(&mut self, chosen: NodeId) -> bool {
        let path = self.active_path_mut();
        if path.front() == Some(&chosen) {
            path.pop_front();
            true
        } else {
            false
        }
    }

    /// 若路径队首是 `at` 的邻居，则弹出并返回它。
    pub fn pop_next_hop(&mut self, graph: &TopologyGraph, at: NodeId) -> Option<NodeId> {
        let next = self.path_hint()?;
        if graph.is_neighbor(at, next) {
            self.active_path_mut().pop_front();
            Some(next)
        } else {
            None
        }
    }

    /// 转为返程：目标位置处理完成后沿 back path 返回。
    pub fn turn_around(&mut self) {
        self.is_return_leg = true;
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}#{}/{}.{} {}B/{}B",
            self.kind, self.master_id, self.id, self.piece, self.fragment_bytes, self.total_bytes
        )
    }
}
