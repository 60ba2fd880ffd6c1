//! 仿真错误类型
//!
//! 配置类错误（拓扑不连通、无法解析出端口、未知节点）与不变量破坏
//! （队列越界、重组计数超出总量、孤立的完成事件）都是致命错误：
//! 事件处理返回 `Err` 后仿真立即终止。

use thiserror::Error;

/// 仿真过程中的致命错误。
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("no route from {src} to {dst}: topology is disconnected for this pair")]
    NoRoute { src: String, dst: String },

    #[error("no outbound port at {node} for request {master_id}/{id}: {reason}")]
    NoPort {
        node: String,
        master_id: u64,
        id: u64,
        reason: String,
    },

    #[error("unknown node: {0}")]
    UnknownNode(String),

    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("invariant violated at {node} (master {master_id}, fragment {id}): {reason}")]
    Invariant {
        node: String,
        master_id: u64,
        id: u64,
        reason: String,
    },

    #[error("completion token {token} at {node} matches no queued entry")]
    OrphanCompletion { node: String, token: u64 },

    #[error("transfer {master_id} from {source_node} delivered to sink twice")]
    DuplicateDelivery { source_node: String, master_id: u64 },
}

impl SimError {
    /// 是否属于配置类错误（相对于逻辑不变量破坏）。
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            SimError::NoRoute { .. }
                | SimError::NoPort { .. }
                | SimError::UnknownNode(_)
                | SimError::InvalidTopology(_)
                | SimError::InvalidConfig(_)
        )
    }
}

pub type SimResult<T = ()> = Result<T, SimError>;
