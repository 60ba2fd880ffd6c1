//! 标识符类型
//!
//! 定义节点标识符与队列完成令牌。

use std::fmt;

/// 节点标识符（拓扑图中的下标）
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// 队列条目的完成令牌：全局单调递增，完成事件按令牌查找并移除条目。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u64);
