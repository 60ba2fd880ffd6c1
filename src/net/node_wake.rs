//! 节点自唤醒事件
//!
//! 排队条目的"完成"以令牌表示：入队时调度一个唤醒事件，
//! 事件触发时节点按令牌取出并移除对应条目。

use super::id::{NodeId, Token};
use super::net_world::NetWorld;
use super::stage::Stage;
use crate::error::SimResult;
use crate::sim::{Event, Simulator, World};
use tracing::trace;

/// 唤醒原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// 某个缓冲阶段的服务完成
    Stage { stage: Stage, token: Token },
    /// 交换机服务队列完成
    Service { token: Token },
    /// 磁盘完成
    Disk { token: Token },
    /// 元数据查询完成
    Lookup { token: Token },
}

impl Wake {
    pub fn token(&self) -> Token {
        match *self {
            Wake::Stage { token, .. }
            | Wake::Service { token }
            | Wake::Disk { token }
            | Wake::Lookup { token } => token,
        }
    }
}

/// 事件：唤醒某个节点。
#[derive(Debug)]
pub struct NodeWake {
    pub node: NodeId,
    pub wake: Wake,
}

impl NodeWake {
    pub fn stage(node: NodeId, stage: Stage, token: Token) -> Self {
        Self {
            node,
            wake: Wake::Stage { stage, token },
        }
    }
}

impl Event for NodeWake {
    #[tracing::instrument(skip(self, sim, world), fields(node = ?self.node, wake = ?self.wake))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) -> SimResult {
        let NodeWake { node, wake } = *self;
        trace!(now = ?sim.now(), "⏰ 节点唤醒");
        let w = NetWorld::from_world(world)?;
        w.net.wake(node, wake, sim)
    }
}
