//! 请求交付事件

use super::id::NodeId;
use super::net_world::NetWorld;
use super::request::Request;
use crate::error::SimResult;
use crate::sim::{Event, Simulator, World};
use tracing::debug;

/// 事件：把一个分片交给某个节点处理。
#[derive(Debug)]
pub struct DeliverRequest {
    pub to: NodeId,
    pub req: Request,
}

impl Event for DeliverRequest {
    #[tracing::instrument(skip(self, sim, world), fields(master_id = self.req.master_id, id = self.req.id, to = ?self.to))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) -> SimResult {
        let DeliverRequest { to, req } = *self;
        debug!(
            piece = req.piece,
            fragment_bytes = req.fragment_bytes,
            return_leg = req.is_return_leg,
            now = ?sim.now(),
            "📨 分片到达节点"
        );
        let w = NetWorld::from_world(world)?;
        w.net.deliver(to, req, sim)
    }
}
