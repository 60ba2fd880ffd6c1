//! 网络世界实现
//!
//! 定义网络仿真的世界（World）实现，持有网络。

use super::network::Network;
use crate::error::{SimError, SimResult};
use crate::sim::World;
use std::any::Any;

/// 默认的网络世界实现：持有 Network。
pub struct NetWorld {
    pub net: Network,
}

impl NetWorld {
    pub fn new(net: Network) -> Self {
        Self { net }
    }

    /// 从事件拿到的 `dyn World` 还原出 NetWorld。
    pub fn from_world(world: &mut dyn World) -> SimResult<&mut NetWorld> {
        world
            .as_any_mut()
            .downcast_mut::<NetWorld>()
            .ok_or_else(|| SimError::InvalidConfig("world must be NetWorld".to_string()))
    }
}

impl World for NetWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
