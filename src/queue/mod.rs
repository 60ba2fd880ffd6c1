//! 排队模型
//!
//! - [`CapacityBuffer`]：按字节容量约束的缓冲（内存/闪存/SRAM/交换机缓冲），
//!   服务时间由读写带宽决定；
//! - [`ServiceQueue`]：按并行度约束的流水服务队列，交换机与磁盘共用；
//! - [`StorageDeviceQueue`]：磁盘服务队列。

use crate::config::MB;
use crate::sim::SimTime;

mod capacity;
mod device;
mod service;

pub use capacity::{Admission, BufferClass, CapacityBuffer};
pub use device::StorageDeviceQueue;
pub use service::ServiceQueue;

/// 以 `gbps` 带宽处理 `bytes` 字节所需时间：8 × sizeMB / gbps 秒。
pub fn service_time(bytes: u64, gbps: f64) -> SimTime {
    if bytes == 0 || !(gbps > 0.0) {
        return SimTime::ZERO;
    }
    let size_mb = bytes as f64 / MB as f64;
    SimTime::from_secs_f64(8.0 * size_mb / gbps)
}
