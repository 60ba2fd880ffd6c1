//! 出端口信道
//!
//! 单一的串行化时延模型：信道忙到 `busy_until`，新的发送最早从
//! `max(now, busy_until)` 开始，再加上传播时延到达对端。

use super::graph::ChannelSpec;
use crate::sim::SimTime;

/// 一个方向上的信道状态
#[derive(Debug, Clone)]
pub struct Channel {
    pub spec: ChannelSpec,
    /// 当前发送完成的时刻（transmission-finish timestamp）
    pub busy_until: SimTime,
}

/// 一次发送的时刻表
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transmission {
    pub start: SimTime,
    pub depart: SimTime,
    pub arrive: SimTime,
}

impl Channel {
    pub fn new(spec: ChannelSpec) -> Self {
        Self {
            spec,
            busy_until: SimTime::ZERO,
        }
    }

    /// 最早可开始发送的时刻
    pub fn ready_at(&self, now: SimTime) -> SimTime {
        now.max(self.busy_until)
    }

    /// 计算传输指定字节数所需的时间
    pub(crate) fn tx_time(&self, bytes: u64) -> SimTime {
        let Some(bps) = self.spec.bandwidth_bps else {
            return SimTime::ZERO;
        };
        if bytes == 0 {
            return SimTime::ZERO;
        }
        if bps == 0 {
            return SimTime(u64::MAX / 4);
        }
        // ceil(bytes*8 / bps) 秒 -> 纳秒
        let bits = (bytes as u128).saturating_mul(8);
        let nanos = (bits.saturating_mul(1_000_000_000u128) + (bps as u128 - 1)) / bps as u128;
        SimTime(nanos.min(u64::MAX as u128) as u64)
    }

    /// 占用信道发送 `bytes` 字节，返回开始/离开/到达时刻。
    pub fn transmit(&mut self, now: SimTime, bytes: u64) -> Transmission {
        let start = self.ready_at(now);
        let depart = start.saturating_add(self.tx_time(bytes));
        self.busy_until = depart;
        Transmission {
            start,
            depart,
            arrive: depart.saturating_add(self.spec.latency),
        }
    }
}
