//! 仿真参数
//!
//! 所有参数都可以从 JSON 部分覆盖：每个段都带 `#[serde(default)]`，
//! 未出现的字段沿用默认值。

use serde::{Deserialize, Serialize};

use crate::error::{SimError, SimResult};
use crate::sim::SimTime;

pub const KB: u64 = 1024;
pub const MB: u64 = 1024 * KB;

/// 顶层配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SimConfig {
    pub buffers: BufferConfig,
    pub switches: SwitchConfig,
    pub storage: DeviceConfig,
    pub striping: StripeConfig,
    pub routing: RoutingConfig,
    pub metadata_latency_ns: u64,
    pub seed: u64,
    pub workload: WorkloadConfig,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            buffers: BufferConfig::default(),
            switches: SwitchConfig::default(),
            storage: DeviceConfig::default(),
            striping: StripeConfig::default(),
            routing: RoutingConfig::default(),
            metadata_latency_ns: 2_000,
            seed: 1,
            workload: WorkloadConfig::default(),
        }
    }
}

/// 一类缓冲区的容量与读写带宽（Gbps）。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct BufferClassConfig {
    pub capacity_bytes: u64,
    pub read_gbps: f64,
    pub write_gbps: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct BufferConfig {
    pub flash: BufferClassConfig,
    pub dram: BufferClassConfig,
    pub sram: BufferClassConfig,
    pub switch: BufferClassConfig,
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self {
            flash: BufferClassConfig {
                capacity_bytes: 256 * MB,
                read_gbps: 24.0,
                write_gbps: 16.0,
            },
            dram: BufferClassConfig {
                capacity_bytes: 1024 * MB,
                read_gbps: 160.0,
                write_gbps: 160.0,
            },
            sram: BufferClassConfig {
                capacity_bytes: 16 * MB,
                read_gbps: 400.0,
                write_gbps: 400.0,
            },
            switch: BufferClassConfig {
                capacity_bytes: 32 * MB,
                read_gbps: 200.0,
                write_gbps: 200.0,
            },
        }
    }
}

/// 单层交换机的固定处理时延与并行度。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierConfig {
    pub latency_ns: u64,
    pub parallelism: usize,
}

impl TierConfig {
    pub fn latency(&self) -> SimTime {
        SimTime::from_nanos(self.latency_ns)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SwitchConfig {
    pub edge: TierConfig,
    pub aggregation: TierConfig,
    pub core: TierConfig,
}

impl Default for SwitchConfig {
    fn default() -> Self {
        Self {
            edge: TierConfig {
                latency_ns: 500,
                parallelism: 8,
            },
            aggregation: TierConfig {
                latency_ns: 700,
                parallelism: 8,
            },
            core: TierConfig {
                latency_ns: 1_000,
                parallelism: 16,
            },
        }
    }
}

/// 存储设备（OST 磁盘）参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DeviceConfig {
    pub read_gbps: f64,
    pub write_gbps: f64,
    pub parallelism: usize,
    pub max_queue_len: usize,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            read_gbps: 4.0,
            write_gbps: 2.0,
            parallelism: 4,
            max_queue_len: 32,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct StripeConfig {
    pub stripe_size: u64,
    pub stripe_count: u32,
    pub mtu: u64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            stripe_size: 64 * KB,
            stripe_count: 3,
            mtu: 65_520,
        }
    }
}

/// 路径搜索的跳数边界（按路径上的节点数计，含两端）。
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct RoutingConfig {
    pub min_hops: usize,
    pub max_hops: usize,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            min_hops: 5,
            max_hops: 13,
        }
    }
}

/// 负载生成参数
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WorkloadConfig {
    pub interval_us: u64,
    pub ops_per_node: u64,
    pub data_bytes: u64,
    pub read_probability: f64,
    /// 每隔多少个操作插入一次 checkpoint（0 表示关闭）
    pub checkpoint_every: u64,
    pub checkpoint_fanout: usize,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            interval_us: 100,
            ops_per_node: 8,
            data_bytes: 256 * KB,
            read_probability: 0.5,
            checkpoint_every: 0,
            checkpoint_fanout: 2,
        }
    }
}

impl SimConfig {
    pub fn from_json_str(raw: &str) -> SimResult<Self> {
        let cfg: SimConfig = serde_json::from_str(raw)
            .map_err(|e| SimError::InvalidConfig(format!("parse config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> SimResult {
        let classes = [
            ("flash", &self.buffers.flash),
            ("dram", &self.buffers.dram),
            ("sram", &self.buffers.sram),
            ("switch", &self.buffers.switch),
        ];
        for (name, class) in classes {
            if !(class.read_gbps > 0.0) || !(class.write_gbps > 0.0) {
                return Err(invalid(format!("{name} buffer bandwidth must be positive")));
            }
            if class.capacity_bytes == 0 {
                return Err(invalid(format!("{name} buffer capacity must be positive")));
            }
        }
        let tiers = [
            ("edge", &self.switches.edge),
            ("aggregation", &self.switches.aggregation),
            ("core", &self.switches.core),
        ];
        for (name, tier) in tiers {
            if tier.parallelism == 0 {
                return Err(invalid(format!("{name} switch parallelism must be >= 1")));
            }
        }
        if !(self.storage.read_gbps > 0.0) || !(self.storage.write_gbps > 0.0) {
            return Err(invalid("storage device bandwidth must be positive"));
        }
        if self.storage.parallelism == 0 || self.storage.max_queue_len == 0 {
            return Err(invalid("storage device parallelism and queue length must be >= 1"));
        }
        if self.striping.stripe_size == 0 || self.striping.mtu == 0 || self.striping.stripe_count == 0 {
            return Err(invalid("stripe size, stripe count and mtu must be positive"));
        }
        if self.routing.min_hops > self.routing.max_hops || self.routing.max_hops < 3 {
            return Err(invalid(format!(
                "bad hop bounds [{}, {}]",
                self.routing.min_hops, self.routing.max_hops
            )));
        }
        if self.workload.ops_per_node > 0 && self.workload.data_bytes == 0 {
            return Err(invalid("workload data_bytes must be positive"));
        }
        if !(0.0..=1.0).contains(&self.workload.read_probability) {
            return Err(invalid("read_probability must be within [0, 1]"));
        }
        Ok(())
    }
}

fn invalid(msg: impl Into<String>) -> SimError {
    SimError::InvalidConfig(msg.into())
}
