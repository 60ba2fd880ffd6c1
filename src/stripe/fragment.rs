//! 分片

use crate::config::StripeConfig;
use crate::net::Request;

/// 切分依据的字节数
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Basis {
    /// 线路字节；控制分片不切分
    Wire,
    /// 逻辑范围；零字节的读请求也按条带扇出
    Extent,
}

#[derive(Debug, Clone)]
pub struct StripeRouter {
    stripe_size: u64,
    stripe_count: u32,
    mtu: u64,
}

impl StripeRouter {
    pub fn new(cfg: &StripeConfig) -> Self {
        Self {
            stripe_size: cfg.stripe_size.max(1),
            stripe_count: cfg.stripe_count.max(1),
            mtu: cfg.mtu.max(1),
        }
    }

    pub fn stripe_size(&self) -> u64 {
        self.stripe_size
    }

    pub fn stripe_count(&self) -> u32 {
        self.stripe_count
    }

    pub fn mtu(&self) -> u64 {
        self.mtu
    }

    /// 把 `req` 切成连续的 `unit` 大小分片，最后一片截断为余数。
    ///
    /// 分片保留 `id`、`master_id`、路径与总量，以 `piece` 编号；
    /// 不超过 `unit` 的请求原样返回。
    pub fn split(req: Request, unit: u64, basis: Basis) -> Vec<Request> {
        let carries_data = req.fragment_bytes > 0;
        let size = match basis {
            Basis::Wire => req.fragment_bytes,
            Basis::Extent if carries_data => req.fragment_bytes,
            Basis::Extent => req.extent_bytes,
        };
        if size <= unit {
            return vec![req];
        }

        let mut pieces = Vec::with_capacity(size.div_ceil(unit) as usize);
        let mut remaining = size;
        let mut index = 0u32;
        while remaining > 0 {
            let len = remaining.min(unit);
            let mut piece = req.clone();
            piece.piece = index;
            piece.extent_bytes = len;
            piece.fragment_bytes = if carries_data { len } else { 0 };
            pieces.push(piece);
            remaining -= len;
            index += 1;
        }
        pieces
    }

    /// 网络侧按 MTU 分段
    pub fn segment(&self, req: Request) -> Vec<Request> {
        Self::split(req, self.mtu, Basis::Wire)
    }

    /// 存储侧条带化：按条带大小切分，从请求的基准下标开始在
    /// `stripe_count` 个目标间轮转，对本服务器的目标数取模。
    pub fn stripe(&self, req: Request, target_count: usize) -> Vec<Request> {
        let base = req.target_storage_index;
        let count = target_count.max(1);
        let mut pieces = Self::split(req, self.stripe_size, Basis::Extent);
        for (k, piece) in pieces.iter_mut().enumerate() {
            let lane = k % self.stripe_count as usize;
            piece.target_storage_index = (base + lane) % count;
        }
        pieces
    }
}
