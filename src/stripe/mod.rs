//! 条带化与重组
//!
//! 出站传输按固定单位切分（网络侧按 MTU，存储侧按条带大小），
//! 存储侧的分片再按 `stripe_count` 轮转分配到各存储目标。
//! 到达的分片在 [`ArrivalTracker`] 中按 `(source, master_id)` 累计，
//! 直到达到声明的总量。

mod fragment;
mod tracker;

pub use fragment::{Basis, StripeRouter};
pub use tracker::{ArrivalTracker, Completion};
