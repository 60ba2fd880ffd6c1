//! 存储设备（磁盘）服务队列
//!
//! 读：响应携带分片数据；写：以零字节确认返回。
//! `is_free` 供上游闪存缓冲决定是否放行。

use super::service::ServiceQueue;
use super::service_time;
use crate::config::DeviceConfig;
use crate::net::{Request, RequestKind, Token};
use crate::sim::SimTime;

#[derive(Debug)]
pub struct StorageDeviceQueue {
    read_gbps: f64,
    write_gbps: f64,
    max_queue_len: usize,
    queue: ServiceQueue<Request>,
}

impl StorageDeviceQueue {
    pub fn new(cfg: &DeviceConfig) -> Self {
        Self {
            read_gbps: cfg.read_gbps,
            write_gbps: cfg.write_gbps,
            max_queue_len: cfg.max_queue_len,
            queue: ServiceQueue::new(cfg.parallelism),
        }
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn max_queue_len(&self) -> usize {
        self.max_queue_len
    }

    /// 占用低于上限
    pub fn is_free(&self) -> bool {
        self.queue.len() < self.max_queue_len
    }

    /// 计入 `reserved` 个已放行、尚在路上的分片后是否仍有空位。
    pub fn has_room(&self, reserved: usize) -> bool {
        self.queue.len().saturating_add(reserved) < self.max_queue_len
    }

    pub fn service_time(&self, req: &Request) -> SimTime {
        let gbps = match req.kind {
            RequestKind::Read => self.read_gbps,
            RequestKind::Write => self.write_gbps,
        };
        service_time(req.extent_bytes, gbps)
    }

    /// 提交一个分片，返回完成时间。占用已达上限时返回 Err 并交还分片。
    pub fn submit(&mut self, token: Token, mut req: Request, now: SimTime) -> Result<SimTime, Request> {
        if self.queue.len() >= self.max_queue_len {
            return Err(req);
        }
        let proc = self.service_time(&req);
        req.fragment_bytes = match req.kind {
            RequestKind::Read => req.extent_bytes,
            RequestKind::Write => 0,
        };
        req.arrive_time = now;
        req.proc_time = proc;
        req.turn_around();
        let leave_at = self.queue.push(token, req, now, proc);
        Ok(leave_at)
    }

    pub fn complete(&mut self, token: Token) -> Option<Request> {
        self.queue.complete(token).map(|(mut req, leave_at)| {
            req.depart_time = leave_at;
            req
        })
    }
}
