//! 静态路径发现
//!
//! 对每一对 (计算节点, 计算节点) 与 (计算节点, 存储服务器) 做深度优先枚举，
//! 按胖树的层级位置剪枝，只保留每对端点之间最短的等长中间路径集合。
//!
//! 剪枝规则（候选节点被拒绝、分支放弃）：
//! - 目的端点出现在不足两跳的位置；
//! - 死胡同类型（存储目标、元数据服务、内存缓冲），或不是目的地的存储服务器/计算节点；
//! - 路径长度超过 `max_hops`；
//! - 节点类型与它在规范胖树遍历中的位置不符（见 [`NodeKind::allowed_at_depth`]）。
//!
//! 到达目的地的路径还需通过 `check_path`：长度为奇数、落在 [min, max] 内、
//! 任何交换机最多出现两次。

use std::collections::HashMap;

use super::graph::TopologyGraph;
use super::id::NodeId;
use super::kind::NodeKind;
use crate::config::RoutingConfig;
use crate::error::{SimError, SimResult};
use tracing::{debug, info, trace};

/// 单个交换机在一条路径上允许出现的最多次数
const MAX_SWITCH_VISITS: usize = 2;

/// 一对端点之间的最短等长中间路径（不含两端）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteSet {
    routes: Vec<Vec<NodeId>>,
}

impl RouteSet {
    /// 中间段长度；空集合返回 None
    pub fn midway_len(&self) -> Option<usize> {
        self.routes.first().map(Vec::len)
    }

    pub fn routes(&self) -> &[Vec<NodeId>] {
        &self.routes
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    /// 更短的路径替换全部已有路径，等长的追加（去重），更长的丢弃。
    fn offer(&mut self, midway: Vec<NodeId>) {
        match self.midway_len() {
            Some(len) if midway.len() > len => {}
            Some(len) if midway.len() == len => {
                if !self.routes.contains(&midway) {
                    self.routes.push(midway);
                }
            }
            _ => {
                self.routes.clear();
                self.routes.push(midway);
            }
        }
    }
}

/// (源, 目的) → RouteSet
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    sets: HashMap<(NodeId, NodeId), RouteSet>,
}

impl RouteTable {
    pub fn get(&self, src: NodeId, dst: NodeId) -> Option<&RouteSet> {
        self.sets.get(&(src, dst)).filter(|s| !s.is_empty())
    }

    /// 与 `get` 相同，但缺失时返回配置错误。
    pub fn require(&self, graph: &TopologyGraph, src: NodeId, dst: NodeId) -> SimResult<&RouteSet> {
        self.get(src, dst).ok_or_else(|| SimError::NoRoute {
            src: graph.name(src).to_string(),
            dst: graph.name(dst).to_string(),
        })
    }

    pub fn pairs(&self) -> impl Iterator<Item = (&(NodeId, NodeId), &RouteSet)> {
        self.sets.iter()
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    /// 记录一条完整路径（含两端）及其反向路径。
    fn record(&mut self, path: &[NodeId]) {
        let (Some(&src), Some(&dst)) = (path.first(), path.last()) else {
            return;
        };
        let midway = path[1..path.len() - 1].to_vec();
        let mut reversed = midway.clone();
        reversed.reverse();
        self.sets.entry((src, dst)).or_default().offer(midway);
        self.sets.entry((dst, src)).or_default().offer(reversed);
    }
}

/// 路径发现器
#[derive(Debug)]
pub struct PathFinder<'g> {
    graph: &'g TopologyGraph,
    min_hops: usize,
    max_hops: usize,
}

impl<'g> PathFinder<'g> {
    pub fn new(graph: &'g TopologyGraph, cfg: &RoutingConfig) -> Self {
        Self {
            graph,
            min_hops: cfg.min_hops,
            max_hops: cfg.max_hops,
        }
    }

    /// 枚举 `src` 到 `dst` 的全部合法完整路径（含两端）。
    pub fn enumerate(&self, src: NodeId, dst: NodeId) -> Vec<Vec<NodeId>> {
        let mut out = Vec::new();
        let mut path = Vec::with_capacity(self.max_hops + 1);
        self.dfs(dst, src, &mut path, &mut out);
        trace!(src = %self.graph.name(src), dst = %self.graph.name(dst), found = out.len(), "路径枚举完成");
        out
    }

    fn dfs(&self, dst: NodeId, node: NodeId, path: &mut Vec<NodeId>, out: &mut Vec<Vec<NodeId>>) {
        path.push(node);
        let depth = path.len();

        if node == dst {
            // 端点不能在两跳以内直接相遇
            if depth >= 3 && self.check_path(path) {
                out.push(path.clone());
            }
            path.pop();
            return;
        }

        if depth > self.max_hops || !self.admissible(node, depth) {
            path.pop();
            return;
        }

        for next in self.graph.neighbors(node) {
            self.dfs(dst, next, path, out);
        }
        path.pop();
    }

    /// 非目的节点能否占据第 `depth` 个位置。
    fn admissible(&self, node: NodeId, depth: usize) -> bool {
        let kind = self.graph.kind(node);
        if kind.is_route_dead_end() || kind.is_storage_server() {
            return false;
        }
        if kind.is_compute() {
            // 计算节点只能作为起点
            return depth == 1;
        }
        kind.allowed_at_depth(depth)
    }

    /// 完整路径的合法性：奇数长度、长度边界、交换机复用次数。
    pub fn check_path(&self, path: &[NodeId]) -> bool {
        let len = path.len();
        if len % 2 == 0 || len < self.min_hops || len > self.max_hops {
            return false;
        }
        let mut visits: HashMap<NodeId, usize> = HashMap::new();
        for &n in path {
            if matches!(self.graph.kind(n), NodeKind::Switch(_)) {
                let c = visits.entry(n).or_insert(0);
                *c += 1;
                if *c > MAX_SWITCH_VISITS {
                    return false;
                }
            }
        }
        true
    }

    /// 从某个计算节点出发，到其它每个计算节点与每个存储服务器的最短路径集合。
    pub fn routes_from(&self, source: NodeId) -> HashMap<NodeId, RouteSet> {
        let mut table = RouteTable::default();
        let dests = self
            .graph
            .compute_nodes()
            .into_iter()
            .chain(self.graph.storage_servers())
            .filter(|&d| d != source);
        for dst in dests {
            for path in self.enumerate(source, dst) {
                table.record(&path);
            }
        }
        table
            .sets
            .into_iter()
            .filter(|((s, _), _)| *s == source)
            .map(|((_, d), set)| (d, set))
            .collect()
    }

    /// 构建完整路由表：CN↔CN 与 CN↔OSS 两个方向都必须可达。
    #[tracing::instrument(skip(self))]
    pub fn build_table(&self) -> SimResult<RouteTable> {
        let cns = self.graph.compute_nodes();
        let osses = self.graph.storage_servers();
        let mut table = RouteTable::default();

        for (i, &a) in cns.iter().enumerate() {
            for &b in &cns[i + 1..] {
                for path in self.enumerate(a, b) {
                    table.record(&path);
                }
                table.require(self.graph, a, b)?;
            }
            for &oss in &osses {
                for path in self.enumerate(a, oss) {
                    table.record(&path);
                }
                table.require(self.graph, a, oss)?;
            }
        }

        debug!(pairs = table.len(), "路由表条目");
        info!(
            compute_nodes = cns.len(),
            storage_servers = osses.len(),
            "🧭 路由表构建完成"
        );
        Ok(table)
    }
}
