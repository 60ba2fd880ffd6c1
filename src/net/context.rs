//! 仿真上下文
//!
//! 拓扑图、路由表与配置在构建后只读，由所有节点共享。

use super::graph::TopologyGraph;
use super::routing::{PathFinder, RouteTable};
use crate::config::SimConfig;
use crate::error::SimResult;
use tracing::info;

#[derive(Debug)]
pub struct SimContext {
    pub graph: TopologyGraph,
    pub routes: RouteTable,
    pub config: SimConfig,
}

impl SimContext {
    /// 校验配置并计算路由表；任何一对必需端点不可达都是配置错误。
    pub fn build(graph: TopologyGraph, config: SimConfig) -> SimResult<Self> {
        config.validate()?;
        let routes = PathFinder::new(&graph, &config.routing).build_table()?;
        info!(nodes = graph.len(), route_pairs = routes.len(), "🗺️  仿真上下文就绪");
        Ok(Self {
            graph,
            routes,
            config,
        })
    }
}
