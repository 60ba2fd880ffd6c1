//! 拓扑构建
//!
//! - [`fat_tree`]：带存储层的 k 叉 fat-tree；
//! - [`layout`]：JSON 邻接描述。

pub mod fat_tree;
pub mod layout;
