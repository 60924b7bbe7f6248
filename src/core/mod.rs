//! 核心业务逻辑模块
//!
//! Process ownership, tree resolution and the metrics data model.

pub mod handle;
pub mod models;
pub mod process_tree;
