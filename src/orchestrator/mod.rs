//! 编排层
//!
//! - `coordinator`：单个批次的编排（过滤、并发派发、聚合、记账、汇报）
//! - `batch_app`：应用入口，装配依赖并逐批消费请求文件

pub mod batch_app;
pub mod coordinator;

pub use batch_app::App;
pub use coordinator::{filter_players, Coordinator};
