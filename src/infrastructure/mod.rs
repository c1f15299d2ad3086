//! 基础设施层
//!
//! 持有稀缺资源（Page），只暴露能力：执行 JS、填表、点击、带超时轮询。
//! 不认识玩家 / 礼品码，不处理业务流程。

pub mod page_driver;

pub use page_driver::{poll_until, PageDriver, Poll};
