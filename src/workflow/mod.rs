//! 工作流层
//!
//! 把"一个玩家"的兑换能力组织成完整的单人流程：
//! - `redeem_ctx`：单人任务上下文
//! - `redeem_flow`：带重试 / 退避 / 超时的单人状态机

pub mod redeem_ctx;
pub mod redeem_flow;

pub use redeem_ctx::PlayerCtx;
pub use redeem_flow::RedeemFlow;
