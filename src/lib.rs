//! 礼品码批量兑换器
//!
//! 驱动无头浏览器在兑换页面上为一批玩家领取礼品码，
//! 自动识别验证码，按账本去重，完成后通过 webhook 汇报。
//!
//! ## 架构分层
//!
//! - **基础设施层**（`browser` / `infrastructure`）：
//!   浏览器生命周期与页面驱动能力，不认识业务概念
//! - **业务能力层**（`services` / `clients`）：
//!   单个玩家粒度的能力（兑换会话、资料抓取、验证码识别、汇报）
//! - **工作流层**（`workflow`）：
//!   单人兑换状态机（重试 / 退避 / 超时 / 快照）
//! - **编排层**（`orchestrator`）：
//!   批次过滤、并发派发、聚合记账与汇报
//!
//! 横切模块：`classifier`（响应三分类）、`ledger`（持久化账本）、
//! `models`（请求 / 结果 / 汇总）、`config` / `error` / `logger`。

pub mod browser;
pub mod classifier;
pub mod clients;
pub mod config;
pub mod error;
pub mod infrastructure;
pub mod ledger;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod workflow;

pub use classifier::{classify, Outcome};
pub use config::Config;
pub use error::{AppResult, RedeemError};
pub use models::{AttemptResult, BatchSummary, RedemptionRequest};
pub use orchestrator::{App, Coordinator};
pub use workflow::{PlayerCtx, RedeemFlow};
