//! 账本存储接口

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::AttemptResult;

/// 成功记录：一旦写入即永久保留
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SuccessEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

/// 失败记录：同键成功写入时删除
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub name: String,
    pub reason: String,
    pub updated_at: DateTime<Utc>,
}

/// 账本存储能力
///
/// 不同玩家的并发写互不冲突；同键并发写 last-write-wins
/// （协调器保证每个玩家每批只派发一次）。
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// 某 (guild, code) 下已成功的玩家集合
    async fn list_success(&self, guild_id: &str, code: &str) -> Result<HashSet<String>>;

    /// 某 (guild, code) 下的失败记录
    async fn list_failed(&self, guild_id: &str, code: &str)
        -> Result<HashMap<String, FailureEntry>>;

    /// 记录成功；同时清除同键的失败记录
    async fn record_success(
        &self,
        guild_id: &str,
        code: &str,
        player_id: &str,
        message: &str,
    ) -> Result<()>;

    /// 记录失败
    async fn record_failure(
        &self,
        guild_id: &str,
        code: &str,
        player_id: &str,
        name: &str,
        reason: &str,
    ) -> Result<()>;

    /// 按玩家写入最近一次尝试的快照
    ///
    /// 独立于批级别的 success / failed 写入，防止批处理中途失败时
    /// 丢失单个玩家的结果。
    async fn record_attempt_snapshot(&self, player_id: &str, result: &AttemptResult)
        -> Result<()>;
}
