//! 内存账本 / 资料缓存
//!
//! 无持久化需求的场景与测试使用。

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use crate::ledger::profiles::{PlayerProfile, ProfileCache};
use crate::ledger::store::{FailureEntry, LedgerStore, SuccessEntry};
use crate::models::AttemptResult;

#[derive(Default)]
struct MemoryInner {
    success: HashMap<(String, String), HashMap<String, SuccessEntry>>,
    failed: HashMap<(String, String), HashMap<String, FailureEntry>>,
    snapshots: HashMap<String, AttemptResult>,
}

/// 内存账本
#[derive(Default)]
pub struct MemoryLedger {
    inner: Mutex<MemoryInner>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// 某玩家最近一次尝试快照（测试断言用）
    pub async fn attempt_snapshot(&self, player_id: &str) -> Option<AttemptResult> {
        self.inner.lock().await.snapshots.get(player_id).cloned()
    }
}

fn key(guild_id: &str, code: &str) -> (String, String) {
    (guild_id.to_string(), code.to_string())
}

#[async_trait]
impl LedgerStore for MemoryLedger {
    async fn list_success(&self, guild_id: &str, code: &str) -> Result<HashSet<String>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .success
            .get(&key(guild_id, code))
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default())
    }

    async fn list_failed(
        &self,
        guild_id: &str,
        code: &str,
    ) -> Result<HashMap<String, FailureEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.failed.get(&key(guild_id, code)).cloned().unwrap_or_default())
    }

    async fn record_success(
        &self,
        guild_id: &str,
        code: &str,
        player_id: &str,
        message: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner
            .success
            .entry(key(guild_id, code))
            .or_default()
            .insert(
                player_id.to_string(),
                SuccessEntry {
                    message: message.to_string(),
                    timestamp: Utc::now(),
                },
            );
        if let Some(failed) = inner.failed.get_mut(&key(guild_id, code)) {
            failed.remove(player_id);
        }
        Ok(())
    }

    async fn record_failure(
        &self,
        guild_id: &str,
        code: &str,
        player_id: &str,
        name: &str,
        reason: &str,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.failed.entry(key(guild_id, code)).or_default().insert(
            player_id.to_string(),
            FailureEntry {
                name: name.to_string(),
                reason: reason.to_string(),
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn record_attempt_snapshot(
        &self,
        player_id: &str,
        result: &AttemptResult,
    ) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.snapshots.insert(player_id.to_string(), result.clone());
        Ok(())
    }
}

/// 内存资料缓存
#[derive(Default)]
pub struct MemoryProfileCache {
    inner: Mutex<HashMap<(String, String), PlayerProfile>>,
}

impl MemoryProfileCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileCache for MemoryProfileCache {
    async fn get(&self, guild_id: &str, player_id: &str) -> Result<Option<PlayerProfile>> {
        let inner = self.inner.lock().await;
        Ok(inner.get(&(guild_id.to_string(), player_id.to_string())).cloned())
    }

    async fn put(&self, guild_id: &str, player_id: &str, profile: &PlayerProfile) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.insert(
            (guild_id.to_string(), player_id.to_string()),
            profile.clone(),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_ledger_success_supersedes_failure() {
        let ledger = MemoryLedger::new();
        ledger
            .record_failure("g1", "C1", "100", "玩家甲", "驗證碼錯誤")
            .await
            .unwrap();
        ledger.record_success("g1", "C1", "100", "兌換成功").await.unwrap();

        assert!(ledger.list_success("g1", "C1").await.unwrap().contains("100"));
        assert!(ledger.list_failed("g1", "C1").await.unwrap().is_empty());
    }
}
