//! JSON 文件账本
//!
//! 每个 (guild, code) 一个文档，内含 success / failed 两个分区；
//! 写入走临时文件 + rename，保证单条写入原子。

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::RedeemError;
use crate::ledger::store::{FailureEntry, LedgerStore, SuccessEntry};
use crate::models::AttemptResult;

/// (guild, code) 文档
#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerDoc {
    #[serde(default)]
    success: HashMap<String, SuccessEntry>,
    #[serde(default)]
    failed: HashMap<String, FailureEntry>,
}

/// 磁盘 JSON 账本
pub struct JsonLedger {
    dir: PathBuf,
    // 单进程内的读-改-写串行化；跨玩家的键不冲突，但同一文档需要整体重写
    write_lock: Mutex<()>,
}

impl JsonLedger {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(dir.join("attempts")).map_err(|e| RedeemError::Ledger {
            path: dir.to_string_lossy().to_string(),
            source: e,
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn doc_path(&self, guild_id: &str, code: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.json", guild_id, code))
    }

    fn snapshot_path(&self, player_id: &str) -> PathBuf {
        self.dir.join("attempts").join(format!("{}.json", player_id))
    }

    async fn load_doc(&self, path: &Path) -> Result<LedgerDoc> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(LedgerDoc::default()),
            Err(e) => Err(RedeemError::Ledger {
                path: path.to_string_lossy().to_string(),
                source: e,
            }
            .into()),
        }
    }

    async fn save_atomic(&self, path: &Path, content: &str) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        let io_err = |e: std::io::Error| RedeemError::Ledger {
            path: path.to_string_lossy().to_string(),
            source: e,
        };
        fs::write(&tmp, content).await.map_err(io_err)?;
        fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }

    async fn save_doc(&self, path: &Path, doc: &LedgerDoc) -> Result<()> {
        self.save_atomic(path, &serde_json::to_string_pretty(doc)?)
            .await
    }
}

#[async_trait]
impl LedgerStore for JsonLedger {
    async fn list_success(&self, guild_id: &str, code: &str) -> Result<HashSet<String>> {
        let doc = self.load_doc(&self.doc_path(guild_id, code)).await?;
        Ok(doc.success.into_keys().collect())
    }

    async fn list_failed(
        &self,
        guild_id: &str,
        code: &str,
    ) -> Result<HashMap<String, FailureEntry>> {
        let doc = self.load_doc(&self.doc_path(guild_id, code)).await?;
        Ok(doc.failed)
    }

    async fn record_success(
        &self,
        guild_id: &str,
        code: &str,
        player_id: &str,
        message: &str,
    ) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.doc_path(guild_id, code);
        let mut doc = self.load_doc(&path).await?;
        doc.success.insert(
            player_id.to_string(),
            SuccessEntry {
                message: message.to_string(),
                timestamp: Utc::now(),
            },
        );
        // 成功覆盖失败
        doc.failed.remove(player_id);
        self.save_doc(&path, &doc).await?;
        debug!("[Ledger] 记录成功 {}:{}:{}", guild_id, code, player_id);
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
        let _guard = self.write_lock.lock().await;
        let path = self.doc_path(guild_id, code);
        let mut doc = self.load_doc(&path).await?;
        doc.failed.insert(
            player_id.to_string(),
            FailureEntry {
                name: name.to_string(),
                reason: reason.to_string(),
                updated_at: Utc::now(),
            },
        );
        self.save_doc(&path, &doc).await?;
        debug!("[Ledger] 记录失败 {}:{}:{}", guild_id, code, player_id);
        Ok(())
    }

    async fn record_attempt_snapshot(
        &self,
        player_id: &str,
        result: &AttemptResult,
    ) -> Result<()> {
        let path = self.snapshot_path(player_id);
        self.save_atomic(&path, &serde_json::to_string_pretty(result)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ledger() -> (tempfile::TempDir, JsonLedger) {
        let dir = tempfile::tempdir().expect("tempdir");
        let ledger = JsonLedger::new(dir.path()).expect("new ledger");
        (dir, ledger)
    }

    #[tokio::test]
    async fn test_empty_ledger_reads() {
        let (_dir, ledger) = ledger();
        assert!(ledger.list_success("g1", "C1").await.unwrap().is_empty());
        assert!(ledger.list_failed("g1", "C1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_supersedes_failure() {
        let (_dir, ledger) = ledger();
        ledger
            .record_failure("g1", "C1", "100", "玩家甲", "驗證碼錯誤")
            .await
            .unwrap();
        assert!(ledger.list_failed("g1", "C1").await.unwrap().contains_key("100"));

        ledger
            .record_success("g1", "C1", "100", "兌換成功")
            .await
            .unwrap();
        assert!(ledger.list_success("g1", "C1").await.unwrap().contains("100"));
        assert!(!ledger.list_failed("g1", "C1").await.unwrap().contains_key("100"));
    }

    #[tokio::test]
    async fn test_documents_keyed_by_guild_and_code() {
        let (_dir, ledger) = ledger();
        ledger.record_success("g1", "C1", "100", "ok").await.unwrap();
        assert!(ledger.list_success("g2", "C1").await.unwrap().is_empty());
        assert!(ledger.list_success("g1", "C2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_disk_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        {
            let ledger = JsonLedger::new(dir.path()).expect("new");
            ledger
                .record_failure("g1", "C1", "200", "玩家乙", "不存在")
                .await
                .unwrap();
        }
        // 重新打开同一目录，记录仍在
        let reopened = JsonLedger::new(dir.path()).expect("reopen");
        let failed = reopened.list_failed("g1", "C1").await.unwrap();
        assert_eq!(failed.get("200").map(|f| f.reason.as_str()), Some("不存在"));
    }

    #[tokio::test]
    async fn test_attempt_snapshot_written() {
        let (dir, ledger) = ledger();
        let result = AttemptResult::failure("300", "Timeout");
        ledger.record_attempt_snapshot("300", &result).await.unwrap();
        let content =
            std::fs::read_to_string(dir.path().join("attempts").join("300.json")).unwrap();
        assert!(content.contains("Timeout"));
    }
}
