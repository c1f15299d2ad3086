//! 玩家资料缓存
//!
//! 兑换正确性不依赖资料；只用于失败明细的名称 / 王国注记。
//! "未知"值一律不落盘。

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::Mutex;

use crate::error::RedeemError;

/// 名称未知时的占位显示值
pub const UNKNOWN_NAME: &str = "未知名稱";
/// 王国未知时的占位显示值
pub const UNKNOWN_KINGDOM: &str = "未知";

/// 玩家资料
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerProfile {
    pub name: String,
    pub kingdom: Option<String>,
}

impl PlayerProfile {
    /// 名称与王国均已知才算有效，无效资料不应持久化
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && self.name != UNKNOWN_NAME && self.kingdom.is_some()
    }
}

/// 资料缓存能力
#[async_trait]
pub trait ProfileCache: Send + Sync {
    async fn get(&self, guild_id: &str, player_id: &str) -> Result<Option<PlayerProfile>>;
    async fn put(&self, guild_id: &str, player_id: &str, profile: &PlayerProfile) -> Result<()>;
}

/// 磁盘 JSON 资料缓存，每个 guild 一个文档
pub struct JsonProfileCache {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonProfileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|e| RedeemError::Ledger {
            path: dir.to_string_lossy().to_string(),
            source: e,
        })?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    fn doc_path(&self, guild_id: &str) -> PathBuf {
        self.dir.join(format!("profiles_{}.json", guild_id))
    }

    async fn load_doc(&self, path: &Path) -> Result<HashMap<String, PlayerProfile>> {
        match fs::read_to_string(path).await {
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(RedeemError::Ledger {
                path: path.to_string_lossy().to_string(),
                source: e,
            }
            .into()),
        }
    }
}

#[async_trait]
impl ProfileCache for JsonProfileCache {
    async fn get(&self, guild_id: &str, player_id: &str) -> Result<Option<PlayerProfile>> {
        let doc = self.load_doc(&self.doc_path(guild_id)).await?;
        Ok(doc.get(player_id).cloned())
    }

    async fn put(&self, guild_id: &str, player_id: &str, profile: &PlayerProfile) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let path = self.doc_path(guild_id);
        let mut doc = self.load_doc(&path).await?;
        doc.insert(player_id.to_string(), profile.clone());

        let tmp = path.with_extension("json.tmp");
        let io_err = |e: std::io::Error| RedeemError::Ledger {
            path: path.to_string_lossy().to_string(),
            source: e,
        };
        fs::write(&tmp, serde_json::to_string_pretty(&doc)?)
            .await
            .map_err(io_err)?;
        fs::rename(&tmp, &path).await.map_err(io_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_validity() {
        let valid = PlayerProfile {
            name: "玩家甲".to_string(),
            kingdom: Some("245".to_string()),
        };
        assert!(valid.is_valid());

        let unknown_name = PlayerProfile {
            name: UNKNOWN_NAME.to_string(),
            kingdom: Some("245".to_string()),
        };
        assert!(!unknown_name.is_valid());

        let no_kingdom = PlayerProfile {
            name: "玩家甲".to_string(),
            kingdom: None,
        };
        assert!(!no_kingdom.is_valid());
    }

    #[tokio::test]
    async fn test_cache_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let cache = JsonProfileCache::new(dir.path()).expect("new");
        assert!(cache.get("g1", "100").await.unwrap().is_none());

        let profile = PlayerProfile {
            name: "玩家甲".to_string(),
            kingdom: Some("245".to_string()),
        };
        cache.put("g1", "100", &profile).await.unwrap();

        let loaded = cache.get("g1", "100").await.unwrap().expect("profile");
        assert_eq!(loaded.name, "玩家甲");
        assert_eq!(loaded.kingdom.as_deref(), Some("245"));
        // guild 隔离
        assert!(cache.get("g2", "100").await.unwrap().is_none());
    }
}
