//! 兑换请求文件加载
//!
//! 请求以 TOML 文件投递到指定目录，处理完成后删除。

use crate::models::request::RedemptionRequest;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tokio::fs;

/// 从 TOML 文件加载单个兑换请求
pub async fn load_request_file(path: &Path) -> Result<RedemptionRequest> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("无法读取请求文件: {}", path.display()))?;

    let mut request: RedemptionRequest = toml::from_str(&content)
        .with_context(|| format!("无法解析请求文件: {}", path.display()))?;

    request.dedup_players();
    request.file_path = Some(path.to_string_lossy().to_string());

    Ok(request)
}

/// 扫描目录，加载所有待处理的兑换请求
///
/// 解析失败或字段不全的文件记录 warn 后跳过，不中断整个批次。
pub async fn load_all_request_files(folder_path: &str) -> Result<Vec<RedemptionRequest>> {
    let folder = PathBuf::from(folder_path);

    if !folder.exists() {
        anyhow::bail!("请求目录不存在: {}", folder_path);
    }

    let mut requests = Vec::new();
    let mut entries = fs::read_dir(&folder)
        .await
        .with_context(|| format!("无法读取请求目录: {}", folder_path))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("toml") {
            continue;
        }
        tracing::info!(
            "正在加载请求: {}",
            path.file_name().unwrap_or_default().to_string_lossy()
        );

        match load_request_file(&path).await {
            Ok(request) if request.is_incomplete() => {
                tracing::warn!("请求缺少必要字段，跳过: {}", path.display());
            }
            Ok(request) => {
                tracing::info!(
                    "成功加载请求 code={} 玩家数={}",
                    request.code,
                    request.player_ids.len()
                );
                requests.push(request);
            }
            Err(e) => {
                tracing::warn!("加载请求失败 {}: {}", path.display(), e);
            }
        }
    }

    Ok(requests)
}

/// 删除已处理的请求文件
pub async fn remove_request_file(request: &RedemptionRequest) -> Result<()> {
    if let Some(path) = &request.file_path {
        fs::remove_file(path)
            .await
            .with_context(|| format!("无法删除请求文件: {}", path))?;
        tracing::info!("🗑️ 已删除请求文件: {}", path);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_request_file_dedups_and_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("req.toml");
        tokio::fs::write(
            &path,
            r#"
code = "WOS2024"
guild_id = "g1"
player_ids = ["100", "200", "100"]
"#,
        )
        .await
        .expect("write");

        let request = load_request_file(&path).await.expect("load");
        assert_eq!(request.code, "WOS2024");
        assert_eq!(request.player_ids, vec!["100", "200"]);
        assert!(!request.retry);
        assert!(!request.debug);
        assert!(request.file_path.is_some());
    }

    #[tokio::test]
    async fn test_load_all_skips_incomplete_and_broken() {
        let dir = tempfile::tempdir().expect("tempdir");
        tokio::fs::write(
            dir.path().join("ok.toml"),
            "code = \"C1\"\nguild_id = \"g1\"\nplayer_ids = [\"1\"]\nretry = true\n",
        )
        .await
        .expect("write");
        tokio::fs::write(
            dir.path().join("empty.toml"),
            "code = \"\"\nguild_id = \"g1\"\nplayer_ids = [\"1\"]\n",
        )
        .await
        .expect("write");
        tokio::fs::write(dir.path().join("broken.toml"), "not toml at all = [")
            .await
            .expect("write");

        let requests = load_all_request_files(&dir.path().to_string_lossy())
            .await
            .expect("load_all");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].code, "C1");
        assert!(requests[0].retry);
    }
}
