//! 汇报端客户端
//!
//! 批处理汇总通过 webhook 发送；超过传输上限的内容按字符切块依次发送。

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::error::RedeemError;

/// 单条消息的传输上限（字符数）
pub const MAX_CHUNK_LEN: usize = 1900;

/// 汇报能力（可替换为测试桩）
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, content: &str) -> Result<()>;
}

/// 按字符数切块（在字符边界切分，中文安全）
pub fn chunk_content(content: &str, max_len: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0;
    for ch in content.chars() {
        if count == max_len {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        current.push(ch);
        count += 1;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// Webhook 汇报客户端
pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
}

impl WebhookClient {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
        }
    }
}

#[async_trait]
impl Notifier for WebhookClient {
    async fn notify(&self, content: &str) -> Result<()> {
        for chunk in chunk_content(content, MAX_CHUNK_LEN) {
            let response = self
                .http
                .post(&self.url)
                .json(&serde_json::json!({ "content": chunk }))
                .send()
                .await
                .map_err(|e| RedeemError::Notify(e.to_string()))?;

            if response.status().as_u16() >= 400 {
                warn!("[Webhook] 发送失败: {}", response.status());
            } else {
                info!("[Webhook] 发送成功: {}", response.status());
            }
        }
        Ok(())
    }
}

/// 未配置 webhook 时的兜底：只写日志
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, content: &str) -> Result<()> {
        info!("📣 批处理汇总（未配置 webhook）:\n{}", content);
        Ok(())
    }
}
