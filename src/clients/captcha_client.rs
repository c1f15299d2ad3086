//! 2Captcha 客户端
//!
//! 提交验证码图片并轮询识别结果。调用方拿到 `Failed` / `Unsolvable`
//! 时应刷新验证码图后重试，次数由会话层的 OCR 重试上限控制。

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use serde_json::Value as JsonValue;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::RedeemError;

/// 识别结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    /// 识别出的验证码（已通过长度 / 字符集校验）
    Token(String),
    /// 服务端明确表示无解，调用方应刷新图片
    Unsolvable,
    /// 提交失败、响应异常或超出轮询预算
    Failed,
}

/// 验证码识别能力（可替换为测试桩）
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    async fn solve(&self, image: &[u8]) -> Result<SolveOutcome>;
}

/// 2Captcha HTTP 客户端
pub struct TwoCaptchaClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    poll_rounds: usize,
    poll_interval: Duration,
}

/// 单次轮询响应的判定
#[derive(Debug, Clone, PartialEq, Eq)]
enum PollDecision {
    Token(String),
    NotReady,
    Unsolvable,
    Failed,
}

impl TwoCaptchaClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.captcha_api_key.clone(),
            base_url: config.captcha_api_base_url.clone(),
            poll_rounds: config.captcha_poll_rounds,
            poll_interval: Duration::from_secs(config.captcha_poll_interval_secs),
        }
    }

    /// token 必须恰好 4 位字母数字
    fn is_valid_token(token: &str) -> bool {
        token.len() == 4 && token.chars().all(|c| c.is_ascii_alphanumeric())
    }

    /// 解析提交响应，返回 request id
    fn parse_submit_response(value: &JsonValue) -> Option<String> {
        if value.get("status").and_then(|v| v.as_u64()) != Some(1) {
            return None;
        }
        value
            .get("request")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    }

    /// 解析单次轮询响应
    fn parse_poll_response(value: &JsonValue) -> PollDecision {
        if value.get("status").and_then(|v| v.as_u64()) == Some(1) {
            return match value.get("request").and_then(|v| v.as_str()) {
                Some(token) => PollDecision::Token(token.trim().to_string()),
                None => PollDecision::Failed,
            };
        }
        match value.get("request").and_then(|v| v.as_str()) {
            Some("CAPCHA_NOT_READY") => PollDecision::NotReady,
            Some("ERROR_CAPTCHA_UNSOLVABLE") => PollDecision::Unsolvable,
            _ => PollDecision::Failed,
        }
    }

    /// 提交图片，返回 request id；提交被拒或响应异常返回 None
    async fn submit(&self, image_base64: &str) -> Option<String> {
        let endpoint = format!("{}/in.php", self.base_url);
        info!("[2Captcha] 提交开始，图片大小: {} bytes", image_base64.len());

        let form = [
            ("key", self.api_key.as_str()),
            ("method", "base64"),
            ("body", image_base64),
            ("json", "1"),
            ("numeric", "0"),
            ("min_len", "4"),
            ("max_len", "5"),
            ("language", "2"),
        ];

        let response = match self.http.post(&endpoint).form(&form).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!("[2Captcha] 提交请求失败: {}", e);
                return None;
            }
        };

        let value: JsonValue = match response.json().await {
            Ok(v) => v,
            Err(e) => {
                warn!("[2Captcha] 提交响应非 JSON: {}", e);
                return None;
            }
        };

        let request_id = Self::parse_submit_response(&value);
        if request_id.is_none() {
            warn!("[2Captcha] 提交被拒: {}", value);
        }
        request_id
    }

    /// 轮询识别结果，最多 poll_rounds 次
    async fn poll(&self, request_id: &str) -> SolveOutcome {
        let endpoint = format!(
            "{}/res.php?key={}&action=get&id={}&json=1",
            self.base_url, self.api_key, request_id
        );

        for round in 0..self.poll_rounds {
            sleep(self.poll_interval).await;
            debug!("[2Captcha] 查询结果中 (第 {} 轮)，ID={}", round + 1, request_id);

            let response = match self.http.get(&endpoint).send().await {
                Ok(r) => r,
                Err(e) => {
                    warn!("[2Captcha] 查询请求失败: {}", e);
                    return SolveOutcome::Failed;
                }
            };
            let value: JsonValue = match response.json().await {
                Ok(v) => v,
                Err(e) => {
                    warn!("[2Captcha] 查询响应非 JSON: {}", e);
                    return SolveOutcome::Failed;
                }
            };

            match Self::parse_poll_response(&value) {
                PollDecision::Token(token) => {
                    if Self::is_valid_token(&token) {
                        info!("[2Captcha] 识别成功 → {}", token);
                        return SolveOutcome::Token(token);
                    }
                    warn!("[2Captcha] 返回长度 / 字符不符（{}），视为识别失败", token);
                    return SolveOutcome::Failed;
                }
                PollDecision::NotReady => continue,
                PollDecision::Unsolvable => {
                    warn!("[2Captcha] 服务端回报无解 → {}", value);
                    return SolveOutcome::Unsolvable;
                }
                PollDecision::Failed => {
                    warn!("[2Captcha] 返回错误结果: {}", value);
                    return SolveOutcome::Failed;
                }
            }
        }

        warn!("[2Captcha] 轮询预算耗尽，放弃本次识别");
        SolveOutcome::Failed
    }
}

#[async_trait]
impl CaptchaSolver for TwoCaptchaClient {
    async fn solve(&self, image: &[u8]) -> Result<SolveOutcome> {
        if self.api_key.is_empty() {
            return Err(RedeemError::Captcha {
                endpoint: format!("{}/in.php", self.base_url),
                message: "api key 未設置".to_string(),
            }
            .into());
        }
        let image_base64 = BASE64.encode(image);

        let request_id = match self.submit(&image_base64).await {
            Some(id) => id,
            None => return Ok(SolveOutcome::Failed),
        };

        Ok(self.poll(&request_id).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_is_valid_token() {
        assert!(TwoCaptchaClient::is_valid_token("aB3d"));
        assert!(TwoCaptchaClient::is_valid_token("1234"));
        assert!(!TwoCaptchaClient::is_valid_token("abc"));
        assert!(!TwoCaptchaClient::is_valid_token("abcde"));
        assert!(!TwoCaptchaClient::is_valid_token("ab!d"));
        assert!(!TwoCaptchaClient::is_valid_token(""));
    }

    #[test]
    fn test_parse_submit_response() {
        let ok = json!({"status": 1, "request": "123456"});
        assert_eq!(
            TwoCaptchaClient::parse_submit_response(&ok),
            Some("123456".to_string())
        );

        let rejected = json!({"status": 0, "request": "ERROR_ZERO_BALANCE"});
        assert_eq!(TwoCaptchaClient::parse_submit_response(&rejected), None);

        let malformed = json!("not an object");
        assert_eq!(TwoCaptchaClient::parse_submit_response(&malformed), None);
    }

    #[test]
    fn test_parse_poll_response() {
        let token = json!({"status": 1, "request": " aB3d "});
        assert_eq!(
            TwoCaptchaClient::parse_poll_response(&token),
            PollDecision::Token("aB3d".to_string())
        );

        let not_ready = json!({"status": 0, "request": "CAPCHA_NOT_READY"});
        assert_eq!(
            TwoCaptchaClient::parse_poll_response(&not_ready),
            PollDecision::NotReady
        );

        let unsolvable = json!({"status": 0, "request": "ERROR_CAPTCHA_UNSOLVABLE"});
        assert_eq!(
            TwoCaptchaClient::parse_poll_response(&unsolvable),
            PollDecision::Unsolvable
        );

        let error = json!({"status": 0, "request": "ERROR_WRONG_CAPTCHA_ID"});
        assert_eq!(
            TwoCaptchaClient::parse_poll_response(&error),
            PollDecision::Failed
        );
    }
}
