//! 浏览器会话驱动 - 业务能力层
//!
//! 驱动一个独立的浏览器会话完成一次完整的兑换尝试：
//! 登录 → 填礼品码 → 验证码循环（最多 N 次）→ 读取服务器响应。
//!
//! 不论成功、失败还是中途异常，浏览器都会被关闭；
//! 会话内的异常一律转换为 Terminal 结果，绝不向上抛出。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use tokio::time::sleep;
use tracing::{error, info, warn};

use crate::browser;
use crate::classifier::contains_failure_keyword;
use crate::clients::{CaptchaSolver, SolveOutcome};
use crate::config::Config;
use crate::infrastructure::{poll_until, PageDriver, Poll};
use crate::models::{AttemptResult, DebugArtifacts, DebugLogEntry};

// 兑换页面选择器
const LOGIN_INPUT: &str = r#"input[type="text"]"#;
const LOGIN_BTN: &str = ".login_btn";
const MODAL_MSG: &str = ".message_modal p.msg";
const CONFIRM_BTN: &str = ".message_modal .confirm_btn";
const NAME_LABEL: &str = ".name";
const CODE_INPUT: &str = r#"input[placeholder="請輸入兌換碼"]"#;
const CAPTCHA_INPUT: &str = r#"input[placeholder="請輸入驗證碼"]"#;
const EXCHANGE_BTN: &str = ".exchange_btn";
const CAPTCHA_IMG: &str = ".verify_pic";
const RELOAD_BTN: &str = ".reload_btn";

/// 验证码图小于该字节数视为损坏，刷新重试
const MIN_CAPTCHA_BYTES: usize = 1024;

/// 弹窗提示验证码错误 / 过期时，刷新后进入下一次 OCR 尝试
const CAPTCHA_RETRY_MODAL_KEYWORDS: &[&str] =
    &["驗證碼錯誤", "驗證碼已過期", "captcha wrong", "captcha expired"];

/// 验证码识别耗尽的终态文案（账本过滤依赖其中的标记）
const CAPTCHA_EXHAUSTED_REASON: &str = "驗證碼三次辨識皆失敗，放棄兌換 / CAPTCHA failed 3 times";

/// 一次兑换尝试的驱动能力（可替换为测试桩）
#[async_trait]
pub trait RedeemDriver: Send + Sync {
    async fn attempt(&self, player_id: &str, code: &str, debug: bool) -> Result<AttemptResult>;
}

/// 会话内部的控制流
enum SessionStep {
    Done(AttemptResult),
    RefreshAndRetry(String),
}

/// 真实浏览器会话驱动
pub struct BrowserSessionDriver {
    redeem_url: String,
    chrome_executable: Option<String>,
    ocr_max_retries: usize,
    page_load_timeout: Duration,
    solver: Arc<dyn CaptchaSolver>,
}

impl BrowserSessionDriver {
    pub fn new(config: &Config, solver: Arc<dyn CaptchaSolver>) -> Self {
        Self {
            redeem_url: config.redeem_url.clone(),
            chrome_executable: config.chrome_executable.clone(),
            ocr_max_retries: config.ocr_max_retries,
            page_load_timeout: Duration::from_millis(config.page_load_timeout_ms),
            solver,
        }
    }

    /// 会话主流程（浏览器生命周期由 attempt 管理）
    async fn drive(
        &self,
        page: &PageDriver,
        player_id: &str,
        code: &str,
        logs: &mut Vec<DebugLogEntry>,
    ) -> Result<AttemptResult> {
        // 登录
        if !page.fill(LOGIN_INPUT, player_id).await? {
            anyhow::bail!("找不到登入輸入框");
        }
        page.click(LOGIN_BTN).await?;

        // 登录失败弹窗（短暂等待）
        if let Some(msg) = self.poll_modal(page, Duration::from_secs(5)).await {
            logs.push(DebugLogEntry {
                attempt: 0,
                info: format!("login modal: {}", msg),
            });
            if contains_failure_keyword(&msg) {
                info!("[{}] 登入失敗：{}", player_id, msg);
                return Ok(AttemptResult::failure(player_id, format!("登入失敗：{}", msg)));
            }
        }

        // 名称与兑换码输入框都出现才算登录成功
        let name_ready = page.wait_for(NAME_LABEL, Duration::from_secs(5)).await;
        let input_ready = page.wait_for(CODE_INPUT, Duration::from_secs(5)).await;
        if name_ready == Poll::TimedOut || input_ready == Poll::TimedOut {
            return Ok(AttemptResult::failure(
                player_id,
                "登入失敗（未成功進入兌換頁） / Login failed (did not reach redeem page)",
            ));
        }

        page.fill(CODE_INPUT, code).await?;

        // 验证码循环
        for attempt in 1..=self.ocr_max_retries {
            match self.captcha_round(page, player_id, attempt, logs).await {
                Ok(SessionStep::Done(result)) => return Ok(result),
                Ok(SessionStep::RefreshAndRetry(info)) => {
                    logs.push(DebugLogEntry { attempt, info });
                    self.refresh_captcha(page, player_id).await;
                }
                Err(e) => {
                    // 单轮内的异常不终结会话，刷新后再试
                    warn!("[{}] 第 {} 次验证码尝试异常: {}", player_id, attempt, e);
                    logs.push(DebugLogEntry {
                        attempt,
                        info: format!("error: {}", e),
                    });
                    self.refresh_captcha(page, player_id).await;
                    sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("[{}] 最終失敗：{}", player_id, CAPTCHA_EXHAUSTED_REASON);
        Ok(AttemptResult::failure(player_id, CAPTCHA_EXHAUSTED_REASON))
    }

    /// 一轮验证码尝试：截图 → 识别 → 提交 → 读弹窗
    async fn captcha_round(
        &self,
        page: &PageDriver,
        player_id: &str,
        attempt: usize,
        logs: &mut Vec<DebugLogEntry>,
    ) -> Result<SessionStep> {
        // 截取验证码图
        let image = match page.screenshot_element(CAPTCHA_IMG).await {
            Some(bytes) if bytes.len() >= MIN_CAPTCHA_BYTES => bytes,
            Some(bytes) => {
                warn!(
                    "[{}] 第 {} 次：驗證碼圖太小（{} bytes），自動刷新",
                    player_id,
                    attempt,
                    bytes.len()
                );
                return Ok(SessionStep::RefreshAndRetry("captcha image too small".into()));
            }
            None => {
                warn!("[{}] 第 {} 次：未找到驗證碼圖片", player_id, attempt);
                return Ok(SessionStep::RefreshAndRetry("captcha image missing".into()));
            }
        };

        // 识别
        let token = match self.solver.solve(&image).await {
            Ok(SolveOutcome::Token(token)) => token,
            Ok(SolveOutcome::Unsolvable) => {
                warn!("[{}] 第 {} 次：識別服務回報無解，自動刷新", player_id, attempt);
                return Ok(SessionStep::RefreshAndRetry("solver: unsolvable".into()));
            }
            Ok(SolveOutcome::Failed) => {
                warn!("[{}] 第 {} 次：識別失敗，自動刷新", player_id, attempt);
                return Ok(SessionStep::RefreshAndRetry("solver: failed".into()));
            }
            Err(e) => {
                warn!("[{}] 第 {} 次：識別服務異常: {}", player_id, attempt, e);
                return Ok(SessionStep::RefreshAndRetry(format!("solver error: {}", e)));
            }
        };
        logs.push(DebugLogEntry {
            attempt,
            info: format!("captcha token: {}", token),
        });

        // 提交
        page.fill(CAPTCHA_INPUT, &token).await?;
        page.click(EXCHANGE_BTN).await?;
        sleep(Duration::from_secs(1)).await;

        // 等服务器响应弹窗（3 秒内按 300ms 切片轮询）
        let message = match self.poll_modal(page, Duration::from_secs(3)).await {
            Some(msg) => msg,
            None => {
                logs.push(DebugLogEntry {
                    attempt,
                    info: "no response modal".into(),
                });
                return Ok(SessionStep::RefreshAndRetry("no response modal".into()));
            }
        };

        info!("[{}] 第 {} 次：伺服器回應：{}", player_id, attempt, message);
        logs.push(DebugLogEntry {
            attempt,
            info: format!("server message: {}", message),
        });
        self.dismiss_modal(page).await;

        // 验证码被判错 / 过期：刷新后进入下一轮
        if CAPTCHA_RETRY_MODAL_KEYWORDS.iter().any(|k| message.contains(k)) {
            return Ok(SessionStep::RefreshAndRetry("captcha rejected".into()));
        }

        if contains_failure_keyword(&message) {
            return Ok(SessionStep::Done(AttemptResult::failure(player_id, message)));
        }

        if message.contains("成功") || message.to_lowercase().contains("success") {
            return Ok(SessionStep::Done(AttemptResult::success(player_id, message)));
        }

        Ok(SessionStep::Done(AttemptResult::failure(
            player_id,
            format!("未知錯誤：{}", message),
        )))
    }

    /// 轮询弹窗文本
    async fn poll_modal(&self, page: &PageDriver, timeout: Duration) -> Option<String> {
        poll_until(timeout, Duration::from_millis(300), || async move {
            page.text_of(MODAL_MSG).await.ok().flatten()
        })
        .await
        .found()
    }

    /// 关闭弹窗（最多重试几次，点不掉就放弃）
    async fn dismiss_modal(&self, page: &PageDriver) {
        for _ in 0..10 {
            match page.click(CONFIRM_BTN).await {
                Ok(true) => {
                    sleep(Duration::from_millis(300)).await;
                }
                _ => return,
            }
        }
    }

    /// 刷新验证码图，并等待图片内容实际变化
    ///
    /// 任何一步失败都只记日志：刷新失败的后果是下一轮识别继续用旧图，
    /// 由 OCR 重试上限兜底。
    async fn refresh_captcha(&self, page: &PageDriver, player_id: &str) {
        self.dismiss_modal(page).await;

        let original = page.screenshot_element(CAPTCHA_IMG).await;

        match page.click(RELOAD_BTN).await {
            Ok(true) => {}
            _ => {
                info!("[{}] 無法定位驗證碼刷新按鈕", player_id);
                return;
            }
        }

        let changed = poll_until(
            Duration::from_millis(4500),
            Duration::from_millis(150),
            || {
                let original = original.clone();
                async move {
                    let fresh = page.screenshot_element(CAPTCHA_IMG).await?;
                    if fresh.len() >= MIN_CAPTCHA_BYTES && Some(&fresh) != original.as_ref() {
                        Some(())
                    } else {
                        None
                    }
                }
            },
        )
        .await;

        if changed == Poll::TimedOut {
            info!(
                "[{}] 刷新失敗：圖片內容未更新 / Refresh failed: Captcha image did not update",
                player_id
            );
        }
    }

    /// 异常路径下尽力采集调试产物
    async fn capture_artifacts(&self, page: &PageDriver) -> DebugArtifacts {
        let html_base64 = match page.html().await {
            Ok(html) => Some(BASE64.encode(html.as_bytes())),
            Err(_) => None,
        };
        let screenshot_base64 = match page.screenshot_page().await {
            Ok(bytes) => Some(BASE64.encode(bytes)),
            Err(_) => None,
        };
        DebugArtifacts {
            html_base64,
            screenshot_base64,
        }
    }
}

#[async_trait]
impl RedeemDriver for BrowserSessionDriver {
    async fn attempt(&self, player_id: &str, code: &str, debug: bool) -> Result<AttemptResult> {
        info!("[{}] 開始兌換會話 code={}", player_id, code);

        let (mut browser, raw_page) = match browser::launch_headless_browser(
            &self.redeem_url,
            self.chrome_executable.as_deref(),
        )
        .await
        {
            Ok(pair) => pair,
            Err(e) => {
                error!("[{}] 瀏覽器啟動失敗: {}", player_id, e);
                return Ok(AttemptResult::failure(player_id, format!("例外錯誤：{}", e)));
            }
        };
        let page = PageDriver::new(raw_page);

        // 页面加载本身也受超时保护
        let navigated = tokio::time::timeout(self.page_load_timeout, async {
            page.wait_for(LOGIN_INPUT, self.page_load_timeout).await
        })
        .await;

        let mut logs = Vec::new();
        let mut result = match navigated {
            Ok(Poll::Found(())) => match self.drive(&page, player_id, code, &mut logs).await {
                Ok(result) => result,
                Err(e) => {
                    // 意外异常：转换为 Terminal 结果，尽力采集现场
                    error!("[{}] 發生例外錯誤：{}", player_id, e);
                    let mut result =
                        AttemptResult::failure(player_id, format!("例外錯誤：{}", e));
                    if debug {
                        result.debug_artifacts = Some(self.capture_artifacts(&page).await);
                    }
                    result
                }
            },
            _ => AttemptResult::failure(player_id, "頁面載入逾時 / page load timeout"),
        };
        result.debug_logs = logs;
        result.ensure_reason();

        // 任何退出路径都关闭浏览器
        if let Err(e) = browser.close().await {
            warn!("[{}] 關閉瀏覽器失敗: {}", player_id, e);
        }
        info!(
            "[{}] 會話結束 success={} reason={}",
            player_id, result.success, result.reason
        );

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // 会话流程的端到端行为（重试、超时、资源释放）在
    // workflow 单元测试与 tests/integration_test.rs 中用测试桩覆盖；
    // 这里只验证不依赖浏览器的纯逻辑。

    #[test]
    fn test_captcha_retry_modal_keywords() {
        assert!(CAPTCHA_RETRY_MODAL_KEYWORDS
            .iter()
            .any(|k| "驗證碼錯誤，請重新輸入".contains(k)));
        assert!(CAPTCHA_RETRY_MODAL_KEYWORDS
            .iter()
            .any(|k| "驗證碼已過期".contains(k)));
        assert!(!CAPTCHA_RETRY_MODAL_KEYWORDS
            .iter()
            .any(|k| "兌換成功".contains(k)));
    }

    #[test]
    fn test_exhausted_reason_carries_marker() {
        assert!(crate::classifier::is_captcha_exhausted(CAPTCHA_EXHAUSTED_REASON));
    }
}
