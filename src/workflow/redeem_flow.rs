//! 单人兑换状态机
//!
//! 在会话驱动之上叠加批级别的重试语义：
//! - Retryable 结果按退避重试，总尝试次数 = 1 + redeem_retries
//! - 每次尝试受整体超时保护，超时视为终态失败
//! - 会话层异常转换为终态失败，绝不让单人任务 panic 或挂起
//! - 无论结局如何，都尽力写入该玩家的尝试快照

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::{info, warn};

use crate::classifier::{classify, Outcome};
use crate::config::Config;
use crate::ledger::LedgerStore;
use crate::models::{AttemptResult, DebugLogEntry};
use crate::services::RedeemDriver;
use crate::workflow::PlayerCtx;

/// 单次尝试超时的终态文案
const TIMEOUT_REASON: &str = "Timeout：單人兌換超過 90 秒，視為失敗 / single redemption exceeded 90s";

/// 单人兑换状态机
pub struct RedeemFlow {
    driver: Arc<dyn RedeemDriver>,
    ledger: Arc<dyn LedgerStore>,
    max_retries: usize,
    backoff_base: Duration,
    attempt_timeout: Duration,
}

impl RedeemFlow {
    pub fn new(
        config: &Config,
        driver: Arc<dyn RedeemDriver>,
        ledger: Arc<dyn LedgerStore>,
    ) -> Self {
        Self {
            driver,
            ledger,
            max_retries: config.redeem_retries,
            backoff_base: Duration::from_secs(config.retry_backoff_base_secs),
            attempt_timeout: Duration::from_secs(config.attempt_timeout_secs),
        }
    }

    /// 执行单人兑换直到终态
    pub async fn run(&self, ctx: &PlayerCtx) -> AttemptResult {
        let mut last;
        // 跨尝试的重试轨迹，随最终结果一并落入快照
        let mut retry_trail: Vec<DebugLogEntry> = Vec::new();

        let mut attempt = 0;
        loop {
            let outcome = timeout(
                self.attempt_timeout,
                self.driver.attempt(&ctx.player_id, &ctx.code, ctx.debug),
            )
            .await;

            last = match outcome {
                Err(_) => {
                    warn!("[{}] {}", ctx, TIMEOUT_REASON);
                    AttemptResult::failure(&ctx.player_id, TIMEOUT_REASON)
                }
                Ok(Err(e)) => {
                    warn!("[{}] 會話異常：{}", ctx, e);
                    AttemptResult::failure(&ctx.player_id, format!("例外錯誤：{}", e))
                }
                Ok(Ok(result)) => result,
            };

            match classify(&last.reason, last.message.as_deref().unwrap_or("")) {
                Outcome::Success => {
                    info!("✓ [{}] 兌換成功", ctx);
                    break;
                }
                Outcome::Terminal => {
                    info!("❌ [{}] 終態失敗：{}", ctx, last.reason);
                    break;
                }
                Outcome::Retryable => {
                    if attempt >= self.max_retries {
                        info!("❌ [{}] 重試次數用盡：{}", ctx, last.reason);
                        break;
                    }
                    let delay = self.backoff_base + Duration::from_secs(attempt as u64);
                    info!(
                        "⚠️ [{}] 可重試失敗（{}），{} 秒後重試",
                        ctx,
                        last.reason,
                        delay.as_secs()
                    );
                    retry_trail.push(DebugLogEntry {
                        attempt: attempt + 1,
                        info: format!("Retry due to: {}", last.reason),
                    });
                    sleep(delay).await;
                    attempt += 1;
                }
            }
        }

        if !retry_trail.is_empty() {
            retry_trail.append(&mut last.debug_logs);
            last.debug_logs = retry_trail;
        }
        last.ensure_reason();

        // 快照独立于批级别账本写入，失败只记日志
        if let Err(e) = self
            .ledger
            .record_attempt_snapshot(&ctx.player_id, &last)
            .await
        {
            warn!("[{}] 寫入嘗試快照失敗: {}", ctx, e);
        }

        last
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Mutex;

    use crate::ledger::MemoryLedger;

    /// 按脚本逐次返回结果的驱动桩
    struct ScriptedDriver {
        script: Mutex<Vec<AttemptResult>>,
        calls: AtomicUsize,
    }

    impl ScriptedDriver {
        fn new(mut script: Vec<AttemptResult>) -> Self {
            script.reverse();
            Self {
                script: Mutex::new(script),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl RedeemDriver for ScriptedDriver {
        async fn attempt(&self, _pid: &str, _code: &str, _debug: bool) -> Result<AttemptResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut script = self.script.lock().await;
            Ok(script.pop().expect("script exhausted"))
        }
    }

    /// 永不返回的驱动桩（触发超时路径）
    struct HangingDriver;

    #[async_trait]
    impl RedeemDriver for HangingDriver {
        async fn attempt(&self, _pid: &str, _code: &str, _debug: bool) -> Result<AttemptResult> {
            std::future::pending().await
        }
    }

    fn flow(driver: Arc<dyn RedeemDriver>, ledger: Arc<MemoryLedger>) -> RedeemFlow {
        let config = Config {
            redeem_retries: 3,
            retry_backoff_base_secs: 2,
            attempt_timeout_secs: 90,
            ..Config::default()
        };
        RedeemFlow::new(&config, driver, ledger)
    }

    fn ctx() -> PlayerCtx {
        PlayerCtx::new("100", "CODE1", "g1", false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_exhausts_all_attempts() {
        let driver = Arc::new(ScriptedDriver::new(vec![
            AttemptResult::failure("100", "驗證碼錯誤"),
            AttemptResult::failure("100", "伺服器繁忙"),
            AttemptResult::failure("100", "系統異常"),
            AttemptResult::failure("100", "請稍後再試"),
        ]));
        let ledger = Arc::new(MemoryLedger::new());
        let result = flow(driver.clone(), ledger).run(&ctx()).await;

        assert_eq!(driver.calls.load(Ordering::SeqCst), 4);
        assert!(!result.success);
        assert_eq!(result.reason, "請稍後再試");
        // 重试轨迹随终态结果保留
        assert_eq!(result.debug_logs.len(), 3);
        assert!(result.debug_logs[0].info.contains("驗證碼錯誤"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_then_success_stops_early() {
        let driver = Arc::new(ScriptedDriver::new(vec![
            AttemptResult::failure("100", "驗證碼錯誤"),
            AttemptResult::failure("100", "伺服器繁忙"),
            AttemptResult::success("100", "兌換成功，請在信件中領取獎勵！"),
        ]));
        let ledger = Arc::new(MemoryLedger::new());
        let result = flow(driver.clone(), ledger).run(&ctx()).await;

        assert_eq!(driver.calls.load(Ordering::SeqCst), 3);
        assert!(result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_terminal_failure_never_retries() {
        let driver = Arc::new(ScriptedDriver::new(vec![AttemptResult::failure(
            "100",
            "玩家不存在",
        )]));
        let ledger = Arc::new(MemoryLedger::new());
        let result = flow(driver.clone(), ledger).run(&ctx()).await;

        assert_eq!(driver.calls.load(Ordering::SeqCst), 1);
        assert!(!result.success);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_attempt_becomes_timeout_failure() {
        let ledger = Arc::new(MemoryLedger::new());
        let result = flow(Arc::new(HangingDriver), ledger).run(&ctx()).await;

        assert!(!result.success);
        assert!(result.reason.contains("Timeout"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_snapshot_written_after_terminal() {
        let driver = Arc::new(ScriptedDriver::new(vec![AttemptResult::failure(
            "100",
            "玩家不存在",
        )]));
        let ledger = Arc::new(MemoryLedger::new());
        flow(driver, ledger.clone()).run(&ctx()).await;

        let snapshot = ledger.attempt_snapshot("100").await.expect("snapshot");
        assert_eq!(snapshot.reason, "玩家不存在");
    }
}
