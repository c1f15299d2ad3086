//! 批次协调器
//!
//! ## 职责
//! - 批前准备：并发补齐玩家资料缓存（尽力而为）
//! - 过滤：根据账本决定哪些玩家需要派发
//! - 派发：按并发上限逐玩家启动状态机
//! - 聚合：收集所有终态结果，写账本，构建汇总并汇报
//!
//! 账本与汇报的写入失败只降级为日志，绝不让单点故障拖垮整个批次。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

use crate::classifier::{is_captcha_exhausted, is_success_reason};
use crate::clients::Notifier;
use crate::config::Config;
use crate::ledger::{FailureEntry, LedgerStore};
use crate::models::{AttemptResult, BatchSummary, FailureDetail, RedemptionRequest};
use crate::services::ProfileService;
use crate::workflow::{PlayerCtx, RedeemFlow};

/// 根据账本状态决定本批次要派发的玩家
///
/// - 已成功的玩家永远跳过（成功是粘性的）
/// - retry 批：只派发账本中已失败的玩家
/// - 普通批：跳过所有已失败的玩家（其中验证码耗尽者尤其不该自动重试），
///   只派发账本中没有任何记录的新玩家
pub fn filter_players(
    player_ids: &[String],
    success: &HashSet<String>,
    failed: &HashMap<String, FailureEntry>,
    is_retry: bool,
) -> Vec<String> {
    player_ids
        .iter()
        .filter(|id| !success.contains(*id))
        .filter(|id| {
            if is_retry {
                failed.contains_key(*id)
            } else {
                !failed.contains_key(*id)
            }
        })
        .cloned()
        .collect()
}

/// 批次协调器
pub struct Coordinator {
    config: Config,
    ledger: Arc<dyn LedgerStore>,
    flow: Arc<RedeemFlow>,
    profiles: Arc<ProfileService>,
    notifier: Arc<dyn Notifier>,
    fetch_semaphore: Arc<Semaphore>,
    redeem_semaphore: Arc<Semaphore>,
}

impl Coordinator {
    pub fn new(
        config: Config,
        ledger: Arc<dyn LedgerStore>,
        flow: Arc<RedeemFlow>,
        profiles: Arc<ProfileService>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let fetch_semaphore = Arc::new(Semaphore::new(config.max_concurrent_fetches));
        let redeem_semaphore = Arc::new(Semaphore::new(config.max_concurrent_redeems));
        Self {
            config,
            ledger,
            flow,
            profiles,
            notifier,
            fetch_semaphore,
            redeem_semaphore,
        }
    }

    /// 处理一个完整批次，返回汇总
    pub async fn run_batch(&self, request: &RedemptionRequest) -> Result<BatchSummary> {
        let start = Instant::now();
        info!(
            "🚀 開始批次 code={} guild={} 玩家數={} retry={}",
            request.code,
            request.guild_id,
            request.player_ids.len(),
            request.retry
        );

        self.enrich_profiles(request).await;

        let success = self
            .ledger
            .list_success(&request.guild_id, &request.code)
            .await?;
        let failed = self
            .ledger
            .list_failed(&request.guild_id, &request.code)
            .await?;

        let to_process = filter_players(&request.player_ids, &success, &failed, request.retry);
        if !request.retry {
            // 验证码耗尽的玩家只有 retry 批才会再碰，这里单独记日志
            for (id, entry) in &failed {
                if request.player_ids.contains(id) && is_captcha_exhausted(&entry.reason) {
                    info!("[{}] 驗證碼辨識已耗盡，跳過（等待 retry 批）", id);
                }
            }
        }

        let skipped = request.player_ids.len() - to_process.len();
        info!(
            "📊 過濾結果：派發 {} 人，跳過 {} 人",
            to_process.len(),
            skipped
        );

        if to_process.is_empty() {
            let summary = BatchSummary::all_skipped(
                &request.code,
                request.retry,
                skipped,
                start.elapsed().as_secs_f64(),
            );
            let note = format!(
                "{}\n所有 ID 皆已兌換成功或已領取過，無需再處理 / Nothing left to process",
                summary.render_notification()
            );
            if let Err(e) = self.notifier.notify(&note).await {
                warn!("📣 汇报失败: {}", e);
            }
            return Ok(summary);
        }

        let results = self.dispatch(request, to_process).await;
        let summary = self
            .aggregate(request, results, skipped, start.elapsed().as_secs_f64())
            .await;

        if let Err(e) = self.notifier.notify(&summary.render_notification()).await {
            warn!("📣 汇报失败: {}", e);
        }
        info!(
            "✓ 批次完成 code={} 成功={} 失敗={} 跳過={} 耗時={:.1}s",
            summary.code,
            summary.success_count,
            summary.failure_count,
            summary.skipped_count,
            summary.duration_secs
        );
        Ok(summary)
    }

    /// 并发补齐玩家资料缓存，抓取失败只记日志
    async fn enrich_profiles(&self, request: &RedemptionRequest) {
        let tasks = request.player_ids.iter().map(|player_id| {
            let profiles = Arc::clone(&self.profiles);
            let semaphore = Arc::clone(&self.fetch_semaphore);
            let guild_id = request.guild_id.clone();
            let player_id = player_id.clone();
            async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return,
                };
                if let Err(e) = profiles.ensure_cached(&guild_id, &player_id).await {
                    warn!("[{}] 補齊資料失敗: {}", player_id, e);
                }
            }
        });
        join_all(tasks).await;
    }

    /// 按并发上限逐玩家派发状态机
    async fn dispatch(
        &self,
        request: &RedemptionRequest,
        player_ids: Vec<String>,
    ) -> Vec<AttemptResult> {
        let mut handles = Vec::with_capacity(player_ids.len());
        let debug = request.debug || self.config.debug_mode;

        for player_id in player_ids {
            let flow = Arc::clone(&self.flow);
            let semaphore = Arc::clone(&self.redeem_semaphore);
            let ctx = PlayerCtx::new(&player_id, &request.code, &request.guild_id, debug);
            let handle = tokio::spawn(async move {
                let _permit = match semaphore.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => {
                        return AttemptResult::failure(&ctx.player_id, "例外錯誤：semaphore closed")
                    }
                };
                flow.run(&ctx).await
            });
            handles.push((player_id, handle));
        }

        let mut results = Vec::with_capacity(handles.len());
        for (player_id, handle) in handles {
            match handle.await {
                Ok(result) => results.push(result),
                Err(e) => {
                    // 任务 panic 也必须产出终态结果
                    error!("[{}] 兌換任務崩潰: {}", player_id, e);
                    results.push(AttemptResult::failure(
                        &player_id,
                        format!("例外錯誤：{}", e),
                    ));
                }
            }
        }
        results
    }

    /// 聚合终态结果：写账本、构建汇总
    async fn aggregate(
        &self,
        request: &RedemptionRequest,
        results: Vec<AttemptResult>,
        skipped: usize,
        duration_secs: f64,
    ) -> BatchSummary {
        let mut success_count = 0;
        let mut failures = Vec::new();

        for mut result in results {
            result.ensure_reason();
            let message = result.message.as_deref().unwrap_or("");

            if is_success_reason(&result.reason, message) {
                success_count += 1;
                let message = if message.is_empty() {
                    "成功但無訊息 / succeeded without message"
                } else {
                    message
                };
                if let Err(e) = self
                    .ledger
                    .record_success(&request.guild_id, &request.code, &result.player_id, message)
                    .await
                {
                    warn!("[{}] 寫入成功記錄失敗: {}", result.player_id, e);
                }
            } else {
                let (name, kingdom) = self
                    .profiles
                    .lookup(&request.guild_id, &result.player_id)
                    .await;
                if let Err(e) = self
                    .ledger
                    .record_failure(
                        &request.guild_id,
                        &request.code,
                        &result.player_id,
                        &name,
                        &result.reason,
                    )
                    .await
                {
                    warn!("[{}] 寫入失敗記錄失敗: {}", result.player_id, e);
                }
                failures.push(FailureDetail {
                    player_id: result.player_id.clone(),
                    kingdom,
                    name,
                });
            }
        }

        BatchSummary {
            code: request.code.clone(),
            is_retry: request.retry,
            success_count,
            failure_count: failures.len(),
            skipped_count: skipped,
            duration_secs,
            failures,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn failed_with(entries: &[(&str, &str)]) -> HashMap<String, FailureEntry> {
        entries
            .iter()
            .map(|(id, reason)| {
                (
                    id.to_string(),
                    FailureEntry {
                        name: "玩家".to_string(),
                        reason: reason.to_string(),
                        updated_at: Utc::now(),
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_filter_skips_successful_players() {
        let success: HashSet<String> = ids(&["100"]).into_iter().collect();
        let failed = HashMap::new();
        let result = filter_players(&ids(&["100", "200"]), &success, &failed, false);
        assert_eq!(result, ids(&["200"]));
    }

    #[test]
    fn test_fresh_run_skips_all_failed_players() {
        let success = HashSet::new();
        let failed = failed_with(&[
            ("200", "驗證碼三次辨識皆失敗，放棄兌換"),
            ("300", "不存在"),
        ]);
        let result = filter_players(&ids(&["100", "200", "300"]), &success, &failed, false);
        assert_eq!(result, ids(&["100"]));
    }

    #[test]
    fn test_retry_run_only_dispatches_failed_players() {
        let success: HashSet<String> = ids(&["100"]).into_iter().collect();
        let failed = failed_with(&[("300", "不存在")]);
        let result = filter_players(&ids(&["100", "200", "300"]), &success, &failed, true);
        assert_eq!(result, ids(&["300"]));
    }

    #[test]
    fn test_success_wins_even_on_retry_run() {
        // 同一玩家既在 success 又在 failed（理论上不会发生），成功优先
        let success: HashSet<String> = ids(&["100"]).into_iter().collect();
        let failed = failed_with(&[("100", "驗證碼錯誤")]);
        let result = filter_players(&ids(&["100"]), &success, &failed, true);
        assert!(result.is_empty());
    }

    #[test]
    fn test_skipped_plus_dispatched_equals_total() {
        let all = ids(&["1", "2", "3", "4", "5"]);
        let success: HashSet<String> = ids(&["1", "3"]).into_iter().collect();
        let failed = failed_with(&[("5", "不存在")]);

        for is_retry in [false, true] {
            let dispatched = filter_players(&all, &success, &failed, is_retry);
            let skipped = all.len() - dispatched.len();
            assert_eq!(dispatched.len() + skipped, all.len());
        }
    }
}
