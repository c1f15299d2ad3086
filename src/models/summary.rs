//! 批处理结果汇总

/// 失败明细（带玩家资料注记）
#[derive(Debug, Clone)]
pub struct FailureDetail {
    pub player_id: String,
    pub kingdom: String,
    pub name: String,
}

/// 一次批处理的汇总，构建后只读，发送给汇报端即丢弃
#[derive(Debug, Clone)]
pub struct BatchSummary {
    pub code: String,
    pub is_retry: bool,
    pub success_count: usize,
    pub failure_count: usize,
    pub skipped_count: usize,
    pub duration_secs: f64,
    pub failures: Vec<FailureDetail>,
}

impl BatchSummary {
    /// 汇总块（固定格式，与历史通知保持一致）
    pub fn render_block(&self) -> String {
        format!(
            "=== {}Summary ===\nGiftcode : {}\nSuccess  : {}\nFailed   : {}\nSkipped  : {}\nDuration : {:.1}s",
            if self.is_retry { "Retry " } else { "" },
            self.code,
            self.success_count,
            self.failure_count,
            self.skipped_count,
            self.duration_secs
        )
    }

    /// 失败明细块，每行 `- 玩家ID｜王國｜名稱`
    pub fn render_failures(&self) -> String {
        self.failures
            .iter()
            .map(|f| format!("- {}｜{}｜{}", f.player_id, f.kingdom, f.name))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 完整通知文本（标题 + 代码块包裹的汇总与明细）
    pub fn render_notification(&self) -> String {
        let header = if self.is_retry {
            "Retry 兌換完成 / Retry Redemption Complete"
        } else {
            "兌換完成 / Redemption Completed"
        };
        let failures = self.render_failures();
        let detail = if failures.is_empty() {
            "無錯誤資料 / No error data".to_string()
        } else {
            failures
        };
        format!(
            "{}\n```text\n{}\n\n{}\n```",
            header,
            self.render_block(),
            detail
        )
    }

    /// 全部跳过时的零活动汇总
    pub fn all_skipped(code: &str, is_retry: bool, skipped: usize, duration_secs: f64) -> Self {
        Self {
            code: code.to_string(),
            is_retry,
            success_count: 0,
            failure_count: 0,
            skipped_count: skipped,
            duration_secs,
            failures: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> BatchSummary {
        BatchSummary {
            code: "WOS2024".to_string(),
            is_retry: false,
            success_count: 2,
            failure_count: 1,
            skipped_count: 3,
            duration_secs: 12.34,
            failures: vec![FailureDetail {
                player_id: "111".to_string(),
                kingdom: "245".to_string(),
                name: "玩家甲".to_string(),
            }],
        }
    }

    #[test]
    fn test_render_block_format() {
        let block = sample().render_block();
        assert!(block.starts_with("=== Summary ==="));
        assert!(block.contains("Giftcode : WOS2024"));
        assert!(block.contains("Success  : 2"));
        assert!(block.contains("Failed   : 1"));
        assert!(block.contains("Skipped  : 3"));
        assert!(block.contains("Duration : 12.3s"));
    }

    #[test]
    fn test_retry_header() {
        let mut summary = sample();
        summary.is_retry = true;
        assert!(summary.render_block().starts_with("=== Retry Summary ==="));
        assert!(summary.render_notification().contains("Retry 兌換完成"));
    }

    #[test]
    fn test_render_failures_lines() {
        let text = sample().render_failures();
        assert_eq!(text, "- 111｜245｜玩家甲");
    }

    #[test]
    fn test_all_skipped_summary() {
        let summary = BatchSummary::all_skipped("WOS2024", false, 5, 0.5);
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.failure_count, 0);
        assert_eq!(summary.skipped_count, 5);
        assert!(summary
            .render_notification()
            .contains("無錯誤資料 / No error data"));
    }
}
