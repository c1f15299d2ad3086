//! 兑换结果分类器
//!
//! 把服务器响应文本分成三类：
//! - `Success`：业务上的最终状态（兑换成功、已领取、码已过期等），不重试也不算失败
//! - `Retryable`：服务器暂时性错误（验证码错误、繁忙等），带退避重试
//! - `Terminal`：硬性失败（ID 不存在、输入无效、登录失败等），本轮不再重试
//!
//! 关键词保留兑换页面实际返回的繁体中文原文，并附上程序输出的英文镜像。

/// 视为最终成功的响应关键词（含"已领取""已过期"这类业务终态）
pub const SUCCESS_KEYWORDS: &[&str] = &[
    "您已領取",
    "已兌換",
    "已領取過",
    "已經兌換",
    "超出兌換時間",
    "已使用",
    "已過期",
    "兌換成功，請在信件中領取獎勵！",
    "暫不符合兌換要求",
    "already claimed",
    "claim succeeded",
    "redemption window passed",
    "already used",
    "expired",
];

/// 视为暂时性错误、应退避重试的关键词
pub const RETRY_KEYWORDS: &[&str] = &[
    "驗證碼錯誤",
    "伺服器繁忙",
    "請稍後再試",
    "系統異常",
    "請重試",
    "處理中",
    "captcha wrong",
    "captcha incorrect",
    "server busy",
    "try again later",
    "system exception",
    "processing",
];

/// 页面弹窗中的硬性失败关键词（输入校验、登录失败等）
pub const FAILURE_KEYWORDS: &[&str] = &[
    "請先輸入",
    "不存在",
    "錯誤",
    "無效",
    "超出",
    "無法",
    "類型",
    "does not exist",
    "invalid",
    "out of range",
    "login failed",
];

/// 验证码识别次数耗尽的标记（普通提交时不自动重试这类失败）
pub const CAPTCHA_EXHAUSTED_MARKERS: &[&str] = &["驗證碼三次辨識皆失敗", "CAPTCHA failed 3 times"];

/// 分类结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 业务终态，记为成功
    Success,
    /// 暂时性错误，可退避重试
    Retryable,
    /// 硬性失败，本轮不再重试
    Terminal,
}

/// 判断响应是否为业务上的成功终态
///
/// 成功判定基于 reason 与 message 的拼接，成功优先于一切失败标记。
pub fn is_success_reason(reason: &str, message: &str) -> bool {
    let combined = format!("{}{}", reason, message);
    SUCCESS_KEYWORDS.iter().any(|k| combined.contains(k))
}

/// 判断失败原因是否为"验证码识别耗尽"
pub fn is_captcha_exhausted(reason: &str) -> bool {
    CAPTCHA_EXHAUSTED_MARKERS.iter().any(|k| reason.contains(k))
}

/// 判断弹窗文本是否命中硬性失败关键词
pub fn contains_failure_keyword(text: &str) -> bool {
    FAILURE_KEYWORDS.iter().any(|k| text.contains(k))
}

/// 三分类：成功 > 可重试 > 硬性失败
///
/// 成功优先检查（成功是粘性的），之后仅根据 reason 判断是否可重试，
/// 其余一律视为硬性失败。
pub fn classify(reason: &str, message: &str) -> Outcome {
    if is_success_reason(reason, message) {
        return Outcome::Success;
    }
    if RETRY_KEYWORDS.iter().any(|k| reason.contains(k)) {
        return Outcome::Retryable;
    }
    Outcome::Terminal
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_success_phrases() {
        assert_eq!(classify("already claimed", ""), Outcome::Success);
        assert_eq!(classify("您已領取過", ""), Outcome::Success);
        assert_eq!(classify("超出兌換時間", ""), Outcome::Success);
        // 成功短语出现在 message 中同样生效
        assert_eq!(
            classify("", "兌換成功，請在信件中領取獎勵！"),
            Outcome::Success
        );
    }

    #[test]
    fn test_classify_retryable_phrases() {
        assert_eq!(classify("captcha wrong, try again", ""), Outcome::Retryable);
        assert_eq!(classify("驗證碼錯誤", ""), Outcome::Retryable);
        assert_eq!(classify("伺服器繁忙，請稍後再試", ""), Outcome::Retryable);
    }

    #[test]
    fn test_classify_terminal_phrases() {
        assert_eq!(classify("does not exist", ""), Outcome::Terminal);
        assert_eq!(classify("ID 不存在", ""), Outcome::Terminal);
        assert_eq!(classify("登入失敗：請先輸入玩家ID", ""), Outcome::Terminal);
        assert_eq!(classify("未知錯誤", ""), Outcome::Terminal);
    }

    #[test]
    fn test_success_wins_over_failure_keywords() {
        // "超出兌換時間" 同时包含失败关键词 "超出"，成功优先
        assert_eq!(classify("超出兌換時間", ""), Outcome::Success);
        assert!(is_success_reason("超出兌換時間", ""));
    }

    #[test]
    fn test_captcha_exhausted_marker() {
        assert!(is_captcha_exhausted("驗證碼三次辨識皆失敗，放棄兌換"));
        assert!(is_captcha_exhausted("CAPTCHA failed 3 times"));
        assert!(!is_captcha_exhausted("驗證碼錯誤"));
    }

    #[test]
    fn test_failure_keywords() {
        assert!(contains_failure_keyword("請先輸入玩家ID"));
        assert!(contains_failure_keyword("兌換碼無效"));
        assert!(!contains_failure_keyword("兌換成功"));
    }
}
