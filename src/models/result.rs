//! 单个玩家的兑换尝试结果

use serde::Serialize;

/// reason 字段缺省值（下游消费必须有值，绝不隐式缺失）
pub const UNKNOWN_ERROR: &str = "未知錯誤 / unknown error";

/// 结构化调试日志条目
#[derive(Debug, Clone, Serialize)]
pub struct DebugLogEntry {
    /// 第几次尝试（会话内或外层重试，视上下文）
    pub attempt: usize,
    pub info: String,
}

/// 异常时的最佳努力调试产物
#[derive(Debug, Clone, Serialize)]
pub struct DebugArtifacts {
    pub html_base64: Option<String>,
    pub screenshot_base64: Option<String>,
}

/// 一个玩家的终态兑换结果
///
/// 由状态机产出，交给协调器后不再变更。
#[derive(Debug, Clone, Serialize)]
pub struct AttemptResult {
    pub player_id: String,
    pub success: bool,
    /// 失败原因或成功短语，永远非空
    pub reason: String,
    /// 服务器成功响应原文
    pub message: Option<String>,
    pub debug_logs: Vec<DebugLogEntry>,
    pub debug_artifacts: Option<DebugArtifacts>,
}

impl AttemptResult {
    pub fn success(player_id: impl Into<String>, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            player_id: player_id.into(),
            success: true,
            reason: message.clone(),
            message: Some(message),
            debug_logs: Vec::new(),
            debug_artifacts: None,
        }
    }

    pub fn failure(player_id: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut result = Self {
            player_id: player_id.into(),
            success: false,
            reason: reason.into(),
            message: None,
            debug_logs: Vec::new(),
            debug_artifacts: None,
        };
        result.ensure_reason();
        result
    }

    /// reason 为空时回填缺省值
    pub fn ensure_reason(&mut self) {
        if self.reason.trim().is_empty() {
            self.reason = UNKNOWN_ERROR.to_string();
        }
    }
}
