//! 兑换请求

use serde::Deserialize;

/// 一次批量兑换请求
///
/// 由外部投递（TOML 请求文件或直接构造），在单次批处理期间不可变。
#[derive(Debug, Clone, Deserialize)]
pub struct RedemptionRequest {
    /// 礼品码
    pub code: String,
    /// 所属 guild
    pub guild_id: String,
    /// 玩家 ID 列表（加载时去重，保持顺序）
    pub player_ids: Vec<String>,
    /// 是否为"只重试已失败玩家"的请求
    #[serde(default)]
    pub retry: bool,
    /// 是否保留调试产物（页面 HTML / 截图）
    #[serde(default)]
    pub debug: bool,
    /// 来源文件路径（处理完成后删除）
    #[serde(skip)]
    pub file_path: Option<String>,
}

impl RedemptionRequest {
    pub fn new(
        code: impl Into<String>,
        guild_id: impl Into<String>,
        player_ids: Vec<String>,
        retry: bool,
    ) -> Self {
        let mut request = Self {
            code: code.into(),
            guild_id: guild_id.into(),
            player_ids,
            retry,
            debug: false,
            file_path: None,
        };
        request.dedup_players();
        request
    }

    /// 去重玩家 ID，保持首次出现的顺序
    pub fn dedup_players(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.player_ids.retain(|id| seen.insert(id.clone()));
    }

    /// 请求是否缺少必要字段
    pub fn is_incomplete(&self) -> bool {
        self.code.is_empty() || self.guild_id.is_empty() || self.player_ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedup_preserves_order() {
        let request = RedemptionRequest::new(
            "CODE1",
            "g1",
            vec![
                "300".to_string(),
                "100".to_string(),
                "300".to_string(),
                "200".to_string(),
                "100".to_string(),
            ],
            false,
        );
        assert_eq!(request.player_ids, vec!["300", "100", "200"]);
    }

    #[test]
    fn test_is_incomplete() {
        let request = RedemptionRequest::new("", "g1", vec!["1".to_string()], false);
        assert!(request.is_incomplete());
        let request = RedemptionRequest::new("CODE1", "g1", vec![], false);
        assert!(request.is_incomplete());
        let request = RedemptionRequest::new("CODE1", "g1", vec!["1".to_string()], false);
        assert!(!request.is_incomplete());
    }
}
