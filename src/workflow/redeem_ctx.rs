//! 单人兑换任务上下文

use std::fmt;

/// 一个玩家在一个批次内的任务上下文
///
/// 状态机与日志共用，字段一旦构造不再变更。
#[derive(Debug, Clone)]
pub struct PlayerCtx {
    pub player_id: String,
    pub code: String,
    pub guild_id: String,
    pub debug: bool,
}

impl PlayerCtx {
    pub fn new(
        player_id: impl Into<String>,
        code: impl Into<String>,
        guild_id: impl Into<String>,
        debug: bool,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            code: code.into(),
            guild_id: guild_id.into(),
            debug,
        }
    }
}

impl fmt::Display for PlayerCtx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}[{}]", self.player_id, self.guild_id, self.code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_format() {
        let ctx = PlayerCtx::new("100", "CODE1", "g1", false);
        assert_eq!(ctx.to_string(), "100@g1[CODE1]");
    }
}
