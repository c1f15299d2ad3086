//! 应用程序错误类型
//!
//! 业务边界（账本读写、验证码服务、通知发送）使用带上下文的领域错误；
//! 其余路径沿用 `anyhow::Result` 逐层向上传递。

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RedeemError {
    /// 浏览器启动 / 配置失败
    #[error("浏览器错误: {0}")]
    Browser(String),

    /// 验证码服务调用失败
    #[error("验证码服务错误 ({endpoint}): {message}")]
    Captcha { endpoint: String, message: String },

    /// 账本文件读写失败
    #[error("账本读写失败 ({path}): {source}")]
    Ledger {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// 通知发送失败
    #[error("通知发送失败: {0}")]
    Notify(String),

    /// 配置错误
    #[error("配置错误: {0}")]
    Config(String),
}

/// 应用程序结果类型
pub type AppResult<T> = Result<T, RedeemError>;
