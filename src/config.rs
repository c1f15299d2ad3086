/// 程序配置
#[derive(Clone, Debug)]
pub struct Config {
    /// 兑换页面 URL
    pub redeem_url: String,
    /// 待处理兑换请求（TOML 文件）存放目录
    pub request_folder: String,
    /// 账本（success / failed 记录）存放目录
    pub ledger_dir: String,
    /// 结果汇报 webhook URL（为空时只写日志）
    pub webhook_url: Option<String>,
    /// 2Captcha API key
    pub captcha_api_key: String,
    /// 2Captcha API 地址
    pub captcha_api_base_url: String,
    /// 验证码结果轮询次数
    pub captcha_poll_rounds: usize,
    /// 验证码结果轮询间隔（秒）
    pub captcha_poll_interval_secs: u64,
    /// 同时进行的兑换会话数（每个会话对应一个真实浏览器）
    pub max_concurrent_redeems: usize,
    /// 同时进行的玩家资料抓取会话数
    pub max_concurrent_fetches: usize,
    /// 单次会话内验证码识别尝试次数
    pub ocr_max_retries: usize,
    /// 单个玩家的额外重试次数（总尝试次数 = redeem_retries + 1）
    pub redeem_retries: usize,
    /// 单次兑换尝试的硬超时（秒）
    pub attempt_timeout_secs: u64,
    /// 重试退避基数（秒），第 n 次重试等待 base + n 秒
    pub retry_backoff_base_secs: u64,
    /// 页面加载超时（毫秒）
    pub page_load_timeout_ms: u64,
    /// 浏览器可执行文件路径（为空时使用系统默认）
    pub chrome_executable: Option<String>,
    /// 是否在异常时保留页面 HTML / 截图
    pub debug_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            redeem_url: "https://wos-giftcode.centurygame.com/".to_string(),
            request_folder: "requests".to_string(),
            ledger_dir: "ledger".to_string(),
            webhook_url: None,
            captcha_api_key: String::new(),
            captcha_api_base_url: "http://2captcha.com".to_string(),
            captcha_poll_rounds: 12,
            captcha_poll_interval_secs: 5,
            max_concurrent_redeems: 4,
            max_concurrent_fetches: 4,
            ocr_max_retries: 3,
            redeem_retries: 3,
            attempt_timeout_secs: 90,
            retry_backoff_base_secs: 2,
            page_load_timeout_ms: 60_000,
            chrome_executable: None,
            debug_mode: false,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        let default = Self::default();
        Self {
            redeem_url: std::env::var("REDEEM_URL").unwrap_or(default.redeem_url),
            request_folder: std::env::var("REQUEST_FOLDER").unwrap_or(default.request_folder),
            ledger_dir: std::env::var("LEDGER_DIR").unwrap_or(default.ledger_dir),
            webhook_url: std::env::var("WEBHOOK_URL").ok().filter(|v| !v.is_empty()),
            captcha_api_key: std::env::var("CAPTCHA_API_KEY").unwrap_or(default.captcha_api_key),
            captcha_api_base_url: std::env::var("CAPTCHA_API_BASE_URL")
                .unwrap_or(default.captcha_api_base_url),
            captcha_poll_rounds: std::env::var("CAPTCHA_POLL_ROUNDS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.captcha_poll_rounds),
            captcha_poll_interval_secs: std::env::var("CAPTCHA_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.captcha_poll_interval_secs),
            max_concurrent_redeems: std::env::var("MAX_CONCURRENT_REDEEMS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_concurrent_redeems),
            max_concurrent_fetches: std::env::var("MAX_CONCURRENT_FETCHES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.max_concurrent_fetches),
            ocr_max_retries: std::env::var("OCR_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.ocr_max_retries),
            redeem_retries: std::env::var("REDEEM_RETRIES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.redeem_retries),
            attempt_timeout_secs: std::env::var("ATTEMPT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.attempt_timeout_secs),
            retry_backoff_base_secs: std::env::var("RETRY_BACKOFF_BASE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.retry_backoff_base_secs),
            page_load_timeout_ms: std::env::var("PAGE_LOAD_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.page_load_timeout_ms),
            chrome_executable: std::env::var("CHROME_EXECUTABLE")
                .ok()
                .filter(|v| !v.is_empty()),
            debug_mode: std::env::var("DEBUG_MODE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(default.debug_mode),
        }
    }
}
