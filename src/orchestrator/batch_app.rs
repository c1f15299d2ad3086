//! 应用入口
//!
//! 装配所有依赖（账本、识别客户端、会话驱动、汇报端），
//! 扫描请求目录并逐批消费，处理成功后删除请求文件。

use std::sync::Arc;

use anyhow::Result;
use tracing::{error, info, warn};

use crate::clients::{LogNotifier, Notifier, TwoCaptchaClient, WebhookClient};
use crate::config::Config;
use crate::error::RedeemError;
use crate::ledger::{JsonLedger, JsonProfileCache};
use crate::models::{load_all_request_files, remove_request_file};
use crate::orchestrator::Coordinator;
use crate::services::{BrowserProfileFetcher, BrowserSessionDriver, ProfileService};
use crate::workflow::RedeemFlow;

/// 应用
pub struct App {
    config: Config,
    coordinator: Coordinator,
}

impl App {
    /// 装配依赖
    pub async fn initialize(config: Config) -> Result<Self> {
        if config.captcha_api_key.is_empty() {
            return Err(RedeemError::Config(
                "CAPTCHA_API_KEY 未設置，無法進行驗證碼識別".to_string(),
            )
            .into());
        }

        let ledger = Arc::new(JsonLedger::new(&config.ledger_dir)?);
        let profile_cache = Arc::new(JsonProfileCache::new(&config.ledger_dir)?);

        let solver = Arc::new(TwoCaptchaClient::new(&config));
        let driver = Arc::new(BrowserSessionDriver::new(&config, solver));
        let flow = Arc::new(RedeemFlow::new(&config, driver, ledger.clone()));

        let fetcher = Arc::new(BrowserProfileFetcher::new(&config));
        let profiles = Arc::new(ProfileService::new(fetcher, profile_cache));

        let notifier: Arc<dyn Notifier> = match &config.webhook_url {
            Some(url) => Arc::new(WebhookClient::new(url)),
            None => {
                info!("未配置 WEBHOOK_URL，結果只寫日誌");
                Arc::new(LogNotifier)
            }
        };

        let coordinator = Coordinator::new(
            config.clone(),
            ledger,
            flow,
            profiles,
            notifier,
        );

        Ok(Self {
            config,
            coordinator,
        })
    }

    fn log_startup(&self) {
        info!("🚀 禮品碼兌換器啟動");
        info!("   兌換頁面   : {}", self.config.redeem_url);
        info!("   請求目錄   : {}", self.config.request_folder);
        info!("   帳本目錄   : {}", self.config.ledger_dir);
        info!("   兌換併發   : {}", self.config.max_concurrent_redeems);
        info!("   資料併發   : {}", self.config.max_concurrent_fetches);
    }

    /// 扫描请求目录并逐批处理
    pub async fn run(&self) -> Result<()> {
        self.log_startup();

        let requests = load_all_request_files(&self.config.request_folder).await?;
        if requests.is_empty() {
            warn!("請求目錄沒有待處理文件: {}", self.config.request_folder);
            return Ok(());
        }
        info!("共 {} 個批次待處理", requests.len());

        let mut completed = 0usize;
        let mut total_success = 0usize;
        let mut total_failure = 0usize;

        for request in &requests {
            match self.coordinator.run_batch(request).await {
                Ok(summary) => {
                    completed += 1;
                    total_success += summary.success_count;
                    total_failure += summary.failure_count;
                    if let Err(e) = remove_request_file(request).await {
                        warn!("刪除請求文件失敗: {}", e);
                    }
                }
                Err(e) => {
                    // 批次级失败保留请求文件，下次启动重新处理
                    error!("❌ 批次處理失敗 code={}: {}", request.code, e);
                }
            }
        }

        info!(
            "📊 全部完成：{}/{} 個批次，成功 {} 人次，失敗 {} 人次",
            completed,
            requests.len(),
            total_success,
            total_failure
        );
        Ok(())
    }
}
