//! 玩家资料服务 - 业务能力层
//!
//! 抓取玩家名称 / 王国并写入缓存。资料只用于失败明细的可读性，
//! 抓取失败不影响兑换流程本身。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::{info, warn};

use crate::browser;
use crate::config::Config;
use crate::infrastructure::{PageDriver, Poll};
use crate::ledger::{PlayerProfile, ProfileCache, UNKNOWN_KINGDOM, UNKNOWN_NAME};

const LOGIN_INPUT: &str = r#"input[type="text"]"#;
const LOGIN_BTN: &str = ".login_btn";
const NAME_LABEL: &str = ".name";
const CODE_INPUT: &str = r#"input[placeholder="請輸入兌換碼"]"#;
const PROFILE_FETCH_RETRIES: usize = 3;

/// 资料抓取能力（可替换为测试桩）
#[async_trait]
pub trait ProfileFetcher: Send + Sync {
    async fn fetch(&self, player_id: &str) -> Result<PlayerProfile>;
}

/// 通过兑换页登录态抓取玩家资料
pub struct BrowserProfileFetcher {
    redeem_url: String,
    chrome_executable: Option<String>,
}

impl BrowserProfileFetcher {
    pub fn new(config: &Config) -> Self {
        Self {
            redeem_url: config.redeem_url.clone(),
            chrome_executable: config.chrome_executable.clone(),
        }
    }

    async fn fetch_once(&self, player_id: &str) -> Result<PlayerProfile> {
        let (mut browser, raw_page) =
            browser::launch_headless_browser(&self.redeem_url, self.chrome_executable.as_deref())
                .await?;
        let page = PageDriver::new(raw_page);

        let profile = self.read_profile(&page, player_id).await;

        if let Err(e) = browser.close().await {
            warn!("[{}] 關閉瀏覽器失敗: {}", player_id, e);
        }
        profile
    }

    async fn read_profile(&self, page: &PageDriver, player_id: &str) -> Result<PlayerProfile> {
        if page.wait_for(LOGIN_INPUT, Duration::from_secs(10)).await == Poll::TimedOut {
            anyhow::bail!("登入頁未載入");
        }
        if !page.fill(LOGIN_INPUT, player_id).await? {
            anyhow::bail!("找不到登入輸入框");
        }
        page.click(LOGIN_BTN).await?;

        let name_ready = page.wait_for(NAME_LABEL, Duration::from_secs(5)).await;
        let input_ready = page.wait_for(CODE_INPUT, Duration::from_secs(5)).await;
        if name_ready == Poll::TimedOut || input_ready == Poll::TimedOut {
            anyhow::bail!("未成功進入兌換頁");
        }

        let name = page
            .text_of(NAME_LABEL)
            .await?
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| UNKNOWN_NAME.to_string());

        // 王国编号散落在登录态的其它文本里
        let body_text = page.text_of("body").await?.unwrap_or_default();
        let kingdom = extract_kingdom(&body_text)?;

        Ok(PlayerProfile { name, kingdom })
    }
}

/// 从页面文本提取王国编号
fn extract_kingdom(text: &str) -> Result<Option<String>> {
    let re = Regex::new(r"王國[:：]\s*(\d+)")?;
    Ok(re
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string()))
}

#[async_trait]
impl ProfileFetcher for BrowserProfileFetcher {
    async fn fetch(&self, player_id: &str) -> Result<PlayerProfile> {
        let mut last_err = None;
        for attempt in 1..=PROFILE_FETCH_RETRIES {
            match self.fetch_once(player_id).await {
                Ok(profile) => return Ok(profile),
                Err(e) => {
                    warn!("[{}] 第 {} 次抓取資料失敗: {}", player_id, attempt, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("抓取資料失敗")))
    }
}

/// 资料服务：抓取 + 缓存
pub struct ProfileService {
    fetcher: Arc<dyn ProfileFetcher>,
    cache: Arc<dyn ProfileCache>,
}

impl ProfileService {
    pub fn new(fetcher: Arc<dyn ProfileFetcher>, cache: Arc<dyn ProfileCache>) -> Self {
        Self { fetcher, cache }
    }

    /// 确保玩家资料已入缓存；无效资料（名称 / 王国未知）不落盘
    pub async fn ensure_cached(&self, guild_id: &str, player_id: &str) -> Result<()> {
        if self.cache.get(guild_id, player_id).await?.is_some() {
            return Ok(());
        }
        let profile = self.fetcher.fetch(player_id).await?;
        if profile.is_valid() {
            info!(
                "[{}] 快取資料：{}（王國 {}）",
                player_id,
                profile.name,
                profile.kingdom.as_deref().unwrap_or(UNKNOWN_KINGDOM)
            );
            self.cache.put(guild_id, player_id, &profile).await?;
        } else {
            warn!("[{}] 抓到的資料不完整，不寫入快取", player_id);
        }
        Ok(())
    }

    /// 查询用于展示的 (名称, 王国)，缺失时回退为占位值
    pub async fn lookup(&self, guild_id: &str, player_id: &str) -> (String, String) {
        match self.cache.get(guild_id, player_id).await {
            Ok(Some(profile)) => {
                let kingdom = profile
                    .kingdom
                    .unwrap_or_else(|| UNKNOWN_KINGDOM.to_string());
                (profile.name, kingdom)
            }
            Ok(None) => (UNKNOWN_NAME.to_string(), UNKNOWN_KINGDOM.to_string()),
            Err(e) => {
                warn!("[{}] 讀取資料快取失敗: {}", player_id, e);
                (UNKNOWN_NAME.to_string(), UNKNOWN_KINGDOM.to_string())
            }
        }
    }
}
