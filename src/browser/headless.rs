//! 无头浏览器启动
//!
//! 每个兑换会话对应一个独立的浏览器进程，会话结束必须关闭。

use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::error::RedeemError;

/// 启动无头浏览器并导航到指定 URL
///
/// 返回的 `Browser` 由调用方负责关闭（任何退出路径都要关闭）。
pub async fn launch_headless_browser(
    url: &str,
    chrome_executable: Option<&str>,
) -> Result<(Browser, Page)> {
    debug!("启动无头浏览器，目标 URL: {}", url);

    let mut builder = BrowserConfig::builder().new_headless_mode().args(vec![
        "--disable-gpu",
        "--no-sandbox",
        "--disable-dev-shm-usage",
        "--remote-debugging-port=0",
    ]);
    if let Some(exe) = chrome_executable {
        builder = builder.chrome_executable(Path::new(exe));
    }
    let config = builder.build().map_err(|e| {
        error!("配置无头浏览器失败: {}", e);
        RedeemError::Browser(format!("配置无头浏览器失败: {}", e))
    })?;

    let (browser, mut handler) = Browser::launch(config).await.map_err(|e| {
        error!("启动无头浏览器失败: {}", e);
        RedeemError::Browser(format!("启动无头浏览器失败: {}", e))
    })?;
    debug!("无头浏览器启动成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(Duration::from_millis(300)).await;

    let page = browser.new_page(url).await.map_err(|e| {
        error!("创建页面失败: {}", e);
        RedeemError::Browser(format!("创建页面失败: {}", e))
    })?;

    info!("✅ 无头浏览器已导航到: {}", url);

    Ok((browser, page))
}
