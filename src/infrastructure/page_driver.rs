//! 页面驱动器 - 基础设施层
//!
//! 唯一的 page 持有者，向上只暴露能力：
//! - `eval`：执行 JS 并取回 JSON 结果
//! - `fill` / `click` / `text_of`：以 JS 驱动的基础页面操作
//! - `poll_until`：统一的带超时轮询原语（替代散落各处的回调式等待）

use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use serde_json::Value as JsonValue;
use tokio::time::{sleep, Instant};

/// 轮询结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Poll<T> {
    Found(T),
    TimedOut,
}

impl<T> Poll<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Poll::Found(v) => Some(v),
            Poll::TimedOut => None,
        }
    }
}

/// 以固定间隔执行探测，直到拿到值或超时
///
/// 探测函数返回 `Some(v)` 表示命中；超时后返回 `Poll::TimedOut`。
pub async fn poll_until<T, F, Fut>(timeout: Duration, interval: Duration, mut probe: F) -> Poll<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = probe().await {
            return Poll::Found(value);
        }
        if Instant::now() >= deadline {
            return Poll::TimedOut;
        }
        sleep(interval).await;
    }
}

/// 页面驱动器
pub struct PageDriver {
    page: Page,
}

impl PageDriver {
    pub fn new(page: Page) -> Self {
        Self { page }
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// 执行 JS 代码并返回 JSON 结果
    pub async fn eval(&self, js_code: impl Into<String>) -> Result<JsonValue> {
        let result = self.page.evaluate(js_code.into()).await?;
        let json_value = result.into_value()?;
        Ok(json_value)
    }

    /// 填入输入框（设置 value 并派发 input / change 事件）
    ///
    /// 返回是否找到目标元素。
    pub async fn fill(&self, selector: &str, value: &str) -> Result<bool> {
        let js = format!(
            r#"
            (() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.value = {val};
                el.dispatchEvent(new Event('input', {{ bubbles: true }}));
                el.dispatchEvent(new Event('change', {{ bubbles: true }}));
                return true;
            }})()
            "#,
            sel = serde_json::to_string(selector)?,
            val = serde_json::to_string(value)?,
        );
        Ok(self.eval(js).await?.as_bool().unwrap_or(false))
    }

    /// 点击元素，返回是否找到目标元素
    pub async fn click(&self, selector: &str) -> Result<bool> {
        let js = format!(
            r#"
            (() => {{
                const el = document.querySelector({sel});
                if (!el) return false;
                el.click();
                return true;
            }})()
            "#,
            sel = serde_json::to_string(selector)?,
        );
        Ok(self.eval(js).await?.as_bool().unwrap_or(false))
    }

    /// 读取元素 innerText；元素不存在时返回 None
    pub async fn text_of(&self, selector: &str) -> Result<Option<String>> {
        let js = format!(
            r#"
            (() => {{
                const el = document.querySelector({sel});
                return el ? el.innerText : null;
            }})()
            "#,
            sel = serde_json::to_string(selector)?,
        );
        match self.eval(js).await? {
            JsonValue::String(s) => Ok(Some(s)),
            _ => Ok(None),
        }
    }

    /// 元素是否存在
    pub async fn exists(&self, selector: &str) -> Result<bool> {
        let js = format!(
            "document.querySelector({sel}) !== null",
            sel = serde_json::to_string(selector)?,
        );
        Ok(self.eval(js).await?.as_bool().unwrap_or(false))
    }

    /// 等待元素出现
    pub async fn wait_for(&self, selector: &str, timeout: Duration) -> Poll<()> {
        let driver = &*self;
        poll_until(timeout, Duration::from_millis(300), || async move {
            match driver.exists(selector).await {
                Ok(true) => Some(()),
                _ => None,
            }
        })
        .await
    }

    /// 截取单个元素的 PNG 图像；元素不存在或截图失败返回 None
    pub async fn screenshot_element(&self, selector: &str) -> Option<Vec<u8>> {
        let element = self.page.find_element(selector).await.ok()?;
        element.screenshot(CaptureScreenshotFormat::Png).await.ok()
    }

    /// 整页截图（调试用）
    pub async fn screenshot_page(&self) -> Result<Vec<u8>> {
        let bytes = self
            .page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await?;
        Ok(bytes)
    }

    /// 页面 HTML（调试用）
    pub async fn html(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_finds_value() {
        let calls = AtomicUsize::new(0);
        let result = poll_until(
            Duration::from_secs(3),
            Duration::from_millis(300),
            || async {
                if calls.fetch_add(1, Ordering::SeqCst) >= 2 {
                    Some(42)
                } else {
                    None
                }
            },
        )
        .await;
        assert_eq!(result, Poll::Found(42));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_times_out() {
        let result: Poll<u32> = poll_until(
            Duration::from_secs(1),
            Duration::from_millis(300),
            || async { None },
        )
        .await;
        assert_eq!(result, Poll::TimedOut);
    }

    #[test]
    fn test_poll_found_accessor() {
        assert_eq!(Poll::Found(7).found(), Some(7));
        assert_eq!(Poll::<u32>::TimedOut.found(), None);
    }
}
