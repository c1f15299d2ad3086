//! 业务能力层
//!
//! 只处理"一个玩家"粒度的能力，不出现玩家列表，不关心批次流程：
//! - `session_driver`：驱动一个浏览器会话完成一次兑换尝试
//! - `profile_service`：抓取并缓存玩家名称 / 王国

pub mod profile_service;
pub mod session_driver;

pub use profile_service::{BrowserProfileFetcher, ProfileFetcher, ProfileService};
pub use session_driver::{BrowserSessionDriver, RedeemDriver};
