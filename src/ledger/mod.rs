//! 账本 - 持久化的兑换结果记录
//!
//! 以 (guild, code, player) 为键，success / failed 两个互斥分区：
//! 成功是粘性的，后来的成功会清除同键的失败记录。
//! 无跨键事务保证，单条写入各自原子。

pub mod json_store;
pub mod memory;
pub mod profiles;
pub mod store;

pub use json_store::JsonLedger;
pub use memory::{MemoryLedger, MemoryProfileCache};
pub use profiles::{JsonProfileCache, PlayerProfile, ProfileCache, UNKNOWN_KINGDOM, UNKNOWN_NAME};
pub use store::{FailureEntry, LedgerStore, SuccessEntry};
