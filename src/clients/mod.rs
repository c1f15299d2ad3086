pub mod captcha_client;
pub mod webhook_client;

pub use captcha_client::{CaptchaSolver, SolveOutcome, TwoCaptchaClient};
pub use webhook_client::{LogNotifier, Notifier, WebhookClient, MAX_CHUNK_LEN};
