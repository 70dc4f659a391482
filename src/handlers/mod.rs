mod chat;
mod health;
mod metrics;

pub use chat::{API_KEY_HEADER, chat_completions_handler};
pub use health::{HEALTHY_MESSAGE, health_handler};
pub use metrics::metrics_handler;
