pub mod telegram;

use async_trait::async_trait;

/// Best-effort outbound message delivery to an external chat identity.
/// Callers on the booking path must treat failures as log-and-continue.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_message(&self, chat_id: &str, text: &str) -> anyhow::Result<()>;
}
