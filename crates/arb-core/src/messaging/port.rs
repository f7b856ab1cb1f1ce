use async_trait::async_trait;

use crate::{domain::RecipientId, Result};

/// Outbound messaging port.
///
/// Implementations perform a single bounded-timeout request per call and never
/// retry; retry policy belongs to the caller.
#[async_trait]
pub trait NotificationChannel: Send + Sync {
    async fn send_text(&self, to: RecipientId, text: &str) -> Result<()>;

    /// Send and report acceptance, logging any failure instead of returning it.
    async fn notify(&self, to: RecipientId, text: &str) -> bool {
        match self.send_text(to, text).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(recipient = %to, error = %e, "failed to send message");
                false
            }
        }
    }
}
