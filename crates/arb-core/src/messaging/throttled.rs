use std::{collections::HashMap, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{domain::RecipientId, messaging::port::NotificationChannel, Result};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between *any* outbound sends (global flood control).
    pub global_min_interval: Duration,
    /// Minimum spacing between sends to the same recipient.
    pub per_recipient_min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        // Telegram allows ~30 msg/sec overall and ~1 msg/sec per chat.
        Self {
            global_min_interval: Duration::from_millis(40),
            per_recipient_min_interval: Duration::from_millis(1050),
        }
    }
}

/// Claim the earliest send slot at or after `now`, pushing `next` one interval on.
/// Returns how long to wait for the claimed slot.
fn claim_slot(next: &mut Instant, now: Instant, interval: Duration) -> Duration {
    let start = (*next).max(now);
    *next = start + interval;
    start.saturating_duration_since(now)
}

/// NotificationChannel decorator that spaces out outbound sends.
///
/// Fan-out of one advisory to every approved recipient is the burst this
/// guards against. It waits; it never drops or retries a send.
///
/// A recipient is tracked only while its next slot lies in the future, so
/// one-off replies to arbitrary chats leave nothing behind.
pub struct ThrottledChannel {
    inner: Arc<dyn NotificationChannel>,
    cfg: ThrottleConfig,
    global: Mutex<Instant>,
    per_recipient: Mutex<HashMap<RecipientId, Instant>>,
}

impl ThrottledChannel {
    pub fn new(inner: Arc<dyn NotificationChannel>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            cfg,
            global: Mutex::new(Instant::now()),
            per_recipient: Mutex::new(HashMap::new()),
        }
    }

    async fn throttle(&self, to: RecipientId) {
        let now = Instant::now();
        let global_wait = {
            let mut next = self.global.lock().await;
            claim_slot(&mut next, now, self.cfg.global_min_interval)
        };
        let recipient_wait = {
            let mut slots = self.per_recipient.lock().await;
            slots.retain(|_, next| *next > now);
            let next = slots.entry(to).or_insert(now);
            claim_slot(next, now, self.cfg.per_recipient_min_interval)
        };

        let wait = global_wait.max(recipient_wait);
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl NotificationChannel for ThrottledChannel {
    async fn send_text(&self, to: RecipientId, text: &str) -> Result<()> {
        self.throttle(to).await;
        self.inner.send_text(to, text).await
    }
}
