use std::{sync::Arc, time::Duration};

use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::{commands::CommandProcessor, domain::UpdateId, ports::UpdateSource, Result};

#[derive(Clone, Copy, Debug)]
pub struct BackoffPolicy {
    /// Consecutive failed cycles after which the loop gives up.
    pub max_consecutive_failures: u32,
    pub base: Duration,
    pub max: Duration,
    /// Pause after an empty batch.
    pub idle_delay: Duration,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            max_consecutive_failures: 5,
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
            idle_delay: Duration::from_secs(1),
        }
    }
}

/// `min(max, base * 2^failures)`.
pub fn backoff_delay(failures: u32, base: Duration, max: Duration) -> Duration {
    let factor = 2u32.checked_pow(failures).unwrap_or(u32::MAX);
    base.checked_mul(factor).unwrap_or(max).min(max)
}

/// Why the command loop returned.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollExit {
    Cancelled,
    TooManyFailures(u32),
}

/// Long-polls inbound updates and dispatches commands in arrival order.
pub struct CommandPoller {
    source: Arc<dyn UpdateSource>,
    processor: Arc<CommandProcessor>,
    cursor: Option<UpdateId>,
    policy: BackoffPolicy,
}

impl CommandPoller {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        processor: Arc<CommandProcessor>,
        policy: BackoffPolicy,
    ) -> Self {
        Self {
            source,
            processor,
            cursor: None,
            policy,
        }
    }

    /// Offset for the next poll: one past the last consumed update.
    pub fn cursor(&self) -> Option<UpdateId> {
        self.cursor
    }

    /// Fetch one batch and dispatch it, returning how many updates were consumed.
    pub async fn poll_once(&mut self) -> Result<usize> {
        let updates = self.source.fetch_updates(self.cursor).await?;

        for update in &updates {
            let next = UpdateId(update.id.0 + 1);
            if self.cursor.map_or(true, |c| next > c) {
                self.cursor = Some(next);
            }

            let Some(cmd) = update.command.clone() else {
                continue;
            };
            let sender = cmd.sender;

            // Run each command in its own task so a panic is contained to it.
            let processor = self.processor.clone();
            let handle = tokio::spawn(async move { processor.handle(&cmd).await });
            if let Err(e) = handle.await {
                tracing::error!(update_id = update.id.0, sender = %sender, error = %e, "command handler failed");
            }
        }

        Ok(updates.len())
    }

    /// Poll until cancelled or until too many consecutive cycles fail.
    pub async fn run(mut self, cancel: CancellationToken) -> PollExit {
        tracing::info!("command poller started");
        let mut failures = 0u32;

        loop {
            let res = tokio::select! {
                _ = cancel.cancelled() => return PollExit::Cancelled,
                res = self.poll_once() => res,
            };

            let pause = match res {
                Ok(consumed) => {
                    failures = 0;
                    if consumed > 0 {
                        continue;
                    }
                    self.policy.idle_delay
                }
                Err(e) => {
                    failures += 1;
                    tracing::error!(error = %e, failures, "command poll cycle failed");
                    if failures >= self.policy.max_consecutive_failures {
                        tracing::error!(failures, "too many consecutive failures; stopping");
                        return PollExit::TooManyFailures(failures);
                    }
                    let delay = backoff_delay(failures, self.policy.base, self.policy.max);
                    tracing::info!(delay_secs = delay.as_secs_f64(), "backing off");
                    delay
                }
            };

            tokio::select! {
                _ = cancel.cancelled() => return PollExit::Cancelled,
                _ = sleep(pause) => {}
            }
        }
    }
}
