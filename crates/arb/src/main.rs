use std::sync::Arc;

use anyhow::Context;
use tokio_util::sync::CancellationToken;

use arb_core::{
    commands::CommandProcessor,
    config::Config,
    messaging::{
        port::NotificationChannel,
        throttled::{ThrottleConfig, ThrottledChannel},
    },
    polling::{AdvisoryPoller, BackoffPolicy, CommandPoller, PollExit},
    registry::RecipientRegistry,
    seen::SeenAdvisorySet,
};
use arb_source::HttpAdvisorySource;
use arb_telegram::TelegramChannel;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    arb_core::logging::init("arb")?;

    let cfg = Config::load().context("invalid configuration")?;
    tracing::info!(
        owner = %cfg.owner,
        url = %cfg.advisory_url,
        interval_secs = cfg.poll_interval.as_secs(),
        "starting advisory relay bot"
    );

    let telegram = Arc::new(
        TelegramChannel::new(&cfg.bot_token, cfg.request_timeout, cfg.long_poll_timeout)
            .context("telegram client")?,
    );
    telegram.log_identity().await;

    // Fan-out goes through the throttle; polling talks to Telegram directly.
    let channel: Arc<dyn NotificationChannel> = Arc::new(ThrottledChannel::new(
        telegram.clone(),
        ThrottleConfig::default(),
    ));
    let registry = Arc::new(RecipientRegistry::load(&cfg.approved_file));
    let source = Arc::new(
        HttpAdvisorySource::new(&cfg.advisory_url, &cfg.user_agent, cfg.request_timeout)
            .context("advisory client")?,
    );

    let cancel = CancellationToken::new();

    let advisories = Arc::new(AdvisoryPoller::new(
        source,
        channel.clone(),
        registry.clone(),
        SeenAdvisorySet::new(cfg.seen_capacity, cfg.seen_retain),
        cfg.poll_interval,
    ));
    let advisory_task = tokio::spawn(advisories.run(cancel.child_token()));

    let processor = Arc::new(CommandProcessor::new(
        registry.clone(),
        channel.clone(),
        cfg.owner,
    ));
    let commands = CommandPoller::new(
        telegram,
        processor,
        BackoffPolicy {
            max_consecutive_failures: cfg.max_consecutive_failures,
            max: cfg.backoff_max,
            idle_delay: cfg.idle_delay,
            ..BackoffPolicy::default()
        },
    );

    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("interrupt received, shutting down");
                cancel.cancel();
            }
        });
    }

    match commands.run(cancel.clone()).await {
        PollExit::Cancelled => tracing::info!("command poller stopped"),
        PollExit::TooManyFailures(n) => {
            tracing::error!(failures = n, "command poller gave up; shutting down")
        }
    }

    cancel.cancel();
    if let Err(e) = advisory_task.await {
        tracing::error!(error = %e, "advisory task ended abnormally");
    }

    if registry.approved_count().await > 0 {
        if let Err(e) = registry.persist().await {
            tracing::error!(error = %e, "failed to flush approved recipients");
        }
    }

    tracing::info!("bye");
    Ok(())
}
