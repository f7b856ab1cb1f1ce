//! Telegram adapter (teloxide).
//!
//! Implements the `arb-core` NotificationChannel and UpdateSource ports over
//! the Telegram Bot API: `sendMessage` for delivery and `getUpdates` long
//! polling for inbound commands.

use std::time::Duration;

use async_trait::async_trait;

use teloxide::{
    prelude::*,
    types::{AllowedUpdate, UpdateKind},
    RequestError,
};

use arb_core::{
    domain::{RecipientId, UpdateId},
    errors::Error,
    messaging::{port::NotificationChannel, types::InboundUpdate},
    ports::UpdateSource,
    Result,
};

/// Telegram rejects messages above 4096 characters; keep some headroom.
pub const SAFE_MESSAGE_LIMIT: usize = 4000;

#[derive(Clone)]
pub struct TelegramChannel {
    bot: Bot,
    long_poll_timeout: Duration,
}

impl TelegramChannel {
    /// Every request, including long polls, is bounded by `request_timeout`.
    pub fn new(token: &str, request_timeout: Duration, long_poll_timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build telegram client: {e}")))?;
        Ok(Self {
            bot: Bot::with_client(token, client),
            long_poll_timeout,
        })
    }

    /// Log the bot's username; failure here is not fatal.
    pub async fn log_identity(&self) {
        match self.bot.get_me().await {
            Ok(me) => tracing::info!(username = %me.username(), "telegram bot connected"),
            Err(e) => tracing::warn!(error = %map_err(e), "could not fetch bot identity"),
        }
    }

    fn tg_chat(to: RecipientId) -> teloxide::types::ChatId {
        teloxide::types::ChatId(to.0)
    }
}

fn map_err(e: RequestError) -> Error {
    match &e {
        RequestError::Api(api) => Error::Rejected(format!("telegram api error: {api}")),
        RequestError::MigrateToChatId(_) => Error::Rejected(format!("telegram error: {e}")),
        RequestError::RetryAfter(_) | RequestError::Network(_) | RequestError::Io(_) => {
            Error::Network(format!("telegram error: {e}"))
        }
        RequestError::InvalidJson { .. } => Error::Parse(format!("telegram error: {e}")),
        #[allow(unreachable_patterns)]
        _ => Error::External(format!("telegram error: {e}")),
    }
}

fn to_inbound(update: Update) -> InboundUpdate {
    let id = UpdateId(i64::from(update.id));
    let UpdateKind::Message(msg) = update.kind else {
        return InboundUpdate {
            id,
            command: None,
        };
    };
    let Some(text) = msg.text() else {
        return InboundUpdate {
            id,
            command: None,
        };
    };

    let display_name = msg.from().map(|u| u.first_name.clone());
    InboundUpdate::command(id.0, msg.chat.id.0, display_name.as_deref(), text)
}

/// Split `text` into chunks of at most `limit` characters, preferring line breaks.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if text.chars().count() <= limit {
        return vec![text.to_string()];
    }

    let mut out = Vec::new();
    let mut chunk = String::new();
    let mut len = 0usize;

    for line in text.split_inclusive('\n') {
        let line_len = line.chars().count();
        if len + line_len > limit && !chunk.is_empty() {
            out.push(std::mem::take(&mut chunk));
            len = 0;
        }
        if line_len <= limit {
            chunk.push_str(line);
            len += line_len;
            continue;
        }
        for ch in line.chars() {
            if len == limit {
                out.push(std::mem::take(&mut chunk));
                len = 0;
            }
            chunk.push(ch);
            len += 1;
        }
    }

    if !chunk.is_empty() {
        out.push(chunk);
    }
    out
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    async fn send_text(&self, to: RecipientId, text: &str) -> Result<()> {
        for chunk in split_message(text, SAFE_MESSAGE_LIMIT) {
            self.bot
                .send_message(Self::tg_chat(to), chunk)
                .await
                .map_err(map_err)?;
        }
        Ok(())
    }
}

#[async_trait]
impl UpdateSource for TelegramChannel {
    async fn fetch_updates(&self, offset: Option<UpdateId>) -> Result<Vec<InboundUpdate>> {
        let timeout = u32::try_from(self.long_poll_timeout.as_secs()).unwrap_or(u32::MAX);
        let mut req = self
            .bot
            .get_updates()
            .timeout(timeout)
            .allowed_updates(vec![AllowedUpdate::Message]);
        if let Some(offset) = offset {
            let offset = i32::try_from(offset.0)
                .map_err(|_| Error::Parse(format!("update offset out of range: {}", offset.0)))?;
            req = req.offset(offset);
        }

        let updates = req.await.map_err(map_err)?;
        if !updates.is_empty() {
            tracing::debug!(count = updates.len(), "received telegram updates");
        }
        Ok(updates.into_iter().map(to_inbound).collect())
    }
}
