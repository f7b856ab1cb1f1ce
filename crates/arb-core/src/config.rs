use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use crate::{domain::RecipientId, errors::Error, Result};

pub const DEFAULT_ADVISORY_URL: &str = "https://www.banenor.no/reise-og-trafikk/trafikkmeldinger/";
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// Typed configuration for the relay bot.
#[derive(Clone, Debug)]
pub struct Config {
    // Required identities
    pub bot_token: String,
    pub owner: RecipientId,

    // Advisory source
    pub advisory_url: String,
    pub user_agent: String,
    pub poll_interval: Duration,

    // Network
    pub request_timeout: Duration,
    pub long_poll_timeout: Duration,

    // Persistence
    pub approved_file: PathBuf,

    // Deduplication
    pub seen_capacity: usize,
    pub seen_retain: usize,

    // Command task failure policy
    pub max_consecutive_failures: u32,
    pub backoff_max: Duration,
    pub idle_delay: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bot_token = lookup("BOT_TOKEN")
            .and_then(non_empty)
            .ok_or_else(|| Error::Config("BOT_TOKEN environment variable is not set".to_string()))?;

        let owner = lookup("OWNER_CHAT_ID")
            .and_then(|s| s.trim().parse::<i64>().ok())
            .map(RecipientId)
            .ok_or_else(|| {
                Error::Config("OWNER_CHAT_ID environment variable is not set or invalid".to_string())
            })?;

        let advisory_url = lookup("ADVISORY_URL")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_ADVISORY_URL.to_string());
        let user_agent = lookup("USER_AGENT")
            .and_then(non_empty)
            .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string());
        let poll_interval = Duration::from_secs(
            parse_u64(lookup("POLL_INTERVAL_SECS"))
                .filter(|v| *v > 0)
                .unwrap_or(50),
        );

        let request_timeout = Duration::from_secs(
            parse_u64(lookup("REQUEST_TIMEOUT_SECS"))
                .filter(|v| *v > 0)
                .unwrap_or(31),
        );
        // The long poll must return before the HTTP client gives up on it.
        let long_poll_timeout = Duration::from_secs(
            parse_u64(lookup("LONG_POLL_TIMEOUT_SECS"))
                .unwrap_or(30)
                .min(request_timeout.as_secs().saturating_sub(1)),
        );

        let approved_file = lookup("APPROVED_RECIPIENTS_FILE")
            .and_then(non_empty)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("approved_recipients.json"));

        let seen_capacity = parse_usize(lookup("SEEN_CAPACITY"))
            .filter(|v| *v > 0)
            .unwrap_or(100);
        let seen_retain = parse_usize(lookup("SEEN_RETAIN"))
            .unwrap_or(50)
            .min(seen_capacity);

        let max_consecutive_failures = parse_u64(lookup("MAX_CONSECUTIVE_FAILURES"))
            .filter(|v| *v > 0)
            .map(|v| v.min(u32::MAX as u64) as u32)
            .unwrap_or(5);
        let backoff_max = Duration::from_secs(parse_u64(lookup("BACKOFF_MAX_SECS")).unwrap_or(60));

        Ok(Self {
            bot_token,
            owner,
            advisory_url,
            user_agent,
            poll_interval,
            request_timeout,
            long_poll_timeout,
            approved_file,
            seen_capacity,
            seen_retain,
            max_consecutive_failures,
            backoff_max,
            idle_delay: Duration::from_secs(1),
        })
    }
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }
        if env::var_os(key).is_some() {
            continue; // do not override existing env
        }

        env::set_var(key, strip_quotes(v.trim()));
    }
}

fn strip_quotes(val: &str) -> &str {
    if val.len() >= 2
        && ((val.starts_with('"') && val.ends_with('"'))
            || (val.starts_with('\'') && val.ends_with('\'')))
    {
        return &val[1..val.len() - 1];
    }
    val
}

fn parse_u64(v: Option<String>) -> Option<u64> {
    v.and_then(|s| s.trim().parse::<u64>().ok())
}

fn parse_usize(v: Option<String>) -> Option<usize> {
    v.and_then(|s| s.trim().parse::<usize>().ok())
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s.trim().to_string())
    }
}
