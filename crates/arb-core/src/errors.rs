use std::path::PathBuf;

/// Core error type for the relay bot.
///
/// Adapter crates map their specific errors into this type so the loops can
/// apply differentiated policy (back off vs. log-and-skip vs. abort startup).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid registry file: {path}: {reason}")]
    InvalidRegistry { path: PathBuf, reason: String },

    /// Timeouts, refused connections, non-success HTTP status, flood control.
    #[error("network error: {0}")]
    Network(String),

    /// The fetched payload did not have the expected structure.
    #[error("parse error: {0}")]
    Parse(String),

    /// The remote API understood the request and refused it.
    #[error("request rejected: {0}")]
    Rejected(String),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Whether waiting and trying again can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Network(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_network_errors_are_transient() {
        assert!(Error::Network("timed out".into()).is_transient());
        assert!(!Error::Parse("no body".into()).is_transient());
        assert!(!Error::Rejected("chat not found".into()).is_transient());
        assert!(!Error::Config("BOT_TOKEN".into()).is_transient());
    }
}
