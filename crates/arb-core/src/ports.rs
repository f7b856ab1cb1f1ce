use async_trait::async_trait;

use crate::{
    domain::{AdvisoryText, UpdateId},
    messaging::types::InboundUpdate,
    Result,
};

/// Hexagonal port for the advisory page.
///
/// Implementations fetch the page with a bounded timeout and extract each
/// advisory block. A page with zero matching blocks is `Ok(vec![])`, not an error.
#[async_trait]
pub trait AdvisorySource: Send + Sync {
    async fn fetch(&self) -> Result<Vec<AdvisoryText>>;
}

/// Hexagonal port for inbound commands (Telegram `getUpdates` today).
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Long-poll for updates with id >= `offset`. Must be bounded by a timeout.
    async fn fetch_updates(&self, offset: Option<UpdateId>) -> Result<Vec<InboundUpdate>>;
}
