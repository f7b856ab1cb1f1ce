//! Outbound notification channel and inbound update model.

pub mod port;
pub mod throttled;
pub mod types;
