//! Core domain + application logic for the rail advisory relay bot.
//!
//! This crate is intentionally framework-agnostic. The advisory page and the
//! Telegram Bot API live behind ports (traits) implemented in adapter crates.

pub mod commands;
pub mod config;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod messaging;
pub mod polling;
pub mod ports;
pub mod registry;
pub mod seen;

pub use errors::{Error, Result};
