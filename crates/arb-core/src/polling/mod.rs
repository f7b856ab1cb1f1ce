//! The two long-running tasks: advisory fan-out and inbound command polling.
//!
//! Each task exclusively owns its loop state (seen set / poll cursor). They
//! share only the recipient registry.

pub mod advisories;
pub mod updates;

pub use advisories::{AdvisoryPoller, CycleReport};
pub use updates::{backoff_delay, BackoffPolicy, CommandPoller, PollExit};
