use std::fmt;

/// Telegram chat id of a message recipient (numeric, may be negative for groups).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecipientId(pub i64);

impl fmt::Display for RecipientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of an inbound update; the poll cursor is derived from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UpdateId(pub i64);

/// A recipient promoted from pending to approved.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApprovedRecipient {
    pub id: RecipientId,
    pub name: String,
}

/// Opaque advisory text as scraped from the page (`title\n\nbody`).
pub type AdvisoryText = String;
