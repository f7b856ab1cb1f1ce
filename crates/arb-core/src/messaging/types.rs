use crate::domain::{RecipientId, UpdateId};

/// Cross-messenger incoming update model.
///
/// Every update advances the poll cursor; only those carrying a command are
/// dispatched to the command processor.
#[derive(Clone, Debug)]
pub struct InboundUpdate {
    pub id: UpdateId,
    pub command: Option<InboundCommand>,
}

/// A text message from a chat, interpreted as a bot command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InboundCommand {
    pub sender: RecipientId,
    /// Sender's first name, when the messenger provides one.
    pub display_name: Option<String>,
    pub text: String,
}

impl InboundUpdate {
    pub fn command(id: i64, sender: i64, display_name: Option<&str>, text: &str) -> Self {
        Self {
            id: UpdateId(id),
            command: Some(InboundCommand {
                sender: RecipientId(sender),
                display_name: display_name.map(str::to_string),
                text: text.to_string(),
            }),
        }
    }

    pub fn other(id: i64) -> Self {
        Self {
            id: UpdateId(id),
            command: None,
        }
    }
}
