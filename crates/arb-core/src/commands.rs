//! Registration / approval state machine driven by inbound text commands.
//!
//! Misuse (bad syntax, unauthorized sender) is answered with a reply and never
//! surfaces as an error. Every refused branch leaves the registry untouched.

use std::sync::Arc;

use crate::{
    domain::{ApprovedRecipient, RecipientId},
    messaging::{port::NotificationChannel, types::InboundCommand},
    registry::RecipientRegistry,
};

pub mod replies {
    pub const ALREADY_APPROVED: &str = "You are already approved and receive advisories.";
    pub const ALREADY_REQUESTED: &str =
        "You have already sent a registration request. Please wait for approval.";
    pub const REQUEST_RECEIVED: &str =
        "Your registration request has been received. Please wait for approval.";
    pub const ACCESS_DENIED: &str = "You do not have access to this command.";
    pub const NOW_APPROVED: &str = "You are now approved and will receive advisories.";
    pub const NOW_DENIED: &str = "Your registration request has been denied.";
    pub const UNKNOWN: &str = "Unknown command. Use /register to request access.";
    pub const APPROVE_USAGE: &str = "Usage: /approve <chat_id>";
    pub const DENY_USAGE: &str = "Usage: /deny <chat_id>";
}

const UNKNOWN_NAME: &str = "Unknown";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Register,
    Approve(String),
    Deny(String),
    Unknown,
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let (name, args) = split_command(text);
        match name.as_str() {
            "register" => Command::Register,
            "approve" | "godkjenn" => Command::Approve(args),
            "deny" | "avslå" => Command::Deny(args),
            _ => Command::Unknown,
        }
    }
}

/// What a command invocation did, for logging and tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    AlreadyApproved,
    AlreadyRequested,
    Requested,
    Approved(ApprovedRecipient),
    Denied { id: RecipientId, name: String },
    NotPending(RecipientId),
    AccessDenied,
    Usage,
    Unknown,
}

pub struct CommandProcessor {
    registry: Arc<RecipientRegistry>,
    channel: Arc<dyn NotificationChannel>,
    owner: RecipientId,
}

impl CommandProcessor {
    pub fn new(
        registry: Arc<RecipientRegistry>,
        channel: Arc<dyn NotificationChannel>,
        owner: RecipientId,
    ) -> Self {
        Self {
            registry,
            channel,
            owner,
        }
    }

    pub async fn handle(&self, cmd: &InboundCommand) -> CommandOutcome {
        let outcome = match Command::parse(&cmd.text) {
            Command::Register => self.register(cmd).await,
            Command::Approve(args) => self.approve(cmd.sender, &args).await,
            Command::Deny(args) => self.deny(cmd.sender, &args).await,
            Command::Unknown => {
                self.reply(cmd.sender, replies::UNKNOWN).await;
                CommandOutcome::Unknown
            }
        };
        tracing::info!(sender = %cmd.sender, outcome = ?outcome, "handled command");
        outcome
    }

    async fn register(&self, cmd: &InboundCommand) -> CommandOutcome {
        let sender = cmd.sender;
        if self.registry.is_approved(sender).await {
            self.reply(sender, replies::ALREADY_APPROVED).await;
            return CommandOutcome::AlreadyApproved;
        }
        if self.registry.is_pending(sender).await {
            self.reply(sender, replies::ALREADY_REQUESTED).await;
            return CommandOutcome::AlreadyRequested;
        }

        let name = cmd
            .display_name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN_NAME);
        self.registry.add_pending(sender, name).await;

        self.reply(sender, replies::REQUEST_RECEIVED).await;
        let owner_msg = format!(
            "Registration request from {name} (chat_id: {sender}).\n\
Send /approve {sender} to approve, or /deny {sender} to deny."
        );
        self.reply(self.owner, &owner_msg).await;
        CommandOutcome::Requested
    }

    async fn approve(&self, sender: RecipientId, args: &str) -> CommandOutcome {
        let id = match self.authorize(sender, args, replies::APPROVE_USAGE).await {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };

        let Some(rec) = self.registry.approve(id).await else {
            self.reply(sender, &not_pending(id)).await;
            return CommandOutcome::NotPending(id);
        };

        self.reply(self.owner, &format!("User with chat_id {id} is approved."))
            .await;
        self.reply(id, replies::NOW_APPROVED).await;
        CommandOutcome::Approved(rec)
    }

    async fn deny(&self, sender: RecipientId, args: &str) -> CommandOutcome {
        let id = match self.authorize(sender, args, replies::DENY_USAGE).await {
            Ok(id) => id,
            Err(outcome) => return outcome,
        };

        let Some(name) = self.registry.deny(id).await else {
            self.reply(sender, &not_pending(id)).await;
            return CommandOutcome::NotPending(id);
        };

        self.reply(self.owner, &format!("User with chat_id {id} is denied."))
            .await;
        self.reply(id, replies::NOW_DENIED).await;
        CommandOutcome::Denied { id, name }
    }

    /// Owner check first, then argument syntax.
    async fn authorize(
        &self,
        sender: RecipientId,
        args: &str,
        usage: &str,
    ) -> Result<RecipientId, CommandOutcome> {
        if sender != self.owner {
            self.reply(sender, replies::ACCESS_DENIED).await;
            return Err(CommandOutcome::AccessDenied);
        }
        match parse_target(args) {
            Some(id) => Ok(id),
            None => {
                self.reply(sender, usage).await;
                Err(CommandOutcome::Usage)
            }
        }
    }

    async fn reply(&self, to: RecipientId, text: &str) {
        // Failures are logged by the channel; the command outcome stands.
        let _ = self.channel.notify(to, text).await;
    }
}

fn not_pending(id: RecipientId) -> String {
    format!("No pending user with chat_id {id}.")
}

fn split_command(text: &str) -> (String, String) {
    // Telegram may send `/cmd@botname arg1 ...`
    let trimmed = text.trim();
    if !trimmed.starts_with('/') {
        return (String::new(), String::new());
    }

    let mut parts = trimmed.splitn(2, char::is_whitespace);
    let first = parts.next().unwrap_or("").trim();
    let rest = parts.next().unwrap_or("").trim().to_string();

    let cmd = first
        .trim_start_matches('/')
        .split('@')
        .next()
        .unwrap_or("")
        .to_lowercase();

    (cmd, rest)
}

/// Exactly one argument: an optionally negative decimal chat id.
fn parse_target(args: &str) -> Option<RecipientId> {
    let mut words = args.split_whitespace();
    let word = words.next()?;
    if words.next().is_some() {
        return None;
    }
    let digits = word.strip_prefix('-').unwrap_or(word);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    word.parse::<i64>().ok().map(RecipientId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{errors::Error, Result};
    use async_trait::async_trait;
    use std::{
        path::PathBuf,
        sync::Mutex,
        time::{Duration, SystemTime, UNIX_EPOCH},
    };

    const OWNER: RecipientId = RecipientId(1000);

    #[derive(Default)]
    struct FakeChannel {
        sends: Mutex<Vec<(RecipientId, String)>>,
        fail_for: Mutex<Vec<RecipientId>>,
    }

    impl FakeChannel {
        fn sent(&self) -> Vec<(RecipientId, String)> {
            self.sends.lock().unwrap().clone()
        }

        fn sent_to(&self, to: RecipientId) -> Vec<String> {
            self.sent()
                .into_iter()
                .filter(|(r, _)| *r == to)
                .map(|(_, t)| t)
                .collect()
        }
    }

    #[async_trait]
    impl NotificationChannel for FakeChannel {
        async fn send_text(&self, to: RecipientId, text: &str) -> Result<()> {
            if self.fail_for.lock().unwrap().contains(&to) {
                return Err(Error::Rejected("chat not found".to_string()));
            }
            self.sends.lock().unwrap().push((to, text.to_string()));
            Ok(())
        }
    }

    fn tmp(prefix: &str) -> PathBuf {
        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::from_secs(0))
            .as_nanos();
        PathBuf::from(format!("/tmp/{prefix}-{}-{ts}.json", std::process::id()))
    }

    fn setup(prefix: &str) -> (Arc<RecipientRegistry>, Arc<FakeChannel>, CommandProcessor, PathBuf) {
        let path = tmp(prefix);
        let registry = Arc::new(RecipientRegistry::load(&path));
        let channel = Arc::new(FakeChannel::default());
        let processor = CommandProcessor::new(registry.clone(), channel.clone(), OWNER);
        (registry, channel, processor, path)
    }

    fn cmd(sender: i64, name: Option<&str>, text: &str) -> InboundCommand {
        InboundCommand {
            sender: RecipientId(sender),
            display_name: name.map(str::to_string),
            text: text.to_string(),
        }
    }

    #[test]
    fn parses_commands_and_bot_suffix() {
        assert_eq!(Command::parse("/register"), Command::Register);
        assert_eq!(Command::parse("  /Register@RailBot "), Command::Register);
        assert_eq!(
            Command::parse("/approve 42"),
            Command::Approve("42".to_string())
        );
        assert_eq!(
            Command::parse("/godkjenn 42"),
            Command::Approve("42".to_string())
        );
        assert_eq!(Command::parse("/avslå 7"), Command::Deny("7".to_string()));
        assert_eq!(Command::parse("register"), Command::Unknown);
        assert_eq!(Command::parse("/start"), Command::Unknown);
        assert_eq!(Command::parse(""), Command::Unknown);
    }

    #[test]
    fn target_must_be_single_integer() {
        assert_eq!(parse_target("42"), Some(RecipientId(42)));
        assert_eq!(parse_target(" -100123 "), Some(RecipientId(-100123)));
        assert_eq!(parse_target(""), None);
        assert_eq!(parse_target("4 2"), None);
        assert_eq!(parse_target("+42"), None);
        assert_eq!(parse_target("-"), None);
        assert_eq!(parse_target("abc"), None);
        assert_eq!(parse_target("99999999999999999999"), None);
    }

    #[tokio::test]
    async fn register_twice_yields_one_pending_and_two_replies() {
        let (registry, channel, processor, _) = setup("arb-cmd-register");

        let first = processor.handle(&cmd(42, Some("Kari"), "/register")).await;
        let second = processor.handle(&cmd(42, Some("Kari"), "/register")).await;

        assert_eq!(first, CommandOutcome::Requested);
        assert_eq!(second, CommandOutcome::AlreadyRequested);
        assert!(registry.is_pending(RecipientId(42)).await);
        assert_eq!(
            channel.sent_to(RecipientId(42)),
            vec![
                replies::REQUEST_RECEIVED.to_string(),
                replies::ALREADY_REQUESTED.to_string()
            ]
        );

        let owner_msgs = channel.sent_to(OWNER);
        assert_eq!(owner_msgs.len(), 1);
        assert!(owner_msgs[0].contains("Kari"));
        assert!(owner_msgs[0].contains("/approve 42"));
        assert!(owner_msgs[0].contains("/deny 42"));
    }

    #[tokio::test]
    async fn register_without_name_uses_placeholder() {
        let (registry, _, processor, _) = setup("arb-cmd-noname");
        processor.handle(&cmd(5, None, "/register")).await;
        assert_eq!(
            registry.pending_name(RecipientId(5)).await.as_deref(),
            Some("Unknown")
        );
    }

    #[tokio::test]
    async fn register_when_already_approved() {
        let (registry, channel, processor, path) = setup("arb-cmd-approved");
        registry.add_pending(RecipientId(42), "Kari").await;
        registry.approve(RecipientId(42)).await.unwrap();

        let out = processor.handle(&cmd(42, Some("Kari"), "/register")).await;
        assert_eq!(out, CommandOutcome::AlreadyApproved);
        assert_eq!(
            channel.sent_to(RecipientId(42)),
            vec![replies::ALREADY_APPROVED.to_string()]
        );
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn non_owner_cannot_approve_or_deny() {
        let (registry, channel, processor, _) = setup("arb-cmd-denied");
        registry.add_pending(RecipientId(42), "Kari").await;

        let a = processor.handle(&cmd(7, None, "/approve 42")).await;
        let d = processor.handle(&cmd(7, None, "/deny 42")).await;

        assert_eq!(a, CommandOutcome::AccessDenied);
        assert_eq!(d, CommandOutcome::AccessDenied);
        assert!(registry.is_pending(RecipientId(42)).await);
        assert!(!registry.is_approved(RecipientId(42)).await);
        assert_eq!(
            channel.sent(),
            vec![
                (RecipientId(7), replies::ACCESS_DENIED.to_string()),
                (RecipientId(7), replies::ACCESS_DENIED.to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn unknown_sender_approve_leaves_registry_unchanged() {
        let (registry, channel, processor, path) = setup("arb-cmd-stranger");
        let out = processor.handle(&cmd(555, None, "/approve 42")).await;
        assert_eq!(out, CommandOutcome::AccessDenied);
        assert_eq!(registry.approved_count().await, 0);
        assert!(!path.exists());
        assert_eq!(
            channel.sent_to(RecipientId(555)),
            vec![replies::ACCESS_DENIED.to_string()]
        );
    }

    #[tokio::test]
    async fn owner_approves_pending_recipient() {
        let (registry, channel, processor, path) = setup("arb-cmd-approve");
        registry.add_pending(RecipientId(42), "Kari").await;

        let out = processor.handle(&cmd(OWNER.0, None, "/approve 42")).await;
        assert_eq!(
            out,
            CommandOutcome::Approved(ApprovedRecipient {
                id: RecipientId(42),
                name: "Kari".to_string()
            })
        );
        assert!(registry.is_approved(RecipientId(42)).await);
        assert!(!registry.is_pending(RecipientId(42)).await);

        let on_disk = std::fs::read_to_string(&path).unwrap();
        assert!(on_disk.contains("\"42\""));
        assert!(on_disk.contains("Kari"));

        assert_eq!(
            channel.sent_to(RecipientId(42)),
            vec![replies::NOW_APPROVED.to_string()]
        );
        assert_eq!(
            channel.sent_to(OWNER),
            vec!["User with chat_id 42 is approved.".to_string()]
        );
        let _ = std::fs::remove_file(path);
    }

    #[tokio::test]
    async fn owner_approve_of_non_pending_is_not_found() {
        let (registry, channel, processor, path) = setup("arb-cmd-missing");
        let out = processor.handle(&cmd(OWNER.0, None, "/approve 42")).await;
        assert_eq!(out, CommandOutcome::NotPending(RecipientId(42)));
        assert_eq!(registry.approved_count().await, 0);
        assert!(!path.exists());
        assert_eq!(
            channel.sent_to(OWNER),
            vec!["No pending user with chat_id 42.".to_string()]
        );
    }

    #[tokio::test]
    async fn owner_malformed_args_get_usage() {
        let (_, channel, processor, _) = setup("arb-cmd-usage");
        assert_eq!(
            processor.handle(&cmd(OWNER.0, None, "/approve")).await,
            CommandOutcome::Usage
        );
        assert_eq!(
            processor.handle(&cmd(OWNER.0, None, "/deny abc")).await,
            CommandOutcome::Usage
        );
        assert_eq!(
            channel.sent_to(OWNER),
            vec![
                replies::APPROVE_USAGE.to_string(),
                replies::DENY_USAGE.to_string()
            ]
        );
    }

    #[tokio::test]
    async fn owner_denies_pending_recipient() {
        let (registry, channel, processor, path) = setup("arb-cmd-deny");
        registry.add_pending(RecipientId(9), "Per").await;

        let out = processor.handle(&cmd(OWNER.0, None, "/deny 9")).await;
        assert_eq!(
            out,
            CommandOutcome::Denied {
                id: RecipientId(9),
                name: "Per".to_string()
            }
        );
        assert!(!registry.is_pending(RecipientId(9)).await);
        assert!(!registry.is_approved(RecipientId(9)).await);
        assert!(!path.exists());
        assert_eq!(
            channel.sent_to(RecipientId(9)),
            vec![replies::NOW_DENIED.to_string()]
        );
    }

    #[tokio::test]
    async fn unknown_text_gets_hint() {
        let (_, channel, processor, _) = setup("arb-cmd-unknown");
        assert_eq!(
            processor.handle(&cmd(3, None, "hello")).await,
            CommandOutcome::Unknown
        );
        assert_eq!(
            channel.sent_to(RecipientId(3)),
            vec![replies::UNKNOWN.to_string()]
        );
    }

    #[tokio::test]
    async fn failed_reply_does_not_undo_registration() {
        let (registry, channel, processor, _) = setup("arb-cmd-sendfail");
        channel.fail_for.lock().unwrap().push(OWNER);

        let out = processor.handle(&cmd(42, Some("Kari"), "/register")).await;
        assert_eq!(out, CommandOutcome::Requested);
        assert!(registry.is_pending(RecipientId(42)).await);
    }
}
