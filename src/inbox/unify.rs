//! Merging the four inbox sources into one list.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};

use crate::api::models::{ChatConversation, EmailMessage, SmsDirection, SmsMessage, Task};
use crate::utils::parse_timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Email,
    Task,
    Chat,
    Sms,
}

impl MessageKind {
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Email,
        MessageKind::Task,
        MessageKind::Chat,
        MessageKind::Sms,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            MessageKind::Email => "email",
            MessageKind::Task => "task",
            MessageKind::Chat => "chat",
            MessageKind::Sms => "sms",
        }
    }

    /// Globally unique id for a record of this kind.
    pub fn unified_id(self, raw: &str) -> String {
        format!("{}-{}", self.prefix(), raw)
    }

    /// Splits a unified id back into kind and source id.
    pub fn split_id(id: &str) -> Option<(MessageKind, &str)> {
        let (prefix, raw) = id.split_once('-')?;
        let kind = MessageKind::ALL.into_iter().find(|k| k.prefix() == prefix)?;
        Some((kind, raw))
    }
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// The record a unified message was built from.
#[derive(Debug, Clone, PartialEq)]
pub enum Origin {
    Email(EmailMessage),
    Task(Task),
    Chat(ChatConversation),
    Sms(SmsMessage),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnifiedMessage {
    pub id: String,
    pub kind: MessageKind,
    pub title: String,
    pub preview: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub unread: bool,
    pub priority: Option<String>,
    pub status: Option<String>,
    pub direction: Option<SmsDirection>,
    pub has_attachments: bool,
    pub origin: Origin,
}

impl UnifiedMessage {
    /// Milliseconds since the epoch; records without a usable timestamp sort as 0.
    pub fn sort_key(&self) -> i64 {
        self.timestamp.map(|t| t.timestamp_millis()).unwrap_or(0)
    }
}

fn ts(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(parse_timestamp)
}

impl From<&EmailMessage> for UnifiedMessage {
    fn from(e: &EmailMessage) -> Self {
        let title = if e.subject.trim().is_empty() {
            "(no subject)".to_string()
        } else {
            e.subject.clone()
        };
        Self {
            id: MessageKind::Email.unified_id(&e.id),
            kind: MessageKind::Email,
            title,
            preview: e.body_preview.clone(),
            timestamp: ts(e.received_date_time.as_deref().or(e.sent_date_time.as_deref())),
            unread: !e.is_read,
            priority: e.importance.clone(),
            status: None,
            direction: None,
            has_attachments: e.has_attachments,
            origin: Origin::Email(e.clone()),
        }
    }
}

impl From<&Task> for UnifiedMessage {
    fn from(t: &Task) -> Self {
        Self {
            id: MessageKind::Task.unified_id(&t.id),
            kind: MessageKind::Task,
            title: t.title.clone(),
            preview: t.description.clone().unwrap_or_default(),
            timestamp: ts(t.created_at.as_deref().or(t.due_date.as_deref())),
            unread: t.is_pending(),
            priority: Some(t.priority.clone()).filter(|p| !p.is_empty()),
            status: Some(t.status.clone()).filter(|s| !s.is_empty()),
            direction: None,
            has_attachments: false,
            origin: Origin::Task(t.clone()),
        }
    }
}

impl From<&ChatConversation> for UnifiedMessage {
    fn from(c: &ChatConversation) -> Self {
        Self {
            id: MessageKind::Chat.unified_id(&c.partner_id),
            kind: MessageKind::Chat,
            title: c.partner_name.clone(),
            preview: c.last_message.content.clone(),
            timestamp: ts(c.last_message.created_at.as_deref()),
            unread: c.unread_count > 0,
            priority: None,
            status: None,
            direction: None,
            has_attachments: false,
            origin: Origin::Chat(c.clone()),
        }
    }
}

impl From<&SmsMessage> for UnifiedMessage {
    fn from(s: &SmsMessage) -> Self {
        let title = s
            .customer_name
            .clone()
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| s.phone_number.clone());
        let undelivered_inbound =
            s.direction == SmsDirection::Inbound && s.delivery_status.as_deref() != Some("read");
        Self {
            id: MessageKind::Sms.unified_id(&s.id),
            kind: MessageKind::Sms,
            title,
            preview: s.content.clone(),
            timestamp: ts(s.created_at.as_deref()),
            unread: undelivered_inbound,
            priority: None,
            status: s.delivery_status.clone(),
            direction: Some(s.direction),
            has_attachments: false,
            origin: Origin::Sms(s.clone()),
        }
    }
}

/// Which part of the inbox is shown.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum FolderSelection {
    #[default]
    All,
    Unread,
    Tasks,
    Chat,
    Sms,
    /// A real mail folder id.
    Mail(String),
}

impl FolderSelection {
    pub fn includes(&self, kind: MessageKind) -> bool {
        match self {
            FolderSelection::All | FolderSelection::Unread => true,
            FolderSelection::Tasks => kind == MessageKind::Task,
            FolderSelection::Chat => kind == MessageKind::Chat,
            FolderSelection::Sms => kind == MessageKind::Sms,
            FolderSelection::Mail(_) => kind == MessageKind::Email,
        }
    }

    pub fn mail_folder(&self) -> Option<&str> {
        match self {
            FolderSelection::Mail(id) => Some(id.as_str()),
            _ => None,
        }
    }
}

impl FromStr for FolderSelection {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "" | "all" => FolderSelection::All,
            "unread" => FolderSelection::Unread,
            "tasks" => FolderSelection::Tasks,
            "chat" => FolderSelection::Chat,
            "sms" => FolderSelection::Sms,
            other => FolderSelection::Mail(other.to_string()),
        })
    }
}

impl fmt::Display for FolderSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FolderSelection::All => f.write_str("all"),
            FolderSelection::Unread => f.write_str("unread"),
            FolderSelection::Tasks => f.write_str("tasks"),
            FolderSelection::Chat => f.write_str("chat"),
            FolderSelection::Sms => f.write_str("sms"),
            FolderSelection::Mail(id) => f.write_str(id),
        }
    }
}

/// Whatever is currently cached for each source.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sources {
    pub emails: Vec<EmailMessage>,
    pub tasks: Vec<Task>,
    pub chats: Vec<ChatConversation>,
    pub sms: Vec<SmsMessage>,
}

/// Flattens the sources the folder asks for. Not sorted, not filtered.
pub fn merge(sources: &Sources, folder: &FolderSelection) -> Vec<UnifiedMessage> {
    let mut out = Vec::new();
    if folder.includes(MessageKind::Email) {
        out.extend(sources.emails.iter().map(UnifiedMessage::from));
    }
    if folder.includes(MessageKind::Task) {
        out.extend(sources.tasks.iter().map(UnifiedMessage::from));
    }
    if folder.includes(MessageKind::Chat) {
        out.extend(sources.chats.iter().map(UnifiedMessage::from));
    }
    if folder.includes(MessageKind::Sms) {
        out.extend(sources.sms.iter().map(UnifiedMessage::from));
    }
    out
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::api::models::ChatMessage;

    pub(crate) fn sample_sources() -> Sources {
        Sources {
            emails: vec![EmailMessage {
                id: "1".into(),
                subject: "Invoice".into(),
                is_read: false,
                has_attachments: true,
                received_date_time: Some("2024-05-02T08:00:00Z".into()),
                ..Default::default()
            }],
            tasks: vec![
                Task {
                    id: "1".into(),
                    title: "Call the clinic".into(),
                    status: "pending".into(),
                    priority: "high".into(),
                    created_at: Some("2024-05-01T08:00:00Z".into()),
                    ..Default::default()
                },
                Task {
                    id: "2".into(),
                    title: "Done already".into(),
                    status: "completed".into(),
                    ..Default::default()
                },
            ],
            chats: vec![ChatConversation {
                partner_id: "u2".into(),
                partner_name: "Eva".into(),
                last_message: ChatMessage {
                    id: "m1".into(),
                    sender_id: "u2".into(),
                    receiver_id: "u1".into(),
                    content: "ping".into(),
                    is_read: false,
                    created_at: Some("2024-05-03T08:00:00Z".into()),
                },
                unread_count: 1,
                message_count: 1,
            }],
            sms: vec![
                SmsMessage {
                    id: "1".into(),
                    direction: SmsDirection::Inbound,
                    phone_number: "+421900000000".into(),
                    content: "Hello".into(),
                    delivery_status: Some("delivered".into()),
                    ..Default::default()
                },
                SmsMessage {
                    id: "2".into(),
                    direction: SmsDirection::Outbound,
                    phone_number: "+421900000001".into(),
                    customer_name: Some("Jana".into()),
                    delivery_status: Some("sent".into()),
                    ..Default::default()
                },
            ],
        }
    }

    #[test]
    fn ids_are_prefixed_and_unique() {
        let merged = merge(&sample_sources(), &FolderSelection::All);
        assert_eq!(merged.len(), 6);
        let mut ids: Vec<_> = merged.iter().map(|m| m.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 6);
        assert!(ids.contains(&"email-1".to_string()));
        assert!(ids.contains(&"task-1".to_string()));
        assert!(ids.contains(&"sms-1".to_string()));
    }

    #[test]
    fn unread_predicates_per_kind() {
        let merged = merge(&sample_sources(), &FolderSelection::All);
        let unread: Vec<_> = merged.iter().filter(|m| m.unread).map(|m| m.id.as_str()).collect();
        assert_eq!(unread, ["email-1", "task-1", "chat-u2", "sms-1"]);
    }

    #[test]
    fn folder_restricts_sources() {
        let s = sample_sources();
        assert!(merge(&s, &FolderSelection::Tasks).iter().all(|m| m.kind == MessageKind::Task));
        assert_eq!(merge(&s, &"sms".parse().unwrap()).len(), 2);
        let mail = merge(&s, &FolderSelection::Mail("AAMk".into()));
        assert_eq!(mail.len(), 1);
        assert_eq!(mail[0].kind, MessageKind::Email);
    }

    #[test]
    fn missing_timestamp_sorts_as_epoch() {
        let merged = merge(&sample_sources(), &FolderSelection::Tasks);
        let done = merged.iter().find(|m| m.id == "task-2").unwrap();
        assert_eq!(done.timestamp, None);
        assert_eq!(done.sort_key(), 0);
    }

    #[test]
    fn sms_title_prefers_customer_name() {
        let merged = merge(&sample_sources(), &FolderSelection::Sms);
        assert_eq!(merged[0].title, "+421900000000");
        assert_eq!(merged[1].title, "Jana");
    }

    #[test]
    fn split_unified_id() {
        assert_eq!(MessageKind::split_id("chat-u-7"), Some((MessageKind::Chat, "u-7")));
        assert_eq!(MessageKind::split_id("fax-1"), None);
        assert_eq!(MessageKind::split_id("email"), None);
        assert_eq!("AAMk".parse::<FolderSelection>().unwrap().to_string(), "AAMk");
    }
}
