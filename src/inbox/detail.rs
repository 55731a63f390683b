//! Detail dispatch: from a selected row back to its typed record.

use std::fmt;

use super::unify::{MessageKind, Origin, Sources, UnifiedMessage};
use crate::api::models::{ChatConversation, EmailMessage, SmsMessage, Task};
use crate::utils::parse_timestamp;

#[derive(Debug, Clone, PartialEq)]
pub enum DetailPanel {
    Email(EmailMessage),
    Task(Task),
    Chat(ChatConversation),
    Sms(SmsMessage),
}

impl DetailPanel {
    pub fn kind(&self) -> MessageKind {
        match self {
            DetailPanel::Email(_) => MessageKind::Email,
            DetailPanel::Task(_) => MessageKind::Task,
            DetailPanel::Chat(_) => MessageKind::Chat,
            DetailPanel::Sms(_) => MessageKind::Sms,
        }
    }
}

impl From<&UnifiedMessage> for DetailPanel {
    fn from(msg: &UnifiedMessage) -> Self {
        match &msg.origin {
            Origin::Email(e) => DetailPanel::Email(e.clone()),
            Origin::Task(t) => DetailPanel::Task(t.clone()),
            Origin::Chat(c) => DetailPanel::Chat(c.clone()),
            Origin::Sms(s) => DetailPanel::Sms(s.clone()),
        }
    }
}

/// Re-derives the typed record behind a unified id from the current sources.
/// `None` when the prefix is unknown or the record is gone.
pub fn locate(id: &str, sources: &Sources) -> Option<DetailPanel> {
    let (kind, raw) = MessageKind::split_id(id)?;
    match kind {
        MessageKind::Email => sources.emails.iter().find(|e| e.id == raw).cloned().map(DetailPanel::Email),
        MessageKind::Task => sources.tasks.iter().find(|t| t.id == raw).cloned().map(DetailPanel::Task),
        MessageKind::Chat => sources
            .chats
            .iter()
            .find(|c| c.partner_id == raw)
            .cloned()
            .map(DetailPanel::Chat),
        MessageKind::Sms => sources.sms.iter().find(|s| s.id == raw).cloned().map(DetailPanel::Sms),
    }
}

fn when(raw: Option<&str>) -> String {
    raw.and_then(parse_timestamp)
        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

impl fmt::Display for DetailPanel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailPanel::Email(e) => {
                writeln!(f, "Subject: {}", e.subject)?;
                if let Some(from) = &e.from {
                    writeln!(f, "From:    {}", from.label())?;
                }
                if !e.to_recipients.is_empty() {
                    let to: Vec<_> = e.to_recipients.iter().map(|r| r.label()).collect();
                    writeln!(f, "To:      {}", to.join(", "))?;
                }
                if !e.cc_recipients.is_empty() {
                    let cc: Vec<_> = e.cc_recipients.iter().map(|r| r.label()).collect();
                    writeln!(f, "Cc:      {}", cc.join(", "))?;
                }
                writeln!(f, "Date:    {}", when(e.received_date_time.as_deref()))?;
                if e.has_attachments {
                    writeln!(f, "[attachments]")?;
                }
                writeln!(f)?;
                let body = e.body.as_ref().map(|b| b.content.as_str()).unwrap_or(&e.body_preview);
                write!(f, "{body}")
            }
            DetailPanel::Task(t) => {
                writeln!(f, "Task:     {}", t.title)?;
                writeln!(f, "Status:   {}", t.status)?;
                writeln!(f, "Priority: {}", t.priority)?;
                writeln!(f, "Due:      {}", when(t.due_date.as_deref()))?;
                if let Some(r) = &t.resolution {
                    writeln!(f, "Resolution: {r}")?;
                }
                if let Some(d) = &t.description {
                    write!(f, "\n{d}")?;
                }
                Ok(())
            }
            DetailPanel::Chat(c) => {
                writeln!(f, "Chat with {} ({} messages, {} unread)", c.partner_name, c.message_count, c.unread_count)?;
                write!(f, "[{}] {}", when(c.last_message.created_at.as_deref()), c.last_message.content)
            }
            DetailPanel::Sms(s) => {
                let who = s.customer_name.as_deref().unwrap_or(&s.phone_number);
                writeln!(f, "SMS {} {} ({})", s.direction.as_str(), who, s.phone_number)?;
                writeln!(f, "Status: {}", s.delivery_status.as_deref().unwrap_or("-"))?;
                writeln!(f, "Date:   {}", when(s.created_at.as_deref()))?;
                write!(f, "\n{}", s.content)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inbox::unify::{merge, tests::sample_sources, FolderSelection};

    #[test]
    fn every_row_dispatches_to_its_kind() {
        let sources = sample_sources();
        for row in merge(&sources, &FolderSelection::All) {
            let panel = DetailPanel::from(&row);
            assert_eq!(panel.kind(), row.kind);
            assert_eq!(locate(&row.id, &sources), Some(panel));
        }
    }

    #[test]
    fn unknown_or_stale_ids() {
        let sources = sample_sources();
        assert_eq!(locate("fax-1", &sources), None);
        assert_eq!(locate("email-999", &sources), None);
        assert_eq!(locate("nodash", &sources), None);
    }

    #[test]
    fn renders_sms_panel() {
        let sources = sample_sources();
        let panel = locate("sms-2", &sources).unwrap();
        let text = panel.to_string();
        assert!(text.starts_with("SMS outbound Jana (+421900000001)"));
        assert!(text.contains("Status: sent"));
    }
}
