//! Source adapters: fetching the four collections and shaping chat threads.

use std::collections::HashMap;

use crate::api::client::ApiClient;
use crate::api::models::{ChatConversation, ChatMessage, EmailMessage, SmsMessage, Task, User};
use crate::error::Result;
use crate::utils::parse_timestamp;

fn message_millis(m: &ChatMessage) -> i64 {
    m.created_at
        .as_deref()
        .and_then(parse_timestamp)
        .map(|t| t.timestamp_millis())
        .unwrap_or(0)
}

/// Groups the flat chat log of `me` into one conversation per partner.
///
/// The latest message of each thread is its preview; unread counts only the
/// messages `me` received and has not read. Messages not involving `me` are
/// ignored. Partner names come from `directory`, falling back to the id.
pub fn derive_conversations(me: &str, log: &[ChatMessage], directory: &[User]) -> Vec<ChatConversation> {
    let names: HashMap<&str, &str> = directory.iter().map(|u| (u.id.as_str(), u.display_name())).collect();
    let mut threads: Vec<ChatConversation> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for msg in log {
        let partner = if msg.sender_id == me {
            msg.receiver_id.as_str()
        } else if msg.receiver_id == me {
            msg.sender_id.as_str()
        } else {
            continue;
        };
        let incoming_unread = msg.receiver_id == me && !msg.is_read;

        match index.get(partner) {
            Some(&i) => {
                let conv = &mut threads[i];
                conv.message_count += 1;
                if incoming_unread {
                    conv.unread_count += 1;
                }
                if message_millis(msg) >= message_millis(&conv.last_message) {
                    conv.last_message = msg.clone();
                }
            }
            None => {
                index.insert(partner, threads.len());
                threads.push(ChatConversation {
                    partner_id: partner.to_string(),
                    partner_name: names.get(partner).copied().unwrap_or(partner).to_string(),
                    last_message: msg.clone(),
                    unread_count: usize::from(incoming_unread),
                    message_count: 1,
                });
            }
        }
    }
    threads
}

/// Messages exchanged with `partner`, oldest first.
pub fn thread<'a>(me: &str, partner: &str, log: &'a [ChatMessage]) -> Vec<&'a ChatMessage> {
    let mut msgs: Vec<&ChatMessage> = log
        .iter()
        .filter(|m| {
            (m.sender_id == me && m.receiver_id == partner) || (m.sender_id == partner && m.receiver_id == me)
        })
        .collect();
    msgs.sort_by_key(|m| message_millis(m));
    msgs
}

/// Outcome of one concurrent refresh. Each source fails independently.
pub struct Fetched {
    pub emails: Result<Vec<EmailMessage>>,
    pub tasks: Result<Vec<Task>>,
    pub chat_log: Result<Vec<ChatMessage>>,
    pub users: Result<Vec<User>>,
    pub sms: Result<Vec<SmsMessage>>,
}

/// Fetches every source at once. `inbox_folder` is the mail folder to list,
/// or `None` to skip mail.
pub async fn fetch_all(
    client: &ApiClient,
    inbox_folder: Option<&str>,
    mailbox: &str,
    top: usize,
) -> Fetched {
    let emails = async {
        match inbox_folder {
            Some(folder) => client
                .folder_messages(folder, mailbox, top, 0)
                .await
                .map(|page| if page.connected { page.emails } else { Vec::new() }),
            None => Ok(Vec::new()),
        }
    };
    let (emails, tasks, chat_log, users, sms) = tokio::join!(
        emails,
        client.tasks(),
        client.chat_messages(),
        client.users(),
        client.sms_messages(),
    );
    Fetched {
        emails,
        tasks,
        chat_log,
        users,
        sms,
    }
}
