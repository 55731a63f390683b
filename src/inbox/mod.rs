//! The unified NEXUS inbox: email, tasks, chat and SMS in one list.

pub mod detail;
pub mod pipeline;
pub mod sources;
pub mod unify;

use crate::api::client::ApiClient;
use crate::api::models::{ChatMessage, EmailMessage, MailFolder, SendEmailRequest, SmsMessage, Task, User};
use crate::api::notice::Notice;
use crate::cache::{key, QueryCache, QueryKey};
use crate::error::Result;

pub use detail::{locate, DetailPanel};
pub use pipeline::{InboxFilter, InboxView, Page, SortOrder};
pub use unify::{merge, FolderSelection, MessageKind, Sources, UnifiedMessage};

/// How many messages one mail folder fetch asks for.
pub const MAIL_FETCH_SIZE: usize = 50;

/// Inbox service. Fetches into the query cache and builds views from it.
#[derive(Clone)]
pub struct Nexus {
    client: ApiClient,
    cache: QueryCache,
    mailbox: String,
}

impl Nexus {
    pub fn new(client: ApiClient, cache: QueryCache, mailbox: impl Into<String>) -> Self {
        Self {
            client,
            cache,
            mailbox: mailbox.into(),
        }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub fn mailbox(&self) -> &str {
        &self.mailbox
    }

    fn user(&self) -> &str {
        self.client.user_id().unwrap_or("-")
    }

    fn folders_key(&self) -> QueryKey {
        key(&["/api/users", self.user(), "ms365-folders", &self.mailbox])
    }

    fn messages_key(&self, folder_id: &str) -> QueryKey {
        key(&["/api/users", self.user(), "ms365-folder-messages", folder_id, &self.mailbox])
    }

    fn chat_key(&self) -> QueryKey {
        key(&["/api/users", self.user(), "chat-messages"])
    }

    /// Mail folders of the current mailbox, cached.
    pub async fn folders(&self) -> Result<Vec<MailFolder>> {
        let folders = self.client.folders(&self.mailbox).await?;
        self.cache.put(self.folders_key(), folders.clone());
        Ok(folders)
    }

    fn cached_inbox_id(&self) -> Option<String> {
        let folders: Vec<MailFolder> = self.cache.get(&self.folders_key())?;
        inbox_folder(&folders).map(|f| f.id.clone())
    }

    /// Mail folder the selection reads from, if any.
    fn cached_mail_folder(&self, folder: &FolderSelection) -> Option<String> {
        match folder {
            FolderSelection::Mail(id) => Some(id.clone()),
            FolderSelection::All | FolderSelection::Unread => self.cached_inbox_id(),
            _ => None,
        }
    }

    async fn resolve_mail_folder(&self, folder: &FolderSelection, notices: &mut Vec<Notice>) -> Option<String> {
        match folder {
            FolderSelection::Mail(id) => Some(id.clone()),
            FolderSelection::All | FolderSelection::Unread => {
                if let Some(id) = self.cached_inbox_id() {
                    return Some(id);
                }
                match self.folders().await {
                    Ok(folders) => inbox_folder(&folders).map(|f| f.id.clone()),
                    Err(e) => {
                        notices.push(Notice::from_error("load mail folders", &e));
                        None
                    }
                }
            }
            _ => None,
        }
    }

    /// Fetches every source concurrently. Sources that fail keep their
    /// previously cached value and are reported as notices.
    pub async fn refresh(&self, folder: &FolderSelection) -> Vec<Notice> {
        let mut notices = Vec::new();
        let mail_folder = self.resolve_mail_folder(folder, &mut notices).await;
        let fetched = sources::fetch_all(&self.client, mail_folder.as_deref(), &self.mailbox, MAIL_FETCH_SIZE).await;

        if let Some(folder_id) = &mail_folder {
            match fetched.emails {
                Ok(emails) => self.cache.put(self.messages_key(folder_id), emails),
                Err(e) => notices.push(Notice::from_error("load email", &e)),
            }
        }
        match fetched.tasks {
            Ok(tasks) => self.cache.put(key(&["/api/tasks"]), tasks),
            Err(e) => notices.push(Notice::from_error("load tasks", &e)),
        }
        match fetched.chat_log {
            Ok(log) => self.cache.put(self.chat_key(), log),
            Err(e) => notices.push(Notice::from_error("load chat", &e)),
        }
        match fetched.users {
            Ok(users) => self.cache.put(key(&["/api/users"]), users),
            Err(e) => log::warn!("user directory unavailable, chat shows ids: {e}"),
        }
        match fetched.sms {
            Ok(sms) => self.cache.put(key(&["/api/sms-messages"]), sms),
            Err(e) => notices.push(Notice::from_error("load SMS", &e)),
        }
        log::debug!("inbox refresh for {folder}: {} failures", notices.len());
        notices
    }

    /// Whatever is cached right now for the folder's sources.
    pub fn sources(&self, folder: &FolderSelection) -> Sources {
        let emails: Vec<EmailMessage> = self
            .cached_mail_folder(folder)
            .and_then(|id| self.cache.get(&self.messages_key(&id)))
            .unwrap_or_default();
        let log = self.chat_log();
        let users: Vec<User> = self.cache.get(&key(&["/api/users"])).unwrap_or_default();
        let chats = match self.client.user_id() {
            Some(me) => sources::derive_conversations(me, &log, &users),
            None => Vec::new(),
        };
        Sources {
            emails,
            tasks: self.cache.get::<Vec<Task>>(&key(&["/api/tasks"])).unwrap_or_default(),
            chats,
            sms: self.cache.get::<Vec<SmsMessage>>(&key(&["/api/sms-messages"])).unwrap_or_default(),
        }
    }

    fn chat_log(&self) -> Vec<ChatMessage> {
        self.cache.get(&self.chat_key()).unwrap_or_default()
    }

    /// The page the view currently points at.
    pub fn page(&self, view: &InboxView) -> Page<UnifiedMessage> {
        let merged = merge(&self.sources(view.folder()), view.folder());
        view.apply(merged)
    }

    pub fn detail(&self, id: &str, folder: &FolderSelection) -> Option<DetailPanel> {
        locate(id, &self.sources(folder))
    }

    /// Full message list of one chat thread, oldest first.
    pub fn chat_thread(&self, partner: &str) -> Vec<ChatMessage> {
        let me = self.user().to_string();
        let log = self.chat_log();
        sources::thread(&me, partner, &log).into_iter().cloned().collect()
    }

    /// Unread rows per kind across all cached sources.
    pub fn unread_counts(&self) -> Vec<(MessageKind, usize)> {
        let merged = merge(&self.sources(&FolderSelection::All), &FolderSelection::All);
        MessageKind::ALL
            .into_iter()
            .map(|k| (k, merged.iter().filter(|m| m.kind == k && m.unread).count()))
            .collect()
    }

    pub async fn send_email(&self, email: &SendEmailRequest) -> Result<()> {
        self.client.send_email(email).await?;
        self.invalidate_mail();
        Ok(())
    }

    pub async fn delete_email(&self, id: &str) -> Result<()> {
        self.client.delete_email(id, &self.mailbox).await?;
        self.invalidate_mail();
        Ok(())
    }

    fn invalidate_mail(&self) {
        self.cache.invalidate(&["/api/users", self.user(), "ms365-folder-messages"]);
    }
}

/// The folder named "Inbox", compared case-insensitively.
pub fn inbox_folder(folders: &[MailFolder]) -> Option<&MailFolder> {
    folders.iter().find(|f| f.display_name.eq_ignore_ascii_case("inbox"))
}
