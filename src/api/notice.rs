use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Destructive,
}

/// A short user-facing message about the outcome of an action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notice {
    pub fn info(title: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Info,
            title: title.into(),
            description: None,
        }
    }

    pub fn destructive(title: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Destructive,
            title: title.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Failure notice for `action`, carrying the error text. Also logged.
    pub fn from_error(action: &str, err: &Error) -> Self {
        log::error!("{action}: {err}");
        let title = match err {
            Error::Validation(_) => "Missing or invalid input",
            Error::Http { status: 404, .. } => "Not found",
            Error::Http { .. } | Error::Rejected(_) | Error::Transport(_) => "Request failed",
            _ => "Something went wrong",
        };
        Self::destructive(title).with_description(format!("{action}: {err}"))
    }

    pub fn is_destructive(&self) -> bool {
        self.level == NoticeLevel::Destructive
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.level {
            NoticeLevel::Info => "✓",
            NoticeLevel::Destructive => "✗",
        };
        write!(f, "{marker} {}", self.title)?;
        if let Some(d) = &self.description {
            write!(f, " ({d})")?;
        }
        Ok(())
    }
}
