//! Contract statuses, their badges and the dashboard tally.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::models::ContractInstance;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    #[default]
    Draft,
    Created,
    Sent,
    Received,
    Returned,
    PendingSignature,
    Verified,
    Signed,
    Executed,
    Completed,
    Terminated,
    Cancelled,
    Expired,
    /// Anything the backend invents later. Rendered like a draft.
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BadgeVariant {
    Secondary,
    Default,
    Destructive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub variant: BadgeVariant,
    pub label: &'static str,
}

/// Dashboard bucket a status is counted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Draft,
    Pending,
    Signed,
    Closed,
}

impl ContractStatus {
    pub const ALL: [ContractStatus; 13] = [
        ContractStatus::Draft,
        ContractStatus::Created,
        ContractStatus::Sent,
        ContractStatus::Received,
        ContractStatus::Returned,
        ContractStatus::PendingSignature,
        ContractStatus::Verified,
        ContractStatus::Signed,
        ContractStatus::Executed,
        ContractStatus::Completed,
        ContractStatus::Terminated,
        ContractStatus::Cancelled,
        ContractStatus::Expired,
    ];

    /// Parses a status name typed by a user; names outside `ALL` are rejected.
    pub fn parse_known(s: &str) -> Result<Self> {
        let name = s.trim();
        ContractStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == name)
            .ok_or_else(|| Error::validation(format!("unknown contract status {name:?}")))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContractStatus::Draft => "draft",
            ContractStatus::Created => "created",
            ContractStatus::Sent => "sent",
            ContractStatus::Received => "received",
            ContractStatus::Returned => "returned",
            ContractStatus::PendingSignature => "pending_signature",
            ContractStatus::Verified => "verified",
            ContractStatus::Signed => "signed",
            ContractStatus::Executed => "executed",
            ContractStatus::Completed => "completed",
            ContractStatus::Terminated => "terminated",
            ContractStatus::Cancelled => "cancelled",
            ContractStatus::Expired => "expired",
            ContractStatus::Unknown => "unknown",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ContractStatus::Draft | ContractStatus::Unknown => "Draft",
            ContractStatus::Created => "Created",
            ContractStatus::Sent => "Sent",
            ContractStatus::Received => "Received",
            ContractStatus::Returned => "Returned",
            ContractStatus::PendingSignature => "Awaiting signature",
            ContractStatus::Verified => "Verified",
            ContractStatus::Signed => "Signed",
            ContractStatus::Executed => "Executed",
            ContractStatus::Completed => "Completed",
            ContractStatus::Terminated => "Terminated",
            ContractStatus::Cancelled => "Cancelled",
            ContractStatus::Expired => "Expired",
        }
    }

    pub fn badge(self) -> Badge {
        let variant = match self {
            ContractStatus::Draft
            | ContractStatus::Created
            | ContractStatus::Expired
            | ContractStatus::Unknown => BadgeVariant::Secondary,
            ContractStatus::Terminated | ContractStatus::Cancelled => BadgeVariant::Destructive,
            _ => BadgeVariant::Default,
        };
        Badge {
            variant,
            label: self.label(),
        }
    }

    pub fn bucket(self) -> Bucket {
        match self {
            ContractStatus::Draft | ContractStatus::Created | ContractStatus::Unknown => {
                Bucket::Draft
            }
            ContractStatus::Sent
            | ContractStatus::Received
            | ContractStatus::Returned
            | ContractStatus::PendingSignature
            | ContractStatus::Verified => Bucket::Pending,
            ContractStatus::Signed | ContractStatus::Executed | ContractStatus::Completed => {
                Bucket::Signed
            }
            ContractStatus::Terminated | ContractStatus::Cancelled | ContractStatus::Expired => {
                Bucket::Closed
            }
        }
    }

    pub fn is_closed(self) -> bool {
        self.bucket() == Bucket::Closed
    }
}

impl fmt::Display for ContractStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ContractStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ContractStatus::ALL
            .into_iter()
            .find(|st| st.as_str() == s)
            .unwrap_or(ContractStatus::Unknown))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusTally {
    pub total: usize,
    pub draft: usize,
    pub pending: usize,
    pub signed: usize,
    pub closed: usize,
}

impl StatusTally {
    pub fn count<'a>(contracts: impl IntoIterator<Item = &'a ContractInstance>) -> Self {
        let mut tally = Self::default();
        for c in contracts {
            tally.total += 1;
            match c.status.bucket() {
                Bucket::Draft => tally.draft += 1,
                Bucket::Pending => tally.pending += 1,
                Bucket::Signed => tally.signed += 1,
                Bucket::Closed => tally.closed += 1,
            }
        }
        tally
    }
}
