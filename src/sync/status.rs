use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::domain::Highlight;

/// Relationship of a local highlight to the remote authority.
///
/// ```text
/// pending_create --(remote create ok)--> synced --(user delete)--> pending_delete
///       |                                                               |
///       +--(user delete: never left the device)--> removed <--(remote delete ok)
/// ```
///
/// There is no failed state: a failed remote call leaves the record where it is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    Synced,
    PendingCreate,
    PendingDelete,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "synced",
            SyncStatus::PendingCreate => "pending_create",
            SyncStatus::PendingDelete => "pending_delete",
        }
    }

    pub fn is_pending(&self) -> bool {
        !matches!(self, SyncStatus::Synced)
    }

    /// Tombstones are hidden from the reading surface.
    pub fn is_visible(&self) -> bool {
        !matches!(self, SyncStatus::PendingDelete)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "synced" => Ok(SyncStatus::Synced),
            "pending_create" => Ok(SyncStatus::PendingCreate),
            "pending_delete" => Ok(SyncStatus::PendingDelete),
            other => Err(anyhow::anyhow!("unknown sync status: {}", other)),
        }
    }
}

/// Outcome of a user deleting a highlight.
#[derive(Debug, Clone, PartialEq)]
pub enum DeleteTransition {
    /// The record never reached the remote authority; drop it from the store.
    RemoveLocally,
    /// Keep a tombstone until the remote delete is confirmed.
    MarkPendingDelete(Highlight),
}

pub fn request_delete(highlight: Highlight) -> DeleteTransition {
    if highlight.temp_id.is_some() || highlight.sync_status == SyncStatus::PendingCreate {
        return DeleteTransition::RemoveLocally;
    }
    DeleteTransition::MarkPendingDelete(Highlight {
        sync_status: SyncStatus::PendingDelete,
        ..highlight
    })
}

/// The record the store should hold once the remote create returned `remote_id`.
pub fn confirm_created(highlight: Highlight, remote_id: String) -> Highlight {
    Highlight {
        id: remote_id,
        sync_status: SyncStatus::Synced,
        temp_id: None,
        ..highlight
    }
}

/// Whether removing a `pending_delete` record requires a remote call.
pub fn needs_remote_delete(highlight: &Highlight) -> bool {
    highlight.temp_id.is_none()
}
