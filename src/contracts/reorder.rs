//! Optimistic reordering of contract categories.
//!
//! The local list is reordered first so the new order shows immediately. The
//! ordered ids are then sent to the backend; if that fails the list goes back
//! to the snapshot taken before the move.

use std::future::Future;

use crate::api::models::ContractCategory;
use crate::error::Result;

/// A reorder that was applied locally and still awaits the server.
#[derive(Debug)]
#[must_use = "a pending reorder must be committed or rolled back"]
pub struct PendingReorder {
    snapshot: Vec<ContractCategory>,
    ordered_ids: Vec<i64>,
}

impl PendingReorder {
    /// Moves `active` to the slot of `over` inside `categories`.
    ///
    /// Returns `None` when nothing moves (same id, unknown id).
    pub fn begin(categories: &mut Vec<ContractCategory>, active: i64, over: i64) -> Option<Self> {
        if active == over {
            return None;
        }
        let from = categories.iter().position(|c| c.id == active)?;
        let to = categories.iter().position(|c| c.id == over)?;
        let snapshot = categories.clone();
        move_item(categories, from, to);
        for (idx, c) in categories.iter_mut().enumerate() {
            c.sort_order = idx as i32;
        }
        let ordered_ids = categories.iter().map(|c| c.id).collect();
        Some(Self {
            snapshot,
            ordered_ids,
        })
    }

    pub fn ordered_ids(&self) -> &[i64] {
        &self.ordered_ids
    }

    pub fn commit(self) {}

    pub fn rollback(self, categories: &mut Vec<ContractCategory>) {
        *categories = self.snapshot;
    }
}

/// Removes the item at `from` and inserts it at `to`.
pub fn move_item<T>(items: &mut Vec<T>, from: usize, to: usize) {
    if from >= items.len() || to >= items.len() || from == to {
        return;
    }
    let item = items.remove(from);
    items.insert(to, item);
}

/// Applies the move, persists it with `persist` and rolls back on error.
pub async fn reorder_with<F, Fut>(
    categories: &mut Vec<ContractCategory>,
    active: i64,
    over: i64,
    persist: F,
) -> Result<bool>
where
    F: FnOnce(Vec<i64>) -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let Some(pending) = PendingReorder::begin(categories, active, over) else {
        return Ok(false);
    };
    match persist(pending.ordered_ids().to_vec()).await {
        Ok(()) => {
            pending.commit();
            Ok(true)
        }
        Err(e) => {
            log::warn!("category reorder rejected, restoring previous order: {e}");
            pending.rollback(categories);
            Err(e)
        }
    }
}
