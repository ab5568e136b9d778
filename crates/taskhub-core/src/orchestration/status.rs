use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::models::SyncStatus;

/// Shared map of per-source sync status. Entries are only ever replaced as
/// whole values, and reads hand out copies.
#[derive(Clone, Default)]
pub(crate) struct StatusBoard {
    inner: Arc<Mutex<HashMap<String, SyncStatus>>>,
}

impl StatusBoard {
    pub(crate) fn insert(&self, status: SyncStatus) {
        if let Ok(mut statuses) = self.inner.lock() {
            statuses.insert(status.source_id.clone(), status);
        }
    }

    /// Replaces the entry for `source_id` with `transition(current)`.
    pub(crate) fn update(
        &self,
        source_id: &str,
        transition: impl FnOnce(&SyncStatus) -> SyncStatus,
    ) -> Option<SyncStatus> {
        let mut statuses = self.inner.lock().ok()?;
        let next = transition(statuses.get(source_id)?);
        statuses.insert(source_id.to_string(), next.clone());
        Some(next)
    }

    pub(crate) fn get(&self, source_id: &str) -> Option<SyncStatus> {
        self.inner.lock().ok()?.get(source_id).cloned()
    }

    pub(crate) fn snapshot(&self) -> Vec<SyncStatus> {
        let Ok(statuses) = self.inner.lock() else {
            return Vec::new();
        };
        let mut values = statuses.values().cloned().collect::<Vec<_>>();
        values.sort_by(|left, right| left.source_id.cmp(&right.source_id));
        values
    }
}
