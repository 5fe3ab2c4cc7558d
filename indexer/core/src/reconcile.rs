use std::{collections::HashSet, ops::AddAssign};

use common::{Resource as _, StorageItem, address::ensure_prefixed_address};
use log::{debug, warn};
use storage::{ResourceIndex, UpsertOutcome};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub added: usize,
    pub updated: usize,
    pub removed: usize,
}

impl AddAssign for ReconcileOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.added += rhs.added;
        self.updated += rhs.updated;
        self.removed += rhs.removed;
    }
}

/// Makes the stored storage slice of `address` equal to the `remote` listing.
///
/// Items present in both are only rewritten when their content differs.
pub async fn reconcile_account_storage(
    index: &ResourceIndex<StorageItem>,
    address: &str,
    remote: Vec<StorageItem>,
) -> ReconcileOutcome {
    let address = ensure_prefixed_address(address);
    let mut outcome = ReconcileOutcome::default();
    let mut remote_ids = HashSet::new();

    for item in remote {
        if item.address != address {
            warn!(
                "Skipping storage item {} listed for account {address}",
                item.id()
            );
            continue;
        }

        remote_ids.insert(item.id.clone());
        match index.upsert(item).await {
            UpsertOutcome::Added => outcome.added += 1,
            UpsertOutcome::Updated => outcome.updated += 1,
            UpsertOutcome::Unchanged => {}
        }
    }

    let stale = index
        .find_where(|item| item.address == address && !remote_ids.contains(&item.id))
        .await;
    for item in stale {
        match index.delete(&item.id).await {
            Ok(_) => outcome.removed += 1,
            Err(err) => warn!("Failed to remove storage item {}: {err}", item.id),
        }
    }

    if outcome != ReconcileOutcome::default() {
        debug!("Reconciled storage of {address}: {outcome:?}");
    }

    outcome
}
