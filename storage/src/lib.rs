//! In-memory resource indexes.
//!
//! One [`ResourceIndex`] holds one resource kind. Writes are serialized behind a single
//! lock and every read hands out owned copies, so a reader never observes a partially
//! merged resource.

use std::{collections::HashMap, sync::Arc};

use common::{
    Resource, TimeStamp, Timestamps,
    clock::{ChangeClock, Clock, SystemClock},
};
use error::IndexError;
use log::debug;
use tokio::sync::RwLock;

pub mod error;

pub type IndexResult<T> = Result<T, IndexError>;

/// What [`ResourceIndex::upsert`] did with the resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Added,
    Updated,
    /// Stored content already matched, nothing was written.
    Unchanged,
}

struct IndexInner<R> {
    lookup: HashMap<String, R>,
    /// Ids in insertion order.
    order: Vec<String>,
    clock: ChangeClock,
}

pub struct ResourceIndex<R: Resource> {
    inner: RwLock<IndexInner<R>>,
}

impl<R: Resource> Default for ResourceIndex<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Resource> ResourceIndex<R> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: RwLock::new(IndexInner {
                lookup: HashMap::new(),
                order: Vec::new(),
                clock: ChangeClock::new(clock),
            }),
        }
    }

    /// Inserts a new resource, stamping both change timestamps.
    pub async fn add(&self, mut resource: R) -> IndexResult<()> {
        let mut inner = self.inner.write().await;

        if inner.lookup.contains_key(resource.id()) {
            return Err(IndexError::already_exists(R::KIND, resource.id()));
        }

        let stamp = inner.clock.next_stamp();
        *resource.timestamps_mut() = Timestamps::new(stamp);

        let id = resource.id().to_string();
        inner.order.push(id.clone());
        inner.lookup.insert(id, resource);

        Ok(())
    }

    /// Merges `patch` into the stored resource and refreshes `updated_at`.
    pub async fn update(&self, id: &str, patch: R::Patch) -> IndexResult<()> {
        let mut inner = self.inner.write().await;
        let stamp = inner.clock.next_stamp();

        let stored = inner
            .lookup
            .get_mut(id)
            .ok_or_else(|| IndexError::not_found(R::KIND, id))?;
        stored.apply_patch(patch);
        stored.timestamps_mut().updated_at = stamp;

        Ok(())
    }

    pub async fn delete(&self, id: &str) -> IndexResult<R> {
        let mut inner = self.inner.write().await;

        let removed = inner
            .lookup
            .remove(id)
            .ok_or_else(|| IndexError::not_found(R::KIND, id))?;
        inner.order.retain(|stored_id| stored_id != id);

        Ok(removed)
    }

    /// Adds the resource if absent, otherwise merges all of its fields into the stored one.
    ///
    /// The merge keeps `created_at` and only stamps `updated_at` when content changed, so
    /// re-ingesting identical data is invisible to polling clients.
    pub async fn upsert(&self, mut resource: R) -> UpsertOutcome {
        let mut inner = self.inner.write().await;

        let merged = inner.lookup.get(resource.id()).map(|stored| {
            let mut merged = stored.clone();
            merged.apply_patch(resource.clone().into_patch());
            (merged.content_eq(stored), merged)
        });

        match merged {
            Some((true, _)) => UpsertOutcome::Unchanged,
            Some((false, mut merged)) => {
                merged.timestamps_mut().updated_at = inner.clock.next_stamp();
                inner.lookup.insert(merged.id().to_string(), merged);
                UpsertOutcome::Updated
            }
            None => {
                let stamp = inner.clock.next_stamp();
                *resource.timestamps_mut() = Timestamps::new(stamp);
                let id = resource.id().to_string();
                debug!("Indexed new {} {id}", R::KIND);
                inner.order.push(id.clone());
                inner.lookup.insert(id, resource);
                UpsertOutcome::Added
            }
        }
    }

    /// Snapshot of every resource in insertion order.
    pub async fn find_all(&self) -> Vec<R> {
        self.find_where(|_| true).await
    }

    pub async fn find_one(&self, id: &str) -> IndexResult<R> {
        self.inner
            .read()
            .await
            .lookup
            .get(id)
            .cloned()
            .ok_or_else(|| IndexError::not_found(R::KIND, id))
    }

    pub async fn contains(&self, id: &str) -> bool {
        self.inner.read().await.lookup.contains_key(id)
    }

    pub async fn find_where(&self, predicate: impl Fn(&R) -> bool) -> Vec<R> {
        let inner = self.inner.read().await;
        inner
            .order
            .iter()
            .filter_map(|id| inner.lookup.get(id))
            .filter(|resource| predicate(resource))
            .cloned()
            .collect()
    }

    /// Resources created or updated strictly after `bound`.
    pub async fn find_changed_after(&self, bound: TimeStamp) -> Vec<R> {
        self.find_where(|resource| resource.last_changed_at() > bound)
            .await
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.lookup.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Drops every resource. Change stamps keep increasing across a clear.
    pub async fn clear(&self) {
        let mut inner = self.inner.write().await;
        inner.lookup.clear();
        inner.order.clear();
    }
}

/// Read access to an index that stays writable only through its owner.
pub struct ReadOnlyIndex<R: Resource>(Arc<ResourceIndex<R>>);

impl<R: Resource> Clone for ReadOnlyIndex<R> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<R: Resource> ReadOnlyIndex<R> {
    pub fn new(index: Arc<ResourceIndex<R>>) -> Self {
        Self(index)
    }

    pub async fn find_all(&self) -> Vec<R> {
        self.0.find_all().await
    }

    pub async fn find_one(&self, id: &str) -> IndexResult<R> {
        self.0.find_one(id).await
    }

    pub async fn find_where(&self, predicate: impl Fn(&R) -> bool) -> Vec<R> {
        self.0.find_where(predicate).await
    }

    pub async fn find_changed_after(&self, bound: TimeStamp) -> Vec<R> {
        self.0.find_changed_after(bound).await
    }

    pub async fn len(&self) -> usize {
        self.0.len().await
    }
}
