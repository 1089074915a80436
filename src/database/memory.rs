use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::backend::ResourceBackend;
use super::models::Resource;
use super::store::StoreError;

struct Table<R> {
    rows: HashMap<Uuid, R>,
    by_owner: HashMap<Uuid, Uuid>,
}

/// In-process resource table with the same guarantees as the Postgres
/// backend: unique owner, version-guarded writes.
pub struct MemoryBackend<R> {
    table: RwLock<Table<R>>,
    latency: Option<Duration>,
}

impl<R: Resource> MemoryBackend<R> {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                rows: HashMap::new(),
                by_owner: HashMap::new(),
            }),
            latency: None,
        }
    }

    /// Delays every call, for exercising timeouts.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl<R: Resource> Default for MemoryBackend<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: Resource> ResourceBackend<R> for MemoryBackend<R> {
    async fn insert(&self, draft: &R) -> Result<R, StoreError> {
        self.simulate_latency().await;
        let mut table = self.table.write().await;

        let owner = draft.meta().owner;
        if table.by_owner.contains_key(&owner) {
            return Err(StoreError::DuplicateOwner);
        }

        let mut created = draft.clone();
        let meta = created.meta_mut();
        meta.id = Uuid::new_v4();
        meta.created_at = Utc::now();
        meta.version = 1;
        let id = meta.id;

        table.by_owner.insert(owner, id);
        table.rows.insert(id, created.clone());
        Ok(created)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, StoreError> {
        self.simulate_latency().await;
        Ok(self.table.read().await.rows.get(&id).cloned())
    }

    async fn find_by_owner(&self, owner: Uuid) -> Result<Option<R>, StoreError> {
        self.simulate_latency().await;
        let table = self.table.read().await;
        Ok(table
            .by_owner
            .get(&owner)
            .and_then(|id| table.rows.get(id))
            .cloned())
    }

    async fn compare_and_swap(&self, next: &R, expected_version: i32) -> Result<Option<i32>, StoreError> {
        self.simulate_latency().await;
        let mut table = self.table.write().await;

        let Some(row) = table.rows.get_mut(&next.meta().id) else {
            return Ok(None);
        };
        if row.meta().version != expected_version {
            return Ok(None);
        }

        // Only the mutable columns and the version move; id, owner and
        // created_at keep their stored values.
        let stored_meta = row.meta().clone();
        *row = next.clone();
        *row.meta_mut() = stored_meta;
        row.meta_mut().version = expected_version + 1;
        Ok(Some(expected_version + 1))
    }
}
