use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::backend::ResourceBackend;
use super::models::Resource;
use super::validation::ValidationErrors;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("edit conflict")]
    Conflict,

    #[error("owner already has a record")]
    DuplicateOwner,

    #[error("validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Version-guarded access to one resource table.
///
/// Every write after insert goes through [`GuardedStore::update_loaded`],
/// which issues a single compare-and-swap; a lost race surfaces as
/// `StoreError::Conflict` and is never retried here. Each backend call is
/// bounded by `timeout`, and a timed-out call is reported, not repeated.
pub struct GuardedStore<R: Resource> {
    backend: Arc<dyn ResourceBackend<R>>,
    timeout: Duration,
}

impl<R: Resource> Clone for GuardedStore<R> {
    fn clone(&self) -> Self {
        Self {
            backend: Arc::clone(&self.backend),
            timeout: self.timeout,
        }
    }
}

impl<R: Resource> GuardedStore<R> {
    pub fn new(backend: Arc<dyn ResourceBackend<R>>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    async fn bounded<T, F>(&self, call: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout(self.timeout)),
        }
    }

    /// Creates the first row for the draft's owner.
    pub async fn insert(&self, draft: R) -> Result<R, StoreError> {
        draft.validate()?;
        let created = self.bounded(self.backend.insert(&draft)).await?;
        tracing::info!(
            "Created {} {} (owner {})",
            R::KIND,
            created.meta().id,
            created.meta().owner
        );
        Ok(created)
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<R, StoreError> {
        self.bounded(self.backend.find_by_id(id))
            .await?
            .ok_or(StoreError::NotFound)
    }

    pub async fn get_by_owner(&self, owner: Uuid) -> Result<R, StoreError> {
        self.bounded(self.backend.find_by_owner(owner))
            .await?
            .ok_or(StoreError::NotFound)
    }

    /// Loads `id`, then behaves like [`update_loaded`](Self::update_loaded).
    pub async fn update<F>(&self, id: Uuid, expected_version: i32, mutate: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut R) -> Result<(), ValidationErrors> + Send,
    {
        let current = self.get_by_id(id).await?;
        self.update_loaded(current, expected_version, mutate).await
    }

    /// Applies `mutate` to an already loaded row and writes it back only if
    /// the persisted version still equals `expected_version`.
    ///
    /// On success the returned row carries `expected_version + 1`. Identity
    /// columns (`id`, `owner`, `created_at`) are restored after `mutate`, so
    /// a mutation cannot move a row to another owner.
    pub async fn update_loaded<F>(&self, mut current: R, expected_version: i32, mutate: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut R) -> Result<(), ValidationErrors> + Send,
    {
        if current.meta().version != expected_version {
            tracing::debug!(
                "{} {} is at version {}, caller expected {}",
                R::KIND,
                current.meta().id,
                current.meta().version,
                expected_version
            );
            return Err(StoreError::Conflict);
        }

        let identity = current.meta().clone();
        mutate(&mut current)?;
        *current.meta_mut() = identity;
        current.validate()?;

        let new_version = self
            .bounded(self.backend.compare_and_swap(&current, expected_version))
            .await?
            .ok_or_else(|| {
                tracing::info!(
                    "Edit conflict on {} {} at version {}",
                    R::KIND,
                    current.meta().id,
                    expected_version
                );
                StoreError::Conflict
            })?;

        current.meta_mut().version = new_version;
        Ok(current)
    }

    pub async fn ping(&self) -> Result<(), StoreError> {
        self.bounded(self.backend.ping()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::memory::MemoryBackend;
    use crate::database::models::{Address, Profile};

    fn store<R: Resource>() -> GuardedStore<R> {
        GuardedStore::new(Arc::new(MemoryBackend::<R>::new()), Duration::from_secs(3))
    }

    fn address(owner: Uuid) -> Address {
        Address::new(owner, "1 Main St", "0150", "Oslo", "NO")
    }

    #[tokio::test]
    async fn update_advances_version_by_one() {
        let store = store::<Address>();
        let created = store.insert(address(Uuid::new_v4())).await.unwrap();

        let updated = store
            .update(created.meta.id, 1, |a| {
                a.city = "Bergen".into();
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(updated.meta.version, 2);
        assert_eq!(store.get_by_id(created.meta.id).await.unwrap().meta.version, 2);
    }

    #[tokio::test]
    async fn missing_row_is_not_found_not_conflict() {
        let store = store::<Address>();
        let result = store.update(Uuid::new_v4(), 1, |_| Ok(())).await;
        assert!(matches!(result, Err(StoreError::NotFound)));
    }

    #[tokio::test]
    async fn stale_expected_version_conflicts() {
        let store = store::<Address>();
        let created = store.insert(address(Uuid::new_v4())).await.unwrap();
        store.update(created.meta.id, 1, |_| Ok(())).await.unwrap();

        let result = store.update(created.meta.id, 1, |_| Ok(())).await;
        assert!(matches!(result, Err(StoreError::Conflict)));
    }

    #[tokio::test]
    async fn invalid_mutation_writes_nothing() {
        let store = store::<Address>();
        let created = store.insert(address(Uuid::new_v4())).await.unwrap();

        let result = store
            .update(created.meta.id, 1, |a| {
                a.city.clear();
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(StoreError::Validation(_))));
        assert_eq!(store.get_by_id(created.meta.id).await.unwrap().meta.version, 1);
    }

    #[tokio::test]
    async fn mutation_cannot_change_owner() {
        let store = store::<Profile>();
        let owner = Uuid::new_v4();
        let created = store.insert(Profile::new(owner, "John Doe")).await.unwrap();

        let updated = store
            .update(created.meta.id, 1, |p| {
                p.meta.owner = Uuid::new_v4();
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(updated.meta.owner, owner);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_updates_with_same_version_have_one_winner() {
        let store = store::<Address>();
        let created = store.insert(address(Uuid::new_v4())).await.unwrap();
        let id = created.meta.id;

        // Walk the row up to version 3
        store.update(id, 1, |_| Ok(())).await.unwrap();
        store.update(id, 2, |_| Ok(())).await.unwrap();

        let loaded_a = store.get_by_id(id).await.unwrap();
        let loaded_b = loaded_a.clone();
        let (store_a, store_b) = (store.clone(), store.clone());

        let a = tokio::spawn(async move {
            store_a
                .update_loaded(loaded_a, 3, |a| {
                    a.city = "Bergen".into();
                    Ok(())
                })
                .await
        });
        let b = tokio::spawn(async move {
            store_b
                .update_loaded(loaded_b, 3, |a| {
                    a.city = "Trondheim".into();
                    Ok(())
                })
                .await
        });

        let results = [a.await.unwrap(), b.await.unwrap()];
        let winners: Vec<_> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
        let conflicts = results
            .iter()
            .filter(|r| matches!(r, Err(StoreError::Conflict)))
            .count();

        assert_eq!(winners.len(), 1);
        assert_eq!(conflicts, 1);
        assert_eq!(winners[0].meta.version, 4);

        let stored = store.get_by_id(id).await.unwrap();
        assert_eq!(stored.meta.version, 4);
        assert_eq!(stored.city, winners[0].city);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_inserts_for_one_owner_have_one_winner() {
        let store = store::<Profile>();
        let owner = Uuid::new_v4();

        let handles: Vec<_> = (0..2)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(Profile::new(owner, format!("name {}", i))).await })
            })
            .collect();

        let mut created = 0;
        let mut duplicates = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => created += 1,
                Err(StoreError::DuplicateOwner) => duplicates += 1,
                Err(e) => panic!("unexpected error: {}", e),
            }
        }
        assert_eq!((created, duplicates), (1, 1));
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let backend = MemoryBackend::<Address>::new().with_latency(Duration::from_millis(200));
        let store = GuardedStore::new(Arc::new(backend), Duration::from_millis(20));

        let result = store.get_by_owner(Uuid::new_v4()).await;
        assert!(matches!(result, Err(StoreError::Timeout(_))));
    }
}
