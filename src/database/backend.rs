use async_trait::async_trait;
use uuid::Uuid;

use super::models::Resource;
use super::store::StoreError;

/// Persistence capability behind a [`GuardedStore`](super::GuardedStore).
///
/// `compare_and_swap` is the only way a row changes after insert: it writes
/// the mutable columns and bumps `version` by one only if the stored version
/// still equals `expected_version`, returning the new version, or `None`
/// when no row matched.
#[async_trait]
pub trait ResourceBackend<R: Resource>: Send + Sync {
    /// Inserts a new row for `draft.meta().owner`. A second row for the same
    /// owner fails with `StoreError::DuplicateOwner`.
    async fn insert(&self, draft: &R) -> Result<R, StoreError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<R>, StoreError>;

    async fn find_by_owner(&self, owner: Uuid) -> Result<Option<R>, StoreError>;

    async fn compare_and_swap(&self, next: &R, expected_version: i32) -> Result<Option<i32>, StoreError>;

    /// Cheap liveness probe for `/health`.
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
