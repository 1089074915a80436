//! Profile picture storage.
//!
//! An upload is sniffed and staged durably before the resource row is
//! touched. A new name becomes visible before the row references it; a name
//! the row already references is only overwritten after the row's version
//! step succeeds. The previous file is removed once nothing points at it.

mod sniff;
mod storage;

pub use sniff::{detect_content_type, sniff_image, MediaType, SNIFF_LEN};
pub use storage::{AssetStorage, FsAssetStorage, StagedAsset};

use axum::body::Bytes;
use std::io;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::database::{GuardedStore, HasAsset, StoreError, ValidationErrors};

#[derive(Debug, Error)]
pub enum AssetError {
    #[error("unsupported content type {0}")]
    InvalidContentType(&'static str),

    #[error("invalid asset name {0:?}")]
    InvalidName(String),

    #[error("asset {0} not found")]
    Missing(String),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<ValidationErrors> for AssetError {
    fn from(err: ValidationErrors) -> Self {
        AssetError::Store(StoreError::Validation(err))
    }
}

/// A file received from a client. The filename is only trusted for its
/// extension.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: String,
    pub content: Bytes,
}

/// Stored asset bytes plus the content type sniffed from them.
#[derive(Debug, Clone)]
pub struct StoredAsset {
    pub content: Vec<u8>,
    pub content_type: &'static str,
}

/// Deterministic asset name: the owner id followed by the declared file
/// extension, or the sniffed type's extension when none was declared.
pub fn asset_name(owner: Uuid, declared_filename: &str, media: MediaType) -> String {
    // Clients may send full paths; only the last component matters
    let basename = declared_filename
        .rsplit(|c: char| c == '/' || c == '\\')
        .next()
        .unwrap_or_default();

    let ext = Path::new(basename)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| format!(".{}", e.to_ascii_lowercase()))
        .unwrap_or_else(|| media.extension().to_string());

    format!("{}{}", owner, ext)
}

/// Rejects names that could escape the storage root.
fn validate_name(name: &str) -> Result<(), AssetError> {
    let bad = name.is_empty()
        || name.starts_with('.')
        || name.contains(['/', '\\', '\0'])
        || name.contains("..");
    if bad {
        Err(AssetError::InvalidName(name.to_string()))
    } else {
        Ok(())
    }
}

/// Whether a freshly loaded row points at `name`. When the row cannot be
/// read the answer is yes, so the file is kept.
fn references<R: HasAsset>(row: Result<R, StoreError>, name: &str) -> bool {
    match row {
        Ok(row) => row.asset_ref() == Some(name),
        Err(StoreError::NotFound) => false,
        Err(_) => true,
    }
}

/// Requests for one owner share a stripe, so they never race on that
/// owner's deterministic asset names within this process.
const OWNER_LOCK_STRIPES: usize = 64;

pub struct AssetReplacer<R: HasAsset> {
    storage: Arc<dyn AssetStorage>,
    store: GuardedStore<R>,
    owner_locks: Arc<[Mutex<()>]>,
}

impl<R: HasAsset> Clone for AssetReplacer<R> {
    fn clone(&self) -> Self {
        Self {
            storage: Arc::clone(&self.storage),
            store: self.store.clone(),
            owner_locks: Arc::clone(&self.owner_locks),
        }
    }
}

impl<R: HasAsset> AssetReplacer<R> {
    pub fn new(storage: Arc<dyn AssetStorage>, store: GuardedStore<R>) -> Self {
        Self {
            storage,
            store,
            owner_locks: (0..OWNER_LOCK_STRIPES).map(|_| Mutex::new(())).collect(),
        }
    }

    fn owner_lock(&self, owner: Uuid) -> &Mutex<()> {
        let stripe = owner.as_u128() % self.owner_locks.len() as u128;
        &self.owner_locks[stripe as usize]
    }

    /// Sniffs, names and previews an upload against `resource` without
    /// touching storage. Field validation runs here so that an invalid
    /// request never overwrites a live file.
    fn prepare<F>(&self, resource: &R, upload: &Upload, edit: &F) -> Result<String, AssetError>
    where
        F: Fn(&mut R) -> Result<(), ValidationErrors>,
    {
        let prefix = &upload.content[..upload.content.len().min(SNIFF_LEN)];
        let media = sniff_image(prefix).map_err(AssetError::InvalidContentType)?;
        let name = asset_name(resource.meta().owner, &upload.filename, media);

        let mut preview = resource.clone();
        edit(&mut preview)?;
        preview.set_asset_ref(Some(name.clone()));
        preview.validate()?;

        Ok(name)
    }

    /// Replaces the asset of an already loaded resource.
    ///
    /// `edit` carries any other field changes of the same request; they are
    /// committed in the same version step as the new asset reference. A
    /// stale `expected_version` is rejected before storage is touched.
    ///
    /// An upload landing on a new name is made visible before the row
    /// references it. An upload landing on the name the row already
    /// references stays staged until the version step is won, so a losing
    /// request never changes the live bytes. On success the old file is
    /// removed if its name differs and no row references it any more; a
    /// failed removal is logged and leaves an orphan behind.
    pub async fn replace<F>(
        &self,
        current: R,
        expected_version: i32,
        upload: Upload,
        edit: F,
    ) -> Result<R, AssetError>
    where
        F: Fn(&mut R) -> Result<(), ValidationErrors> + Send + Sync,
    {
        let name = self.prepare(&current, &upload, &edit)?;
        if current.meta().version != expected_version {
            return Err(StoreError::Conflict.into());
        }

        let id = current.meta().id;
        let _guard = self.owner_lock(current.meta().owner).lock().await;

        // The row may have moved on while this request waited
        let current = self.store.get_by_id(id).await?;
        if current.meta().version != expected_version {
            debug!(
                "{} {} moved to version {} before its asset was replaced",
                R::KIND,
                id,
                current.meta().version
            );
            return Err(StoreError::Conflict.into());
        }

        let previous = current.asset_ref().map(str::to_owned);
        let staged = self.storage.stage(&upload.content).await?;
        let pending = if previous.as_deref() == Some(name.as_str()) {
            Some(staged)
        } else {
            self.storage.commit(staged, &name).await?;
            None
        };
        let in_place = pending.is_some();

        let new_ref = name.clone();
        let result = self
            .store
            .update_loaded(current, expected_version, move |r| {
                edit(r)?;
                r.set_asset_ref(Some(new_ref));
                Ok(())
            })
            .await;

        let updated = match result {
            Ok(updated) => updated,
            Err(e) => {
                // A dropped staged upload deletes itself
                if !in_place {
                    self.discard_unless_referenced(id, &name).await;
                }
                return Err(e.into());
            }
        };

        match (pending, previous) {
            (Some(staged), _) => {
                if let Err(e) = self.storage.commit(staged, &name).await {
                    warn!(
                        "{} {} advanced to version {} but {} kept its previous content: {}",
                        R::KIND,
                        id,
                        updated.meta().version,
                        name,
                        e
                    );
                    return Err(e.into());
                }
            }
            (None, Some(previous)) => self.discard_unless_referenced(id, &previous).await,
            (None, None) => {}
        }

        info!("Replaced {} asset for {} with {}", R::KIND, id, name);
        Ok(updated)
    }

    /// Creates `draft`, storing `upload` first when one is given.
    pub async fn create(&self, mut draft: R, upload: Option<Upload>) -> Result<R, AssetError> {
        let Some(upload) = upload else {
            return Ok(self.store.insert(draft).await?);
        };

        let owner = draft.meta().owner;
        let name = self.prepare(&draft, &upload, &|_: &mut R| -> Result<(), ValidationErrors> { Ok(()) })?;
        let _guard = self.owner_lock(owner).lock().await;

        // An owner's existing row may reference a file with the same name
        match self.store.get_by_owner(owner).await {
            Ok(_) => return Err(StoreError::DuplicateOwner.into()),
            Err(StoreError::NotFound) => {}
            Err(e) => return Err(e.into()),
        }

        self.storage.write(&name, &upload.content).await?;
        draft.set_asset_ref(Some(name.clone()));

        match self.store.insert(draft).await {
            Ok(created) => Ok(created),
            Err(e) => {
                // Keep the file only if the owner's row now references it
                if !references(self.store.get_by_owner(owner).await, &name) {
                    self.discard(&name).await;
                }
                Err(e.into())
            }
        }
    }

    /// Reads a stored asset for public download.
    pub async fn open(&self, name: &str) -> Result<StoredAsset, AssetError> {
        validate_name(name)?;
        let content = self
            .storage
            .read(name)
            .await?
            .ok_or_else(|| AssetError::Missing(name.to_string()))?;
        let content_type = detect_content_type(&content);
        Ok(StoredAsset { content, content_type })
    }

    async fn discard_unless_referenced(&self, id: Uuid, name: &str) {
        if !references(self.store.get_by_id(id).await, name) {
            self.discard(name).await;
        }
    }

    async fn discard(&self, name: &str) {
        match self.storage.remove(name).await {
            Ok(_) => {}
            Err(e) => warn!("Failed to remove asset {}: {} (left as orphan)", name, e),
        }
    }
}
