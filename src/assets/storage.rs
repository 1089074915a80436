use async_trait::async_trait;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::{NamedTempFile, TempPath};

/// Upload bytes made durable under a temporary name in the storage root.
///
/// Nothing can reach them until [`AssetStorage::commit`] renames them onto
/// their final name. Dropping an uncommitted asset deletes it.
#[derive(Debug)]
pub struct StagedAsset {
    path: TempPath,
}

/// Filesystem capability used by the asset replacer.
#[async_trait]
pub trait AssetStorage: Send + Sync {
    /// Durably stores `content` without making it visible under any name.
    async fn stage(&self, content: &[u8]) -> io::Result<StagedAsset>;

    /// Atomically moves a staged asset onto `name`. Readers see either the
    /// previous file or the complete new one, never a partial write.
    async fn commit(&self, staged: StagedAsset, name: &str) -> io::Result<()>;

    /// Removes `name`; `Ok(false)` when it did not exist.
    async fn remove(&self, name: &str) -> io::Result<bool>;

    async fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>>;

    async fn write(&self, name: &str, content: &[u8]) -> io::Result<()> {
        let staged = self.stage(content).await?;
        self.commit(staged, name).await
    }
}

/// Stores assets as plain files under one directory.
pub struct FsAssetStorage {
    root: PathBuf,
}

impl FsAssetStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

fn stage_in(root: &Path, content: &[u8]) -> io::Result<StagedAsset> {
    std::fs::create_dir_all(root)?;

    // Same directory as the targets so the final rename stays on one filesystem
    let mut temp_file = NamedTempFile::new_in(root)?;
    temp_file.write_all(content)?;
    temp_file.as_file().sync_all()?;

    Ok(StagedAsset {
        path: temp_file.into_temp_path(),
    })
}

fn blocking_failed(e: tokio::task::JoinError) -> io::Error {
    io::Error::new(io::ErrorKind::Other, e)
}

#[async_trait]
impl AssetStorage for FsAssetStorage {
    async fn stage(&self, content: &[u8]) -> io::Result<StagedAsset> {
        let root = self.root.clone();
        let content = content.to_vec();

        tokio::task::spawn_blocking(move || stage_in(&root, &content))
            .await
            .map_err(blocking_failed)?
    }

    async fn commit(&self, staged: StagedAsset, name: &str) -> io::Result<()> {
        let target = self.root.join(name);

        tokio::task::spawn_blocking(move || staged.path.persist(target).map_err(|e| e.error))
            .await
            .map_err(blocking_failed)?
    }

    async fn remove(&self, name: &str) -> io::Result<bool> {
        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn read(&self, name: &str) -> io::Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.root.join(name)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }
}
