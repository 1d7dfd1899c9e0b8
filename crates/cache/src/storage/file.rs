//! One file per key under a root directory.
//!
//! File names are the hex encoding of the key so arbitrary keys (slashes,
//! colons, `@`) map onto safe names. Writes go to a temporary file in the same
//! directory and are renamed into place, so readers never see a torn value.

use super::PersistentStorage;
use async_trait::async_trait;
use ledgerline_core::{Error, Result};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

const VALUE_EXTENSION: &str = "val";

/// Durable storage backed by a directory
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (and create if needed) storage rooted at `root`
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root)
            .await
            .map_err(|e| Error::file_system(root.clone(), "create storage directory", e))?;
        Ok(Self { root })
    }

    /// Storage under the platform data directory
    pub async fn open_default() -> Result<Self> {
        let base = dirs::data_local_dir()
            .ok_or_else(|| Error::configuration("cannot determine a data directory for storage"))?;
        Self::open(base.join("ledgerline").join("storage")).await
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{VALUE_EXTENSION}", hex::encode(key.as_bytes())))
    }

    fn key_for(path: &Path) -> Option<String> {
        if path.extension()? != VALUE_EXTENSION {
            return None;
        }
        let stem = path.file_stem()?.to_str()?;
        let bytes = hex::decode(stem).ok()?;
        String::from_utf8(bytes).ok()
    }

    async fn write_atomic(&self, path: &Path, content: &[u8]) -> Result<()> {
        // Temp file lives next to the target so the rename stays on one filesystem
        let temp_path = self.root.join(format!(".{}.tmp", Uuid::new_v4()));

        let written = async {
            let mut file = fs::File::create(&temp_path)
                .await
                .map_err(|e| Error::file_system(temp_path.clone(), "create temporary file", e))?;
            file.write_all(content)
                .await
                .map_err(|e| Error::file_system(temp_path.clone(), "write temporary file", e))?;
            file.sync_all()
                .await
                .map_err(|e| Error::file_system(temp_path.clone(), "sync temporary file", e))?;
            Ok::<(), Error>(())
        }
        .await;

        if let Err(e) = written {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e);
        }

        if let Err(e) = fs::rename(&temp_path, path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(Error::file_system(path.to_path_buf(), "atomic rename", e));
        }

        Ok(())
    }
}

#[async_trait]
impl PersistentStorage for FileStorage {
    async fn get_item(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::file_system(path, "read", e)),
        }
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        self.write_atomic(&path, value.as_bytes()).await
    }

    async fn remove_item(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::file_system(path, "remove", e)),
        }
    }

    async fn get_all_keys(&self) -> Result<Vec<String>> {
        let mut entries = fs::read_dir(&self.root)
            .await
            .map_err(|e| Error::file_system(self.root.clone(), "read directory", e))?;

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| Error::file_system(self.root.clone(), "read directory entry", e))?
        {
            if let Some(key) = Self::key_for(&entry.path()) {
                keys.push(key);
            }
        }
        keys.sort();
        Ok(keys)
    }
}
