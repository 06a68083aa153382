use crate::storage::{KeyValueStore, StoreError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Session keys kept in a single JSON object on disk.
///
/// Writes land in a sibling temp file, created owner-only, that is renamed over
/// the target, so a reader in another process sees either the previous or the
/// new snapshot.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), write_lock: Mutex::new(()) }
    }

    /// Callers hold `write_lock`.
    async fn load(&self) -> Result<HashMap<String, String>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(entries) => Ok(entries),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "Session file is corrupt, removing it");
                self.persist(&HashMap::new()).await?;
                Ok(HashMap::new())
            }
        }
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return match tokio::fs::remove_file(&self.path).await {
                Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let file_name = self.path.file_name().map_or_else(|| "session".into(), |name| name.to_string_lossy());
        let tmp = self.path.with_file_name(format!(".{file_name}.{}.tmp", Uuid::new_v4()));

        let bytes = serde_json::to_vec(entries)?;

        let written = async {
            write_private(&tmp, &bytes).await?;
            tokio::fs::rename(&tmp, &self.path).await
        }
        .await;
        if let Err(e) = written {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await
                && cleanup.kind() != std::io::ErrorKind::NotFound
            {
                tracing::warn!(path = %tmp.display(), error = %cleanup, "Failed to remove session temp file");
            }
            return Err(e.into());
        }
        Ok(())
    }
}

/// Creates `path` readable by the owner only before any secret is written to it.
async fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut options = tokio::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    options.mode(0o600);

    let mut file = options.open(path).await?;
    file.write_all(bytes).await?;
    file.sync_all().await
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, String>, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        Ok(keys.iter().filter_map(|&key| entries.remove_entry(key)).collect())
    }

    async fn set_many(&self, values: &[(&str, String)]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        for (key, value) in values {
            entries.insert((*key).to_string(), value.clone());
        }
        self.persist(&entries).await
    }

    async fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        let before = entries.len();
        entries.retain(|key, _| !keys.contains(&key.as_str()));
        if entries.len() == before {
            return Ok(());
        }
        self.persist(&entries).await
    }

    async fn remove_if(&self, guard_key: &str, expected: Option<&str>, keys: &[&str]) -> Result<bool, StoreError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load().await?;
        if entries.get(guard_key).map(String::as_str) != expected {
            return Ok(false);
        }
        let before = entries.len();
        entries.retain(|key, _| !keys.contains(&key.as_str()));
        if entries.len() != before {
            self.persist(&entries).await?;
        }
        Ok(true)
    }
}
