use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

use crate::error::StoreError;

/// Durable string key-value storage grouped into namespaces.
///
/// Mirrors a platform preference bag: every value is an opaque string and
/// writes replace the previous value wholesale.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError>;
    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError>;
}

/// In-memory store for tests and ephemeral deployments.
#[derive(Default)]
pub struct InMemoryStore {
    values: Mutex<HashMap<(String, String), String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        let guard = self.values.lock().await;
        Ok(guard.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        self.values
            .lock()
            .await
            .insert((namespace.to_string(), key.to_string()), value);
        Ok(())
    }
}

/// File-backed store: one JSON object per namespace inside `dir`.
///
/// Writes go to a temporary sibling first, which is fsynced and renamed
/// into place before the directory itself is fsynced. A crash mid-write
/// leaves the previous document intact.
pub struct FileStore {
    dir: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            lock: Mutex::new(()),
        })
    }

    fn namespace_path(&self, namespace: &str) -> PathBuf {
        let safe: String = namespace
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
            .collect();
        self.dir.join(format!("{}.json", safe))
    }

    async fn load_namespace(&self, path: &Path) -> Result<HashMap<String, String>, StoreError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(err) => Err(err.into()),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        let _guard = self.lock.lock().await;
        let mut values = self.load_namespace(&self.namespace_path(namespace)).await?;
        Ok(values.remove(key))
    }

    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;
        let path = self.namespace_path(namespace);
        let mut values = self.load_namespace(&path).await?;
        values.insert(key.to_string(), value);

        let tmp = path.with_extension("json.tmp");
        {
            let mut file = tokio::fs::File::create(&tmp).await?;
            file.write_all(&serde_json::to_vec(&values)?).await?;
            file.sync_all().await?;
        }
        tokio::fs::rename(&tmp, &path).await?;
        fsync_dir(&self.dir).await
    }
}

#[cfg(unix)]
async fn fsync_dir(dir: &Path) -> Result<(), StoreError> {
    tokio::fs::File::open(dir).await?.sync_all().await?;
    Ok(())
}

// Directories cannot be opened for syncing here; the rename is as durable
// as the platform makes it.
#[cfg(not(unix))]
async fn fsync_dir(_dir: &Path) -> Result<(), StoreError> {
    Ok(())
}
