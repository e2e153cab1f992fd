#[cfg(feature = "redis")]
use async_trait::async_trait;
#[cfg(feature = "redis")]
use redis::AsyncCommands;

#[cfg(feature = "redis")]
use crate::error::StoreError;
#[cfg(feature = "redis")]
use crate::storage::KeyValueStore;

/// Redis-backed store: each namespace is a hash under `<prefix>:<namespace>`.
#[cfg(feature = "redis")]
pub struct RedisStore {
    client: redis::Client,
    prefix: String,
}

#[cfg(feature = "redis")]
impl RedisStore {
    pub fn new(client: redis::Client, prefix: impl Into<String>) -> Self {
        Self {
            client,
            prefix: prefix.into(),
        }
    }

    fn hash_key(&self, namespace: &str) -> String {
        format!("{}:{}", self.prefix, namespace)
    }
}

#[cfg(feature = "redis")]
fn backend(err: redis::RedisError) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[cfg(feature = "redis")]
#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.client.get_tokio_connection().await.map_err(backend)?;
        conn.hget(self.hash_key(namespace), key).await.map_err(backend)
    }

    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        let mut conn = self.client.get_tokio_connection().await.map_err(backend)?;
        conn.hset::<_, _, _, ()>(self.hash_key(namespace), key, value)
            .await
            .map_err(backend)
    }
}
