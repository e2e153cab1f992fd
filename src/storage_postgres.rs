#[cfg(feature = "postgres")]
use async_trait::async_trait;
#[cfg(feature = "postgres")]
use tokio_postgres::Client;

#[cfg(feature = "postgres")]
use crate::error::StoreError;
#[cfg(feature = "postgres")]
use crate::storage::KeyValueStore;

#[cfg(feature = "postgres")]
pub struct PostgresStore {
    client: Client,
}

#[cfg(feature = "postgres")]
fn backend(err: tokio_postgres::Error) -> StoreError {
    StoreError::Backend(err.to_string())
}

#[cfg(feature = "postgres")]
impl PostgresStore {
    pub async fn new(client: Client) -> Result<Self, tokio_postgres::Error> {
        client
            .execute(
                "CREATE TABLE IF NOT EXISTS sms_relay_kv (
                    namespace TEXT NOT NULL,
                    key TEXT NOT NULL,
                    value TEXT NOT NULL,
                    PRIMARY KEY (namespace, key)
                )",
                &[],
            )
            .await?;

        Ok(Self { client })
    }
}

#[cfg(feature = "postgres")]
#[async_trait]
impl KeyValueStore for PostgresStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<String>, StoreError> {
        let row = self.client
            .query_opt(
                "SELECT value FROM sms_relay_kv WHERE namespace = $1 AND key = $2",
                &[&namespace, &key],
            )
            .await
            .map_err(backend)?;

        match row {
            Some(row) => row.try_get::<_, String>(0).map(Some).map_err(backend),
            None => Ok(None),
        }
    }

    async fn put(&self, namespace: &str, key: &str, value: String) -> Result<(), StoreError> {
        self.client
            .execute(
                "INSERT INTO sms_relay_kv (namespace, key, value)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (namespace, key) DO UPDATE SET value = EXCLUDED.value",
                &[&namespace, &key, &value],
            )
            .await
            .map_err(backend)?;
        Ok(())
    }
}
