//! Store-level operations: open, list and delete named stores.

use super::connection::CacheDb;
use super::entries::StoreHandle;
use crate::Error;
use tokio_rusqlite::params;

impl CacheDb {
    /// Handle to the store named `name` without touching the database.
    ///
    /// The store row is created lazily by the first `put`.
    pub fn store(&self, name: &str) -> StoreHandle {
        StoreHandle::new(self.clone(), name.to_string())
    }

    /// Open the store named `name`, creating it if absent.
    pub async fn open_store(&self, name: &str) -> Result<StoreHandle, Error> {
        let owned = name.to_string();
        let created_at = chrono::Utc::now().to_rfc3339();
        let inserted = self
            .conn
            .call(move |conn| -> Result<usize, Error> {
                let count = conn.execute(
                    "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
                    params![owned, created_at],
                )?;
                Ok(count)
            })
            .await
            .map_err(Error::from)?;

        if inserted > 0 {
            tracing::info!(store = name, "created cache store");
        }

        Ok(self.store(name))
    }

    /// Whether a store with this name exists.
    pub async fn has_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Names of every store in the database, oldest first.
    pub async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM stores ORDER BY created_at ASC, name ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a store and every entry in it.
    ///
    /// Returns false if no store had that name.
    pub async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::{RequestDescriptor, Response};
    use url::Url;

    #[tokio::test]
    async fn test_open_store_idempotent() {
        let db = CacheDb::open_in_memory().await.unwrap();
        db.open_store("cache-v1").await.unwrap();
        db.open_store("cache-v1").await.unwrap();

        assert_eq!(db.store_names().await.unwrap(), vec!["cache-v1".to_string()]);
    }

    #[tokio::test]
    async fn test_store_handle_is_lazy() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let _handle = db.store("cache-v1");
        assert!(!db.has_store("cache-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_store_cascades_entries() {
        let db = CacheDb::open_in_memory().await.unwrap();
        let store = db.open_store("cache-v1").await.unwrap();
        let req = RequestDescriptor::get(Url::parse("https://app.test/scan").unwrap());
        store.put(&req, &Response::text(200, "scan")).await.unwrap();

        assert!(db.delete_store("cache-v1").await.unwrap());
        assert!(!db.delete_store("cache-v1").await.unwrap());

        let count: i64 = db
            .conn
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0)))
            .await
            .unwrap();
        assert_eq!(count, 0);
    }
}
