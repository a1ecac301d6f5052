//! Entry operations on a single named store.
//!
//! Entries are keyed by the canonical request URL. A put to an existing
//! key replaces the stored response, so repeated puts never produce
//! duplicates.

use super::connection::CacheDb;
use super::hash::compute_entry_key;
use crate::Error;
use crate::canonical::without_query;
use crate::request::{Headers, RequestDescriptor, Response};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;
use url::Url;

/// Status code for partial content, which a store never holds.
const PARTIAL_CONTENT: u16 = 206;

/// Options for [`StoreHandle::match_request`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Compare URLs without their query strings.
    pub ignore_query: bool,
}

impl MatchOptions {
    pub const IGNORE_QUERY: Self = Self { ignore_query: true };
}

/// Handle to one named store.
///
/// Cheap to clone. Holding a handle does not keep the store alive: if the
/// store is deleted, lookups miss and the next put recreates it.
#[derive(Clone, Debug)]
pub struct StoreHandle {
    db: CacheDb,
    name: String,
}

type RawEntry = (u16, String, Vec<u8>);

impl StoreHandle {
    pub(crate) fn new(db: CacheDb, name: String) -> Self {
        Self { db, name }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up the stored response for `request`.
    ///
    /// With `ignore_query`, any entry whose URL differs only in the query
    /// string qualifies; the most recently stored one wins.
    pub async fn match_request(
        &self, request: &RequestDescriptor, options: MatchOptions,
    ) -> Result<Option<Response>, Error> {
        if options.ignore_query {
            self.match_ignoring_query(request.url()).await
        } else {
            self.match_url(request.url()).await
        }
    }

    /// Exact lookup by URL.
    pub async fn match_url(&self, url: &Url) -> Result<Option<Response>, Error> {
        let store = self.name.clone();
        let key = compute_entry_key("GET", url.as_str());
        let raw = self
            .db
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let result = conn.query_row(
                    "SELECT status_code, headers_json, body FROM entries
                     WHERE store_name = ?1 AND key_hash = ?2",
                    params![store, key],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                );

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode_entry).transpose()
    }

    async fn match_ignoring_query(&self, url: &Url) -> Result<Option<Response>, Error> {
        let store = self.name.clone();
        let stripped = without_query(url).to_string();
        let raw = self
            .db
            .conn
            .call(move |conn| -> Result<Option<RawEntry>, Error> {
                let result = conn.query_row(
                    "SELECT status_code, headers_json, body FROM entries
                     WHERE store_name = ?1 AND url_no_query = ?2
                     ORDER BY stored_at DESC, rowid DESC
                     LIMIT 1",
                    params![store, stripped],
                    |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
                );

                match result {
                    Ok(entry) => Ok(Some(entry)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode_entry).transpose()
    }

    /// Store a copy of `response` keyed by the request URL.
    ///
    /// Uses UPSERT semantics: the last completed write for a URL wins.
    pub async fn put(&self, request: &RequestDescriptor, response: &Response) -> Result<(), Error> {
        if response.status == PARTIAL_CONTENT {
            return Err(Error::Uncacheable(response.status));
        }

        let headers_json = serde_json::to_string(&response.headers).map_err(|e| Error::CorruptEntry(e.to_string()))?;
        let store = self.name.clone();
        let url = request.url().to_string();
        let url_no_query = without_query(request.url()).to_string();
        let key = compute_entry_key("GET", &url);
        let status = response.status;
        let body = response.body.to_vec();
        let now = chrono::Utc::now();
        let created_at = now.to_rfc3339();
        let stored_at = now.to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);

        self.db
            .conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO stores (name, created_at) VALUES (?1, ?2)",
                    params![store, created_at],
                )?;
                tx.execute(
                    "INSERT INTO entries (
                        store_name, key_hash, url, url_no_query, status_code, headers_json, body, stored_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                    ON CONFLICT(store_name, key_hash) DO UPDATE SET
                        url = excluded.url,
                        url_no_query = excluded.url_no_query,
                        status_code = excluded.status_code,
                        headers_json = excluded.headers_json,
                        body = excluded.body,
                        stored_at = excluded.stored_at",
                    params![store, key, url, url_no_query, status, headers_json, body, stored_at],
                )?;
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Remove the entry stored for `url`.
    ///
    /// Returns false if there was none.
    pub async fn delete(&self, url: &Url) -> Result<bool, Error> {
        let store = self.name.clone();
        let key = compute_entry_key("GET", url.as_str());
        self.db
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE store_name = ?1 AND key_hash = ?2",
                    params![store, key],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs of every entry in this store, in insertion order.
    pub async fn keys(&self) -> Result<Vec<String>, Error> {
        let store = self.name.clone();
        self.db
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE store_name = ?1 ORDER BY rowid ASC")?;
                let urls = stmt
                    .query_map(params![store], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }
}

fn decode_entry((status, headers_json, body): RawEntry) -> Result<Response, Error> {
    let headers: Headers = serde_json::from_str(&headers_json).map_err(|e| Error::CorruptEntry(e.to_string()))?;
    Ok(Response::new(status, headers, body))
}
