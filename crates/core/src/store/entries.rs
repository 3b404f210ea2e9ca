//! Namespace and entry operations.
//!
//! A namespace exists once it has been opened (explicitly or by a write) and
//! until it is deleted. Deleting a namespace removes all of its entries.

use super::connection::CacheDb;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

/// A response as it is held in the store and served back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl StoredResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, headers: Vec::new(), body: body.into() }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Synthetic plain-text 503 used for offline fallbacks.
    pub fn unavailable(body: &str) -> Self {
        Self::new(503, body).with_header("content-type", "text/plain; charset=utf-8")
    }
}

impl CacheDb {
    pub async fn has_namespace(&self, identifier: &str) -> Result<bool, Error> {
        let identifier = identifier.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM namespaces WHERE identifier = ?1)",
                    params![identifier],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Identifiers of every existing namespace, oldest first.
    pub async fn namespace_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT identifier FROM namespaces ORDER BY created_at, identifier")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a namespace and all of its entries.
    ///
    /// Returns whether the namespace existed.
    pub async fn delete_namespace(&self, identifier: &str) -> Result<bool, Error> {
        let identifier = identifier.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                conn.execute("DELETE FROM entries WHERE namespace = ?1", params![identifier])?;
                let removed = conn.execute("DELETE FROM namespaces WHERE identifier = ?1", params![identifier])?;
                Ok(removed > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Insert or replace a single entry, opening the namespace if needed.
    pub async fn put_entry(&self, namespace: &str, key: &str, response: &StoredResponse) -> Result<(), Error> {
        let batch = vec![(key.to_string(), response.clone())];
        self.put_entries(namespace, batch).await
    }

    /// Insert or replace a batch of entries in one transaction.
    ///
    /// Either every entry is written or none is.
    pub async fn put_entries(&self, namespace: &str, entries: Vec<(String, StoredResponse)>) -> Result<(), Error> {
        let namespace = namespace.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO namespaces (identifier, created_at) VALUES (?1, ?2)",
                    params![namespace, now],
                )?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO entries (namespace, key, status, headers_json, body, stored_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                         ON CONFLICT(namespace, key) DO UPDATE SET
                            status = excluded.status,
                            headers_json = excluded.headers_json,
                            body = excluded.body,
                            stored_at = excluded.stored_at",
                    )?;
                    for (key, response) in &entries {
                        let headers_json = serde_json::to_string(&response.headers)?;
                        stmt.execute(params![namespace, key, response.status, headers_json, response.body, now])?;
                    }
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Look up an entry by exact key.
    pub async fn get_entry(&self, namespace: &str, key: &str) -> Result<Option<StoredResponse>, Error> {
        let namespace = namespace.to_string();
        let key = key.to_string();
        self.conn
            .call(move |conn| -> Result<Option<StoredResponse>, Error> {
                let result = conn.query_row(
                    "SELECT status, headers_json, body FROM entries WHERE namespace = ?1 AND key = ?2",
                    params![namespace, key],
                    |row| Ok((row.get::<_, u16>(0)?, row.get::<_, String>(1)?, row.get::<_, Vec<u8>>(2)?)),
                );

                match result {
                    Ok((status, headers_json, body)) => {
                        let headers = serde_json::from_str(&headers_json)?;
                        Ok(Some(StoredResponse { status, headers, body }))
                    }
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    /// Keys stored in a namespace, sorted.
    pub async fn keys(&self, namespace: &str) -> Result<Vec<String>, Error> {
        let namespace = namespace.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT key FROM entries WHERE namespace = ?1 ORDER BY key")?;
                let keys = stmt
                    .query_map(params![namespace], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(keys)
            })
            .await
            .map_err(Error::from)
    }
}
