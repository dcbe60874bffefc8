//! SQLite-backed `CacheStorage`.
//!
//! Stores are rows in `cache_stores`; entries cascade-delete with their store.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheDb;
use super::{CacheStorage, RequestKey, ResponseSnapshot};
use crate::Error;

type HeaderPairs = Vec<(String, String)>;

fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_error(idx: usize, err: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(err))
}

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open_store(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![name, now_rfc3339()],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn get(&self, store: &str, key: &RequestKey) -> Result<Option<ResponseSnapshot>, Error> {
        let store = store.to_string();
        let key_hash = key.hash();
        self.conn
            .call(move |conn| -> Result<Option<ResponseSnapshot>, Error> {
                let mut stmt = conn.prepare(
                    "SELECT status_code, headers_json, body, fetched_at
                     FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2",
                )?;

                let result = stmt.query_row(params![store, key_hash], |row| {
                    let headers_json: String = row.get(1)?;
                    let headers: HeaderPairs =
                        serde_json::from_str(&headers_json).map_err(|e| conversion_error(1, e))?;
                    let body: Vec<u8> = row.get(2)?;
                    let fetched_at: String = row.get(3)?;
                    let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
                        .map_err(|e| conversion_error(3, e))?
                        .with_timezone(&Utc);

                    Ok(ResponseSnapshot { status: row.get(0)?, headers, body: body.into(), fetched_at })
                });

                match result {
                    Ok(s) => Ok(Some(s)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }

    async fn put(&self, store: &str, key: &RequestKey, snapshot: &ResponseSnapshot) -> Result<(), Error> {
        let store = store.to_string();
        let key_hash = key.hash();
        let url = key.to_string();
        let headers_json =
            serde_json::to_string(&snapshot.headers).map_err(|e| Error::CacheWrite(format!("headers: {e}")))?;
        let body = snapshot.body.to_vec();
        let status = snapshot.status;
        let fetched_at = snapshot.fetched_at.to_rfc3339_opts(SecondsFormat::Nanos, true);

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_at) VALUES (?1, ?2)",
                    params![store, now_rfc3339()],
                )?;
                tx.execute(
                    "INSERT INTO cache_entries (store_name, key_hash, url, status_code, headers_json, body, fetched_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                     ON CONFLICT(store_name, key_hash) DO UPDATE SET
                         url = excluded.url,
                         status_code = excluded.status_code,
                         headers_json = excluded.headers_json,
                         body = excluded.body,
                         fetched_at = excluded.fetched_at",
                    params![store, key_hash, url, status, headers_json, body, fetched_at],
                )
                .map_err(|e| Error::CacheWrite(e.to_string()))?;
                tx.commit().map_err(|e| Error::CacheWrite(e.to_string()))?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn store_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY name")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete_store(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let deleted = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(deleted > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn entry_count(&self, store: &str) -> Result<u64, Error> {
        let store = store.to_string();
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }

    async fn trim(&self, store: &str, max_entries: usize) -> Result<u64, Error> {
        let store = store.to_string();
        let max = max_entries as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count: i64 =
                    conn.query_row("SELECT COUNT(*) FROM cache_entries WHERE store_name = ?1", params![store], |row| {
                        row.get(0)
                    })?;
                if count <= max {
                    return Ok(0);
                }

                let deleted = conn.execute(
                    "DELETE FROM cache_entries WHERE store_name = ?1 AND key_hash IN (
                        SELECT key_hash FROM cache_entries WHERE store_name = ?1
                        ORDER BY fetched_at ASC LIMIT ?2
                    )",
                    params![store, count - max],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}
