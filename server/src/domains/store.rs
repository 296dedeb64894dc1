//! Versioned domain settings storage (SQLite).
//!
//! Every write appends a new row to the `domains` table; rows are never
//! updated. The newest row of a user (by `created_at`, then `id`) is the
//! current blob. Retention removes old rows in bulk via [`BlobStore::sweep`].

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::sync::MutexGuard;
use thiserror::Error;

use crate::db::models::VersionRow;
use crate::db::DbPool;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("DB lock error: {0}")]
    Lock(String),

    #[error("User id must not be empty")]
    InvalidUser,
}

/// Which rows survive a retention sweep regardless of their age.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RetentionScope {
    /// Keep only the single newest row of the whole store.
    #[default]
    Global,
    /// Keep the newest row of every user.
    PerUser,
}

/// Handle to the blob history. Cheap to clone; all clones share one connection.
#[derive(Clone)]
pub struct BlobStore {
    db: DbPool,
}

impl BlobStore {
    pub fn new(db: DbPool) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.db.lock().map_err(|e| StoreError::Lock(e.to_string()))
    }

    /// Append a new version for `user_id` and return its row id.
    ///
    /// The stored timestamp is the current time, raised to the newest
    /// timestamp already in the table so `created_at` never decreases.
    pub fn write(&self, user_id: &str, data: &[u8]) -> Result<i64, StoreError> {
        check_user(user_id)?;
        let now = Utc::now().timestamp_micros();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO domains (userid, created_at, data)
             VALUES (?1, MAX(?2, COALESCE((SELECT MAX(created_at) FROM domains), 0)), ?3)",
            rusqlite::params![user_id, now, data],
        )?;
        let id = conn.last_insert_rowid();

        tracing::debug!("Stored version {} for {} ({} bytes)", id, user_id, data.len());
        Ok(id)
    }

    /// Return the payload of the newest version, or `None` if the user has none.
    pub fn read_latest(&self, user_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        check_user(user_id)?;
        let conn = self.conn()?;
        let data = conn
            .query_row(
                "SELECT data FROM domains WHERE userid = ?1
                 ORDER BY created_at DESC, id DESC LIMIT 1",
                [user_id],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(data)
    }

    /// List metadata of every version of `user_id`, oldest first.
    pub fn list_versions(&self, user_id: &str) -> Result<Vec<VersionRow>, StoreError> {
        check_user(user_id)?;
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, created_at, length(data) FROM domains WHERE userid = ?1
             ORDER BY created_at ASC, id ASC",
        )?;
        let rows = stmt
            .query_map([user_id], |row| {
                Ok(VersionRow {
                    id: row.get(0)?,
                    created_at: row.get(1)?,
                    size: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Delete every version of `user_id`. Returns the number of rows removed.
    pub fn delete_all(&self, user_id: &str) -> Result<usize, StoreError> {
        check_user(user_id)?;
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM domains WHERE userid = ?1", [user_id])?;
        Ok(deleted)
    }

    /// Delete every row created before `cutoff`, except the newest row of
    /// the store (or of each user, for [`RetentionScope::PerUser`]).
    ///
    /// Returns the number of rows removed.
    pub fn sweep(&self, cutoff: DateTime<Utc>, scope: RetentionScope) -> Result<usize, StoreError> {
        let cutoff = cutoff.timestamp_micros();
        let conn = self.conn()?;

        let deleted = match scope {
            RetentionScope::Global => conn.execute(
                "DELETE FROM domains
                 WHERE created_at < ?1
                   AND id <> (SELECT id FROM domains ORDER BY created_at DESC, id DESC LIMIT 1)",
                [cutoff],
            )?,
            RetentionScope::PerUser => conn.execute(
                "DELETE FROM domains
                 WHERE created_at < ?1
                   AND EXISTS (
                       SELECT 1 FROM domains newer
                       WHERE newer.userid = domains.userid
                         AND (newer.created_at > domains.created_at
                              OR (newer.created_at = domains.created_at AND newer.id > domains.id))
                   )",
                [cutoff],
            )?,
        };

        Ok(deleted)
    }
}

fn check_user(user_id: &str) -> Result<(), StoreError> {
    if user_id.is_empty() {
        return Err(StoreError::InvalidUser);
    }
    Ok(())
}

/// Render a stored `created_at` value as RFC 3339 with microseconds.
pub fn format_timestamp(micros: i64) -> String {
    DateTime::<Utc>::from_timestamp_micros(micros)
        .unwrap_or_default()
        .to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}
