//! Local credential cache backed by an embedded SQLite file.
//!
//! Each row maps a username to a JSON record holding a salted argon2 verifier
//! and the timestamp of the last successful RADIUS verification. The cache is
//! purely an optimization: any uncertainty here falls back to a fresh remote
//! verification, never to granting access.

use anyhow::{anyhow, Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::{
    path::Path,
    sync::{Mutex, MutexGuard},
    time::Duration,
};
use tracing::warn;

const SQL_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS users (
    username TEXT PRIMARY KEY,
    record   TEXT NOT NULL
)";
const SQL_SELECT: &str = "SELECT record FROM users WHERE username = ?1";
const SQL_UPSERT: &str = "INSERT OR REPLACE INTO users (username, record) VALUES (?1, ?2)";
const SQL_DELETE: &str = "DELETE FROM users WHERE username = ?1";
const SQL_SCAN: &str = "SELECT username, record FROM users";

/// Stored value for one verified credential. The verifier is a PHC-formatted
/// argon2 hash; the plaintext password is never persisted.
#[derive(Debug, Serialize, Deserialize)]
struct Record {
    verifier: String,
    verified_at: u64,
}

/// Result of a cache lookup. `Invalid` does not evict the entry: a wrong
/// password attempt must not discard a still-valid credential.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CacheLookup {
    Valid,
    Invalid,
    NotFound,
    Expired,
}

/// Result of a delete, returned by value rather than inferred from errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteOutcome {
    Deleted,
    NotFound,
}

/// Username-keyed credential cache with TTL expiry.
///
/// Every operation runs as a single storage transaction on one connection;
/// the expiry eviction inside [`CredentialCache::lookup`] is deliberately a
/// second, independent transaction so it can only ever delete, never clobber
/// a concurrent replacement.
pub struct CredentialCache {
    conn: Mutex<Connection>,
    ttl: Duration,
}

impl CredentialCache {
    /// Open (or create) the cache file and its `users` table.
    ///
    /// # Errors
    /// Returns an error if the file cannot be opened or the schema cannot be
    /// created.
    pub fn open(path: impl AsRef<Path>, ttl: Duration) -> Result<Self> {
        let conn = Connection::open(path).context("failed to open credential cache")?;
        Self::with_connection(conn, ttl)
    }

    /// In-memory cache, used by tests.
    ///
    /// # Errors
    /// Returns an error if the schema cannot be created.
    pub fn in_memory(ttl: Duration) -> Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory cache")?;
        Self::with_connection(conn, ttl)
    }

    fn with_connection(conn: Connection, ttl: Duration) -> Result<Self> {
        conn.execute_batch(SQL_SCHEMA)
            .context("failed to create users table")?;
        Ok(Self {
            conn: Mutex::new(conn),
            ttl,
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("credential cache lock poisoned"))
    }

    /// Check `password` against the cached entry for `username`.
    ///
    /// A TTL of zero disables caching entirely: the lookup short-circuits to
    /// `NotFound` without touching storage.
    ///
    /// # Errors
    /// Returns an error on storage failure; callers must treat that as a
    /// miss and fall back to remote verification.
    pub fn lookup(&self, username: &str, password: &str) -> Result<CacheLookup> {
        self.lookup_at(username, password, now_unix())
    }

    fn lookup_at(&self, username: &str, password: &str, now: u64) -> Result<CacheLookup> {
        if self.ttl.is_zero() {
            return Ok(CacheLookup::NotFound);
        }

        let raw: Option<String> = {
            let conn = self.conn()?;
            conn.query_row(SQL_SELECT, [username], |row| row.get(0))
                .optional()
                .context("failed to read cache entry")?
        };

        let Some(raw) = raw else {
            return Ok(CacheLookup::NotFound);
        };

        let record: Record =
            serde_json::from_str(&raw).context("failed to decode cache record")?;

        let verifier = PasswordHash::new(&record.verifier)
            .map_err(|err| anyhow!("failed to parse stored verifier: {err}"))?;
        if Argon2::default()
            .verify_password(password.as_bytes(), &verifier)
            .is_err()
        {
            return Ok(CacheLookup::Invalid);
        }

        let age = Duration::from_secs(now.saturating_sub(record.verified_at));
        if age > self.ttl {
            // Evict in its own transaction; a failure here only means the
            // next lookup re-verifies remotely again.
            if let Err(err) = self.delete(username) {
                warn!(username, %err, "failed to evict expired cache entry");
            }
            return Ok(CacheLookup::Expired);
        }

        Ok(CacheLookup::Valid)
    }

    /// Replace the entry for `username` with a fresh salted verifier stamped
    /// at `now`. No-op when caching is disabled.
    ///
    /// # Errors
    /// Returns an error if hashing or the write fails.
    pub fn store(&self, username: &str, password: &str, now: u64) -> Result<()> {
        if self.ttl.is_zero() {
            return Ok(());
        }

        let salt = SaltString::generate(&mut OsRng);
        let verifier = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|err| anyhow!("failed to hash password: {err}"))?
            .to_string();
        let record = serde_json::to_string(&Record {
            verifier,
            verified_at: now,
        })
        .context("failed to encode cache record")?;

        let conn = self.conn()?;
        conn.execute(SQL_UPSERT, rusqlite::params![username, record])
            .context("failed to write cache entry")?;
        Ok(())
    }

    /// Remove the entry for `username`. Absence is not an error.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn delete(&self, username: &str) -> Result<DeleteOutcome> {
        let conn = self.conn()?;
        let changed = conn
            .execute(SQL_DELETE, [username])
            .context("failed to delete cache entry")?;
        if changed == 0 {
            Ok(DeleteOutcome::NotFound)
        } else {
            Ok(DeleteOutcome::Deleted)
        }
    }

    /// Delete every entry strictly older than `max_age` and return the count.
    ///
    /// Runs once at startup, before the listener binds, so the full-table
    /// scan never competes with live traffic. Records that no longer decode
    /// count as infinitely old.
    ///
    /// # Errors
    /// Returns an error on storage failure.
    pub fn purge_expired(&self, max_age: Duration) -> Result<usize> {
        self.purge_expired_at(max_age, now_unix())
    }

    fn purge_expired_at(&self, max_age: Duration, now: u64) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .context("failed to begin purge transaction")?;

        let mut doomed = Vec::new();
        {
            let mut stmt = tx.prepare(SQL_SCAN).context("failed to scan cache")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .context("failed to scan cache")?;
            for row in rows {
                let (username, raw) = row.context("failed to read cache row")?;
                let age = match serde_json::from_str::<Record>(&raw) {
                    Ok(record) => Duration::from_secs(now.saturating_sub(record.verified_at)),
                    Err(_) => Duration::MAX,
                };
                if age > max_age {
                    doomed.push(username);
                }
            }
        }

        for username in &doomed {
            tx.execute(SQL_DELETE, [username])
                .context("failed to delete expired entry")?;
        }
        tx.commit().context("failed to commit purge")?;

        Ok(doomed.len())
    }

    /// Storage reachability check for the health endpoint.
    ///
    /// # Errors
    /// Returns an error if the underlying database cannot be queried.
    pub fn ping(&self) -> Result<()> {
        let conn = self.conn()?;
        conn.query_row("SELECT 1", [], |_row| Ok(()))
            .context("credential cache is unreachable")?;
        Ok(())
    }
}

/// Current unix timestamp in seconds.
pub(crate) fn now_unix() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock before unix epoch")
        .as_secs()
}
