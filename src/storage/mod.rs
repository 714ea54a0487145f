//! DuckDB-backed key/value cache with expiry, plus a log of screening runs.
//!
//! Keys are namespaced: `companies:<exchange>`, `financials:<ticker>`,
//! `industry:averages`. Values are stored as JSON text.

use anyhow::{anyhow, Context, Result};
use chrono::{Duration, NaiveDateTime, Utc};
use duckdb::{params, Connection, OptionalExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

// ── Schema ────────────────────────────────────────────────────────────────────

const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key         VARCHAR PRIMARY KEY,
    namespace   VARCHAR NOT NULL,
    value       VARCHAR NOT NULL,
    stored_at   TIMESTAMP NOT NULL,
    expires_at  TIMESTAMP NOT NULL
);

CREATE SEQUENCE IF NOT EXISTS screen_run_ids START 1;

CREATE TABLE IF NOT EXISTS screen_runs (
    id                  BIGINT PRIMARY KEY DEFAULT nextval('screen_run_ids'),
    started_at          TIMESTAMP NOT NULL,
    finished_at         TIMESTAMP,
    status              VARCHAR NOT NULL DEFAULT 'running',
    exchanges           VARCHAR NOT NULL DEFAULT '',
    companies_considered BIGINT DEFAULT 0,
    companies_passed    BIGINT DEFAULT 0,
    errors              BIGINT DEFAULT 0
);

CREATE TABLE IF NOT EXISTS schema_version (
    version     INTEGER PRIMARY KEY,
    applied_at  TIMESTAMP NOT NULL
);
"#;

const INDEXES: &str = r#"
CREATE INDEX IF NOT EXISTS idx_cache_namespace ON cache_entries (namespace);
CREATE INDEX IF NOT EXISTS idx_cache_expiry    ON cache_entries (expires_at);
"#;

// ── Keys ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheKey {
    Companies(String),
    Financials(String),
    IndustryAverages,
}

impl CacheKey {
    pub fn namespace(&self) -> &'static str {
        match self {
            Self::Companies(_) => "companies",
            Self::Financials(_) => "financials",
            Self::IndustryAverages => "industry",
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Companies(exchange) => write!(f, "companies:{}", exchange),
            Self::Financials(ticker) => write!(f, "financials:{}", ticker),
            Self::IndustryAverages => f.write_str("industry:averages"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: NaiveDateTime,
    pub status: String,
    pub exchanges: String,
    pub companies_considered: i64,
    pub companies_passed: i64,
    pub errors: i64,
}

// ── Cache ─────────────────────────────────────────────────────────────────────

pub struct Cache {
    conn: Mutex<Connection>,
    ttl: Duration,
}

impl Cache {
    pub fn open(path: &Path, ttl_hours: i64) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Could not create dir {:?}", parent))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open DuckDB at {:?}", path))?;
        Ok(Self {
            conn: Mutex::new(conn),
            ttl: Duration::hours(ttl_hours),
        })
    }

    pub fn open_in_memory(ttl_hours: i64) -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            ttl: Duration::hours(ttl_hours),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| anyhow!("cache connection lock poisoned"))
    }

    pub fn run_migrations(&self) -> Result<()> {
        info!("Running migrations…");
        let conn = self.conn()?;
        conn.execute_batch(DDL).context("DDL failed")?;
        conn.execute_batch(INDEXES).context("Index creation failed")?;
        conn.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at) VALUES (1, ?)",
            params![Utc::now().naive_utc()],
        )?;
        info!("Migrations done.");
        Ok(())
    }

    // ── Entries ───────────────────────────────────────────────────────────────

    /// Live value for `key`; expired or undecodable entries read as a miss.
    pub fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Result<Option<T>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT value FROM cache_entries WHERE key = ? AND expires_at > ?")?;
        let raw: Option<String> = stmt
            .query_row(params![key.to_string(), Utc::now().naive_utc()], |r| r.get(0))
            .optional()
            .with_context(|| format!("read {}", key))?;

        let Some(raw) = raw else {
            debug!("cache miss {}", key);
            return Ok(None);
        };
        match serde_json::from_str(&raw) {
            Ok(v) => Ok(Some(v)),
            Err(e) => {
                warn!("Discarding unreadable cache entry {}: {}", key, e);
                Ok(None)
            }
        }
    }

    /// Store `value` under `key` for the configured TTL.
    pub fn set<T: Serialize>(&self, key: &CacheKey, value: &T) -> Result<()> {
        let now = Utc::now().naive_utc();
        self.set_until(key, value, now, now + self.ttl)
    }

    fn set_until<T: Serialize>(
        &self,
        key: &CacheKey,
        value: &T,
        stored_at: NaiveDateTime,
        expires_at: NaiveDateTime,
    ) -> Result<()> {
        let json = serde_json::to_string(value).with_context(|| format!("encode {}", key))?;
        self.conn()?
            .execute(
                r#"INSERT INTO cache_entries (key, namespace, value, stored_at, expires_at)
                   VALUES (?, ?, ?, ?, ?)
                   ON CONFLICT (key) DO UPDATE SET
                       value      = excluded.value,
                       stored_at  = excluded.stored_at,
                       expires_at = excluded.expires_at"#,
                params![key.to_string(), key.namespace(), json, stored_at, expires_at],
            )
            .with_context(|| format!("store {}", key))?;
        Ok(())
    }

    pub fn clear(&self) -> Result<usize> {
        Ok(self.conn()?.execute("DELETE FROM cache_entries", [])?)
    }

    pub fn purge_expired(&self) -> Result<usize> {
        Ok(self.conn()?.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?",
            params![Utc::now().naive_utc()],
        )?)
    }

    pub fn entry_count(&self) -> Result<i64> {
        Ok(self.conn()?.query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE expires_at > ?",
            params![Utc::now().naive_utc()],
            |r| r.get(0),
        )?)
    }

    /// Live entries per namespace.
    pub fn namespace_counts(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT namespace, COUNT(*) FROM cache_entries WHERE expires_at > ? GROUP BY namespace ORDER BY namespace",
        )?;
        let rows = stmt
            .query_map(params![Utc::now().naive_utc()], |r| Ok((r.get(0)?, r.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();
        Ok(rows)
    }

    // ── Run log ───────────────────────────────────────────────────────────────

    pub fn begin_run(&self, exchanges: &str) -> Result<i64> {
        let id: i64 = self.conn()?.query_row(
            "INSERT INTO screen_runs (started_at, status, exchanges) VALUES (?, 'running', ?) RETURNING id",
            params![Utc::now().naive_utc(), exchanges],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn finish_run(&self, run_id: i64, considered: usize, passed: usize, errors: usize) -> Result<()> {
        self.conn()?.execute(
            r#"UPDATE screen_runs SET
               finished_at = ?, status = ?,
               companies_considered = ?, companies_passed = ?, errors = ?
               WHERE id = ?"#,
            params![
                Utc::now().naive_utc(),
                if errors == 0 { "success" } else { "partial" },
                considered as i64,
                passed as i64,
                errors as i64,
                run_id,
            ],
        )?;
        Ok(())
    }

    pub fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"SELECT id, started_at, status, exchanges,
                      companies_considered, companies_passed, errors
               FROM screen_runs ORDER BY id DESC LIMIT ?"#,
        )?;
        let runs = stmt
            .query_map(params![limit as i64], |r| {
                Ok(RunRecord {
                    id: r.get(0)?,
                    started_at: r.get(1)?,
                    status: r.get(2)?,
                    exchanges: r.get(3)?,
                    companies_considered: r.get(4)?,
                    companies_passed: r.get(5)?,
                    errors: r.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();
        Ok(runs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculations::PeerPool;
    use crate::models::Company;

    fn cache() -> Cache {
        let cache = Cache::open_in_memory(24).unwrap();
        cache.run_migrations().unwrap();
        cache
    }

    #[test]
    fn test_key_format() {
        assert_eq!(CacheKey::Companies("oslo".into()).to_string(), "companies:oslo");
        assert_eq!(CacheKey::Financials("EQNR.OL".into()).to_string(), "financials:EQNR.OL");
        assert_eq!(CacheKey::IndustryAverages.to_string(), "industry:averages");
    }

    #[test]
    fn test_set_then_get() {
        let cache = cache();
        let key = CacheKey::Companies("oslo".into());
        let companies = vec![Company::new("EQNR", "Equinor", "oslo", ".OL")];

        assert!(cache.get::<Vec<Company>>(&key).unwrap().is_none());
        cache.set(&key, &companies).unwrap();
        assert_eq!(cache.get::<Vec<Company>>(&key).unwrap(), Some(companies));
    }

    #[test]
    fn test_set_overwrites() {
        let cache = cache();
        let key = CacheKey::IndustryAverages;

        let mut pool = PeerPool::new();
        pool.add_company(Some("Banks"), None, Some(9.0));
        cache.set(&key, &pool.finalize()).unwrap();

        let mut pool = PeerPool::new();
        pool.add_company(Some("Banks"), None, Some(11.0));
        let latest = pool.finalize();
        cache.set(&key, &latest).unwrap();

        let stored: crate::calculations::PeerAverages = cache.get(&key).unwrap().unwrap();
        assert_eq!(stored, latest);
    }

    #[test]
    fn test_expired_entries_are_misses() {
        let cache = cache();
        let key = CacheKey::Financials("DNB.OL".into());
        let past = Utc::now().naive_utc() - Duration::hours(48);
        cache.set_until(&key, &42, past, past + Duration::hours(24)).unwrap();

        assert_eq!(cache.get::<i32>(&key).unwrap(), None);
        assert_eq!(cache.purge_expired().unwrap(), 1);
    }

    #[test]
    fn test_clear_and_counts() {
        let cache = cache();
        cache.set(&CacheKey::Companies("oslo".into()), &1).unwrap();
        cache.set(&CacheKey::Financials("A.OL".into()), &2).unwrap();
        cache.set(&CacheKey::Financials("B.OL".into()), &3).unwrap();

        let counts = cache.namespace_counts().unwrap();
        assert_eq!(counts, vec![("companies".to_string(), 1), ("financials".to_string(), 2)]);
        assert_eq!(cache.entry_count().unwrap(), 3);

        assert_eq!(cache.clear().unwrap(), 3);
        assert!(cache.namespace_counts().unwrap().is_empty());
    }

    #[test]
    fn test_run_log() {
        let cache = cache();
        let first = cache.begin_run("oslo").unwrap();
        cache.finish_run(first, 120, 4, 0).unwrap();
        let second = cache.begin_run("oslo,stockholm").unwrap();
        cache.finish_run(second, 300, 9, 2).unwrap();
        assert!(second > first);

        let runs = cache.recent_runs(10).unwrap();
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].id, second);
        assert_eq!(runs[0].status, "partial");
        assert_eq!(runs[0].companies_passed, 9);
        assert_eq!(runs[1].status, "success");
    }
}
