use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::domain::{AwardRecord, BadgeId, UserId};
use crate::config::LedgerConfig;

/// Result of a conditional award attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AwardOutcome {
    pub granted: bool,
    pub record: Option<AwardRecord>,
}

impl AwardOutcome {
    pub fn granted(record: AwardRecord) -> Self {
        Self {
            granted: true,
            record: Some(record),
        }
    }

    pub fn already_held() -> Self {
        Self {
            granted: false,
            record: None,
        }
    }
}

/// Error enumeration for ledger failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("award ledger unavailable: {0}")]
    Unavailable(String),
}

/// Durable record of awarded badges.
///
/// `try_award` must be an atomic insert-if-absent against shared storage: when
/// several workers race on the same `(user, badge)`, exactly one observes
/// `granted = true`.
pub trait AwardLedger: Send + Sync {
    fn has_award(&self, user_id: &UserId, badge_id: &BadgeId) -> Result<bool, LedgerError>;
    fn held(&self, user_id: &UserId) -> Result<BTreeSet<BadgeId>, LedgerError>;
    fn awards_for(&self, user_id: &UserId) -> Result<Vec<AwardRecord>, LedgerError>;
    fn try_award(
        &self,
        user_id: &UserId,
        badge_id: &BadgeId,
        awarded_at: DateTime<Utc>,
    ) -> Result<AwardOutcome, LedgerError>;
}

const SCHEMA: &str = "CREATE TABLE IF NOT EXISTS badge_awards (
    user_id TEXT NOT NULL,
    badge_id TEXT NOT NULL,
    awarded_at TEXT NOT NULL,
    PRIMARY KEY (user_id, badge_id)
);";

/// SQLite-backed ledger. The composite primary key arbitrates concurrent awards,
/// so separate connections (or processes) sharing one database file stay consistent.
pub struct SqliteAwardLedger {
    db: Mutex<Connection>,
}

impl SqliteAwardLedger {
    pub fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, LedgerError> {
        let path = path.as_ref();
        let db = Connection::open(path).map_err(unavailable)?;
        db.busy_timeout(busy_timeout).map_err(unavailable)?;
        db.execute_batch("PRAGMA journal_mode=WAL;")
            .map_err(unavailable)?;
        let ledger = Self::initialize(db)?;
        info!(path = %path.display(), "award ledger opened");
        Ok(ledger)
    }

    pub fn from_config(config: &LedgerConfig) -> Result<Self, LedgerError> {
        Self::open(&config.path, config.busy_timeout)
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        let db = Connection::open_in_memory().map_err(unavailable)?;
        Self::initialize(db)
    }

    fn initialize(db: Connection) -> Result<Self, LedgerError> {
        db.execute_batch(SCHEMA).map_err(unavailable)?;
        Ok(Self { db: Mutex::new(db) })
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>, LedgerError> {
        self.db
            .lock()
            .map_err(|_| LedgerError::Unavailable("ledger connection poisoned".to_string()))
    }
}

impl AwardLedger for SqliteAwardLedger {
    fn has_award(&self, user_id: &UserId, badge_id: &BadgeId) -> Result<bool, LedgerError> {
        let db = self.connection()?;
        let found = db
            .query_row(
                "SELECT 1 FROM badge_awards WHERE user_id = ?1 AND badge_id = ?2",
                params![user_id.0, badge_id.0],
                |_| Ok(()),
            )
            .optional()
            .map_err(unavailable)?;
        Ok(found.is_some())
    }

    fn held(&self, user_id: &UserId) -> Result<BTreeSet<BadgeId>, LedgerError> {
        let db = self.connection()?;
        let mut stmt = db
            .prepare_cached("SELECT badge_id FROM badge_awards WHERE user_id = ?1")
            .map_err(unavailable)?;
        let rows = stmt
            .query_map([&user_id.0], |row| row.get::<_, String>(0))
            .map_err(unavailable)?;

        let mut held = BTreeSet::new();
        for badge_id in rows {
            held.insert(BadgeId(badge_id.map_err(unavailable)?));
        }
        Ok(held)
    }

    fn awards_for(&self, user_id: &UserId) -> Result<Vec<AwardRecord>, LedgerError> {
        let db = self.connection()?;
        let mut stmt = db
            .prepare_cached(
                "SELECT badge_id, awarded_at FROM badge_awards
                 WHERE user_id = ?1
                 ORDER BY awarded_at, badge_id",
            )
            .map_err(unavailable)?;
        let rows = stmt
            .query_map([&user_id.0], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(unavailable)?;

        let mut records = Vec::new();
        for row in rows {
            let (badge_id, awarded_at) = row.map_err(unavailable)?;
            records.push(AwardRecord {
                user_id: user_id.clone(),
                badge_id: BadgeId(badge_id),
                awarded_at: parse_timestamp(&awarded_at)?,
            });
        }
        Ok(records)
    }

    fn try_award(
        &self,
        user_id: &UserId,
        badge_id: &BadgeId,
        awarded_at: DateTime<Utc>,
    ) -> Result<AwardOutcome, LedgerError> {
        let db = self.connection()?;
        let changed = db
            .execute(
                "INSERT INTO badge_awards (user_id, badge_id, awarded_at)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(user_id, badge_id) DO NOTHING",
                params![user_id.0, badge_id.0, format_timestamp(awarded_at)],
            )
            .map_err(unavailable)?;

        if changed == 1 {
            debug!(user = %user_id, badge = %badge_id, "award recorded");
            Ok(AwardOutcome::granted(AwardRecord {
                user_id: user_id.clone(),
                badge_id: badge_id.clone(),
                awarded_at,
            }))
        } else {
            Ok(AwardOutcome::already_held())
        }
    }
}

fn unavailable(err: rusqlite::Error) -> LedgerError {
    LedgerError::Unavailable(err.to_string())
}

// Fixed-width nanosecond timestamps keep lexical order equal to time order.
fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|err| LedgerError::Unavailable(format!("corrupt award timestamp '{raw}': {err}")))
}
