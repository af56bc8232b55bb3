//! SQLite snapshot reader.
//!
//! RULE: Only the store talks to the database.
//! Computation modules take validated model types and never execute SQL.
//! Every row is range-checked on the way out; a bad row is an error here,
//! never a silent clamp further down.

use crate::{
    error::{EngineError, EngineResult},
    model::{Organization, Regulator},
};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};

mod risk;
mod submission;

pub struct AnalyticsStore {
    conn: Connection,
}

impl AnalyticsStore {
    /// Open for writing, creating the file if needed. Used to build snapshots.
    pub fn open(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_CREATE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        // WAL mode only for real files (shared-memory and :memory: ignore it).
        let _ = conn.execute_batch("PRAGMA journal_mode=WAL;");
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Open an existing snapshot without touching it: no file is created and
    /// the journal mode is left as found.
    pub fn open_read_only(path: &str) -> EngineResult<Self> {
        let conn = Connection::open_with_flags(
            path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY | rusqlite::OpenFlags::SQLITE_OPEN_URI,
        )?;
        Ok(Self { conn })
    }

    /// Open a private in-memory database (used in tests).
    pub fn in_memory() -> EngineResult<Self> {
        let conn = Connection::open(":memory:")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Ok(Self { conn })
    }

    /// Apply the snapshot schema.
    pub fn migrate(&self) -> EngineResult<()> {
        self.conn
            .execute_batch(include_str!("../../../migrations/001_snapshot.sql"))?;
        Ok(())
    }

    // ── Regulators and organizations ───────────────────────────

    pub fn insert_regulator(&self, regulator: &Regulator) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO regulator (regulator_id, code, name) VALUES (?1, ?2, ?3)",
            params![regulator.regulator_id, regulator.code, regulator.name],
        )?;
        Ok(())
    }

    pub fn insert_organization(&self, org: &Organization) -> EngineResult<()> {
        self.conn.execute(
            "INSERT INTO organization (organization_id, name, institution_type)
             VALUES (?1, ?2, ?3)",
            params![org.organization_id, org.name, org.institution_type],
        )?;
        Ok(())
    }

    pub fn assign_organization(&self, regulator_id: &str, organization_id: &str) -> EngineResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO organization_regulator (regulator_id, organization_id)
             VALUES (?1, ?2)",
            params![regulator_id, organization_id],
        )?;
        Ok(())
    }

    pub fn regulator_by_code(&self, code: &str) -> EngineResult<Option<Regulator>> {
        let regulator = self
            .conn
            .query_row(
                "SELECT regulator_id, code, name FROM regulator WHERE code = ?1",
                params![code],
                |row| {
                    Ok(Regulator {
                        regulator_id: row.get(0)?,
                        code:         row.get(1)?,
                        name:         row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(regulator)
    }

    /// Organizations assigned to a regulator, ordered by name then id.
    pub fn assigned_organizations(&self, regulator_id: &str) -> EngineResult<Vec<Organization>> {
        let mut stmt = self.conn.prepare(
            "SELECT o.organization_id, o.name, o.institution_type
             FROM organization o
             JOIN organization_regulator a ON a.organization_id = o.organization_id
             WHERE a.regulator_id = ?1
             ORDER BY o.name ASC, o.organization_id ASC",
        )?;
        let orgs = stmt
            .query_map(params![regulator_id], |row| {
                Ok(Organization {
                    organization_id:  row.get(0)?,
                    name:             row.get(1)?,
                    institution_type: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(orgs)
    }
}

// ── Column decoding helpers ────────────────────────────────────

pub(crate) fn parse_timestamp(field: &'static str, value: &str) -> EngineResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| EngineError::InvalidTimestamp { field, value: value.to_string() })
}

pub(crate) fn parse_date(field: &'static str, value: &str) -> EngineResult<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| EngineError::InvalidTimestamp { field, value: value.to_string() })
}
