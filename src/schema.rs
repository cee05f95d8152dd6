use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

use crate::errors::StoreError;

pub const BASE_SCHEMA_VERSION: i64 = 1;

struct MigrationStep {
    target_version: i64,
    statements: &'static [&'static str],
}

const MIGRATION_STEPS: &[MigrationStep] = &[MigrationStep {
    target_version: 2,
    statements: &["CREATE INDEX IF NOT EXISTS idx_edges_node2 ON edges(node2)"],
}];

pub const SCHEMA_VERSION: i64 = BASE_SCHEMA_VERSION + MIGRATION_STEPS.len() as i64;

/// Satellite tables, one per stored data type.
pub const SATELLITE_TABLES: [&str; 5] = ["strings", "dates", "quantities", "coordinates", "symbols"];

/// One applied migration step, as recorded in `store_meta_history`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedMigration {
    pub version: i64,
    pub applied_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationReport {
    pub from_version: i64,
    pub to_version: i64,
    pub statements: Vec<&'static str>,
    pub dry_run: bool,
}

pub fn ensure_schema(conn: &Connection) -> Result<(), StoreError> {
    ensure_base_schema(conn)?;
    ensure_meta(conn)?;
    run_pending_migrations(conn, false)?;
    Ok(())
}

pub fn ensure_schema_without_migrations(conn: &Connection) -> Result<(), StoreError> {
    ensure_base_schema(conn)?;
    ensure_meta(conn)?;
    Ok(())
}

fn ensure_base_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        r#"
        PRAGMA foreign_keys = ON;
        CREATE TABLE IF NOT EXISTS edges (
            id        TEXT PRIMARY KEY,
            node1     TEXT NOT NULL,
            label     TEXT NOT NULL,
            node2     TEXT NOT NULL,
            data_type TEXT NOT NULL CHECK (
                data_type IN ('string', 'date_and_time', 'quantity', 'coordinate', 'symbol')
            )
        );
        CREATE TABLE IF NOT EXISTS strings (
            edge_id  TEXT PRIMARY KEY REFERENCES edges(id) ON DELETE CASCADE,
            text     TEXT NOT NULL,
            language TEXT
        );
        CREATE TABLE IF NOT EXISTS dates (
            edge_id       TEXT PRIMARY KEY REFERENCES edges(id) ON DELETE CASCADE,
            date_and_time TEXT NOT NULL,
            precision     INTEGER,
            calendar      TEXT
        );
        CREATE TABLE IF NOT EXISTS quantities (
            edge_id        TEXT PRIMARY KEY REFERENCES edges(id) ON DELETE CASCADE,
            number         NOT NULL,
            unit           TEXT,
            low_tolerance  REAL,
            high_tolerance REAL
        );
        CREATE TABLE IF NOT EXISTS coordinates (
            edge_id   TEXT PRIMARY KEY REFERENCES edges(id) ON DELETE CASCADE,
            latitude  REAL NOT NULL,
            longitude REAL NOT NULL,
            precision REAL
        );
        CREATE TABLE IF NOT EXISTS symbols (
            edge_id TEXT PRIMARY KEY REFERENCES edges(id) ON DELETE CASCADE,
            symbol  TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_edges_node1_label ON edges(node1, label);
        CREATE INDEX IF NOT EXISTS idx_edges_label_node2 ON edges(label, node2);
        CREATE TABLE IF NOT EXISTS store_meta (
            id INTEGER PRIMARY KEY CHECK (id = 1),
            schema_version INTEGER NOT NULL
        );
        CREATE TABLE IF NOT EXISTS store_meta_history (
            version    INTEGER NOT NULL,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )
    .map_err(|e| StoreError::schema(e.to_string()))
}

pub fn read_schema_version(conn: &Connection) -> Result<i64, StoreError> {
    conn.query_row(
        "SELECT schema_version FROM store_meta WHERE id=1",
        [],
        |row| row.get(0),
    )
    .map_err(|e| StoreError::schema(e.to_string()))
}

pub fn run_pending_migrations(
    conn: &Connection,
    dry_run: bool,
) -> Result<MigrationReport, StoreError> {
    let current = read_schema_version(conn)?;
    let pending: Vec<&MigrationStep> = MIGRATION_STEPS
        .iter()
        .filter(|step| step.target_version > current)
        .collect();
    let target = pending.last().map_or(current, |step| step.target_version);
    let statements: Vec<&'static str> = pending
        .iter()
        .flat_map(|step| step.statements.iter().copied())
        .collect();
    if pending.is_empty() || dry_run {
        return Ok(MigrationReport {
            from_version: current,
            to_version: target,
            statements,
            dry_run,
        });
    }
    conn.execute("BEGIN IMMEDIATE", [])
        .map_err(|e| StoreError::schema(e.to_string()))?;
    let result: Result<(), StoreError> = (|| {
        for step in &pending {
            for sql in step.statements {
                conn.execute(sql, [])
                    .map_err(|e| StoreError::schema(e.to_string()))?;
            }
            conn.execute(
                "INSERT INTO store_meta_history(version) VALUES(?1)",
                [step.target_version],
            )
            .map_err(|e| StoreError::schema(e.to_string()))?;
        }
        conn.execute(
            "UPDATE store_meta SET schema_version=?1 WHERE id=1",
            [target],
        )
        .map_err(|e| StoreError::schema(e.to_string()))?;
        Ok(())
    })();
    match result {
        Ok(()) => {
            conn.execute("COMMIT", [])
                .map_err(|e| StoreError::schema(e.to_string()))?;
        }
        Err(err) => {
            let _ = conn.execute("ROLLBACK", []);
            return Err(err);
        }
    }
    tracing::info!(from = current, to = target, "schema migrated");
    Ok(MigrationReport {
        from_version: current,
        to_version: target,
        statements,
        dry_run,
    })
}

/// Applied migration steps, oldest first.
pub fn migration_history(conn: &Connection) -> Result<Vec<AppliedMigration>, StoreError> {
    let mut stmt = conn
        .prepare("SELECT version, applied_at FROM store_meta_history ORDER BY rowid")
        .map_err(|e| StoreError::schema(e.to_string()))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(AppliedMigration {
                version: row.get(0)?,
                applied_at: row.get(1)?,
            })
        })
        .map_err(|e| StoreError::schema(e.to_string()))?;
    let mut history = Vec::new();
    for row in rows {
        history.push(row.map_err(|e| StoreError::schema(e.to_string()))?);
    }
    Ok(history)
}

fn ensure_meta(conn: &Connection) -> Result<(), StoreError> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT schema_version FROM store_meta WHERE id=1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(|e| StoreError::schema(e.to_string()))?;
    match version {
        Some(existing) => {
            if existing > SCHEMA_VERSION {
                return Err(StoreError::schema(format!(
                    "database schema version {existing} is newer than supported {SCHEMA_VERSION}"
                )));
            }
            if existing < BASE_SCHEMA_VERSION {
                conn.execute(
                    "UPDATE store_meta SET schema_version=?1 WHERE id=1",
                    [BASE_SCHEMA_VERSION],
                )
                .map_err(|e| StoreError::schema(e.to_string()))?;
            }
        }
        None => {
            conn.execute(
                "INSERT INTO store_meta(id, schema_version) VALUES(1, ?1)",
                [BASE_SCHEMA_VERSION],
            )
            .map_err(|e| StoreError::schema(e.to_string()))?;
        }
    }
    Ok(())
}
