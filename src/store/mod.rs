//! SQLite-backed edge store: one `edges` table plus one satellite table per data type.

mod edge_ops;
mod types;

use std::path::Path;

use rusqlite::Connection;

use crate::{
    config::StoreConfig,
    errors::StoreError,
    schema::{self, AppliedMigration, MigrationReport},
};

pub use edge_ops::{BatchConfig, ImportStats, InsertMode, execute_batch};
pub use types::{Edge, EdgeValue, StatementRecord, StringValue, SymbolValue};

pub(crate) use types::{EDGE_COLUMNS, edge_from_row, satellite_table};

const DEFAULT_STATEMENT_CACHE: usize = 128;

/// Embedded statement store.
pub struct EdgeStore {
    conn: Connection,
    batch: BatchConfig,
    insert_mode: InsertMode,
}

fn is_in_memory_connection(conn: &Connection) -> bool {
    match conn.pragma_query_value(None, "database_list", |row| {
        let name: String = row.get(2)?;
        Ok(name)
    }) {
        Ok(file) => file.is_empty(),
        Err(_) => true,
    }
}

impl EdgeStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_config(path, &StoreConfig::default())
    }

    pub fn open_without_migrations<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let mut cfg = StoreConfig::default();
        cfg.sqlite.without_migrations = true;
        Self::open_with_config(path, &cfg)
    }

    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn =
            Connection::open_in_memory().map_err(|e| StoreError::connection(e.to_string()))?;
        Self::from_connection(conn, &StoreConfig::default())
    }

    pub fn open_with_config<P: AsRef<Path>>(path: P, cfg: &StoreConfig) -> Result<Self, StoreError> {
        let conn = Connection::open(path).map_err(|e| StoreError::connection(e.to_string()))?;
        Self::from_connection(conn, cfg)
    }

    fn from_connection(conn: Connection, cfg: &StoreConfig) -> Result<Self, StoreError> {
        conn.set_prepared_statement_cache_capacity(
            cfg.sqlite.cache_size.unwrap_or(DEFAULT_STATEMENT_CACHE),
        );

        if !is_in_memory_connection(&conn) {
            if conn.pragma_update(None, "journal_mode", "WAL").is_err() {
                let _ = conn.pragma_update(None, "journal_mode", "DELETE");
            }
            let _ = conn.pragma_update(None, "synchronous", "NORMAL");
            let _ = conn.pragma_update(None, "temp_store", "MEMORY");
        }
        let mut pragmas: Vec<_> = cfg.sqlite.pragma_settings.iter().collect();
        pragmas.sort();
        for (name, value) in pragmas {
            conn.pragma_update(None, name, value)
                .map_err(|e| StoreError::connection(format!("PRAGMA {name}={value}: {e}")))?;
        }

        if cfg.sqlite.without_migrations {
            schema::ensure_schema_without_migrations(&conn)?;
        } else {
            schema::ensure_schema(&conn)?;
        }

        Ok(Self {
            conn,
            batch: cfg.batch.clone(),
            insert_mode: cfg.insert_mode,
        })
    }

    /// Raw connection, for ad hoc reads.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn batch_config(&self) -> &BatchConfig {
        &self.batch
    }

    pub fn insert_mode(&self) -> InsertMode {
        self.insert_mode
    }

    pub fn schema_version(&self) -> Result<i64, StoreError> {
        schema::read_schema_version(&self.conn)
    }

    pub fn run_pending_migrations(&self, dry_run: bool) -> Result<MigrationReport, StoreError> {
        schema::run_pending_migrations(&self.conn, dry_run)
    }

    pub fn migration_history(&self) -> Result<Vec<AppliedMigration>, StoreError> {
        schema::migration_history(&self.conn)
    }
}

/// Rolls the transaction back unless it was committed.
pub struct TransactionGuard<'a> {
    conn: &'a Connection,
    committed: bool,
}

impl<'a> TransactionGuard<'a> {
    /// Starts an IMMEDIATE transaction so the write lock is taken up front.
    pub fn new(conn: &'a Connection) -> Result<Self, StoreError> {
        conn.execute("BEGIN IMMEDIATE", [])
            .map_err(|e| StoreError::transaction(e.to_string()))?;
        Ok(Self {
            conn,
            committed: false,
        })
    }

    pub fn conn(&self) -> &'a Connection {
        self.conn
    }

    pub fn commit(mut self) -> Result<(), StoreError> {
        self.conn
            .execute("COMMIT", [])
            .map_err(|e| StoreError::transaction(e.to_string()))?;
        self.committed = true;
        Ok(())
    }

    /// Runs `f` inside the transaction, committing on success.
    pub fn execute<F, R>(self, f: F) -> Result<R, StoreError>
    where
        F: FnOnce(&'a Connection) -> Result<R, StoreError>,
    {
        let result = f(self.conn)?;
        self.commit()?;
        Ok(result)
    }
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.committed {
            let _ = self.conn.execute("ROLLBACK", []);
        }
    }
}
