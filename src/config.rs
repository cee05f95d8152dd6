//! Configuration for opening an [`EdgeStore`] and for bulk writes.
//!
//! ```rust
//! use edgestore::{StoreConfig, open_store};
//!
//! let mut cfg = StoreConfig::default();
//! cfg.sqlite
//!     .pragma_settings
//!     .insert("synchronous".to_string(), "NORMAL".to_string());
//! cfg.batch.max_batch_size = 500;
//! let store = open_store(":memory:", &cfg)?;
//! # Ok::<(), edgestore::StoreError>(())
//! ```

use std::collections::HashMap;
use std::path::Path;

use crate::errors::StoreError;
use crate::store::{BatchConfig, EdgeStore, InsertMode};

/// Options specific to the SQLite connection.
#[derive(Clone, Debug, Default)]
pub struct SqliteConfig {
    /// Skip pending schema migrations when opening an existing database.
    pub without_migrations: bool,

    /// Prepared statement cache capacity; `None` keeps the store default (128).
    pub cache_size: Option<usize>,

    /// Extra PRAGMAs applied after the connection is opened, e.g. `journal_mode = WAL`.
    /// A PRAGMA that SQLite rejects fails the open with a connection error.
    pub pragma_settings: HashMap<String, String>,
}

/// Complete store configuration.
#[derive(Clone, Debug, Default)]
pub struct StoreConfig {
    pub sqlite: SqliteConfig,
    pub batch: BatchConfig,
    pub insert_mode: InsertMode,
}

impl StoreConfig {
    /// Configuration that rejects re-imported ids instead of skipping them.
    pub fn strict() -> Self {
        Self {
            insert_mode: InsertMode::Strict,
            ..Self::default()
        }
    }

    pub fn with_batch_size(mut self, max_batch_size: usize) -> Self {
        self.batch.max_batch_size = max_batch_size;
        self
    }
}

/// Opens a store at `path`; `":memory:"` opens a private in-memory database.
pub fn open_store<P: AsRef<Path>>(path: P, cfg: &StoreConfig) -> Result<EdgeStore, StoreError> {
    EdgeStore::open_with_config(path, cfg)
}
