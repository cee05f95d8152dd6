//! Embedded SQLite store for Wikidata-style statement edges with typed literal values.
//!
//! Statements are `(id, node1, label, node2)` edges; `node2` carries a packed literal
//! (quantity, date, string, coordinate or symbol) whose decoded fields live in one satellite
//! table per data type. Qualifiers are edges whose `node1` is another edge's id. On top of
//! that the crate assembles observation queries with one optional join per requested
//! qualifier, and converts between flat and exploded tab-separated files.
//!
//! Run Criterion benchmarks with `cargo bench` to inspect reports under `target/criterion`.

pub mod bulk;
pub mod client;
pub mod config;
pub mod errors;
pub mod literal;
pub mod metadata;
pub mod qualifier;
pub mod query;
pub mod region;
pub mod safety;
pub mod schema;
pub mod store;
pub mod tsv;
pub mod vocab;

pub use crate::bulk::{ExplodeOptions, ExplodeReport, ExplodedRow, FlatRow, RowError};
pub use crate::config::{SqliteConfig, StoreConfig, open_store};
pub use crate::errors::StoreError;
pub use crate::literal::{DataType, Literal, ValidationError, ValidationErrorKind};
pub use crate::metadata::{DatasetMetadata, QualifierProperty, VariableMetadata};
pub use crate::qualifier::{Qualifier, QualifierType};
pub use crate::query::{ObservationRow, PlaceFilter, QueryPlan};
pub use crate::region::{Region, RegionCache};
pub use crate::safety::{SafetyError, SafetyReport};
pub use crate::store::{
    BatchConfig, Edge, EdgeStore, EdgeValue, ImportStats, InsertMode, StatementRecord,
    TransactionGuard,
};
