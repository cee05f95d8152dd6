use std::collections::BTreeMap;

use ahash::AHashSet;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::ToSql};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{
    EdgeStore, TransactionGuard,
    types::{
        EDGE_COLUMNS, Edge, EdgeValue, StatementRecord, edge_from_row, satellite_table,
        value_from_row, value_select_sql,
    },
};
use crate::{errors::StoreError, literal::DataType, vocab};

/// What to do when an imported edge id already exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// Skip the existing id and keep going.
    #[default]
    Idempotent,
    /// Fail with [`StoreError::ImportConflict`] and roll the batch back.
    Strict,
}

/// Configuration for batch operations
#[derive(Clone, Debug)]
pub struct BatchConfig {
    pub max_batch_size: usize,
    pub enable_chunking: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 10_000,
            enable_chunking: true,
        }
    }
}

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER`.
const MAX_BOUND_PARAMS: usize = 32_766;

const EDGE_INSERT_COLUMNS: [&str; 5] = ["id", "node1", "label", "node2", "data_type"];

impl BatchConfig {
    /// Chunking for one multi-row statement per chunk: chunks are always on and capped so
    /// a chunk of `params_per_row` wide rows stays within the bound-parameter limit.
    pub fn per_statement(&self, params_per_row: usize) -> BatchConfig {
        let cap = (MAX_BOUND_PARAMS / params_per_row.max(1)).max(1);
        BatchConfig {
            max_batch_size: self.max_batch_size.clamp(1, cap),
            enable_chunking: true,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportStats {
    pub edges_inserted: usize,
    pub edges_skipped: usize,
    pub values_inserted: usize,
}

/// Execute a batch operation with automatic chunking for large datasets
pub fn execute_batch<T, F, R>(
    items: &[T],
    config: &BatchConfig,
    mut operation: F,
) -> Result<Vec<R>, StoreError>
where
    F: FnMut(&[T]) -> Result<Vec<R>, StoreError>,
{
    if !config.enable_chunking || items.len() <= config.max_batch_size.max(1) {
        return operation(items);
    }

    let mut all_results = Vec::with_capacity(items.len());
    for (index, chunk) in items.chunks(config.max_batch_size.max(1)).enumerate() {
        debug!(chunk = index, rows = chunk.len(), "processing chunk");
        all_results.extend(operation(chunk)?);
    }
    Ok(all_results)
}

impl EdgeStore {
    /// Imports `records` in one transaction using the store's [`BatchConfig`].
    ///
    /// Edges are written first, then the satellite rows of the newly inserted edges,
    /// grouped by data type. Any failure rolls back the whole call.
    pub fn insert_batch(
        &self,
        records: &[StatementRecord],
        mode: InsertMode,
    ) -> Result<ImportStats, StoreError> {
        if records.is_empty() {
            return Ok(ImportStats::default());
        }
        for record in records {
            validate_record(record)?;
        }

        let config = self.batch_config();
        let stats = TransactionGuard::new(self.connection())?
            .execute(|conn| insert_records(conn, records, mode, config))?;

        info!(
            inserted = stats.edges_inserted,
            skipped = stats.edges_skipped,
            values = stats.values_inserted,
            "import batch committed"
        );
        Ok(stats)
    }

    /// Replaces the edges of `node` carrying any of `predicates` with `records`, in one
    /// transaction. Existing edges whose id is not among `records` are deleted together
    /// with their sub-statements; records already stored are skipped in either insert mode.
    pub fn replace_statements(
        &self,
        node: &str,
        predicates: &[&str],
        records: &[StatementRecord],
    ) -> Result<ImportStats, StoreError> {
        for record in records {
            validate_record(record)?;
        }
        let config = self.batch_config();
        let (removed, stats) = TransactionGuard::new(self.connection())?.execute(|conn| {
            prepare_doomed(conn)?;
            {
                let mut stmt = conn
                    .prepare_cached(
                        "INSERT OR IGNORE INTO temp.doomed_edges(id) \
                         SELECT id FROM edges WHERE node1 = ?1 AND label = ?2",
                    )
                    .map_err(|e| StoreError::query(e.to_string()))?;
                for predicate in predicates {
                    stmt.execute(params![node, predicate])
                        .map_err(|e| StoreError::query(e.to_string()))?;
                }
            }
            {
                let mut stmt = conn
                    .prepare_cached("DELETE FROM temp.doomed_edges WHERE id = ?1")
                    .map_err(|e| StoreError::query(e.to_string()))?;
                for record in records {
                    stmt.execute([&record.edge.id])
                        .map_err(|e| StoreError::query(e.to_string()))?;
                }
            }
            let removed = purge_doomed(conn)?;
            let stats = insert_records(conn, records, InsertMode::Idempotent, config)?;
            Ok((removed, stats))
        })?;
        info!(
            node,
            removed,
            inserted = stats.edges_inserted,
            skipped = stats.edges_skipped,
            "statements replaced"
        );
        Ok(stats)
    }

    /// Deletes the given edges and every sub-statement attached to them (edges whose
    /// `node1` is one of the ids). Returns the number of edge rows removed.
    pub fn delete_by_id_set(&self, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let removed = TransactionGuard::new(self.connection())?.execute(|conn| {
            prepare_doomed(conn)?;
            let mut stmt = conn
                .prepare_cached("INSERT OR IGNORE INTO temp.doomed_edges(id) VALUES(?1)")
                .map_err(|e| StoreError::query(e.to_string()))?;
            for id in ids {
                stmt.execute([id])
                    .map_err(|e| StoreError::query(e.to_string()))?;
            }
            purge_doomed(conn)
        })?;
        info!(requested = ids.len(), removed, "edges deleted");
        Ok(removed)
    }

    /// Deletes every observation of `properties` that belongs to `dataset`, together with
    /// its qualifier and dataset sub-statements.
    pub fn delete_observations(
        &self,
        dataset: &str,
        properties: &[String],
    ) -> Result<usize, StoreError> {
        if properties.is_empty() {
            return Ok(0);
        }
        let removed = TransactionGuard::new(self.connection())?.execute(|conn| {
            prepare_doomed(conn)?;
            let mut stmt = conn
                .prepare_cached(
                    "INSERT OR IGNORE INTO temp.doomed_edges(id) \
                     SELECT e.id FROM edges AS e \
                     JOIN edges AS d ON d.node1 = e.id AND d.label = ?1 \
                     WHERE d.node2 = ?2 AND e.label = ?3",
                )
                .map_err(|e| StoreError::query(e.to_string()))?;
            for property in properties {
                stmt.execute(params![vocab::DATASET, dataset, property])
                    .map_err(|e| StoreError::query(e.to_string()))?;
            }
            purge_doomed(conn)
        })?;
        info!(dataset, properties = ?properties, removed, "observations deleted");
        Ok(removed)
    }

    pub fn lookup_by_subject_predicate(
        &self,
        node1: &str,
        label: &str,
    ) -> Result<Vec<Edge>, StoreError> {
        let mut stmt = self
            .connection()
            .prepare_cached(&format!(
                "SELECT {EDGE_COLUMNS} FROM edges WHERE node1=?1 AND label=?2 ORDER BY id"
            ))
            .map_err(|e| StoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![node1, label], edge_from_row)
            .map_err(|e| StoreError::query(e.to_string()))?;
        let mut edges = Vec::new();
        for row in rows {
            edges.push(row.map_err(|e| StoreError::query(e.to_string()))?);
        }
        Ok(edges)
    }

    /// Edges with their satellite values, for `(node1, label)`.
    pub fn statements_by_subject_predicate(
        &self,
        node1: &str,
        label: &str,
    ) -> Result<Vec<StatementRecord>, StoreError> {
        self.lookup_by_subject_predicate(node1, label)?
            .into_iter()
            .map(|edge| self.attach_value(edge))
            .collect()
    }

    /// Subjects carrying `label` with the exact canonical `node2`.
    pub fn subjects_with(&self, label: &str, node2: &str) -> Result<Vec<String>, StoreError> {
        let mut stmt = self
            .connection()
            .prepare_cached("SELECT DISTINCT node1 FROM edges WHERE label=?1 AND node2=?2 ORDER BY node1")
            .map_err(|e| StoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![label, node2], |row| row.get::<_, String>(0))
            .map_err(|e| StoreError::query(e.to_string()))?;
        let mut subjects = Vec::new();
        for row in rows {
            subjects.push(row.map_err(|e| StoreError::query(e.to_string()))?);
        }
        Ok(subjects)
    }

    pub fn get_edge(&self, id: &str) -> Result<Edge, StoreError> {
        self.connection()
            .prepare_cached(&format!("SELECT {EDGE_COLUMNS} FROM edges WHERE id=?1"))
            .map_err(|e| StoreError::query(e.to_string()))?
            .query_row([id], edge_from_row)
            .optional()
            .map_err(|e| StoreError::query(e.to_string()))?
            .ok_or_else(|| StoreError::not_found(format!("edge {id}")))
    }

    /// The satellite value of `edge_id`; `None` when the edge exists but has no value row.
    pub fn get_value(&self, edge_id: &str) -> Result<Option<EdgeValue>, StoreError> {
        let edge = self.get_edge(edge_id)?;
        read_value(self.connection(), edge.data_type, &edge.id)
    }

    pub fn get_statement(&self, id: &str) -> Result<StatementRecord, StoreError> {
        let edge = self.get_edge(id)?;
        self.attach_value(edge)
    }

    /// Every statement in id order.
    pub fn all_statements(&self) -> Result<Vec<StatementRecord>, StoreError> {
        let edges = {
            let mut stmt = self
                .connection()
                .prepare_cached(&format!("SELECT {EDGE_COLUMNS} FROM edges ORDER BY id"))
                .map_err(|e| StoreError::query(e.to_string()))?;
            let rows = stmt
                .query_map([], edge_from_row)
                .map_err(|e| StoreError::query(e.to_string()))?;
            let mut edges = Vec::new();
            for row in rows {
                edges.push(row.map_err(|e| StoreError::query(e.to_string()))?);
            }
            edges
        };
        edges.into_iter().map(|edge| self.attach_value(edge)).collect()
    }

    pub fn edge_count(&self) -> Result<i64, StoreError> {
        self.connection()
            .query_row("SELECT COUNT(*) FROM edges", [], |row| row.get(0))
            .map_err(|e| StoreError::query(e.to_string()))
    }

    /// Row count of every satellite table, keyed by data type.
    pub fn value_counts(&self) -> Result<BTreeMap<DataType, i64>, StoreError> {
        let mut counts = BTreeMap::new();
        for data_type in DataType::ALL {
            let count: i64 = self
                .connection()
                .query_row(
                    &format!("SELECT COUNT(*) FROM {}", satellite_table(data_type)),
                    [],
                    |row| row.get(0),
                )
                .map_err(|e| StoreError::query(e.to_string()))?;
            counts.insert(data_type, count);
        }
        Ok(counts)
    }

    fn attach_value(&self, edge: Edge) -> Result<StatementRecord, StoreError> {
        let value = read_value(self.connection(), edge.data_type, &edge.id)?
            .ok_or_else(|| StoreError::not_found(format!("value for edge {}", edge.id)))?;
        Ok(StatementRecord { edge, value })
    }
}

fn validate_record(record: &StatementRecord) -> Result<(), StoreError> {
    let edge = &record.edge;
    if edge.id.trim().is_empty() {
        return Err(StoreError::invalid_input("edge id must be set"));
    }
    if edge.node1.trim().is_empty() {
        return Err(StoreError::invalid_input(format!(
            "edge {} has an empty node1",
            edge.id
        )));
    }
    if edge.label.trim().is_empty() {
        return Err(StoreError::invalid_input(format!(
            "edge {} has an empty label",
            edge.id
        )));
    }
    if edge.data_type != record.value.data_type() {
        return Err(StoreError::invalid_input(format!(
            "edge {} is tagged {} but carries a {} value",
            edge.id,
            edge.data_type,
            record.value.data_type()
        )));
    }
    Ok(())
}

/// Writes `records` inside the caller's transaction: edges first, one multi-row
/// `INSERT ... RETURNING` per chunk, then the satellite rows of the edges actually
/// inserted, one multi-row statement per data type and chunk.
fn insert_records(
    conn: &Connection,
    records: &[StatementRecord],
    mode: InsertMode,
    config: &BatchConfig,
) -> Result<ImportStats, StoreError> {
    let mut seen = AHashSet::with_capacity(records.len());
    let edge_chunks = config.per_statement(EDGE_INSERT_COLUMNS.len());
    let inserted = execute_batch(records, &edge_chunks, |chunk| {
        let mut first_seen = Vec::with_capacity(chunk.len());
        let mut params: Vec<&dyn ToSql> =
            Vec::with_capacity(chunk.len() * EDGE_INSERT_COLUMNS.len());
        for record in chunk {
            let edge = &record.edge;
            let first = seen.insert(edge.id.clone());
            if first {
                params.push(&edge.id);
                params.push(&edge.node1);
                params.push(&edge.label);
                params.push(&edge.node2);
                params.push(&edge.data_type);
            }
            first_seen.push(first);
        }
        let rows = params.len() / EDGE_INSERT_COLUMNS.len();
        let mut written = AHashSet::with_capacity(rows);
        if rows > 0 {
            let sql = format!(
                "INSERT INTO edges({}) VALUES {} ON CONFLICT(id) DO NOTHING RETURNING id",
                EDGE_INSERT_COLUMNS.join(","),
                values_placeholders(rows, EDGE_INSERT_COLUMNS.len())
            );
            let mut stmt = conn
                .prepare_cached(&sql)
                .map_err(|e| StoreError::query(e.to_string()))?;
            let ids = stmt
                .query_map(params_from_iter(params), |row| row.get::<_, String>(0))
                .map_err(|e| StoreError::query(e.to_string()))?;
            for id in ids {
                written.insert(id.map_err(|e| StoreError::query(e.to_string()))?);
            }
        }
        let mut flags = Vec::with_capacity(chunk.len());
        for (record, first) in chunk.iter().zip(first_seen) {
            let fresh = first && written.contains(&record.edge.id);
            if !fresh && mode == InsertMode::Strict {
                return Err(StoreError::import_conflict(record.edge.id.clone()));
            }
            flags.push(fresh);
        }
        Ok(flags)
    })?;

    let mut stats = ImportStats::default();
    for &fresh in &inserted {
        if fresh {
            stats.edges_inserted += 1;
        } else {
            stats.edges_skipped += 1;
        }
    }

    for data_type in DataType::ALL {
        let group: Vec<&StatementRecord> = records
            .iter()
            .zip(&inserted)
            .filter(|(record, fresh)| **fresh && record.value.data_type() == data_type)
            .map(|(record, _)| record)
            .collect();
        if group.is_empty() {
            continue;
        }
        let columns = satellite_columns(data_type);
        let written = execute_batch(&group, &config.per_statement(columns.len()), |chunk| {
            let params: Vec<Box<dyn ToSql + '_>> = chunk
                .iter()
                .flat_map(|record| value_params(&record.edge.id, &record.value))
                .collect();
            let sql = format!(
                "INSERT INTO {}({}) VALUES {} ON CONFLICT(edge_id) DO NOTHING",
                satellite_table(data_type),
                columns.join(","),
                values_placeholders(chunk.len(), columns.len())
            );
            let count = conn
                .prepare_cached(&sql)
                .and_then(|mut stmt| stmt.execute(params_from_iter(params)))
                .map_err(|e| StoreError::query(e.to_string()))?;
            Ok(vec![count])
        })?;
        stats.values_inserted += written.iter().sum::<usize>();
        debug!(%data_type, rows = group.len(), "satellite rows written");
    }
    Ok(stats)
}

/// `(?,?,..),(?,?,..)` for `rows` rows of `width` placeholders.
fn values_placeholders(rows: usize, width: usize) -> String {
    let row = format!("({})", vec!["?"; width].join(","));
    vec![row; rows].join(",")
}

fn satellite_columns(data_type: DataType) -> &'static [&'static str] {
    match data_type {
        DataType::String => &["edge_id", "text", "language"],
        DataType::DateAndTime => &["edge_id", "date_and_time", "precision", "calendar"],
        DataType::Quantity => &["edge_id", "number", "unit", "low_tolerance", "high_tolerance"],
        DataType::Coordinate => &["edge_id", "latitude", "longitude", "precision"],
        DataType::Symbol => &["edge_id", "symbol"],
    }
}

fn boxed<'r, T: ToSql + 'r>(value: T) -> Box<dyn ToSql + 'r> {
    Box::new(value)
}

/// Parameters of one satellite row, in [`satellite_columns`] order.
fn value_params<'r>(edge_id: &'r str, value: &'r EdgeValue) -> Vec<Box<dyn ToSql + 'r>> {
    match value {
        EdgeValue::String(v) => vec![boxed(edge_id), boxed(&v.text), boxed(&v.language)],
        EdgeValue::Date(v) => vec![
            boxed(edge_id),
            boxed(&v.date_and_time),
            boxed(&v.precision),
            boxed(&v.calendar),
        ],
        EdgeValue::Quantity(v) => vec![
            boxed(edge_id),
            boxed(&v.number),
            boxed(v.unit()),
            boxed(v.low_tolerance),
            boxed(v.high_tolerance),
        ],
        EdgeValue::Coordinate(v) => vec![
            boxed(edge_id),
            boxed(v.latitude),
            boxed(v.longitude),
            boxed(v.precision),
        ],
        EdgeValue::Symbol(v) => vec![boxed(edge_id), boxed(&v.symbol)],
    }
}

pub(crate) fn read_value(
    conn: &Connection,
    data_type: DataType,
    edge_id: &str,
) -> Result<Option<EdgeValue>, StoreError> {
    conn.prepare_cached(value_select_sql(data_type))
        .map_err(|e| StoreError::query(e.to_string()))?
        .query_row([edge_id], |row| value_from_row(data_type, row))
        .optional()
        .map_err(|e| StoreError::query(e.to_string()))
}

fn prepare_doomed(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TEMP TABLE IF NOT EXISTS doomed_edges(id TEXT PRIMARY KEY);
         DELETE FROM temp.doomed_edges;",
    )
    .map_err(|e| StoreError::query(e.to_string()))
}

/// Removes sub-statements of the doomed edges, then the edges themselves. Satellite rows
/// follow through `ON DELETE CASCADE`.
fn purge_doomed(conn: &Connection) -> Result<usize, StoreError> {
    let sub_statements = conn
        .execute(
            "DELETE FROM edges WHERE node1 IN (SELECT id FROM temp.doomed_edges)",
            [],
        )
        .map_err(|e| StoreError::query(e.to_string()))?;
    let statements = conn
        .execute(
            "DELETE FROM edges WHERE id IN (SELECT id FROM temp.doomed_edges)",
            [],
        )
        .map_err(|e| StoreError::query(e.to_string()))?;
    conn.execute("DELETE FROM temp.doomed_edges", [])
        .map_err(|e| StoreError::query(e.to_string()))?;
    debug!(sub_statements, statements, "purged doomed edges");
    Ok(sub_statements + statements)
}
