use std::{fmt, result};

use rusqlite::OptionalExtension;
use serde::Serialize;

use crate::{
    errors::StoreError,
    literal::DataType,
    store::{EdgeStore, satellite_table},
};

/// Consistency between the `edges` table and the satellite value tables.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub total_edges: i64,
    /// Edges without a row in the satellite table named by their `data_type`.
    pub missing_values: i64,
    /// Satellite rows whose edge carries a different `data_type`.
    pub mismatched_values: i64,
    /// Satellite rows whose edge is gone.
    pub orphan_values: i64,
    /// Extra satellite rows for edges that have values in more than one table.
    pub duplicate_values: i64,
}

impl SafetyReport {
    pub fn merge(&mut self, other: &SafetyReport) {
        self.total_edges = self.total_edges.max(other.total_edges);
        self.missing_values += other.missing_values;
        self.mismatched_values += other.mismatched_values;
        self.orphan_values += other.orphan_values;
        self.duplicate_values += other.duplicate_values;
    }

    pub fn has_issues(&self) -> bool {
        self.missing_values > 0
            || self.mismatched_values > 0
            || self.orphan_values > 0
            || self.duplicate_values > 0
    }
}

#[derive(Debug)]
pub struct SafetyError {
    pub report: SafetyReport,
    pub source: Option<StoreError>,
}

impl fmt::Display for SafetyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(err) => write!(f, "integrity check failed: {err}"),
            None => write!(
                f,
                "integrity violations detected: {} missing, {} mismatched, {} orphan, {} duplicate",
                self.report.missing_values,
                self.report.mismatched_values,
                self.report.orphan_values,
                self.report.duplicate_values
            ),
        }
    }
}

impl std::error::Error for SafetyError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|err| err as &dyn std::error::Error)
    }
}

pub fn validate_value_presence(store: &EdgeStore) -> Result<SafetyReport, StoreError> {
    let mut report = base_report(store)?;
    for data_type in DataType::ALL {
        let table = satellite_table(data_type);
        report.missing_values += query_single(
            store,
            &format!(
                "SELECT COUNT(*) FROM edges e WHERE e.data_type = ?1 \
                 AND NOT EXISTS (SELECT 1 FROM {table} v WHERE v.edge_id = e.id)"
            ),
            Some(data_type.as_str()),
        )?;
        report.mismatched_values += query_single(
            store,
            &format!(
                "SELECT COUNT(*) FROM {table} v JOIN edges e ON e.id = v.edge_id \
                 WHERE e.data_type <> ?1"
            ),
            Some(data_type.as_str()),
        )?;
    }
    Ok(report)
}

pub fn validate_no_orphan_values(store: &EdgeStore) -> Result<SafetyReport, StoreError> {
    let mut report = base_report(store)?;
    for data_type in DataType::ALL {
        report.orphan_values += query_single(
            store,
            &format!(
                "SELECT COUNT(*) FROM {} v LEFT JOIN edges e ON e.id = v.edge_id \
                 WHERE e.id IS NULL",
                satellite_table(data_type)
            ),
            None,
        )?;
    }
    Ok(report)
}

pub fn validate_no_duplicate_values(store: &EdgeStore) -> Result<SafetyReport, StoreError> {
    let mut report = base_report(store)?;
    let union = DataType::ALL
        .iter()
        .map(|data_type| format!("SELECT edge_id FROM {}", satellite_table(*data_type)))
        .collect::<Vec<_>>()
        .join(" UNION ALL ");
    report.duplicate_values = query_single(
        store,
        &format!(
            "SELECT COALESCE(SUM(cnt - 1), 0) FROM (\
             SELECT COUNT(*) AS cnt FROM ({union}) GROUP BY edge_id HAVING cnt > 1)"
        ),
        None,
    )?;
    Ok(report)
}

pub fn run_safety_checks(store: &EdgeStore) -> Result<SafetyReport, StoreError> {
    let mut report = SafetyReport::default();
    report.merge(&validate_value_presence(store)?);
    report.merge(&validate_no_orphan_values(store)?);
    report.merge(&validate_no_duplicate_values(store)?);
    Ok(report)
}

pub fn run_strict_safety_checks(store: &EdgeStore) -> result::Result<SafetyReport, SafetyError> {
    let report = run_safety_checks(store).map_err(|err| SafetyError {
        report: SafetyReport::default(),
        source: Some(err),
    })?;
    if report.has_issues() {
        Err(SafetyError {
            report,
            source: None,
        })
    } else {
        Ok(report)
    }
}

fn base_report(store: &EdgeStore) -> Result<SafetyReport, StoreError> {
    Ok(SafetyReport {
        total_edges: store.edge_count()?,
        ..SafetyReport::default()
    })
}

fn query_single(store: &EdgeStore, sql: &str, param: Option<&str>) -> Result<i64, StoreError> {
    let conn = store.connection();
    let row = match param {
        Some(value) => conn.query_row(sql, [value], |row| row.get(0)),
        None => conn.query_row(sql, [], |row| row.get(0)),
    };
    row.optional()
        .map(|opt| opt.unwrap_or(0))
        .map_err(|e| StoreError::query(e.to_string()))
}
