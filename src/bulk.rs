//! Conversion between flat rows (one packed literal in `node2`) and exploded rows (one
//! column per typed field), and the id scheme that makes re-imports idempotent.

use std::collections::BTreeMap;

use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    errors::StoreError,
    literal::{
        self, CoordinateValue, DataType, DateValue, Number, QuantityValue, ValidationError,
        is_units_node, parse_number,
    },
    store::{Edge, EdgeValue, StatementRecord, StringValue, SymbolValue},
};

/// Typed field columns of an exploded row, in output order.
pub const FIELD_NAMES: [&str; 14] = [
    "number",
    "low_tolerance",
    "high_tolerance",
    "si_units",
    "units_node",
    "date_and_time",
    "precision",
    "calendar",
    "text",
    "language",
    "language_suffix",
    "latitude",
    "longitude",
    "symbol",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlatRow {
    pub id: Option<String>,
    pub node1: String,
    pub label: String,
    pub node2: String,
}

impl FlatRow {
    pub fn new<N: Into<String>, L: Into<String>, V: Into<String>>(node1: N, label: L, node2: V) -> Self {
        Self {
            id: None,
            node1: node1.into(),
            label: label.into(),
            node2: node2.into(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplodedRow {
    pub id: String,
    pub node1: String,
    pub label: String,
    pub node2: String,
    /// One of the five data type tags; anything else fails [`implode`].
    pub data_type: String,
    pub fields: BTreeMap<String, String>,
}

impl ExplodedRow {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RowError {
    /// 1-based line in the source table; the header is line 1.
    pub line: usize,
    pub column: String,
    pub message: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ExplodeOptions {
    /// Stop at the first rejected row.
    pub fail_fast: bool,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExplodeReport {
    pub records: Vec<StatementRecord>,
    pub errors: Vec<RowError>,
}

impl ExplodeReport {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

/// `node1-label-<16 hex of blake3(node1 \t label \t node2 \t occurrence)>`.
pub fn edge_id(node1: &str, label: &str, node2: &str, occurrence: usize) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(node1.as_bytes());
    hasher.update(b"\t");
    hasher.update(label.as_bytes());
    hasher.update(b"\t");
    hasher.update(node2.as_bytes());
    hasher.update(b"\t");
    hasher.update(occurrence.to_string().as_bytes());
    let digest = hasher.finalize().to_hex();
    format!("{node1}-{label}-{}", &digest.as_str()[..16])
}

/// Decodes every row's `node2`. Rejected rows are reported and never produce a record.
pub fn explode(rows: &[FlatRow], options: ExplodeOptions) -> ExplodeReport {
    let mut report = ExplodeReport::default();
    let mut occurrences: AHashMap<(String, String, String), usize> = AHashMap::new();
    for (index, row) in rows.iter().enumerate() {
        let line = index + 2;
        match explode_row(row, &mut occurrences) {
            Ok(record) => report.records.push(record),
            Err((column, message)) => {
                warn!(line, column, %message, "row rejected");
                report.errors.push(RowError {
                    line,
                    column: column.to_string(),
                    message,
                });
                if options.fail_fast {
                    break;
                }
            }
        }
    }
    report
}

fn explode_row(
    row: &FlatRow,
    occurrences: &mut AHashMap<(String, String, String), usize>,
) -> Result<StatementRecord, (&'static str, String)> {
    if row.node1.trim().is_empty() {
        return Err(("node1", "node1 is empty".to_string()));
    }
    if row.label.trim().is_empty() {
        return Err(("label", "label is empty".to_string()));
    }
    let literal = literal::decode(&row.node2).map_err(|e| ("node2", e.to_string()))?;
    let node2 = literal::encode(&literal);
    let id = match row.id.as_deref().filter(|id| !id.is_empty()) {
        Some(id) => id.to_string(),
        None => {
            let key = (row.node1.clone(), row.label.clone(), node2.clone());
            let seen = occurrences.entry(key).or_insert(0);
            let id = edge_id(&row.node1, &row.label, &node2, *seen);
            *seen += 1;
            id
        }
    };
    Ok(StatementRecord::from_literal(
        id,
        row.node1.clone(),
        row.label.clone(),
        literal,
    ))
}

/// Column form of a record.
pub fn to_exploded(record: &StatementRecord) -> ExplodedRow {
    let mut fields = BTreeMap::new();
    let mut put = |name: &str, value: Option<String>| {
        if let Some(value) = value {
            fields.insert(name.to_string(), value);
        }
    };
    match &record.value {
        EdgeValue::Quantity(q) => {
            put("number", Some(q.number.to_string()));
            put("low_tolerance", q.low_tolerance.map(|v| v.to_string()));
            put("high_tolerance", q.high_tolerance.map(|v| v.to_string()));
            put("si_units", q.si_units.clone());
            put("units_node", q.units_node.clone());
        }
        EdgeValue::Date(d) => {
            put("date_and_time", Some(d.date_and_time.clone()));
            put("precision", d.precision.map(|p| p.to_string()));
            put("calendar", d.calendar.clone());
        }
        EdgeValue::String(s) => {
            put("text", Some(s.text.clone()));
            if let Some(tag) = &s.language {
                let (language, suffix) = match tag.split_once('-') {
                    Some((language, suffix)) => (language.to_string(), Some(suffix.to_string())),
                    None => (tag.clone(), None),
                };
                put("language", Some(language));
                put("language_suffix", suffix);
            }
        }
        EdgeValue::Coordinate(c) => {
            put("latitude", Some(c.latitude.to_string()));
            put("longitude", Some(c.longitude.to_string()));
            put("precision", c.precision.map(|p| p.to_string()));
        }
        EdgeValue::Symbol(s) => put("symbol", Some(s.symbol.clone())),
    }
    ExplodedRow {
        id: record.edge.id.clone(),
        node1: record.edge.node1.clone(),
        label: record.edge.label.clone(),
        node2: record.edge.node2.clone(),
        data_type: record.edge.data_type.to_string(),
        fields,
    }
}

pub fn to_flat(record: &StatementRecord) -> FlatRow {
    FlatRow {
        id: Some(record.edge.id.clone()),
        node1: record.edge.node1.clone(),
        label: record.edge.label.clone(),
        node2: record.edge.node2.clone(),
    }
}

/// Rebuilds a record from its typed columns; `node2` is recomputed from the fields.
pub fn from_exploded(row: &ExplodedRow) -> Result<StatementRecord, StoreError> {
    let data_type: DataType = row.data_type.parse().map_err(|_| {
        StoreError::invalid_input(format!(
            "edge {} has unknown data type tag `{}`",
            row.id, row.data_type
        ))
    })?;
    let value = match data_type {
        DataType::Quantity => {
            let number = parse_number(required(row, "number")?)?;
            let mut quantity = QuantityValue::new(number);
            quantity.low_tolerance = optional_float(row, "low_tolerance")?;
            quantity.high_tolerance = optional_float(row, "high_tolerance")?;
            if let Some(node) = row.field("units_node") {
                if !is_units_node(node) {
                    return Err(ValidationError::syntax(format!("bad units node {node}")).into());
                }
                quantity.units_node = Some(node.to_string());
            } else if let Some(si) = row.field("si_units") {
                quantity.si_units = Some(si.to_string());
            }
            EdgeValue::Quantity(quantity)
        }
        DataType::DateAndTime => {
            let precision = row
                .field("precision")
                .map(|p| {
                    p.parse::<u8>()
                        .map_err(|_| ValidationError::syntax(format!("bad precision {p}")))
                })
                .transpose()?;
            EdgeValue::Date(DateValue::from_stored(
                required(row, "date_and_time")?,
                precision,
                row.field("calendar").map(str::to_string),
            )?)
        }
        DataType::String => {
            let language = match (row.field("language"), row.field("language_suffix")) {
                (Some(language), Some(suffix)) => Some(format!("{language}-{suffix}")),
                (Some(language), None) => Some(language.to_string()),
                (None, _) => None,
            };
            EdgeValue::String(StringValue {
                text: row.fields.get("text").cloned().unwrap_or_default(),
                language,
            })
        }
        DataType::Coordinate => {
            let mut coordinate = CoordinateValue::new(
                float_field(required(row, "latitude")?)?,
                float_field(required(row, "longitude")?)?,
            )?;
            coordinate.precision = optional_float(row, "precision")?;
            EdgeValue::Coordinate(coordinate)
        }
        DataType::Symbol => EdgeValue::Symbol(SymbolValue {
            symbol: required(row, "symbol")?.to_string(),
        }),
    };
    let node2 = literal::encode(&value.to_literal());
    Ok(StatementRecord {
        edge: Edge {
            id: row.id.clone(),
            node1: row.node1.clone(),
            label: row.label.clone(),
            node2,
            data_type,
        },
        value,
    })
}

/// Packs an exploded row back into a flat row. Unknown data type tags are rejected.
pub fn implode(row: &ExplodedRow) -> Result<FlatRow, StoreError> {
    from_exploded(row).map(|record| to_flat(&record))
}

fn required<'a>(row: &'a ExplodedRow, name: &str) -> Result<&'a str, StoreError> {
    row.field(name).ok_or_else(|| {
        StoreError::invalid_input(format!(
            "edge {} ({}) is missing `{name}`",
            row.id, row.data_type
        ))
    })
}

fn float_field(text: &str) -> Result<f64, StoreError> {
    Ok(parse_number(text).map(|n: Number| n.as_f64())?)
}

fn optional_float(row: &ExplodedRow, name: &str) -> Result<Option<f64>, StoreError> {
    row.field(name).map(float_field).transpose()
}
