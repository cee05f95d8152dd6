//! Tab-separated exchange files: no quote character, header row required.
//!
//! Flat files carry `id, node1, label, node2` (`id` optional). Exploded files add
//! `node2;kgtk:data_type` and one `node2;kgtk:<field>` column per typed field.

use std::{
    collections::BTreeMap,
    io::{Read, Write},
};

use csv::{ReaderBuilder, StringRecord, Writer, WriterBuilder};

use crate::{
    bulk::{ExplodedRow, FIELD_NAMES, FlatRow},
    errors::StoreError,
};

const FIELD_PREFIX: &str = "node2;kgtk:";
const DATA_TYPE_COLUMN: &str = "node2;kgtk:data_type";

fn reader<R: Read>(input: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .delimiter(b'\t')
        .quoting(false)
        .has_headers(true)
        .flexible(true)
        .from_reader(input)
}

fn writer<W: Write>(output: W) -> Writer<W> {
    WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .from_writer(output)
}

fn csv_error(e: csv::Error) -> StoreError {
    StoreError::invalid_input(e.to_string())
}

fn find_column(headers: &StringRecord, name: &str) -> Result<usize, StoreError> {
    headers
        .iter()
        .position(|h| h == name)
        .ok_or_else(|| StoreError::invalid_input(format!("missing required column `{name}`")))
}

fn optional_column(headers: &StringRecord, name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

fn cell(record: &StringRecord, index: usize) -> String {
    record.get(index).unwrap_or_default().to_string()
}

pub fn read_flat<R: Read>(input: R) -> Result<Vec<FlatRow>, StoreError> {
    let mut reader = reader(input);
    let headers = reader.headers().map_err(csv_error)?.clone();
    let id = optional_column(&headers, "id");
    let node1 = find_column(&headers, "node1")?;
    let label = find_column(&headers, "label")?;
    let node2 = find_column(&headers, "node2")?;

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        rows.push(FlatRow {
            id: id.map(|i| cell(&record, i)).filter(|v| !v.is_empty()),
            node1: cell(&record, node1),
            label: cell(&record, label),
            node2: cell(&record, node2),
        });
    }
    Ok(rows)
}

pub fn write_flat<W: Write>(output: W, rows: &[FlatRow]) -> Result<(), StoreError> {
    let mut writer = writer(output);
    writer
        .write_record(["id", "node1", "label", "node2"])
        .map_err(csv_error)?;
    for row in rows {
        writer
            .write_record([
                row.id.as_deref().unwrap_or_default(),
                row.node1.as_str(),
                row.label.as_str(),
                row.node2.as_str(),
            ])
            .map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|e| StoreError::invalid_input(e.to_string()))
}

pub fn read_exploded<R: Read>(input: R) -> Result<Vec<ExplodedRow>, StoreError> {
    let mut reader = reader(input);
    let headers = reader.headers().map_err(csv_error)?.clone();
    let id = find_column(&headers, "id")?;
    let node1 = find_column(&headers, "node1")?;
    let label = find_column(&headers, "label")?;
    let node2 = optional_column(&headers, "node2");
    let data_type = find_column(&headers, DATA_TYPE_COLUMN)?;
    let fields: Vec<(String, usize)> = headers
        .iter()
        .enumerate()
        .filter_map(|(i, h)| {
            h.strip_prefix(FIELD_PREFIX)
                .filter(|name| FIELD_NAMES.contains(name))
                .map(|name| (name.to_string(), i))
        })
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(csv_error)?;
        let mut values = BTreeMap::new();
        for (name, index) in &fields {
            let value = cell(&record, *index);
            if !value.is_empty() {
                values.insert(name.clone(), value);
            }
        }
        rows.push(ExplodedRow {
            id: cell(&record, id),
            node1: cell(&record, node1),
            label: cell(&record, label),
            node2: node2.map(|i| cell(&record, i)).unwrap_or_default(),
            data_type: cell(&record, data_type),
            fields: values,
        });
    }
    Ok(rows)
}

pub fn write_exploded<W: Write>(output: W, rows: &[ExplodedRow]) -> Result<(), StoreError> {
    let mut writer = writer(output);
    let mut header = vec![
        "id".to_string(),
        "node1".to_string(),
        "label".to_string(),
        "node2".to_string(),
        DATA_TYPE_COLUMN.to_string(),
    ];
    header.extend(FIELD_NAMES.iter().map(|f| format!("{FIELD_PREFIX}{f}")));
    writer.write_record(&header).map_err(csv_error)?;
    for row in rows {
        let mut record = Vec::with_capacity(header.len());
        record.push(row.id.as_str());
        record.push(row.node1.as_str());
        record.push(row.label.as_str());
        record.push(row.node2.as_str());
        record.push(row.data_type.as_str());
        for field in FIELD_NAMES {
            record.push(row.fields.get(field).map(String::as_str).unwrap_or_default());
        }
        writer.write_record(&record).map_err(csv_error)?;
    }
    writer
        .flush()
        .map_err(|e| StoreError::invalid_input(e.to_string()))
}
