//! Dataset and variable descriptions stored as ordinary edges.
//!
//! | field                    | predicate      |
//! |--------------------------|----------------|
//! | short name               | `P1813`        |
//! | name                     | `label`        |
//! | description              | `description`  |
//! | url (datasets)           | `P2699`        |
//! | dataset (variables)      | `P2006020004`  |
//! | property (variables)     | `P1687`        |
//! | qualifiers (variables)   | `P2006020002`  |
//!
//! Datasets are `P31 Q1172284`, variables `P31 Q50701`.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    bulk::edge_id,
    errors::StoreError,
    literal::Literal,
    qualifier::map_declared_datatype,
    store::{EdgeStore, EdgeValue, ImportStats, StatementRecord},
    vocab,
};

static SHORT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("short name pattern"));

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetMetadata {
    pub node: String,
    pub short_name: String,
    pub name: String,
    pub description: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableMetadata {
    pub node: String,
    pub short_name: String,
    pub name: String,
    pub dataset_node: String,
    pub corresponds_to_property: String,
    pub description: Option<String>,
    pub qualifiers: Vec<String>,
}

/// A qualifier predicate node: its label and, optionally, its declared Wikidata datatype.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualifierProperty {
    pub property: String,
    pub label: String,
    pub wikidata_data_type: Option<String>,
}

fn require_text(field: &str, value: &str) -> Result<(), StoreError> {
    if value.trim().is_empty() {
        return Err(StoreError::invalid_input(format!("{field} must be set")));
    }
    Ok(())
}

fn require_short_name(value: &str) -> Result<(), StoreError> {
    if !SHORT_NAME_RE.is_match(value) {
        return Err(StoreError::invalid_input(format!(
            "short name `{value}` must match [A-Za-z0-9_-]+"
        )));
    }
    Ok(())
}

fn require_node(field: &str, value: &str) -> Result<(), StoreError> {
    require_text(field, value)?;
    if value.chars().any(char::is_whitespace) {
        return Err(StoreError::invalid_input(format!(
            "{field} `{value}` must not contain whitespace"
        )));
    }
    Ok(())
}

/// Accumulates records with content-derived ids for one subject node.
struct StatementBuilder<'a> {
    node: &'a str,
    records: Vec<StatementRecord>,
}

impl<'a> StatementBuilder<'a> {
    fn new(node: &'a str) -> Self {
        Self {
            node,
            records: Vec::new(),
        }
    }

    fn push(&mut self, label: &str, literal: Literal) {
        let node2 = crate::literal::encode(&literal);
        let id = edge_id(self.node, label, &node2, 0);
        self.records
            .push(StatementRecord::from_literal(id, self.node, label, literal));
    }

    fn text(&mut self, label: &str, value: &str) {
        self.push(label, Literal::Str(value.to_string()));
    }

    fn symbol(&mut self, label: &str, value: &str) {
        self.push(label, Literal::Symbol(value.to_string()));
    }

    fn finish(self) -> Vec<StatementRecord> {
        self.records
    }
}

impl DatasetMetadata {
    pub fn validate(&self) -> Result<(), StoreError> {
        require_node("dataset node", &self.node)?;
        require_short_name(&self.short_name)?;
        require_text("dataset name", &self.name)?;
        require_text("dataset description", &self.description)?;
        if !self.url.starts_with("http") {
            return Err(StoreError::invalid_input(format!(
                "dataset url `{}` must start with http",
                self.url
            )));
        }
        Ok(())
    }

    pub fn to_statements(&self) -> Result<Vec<StatementRecord>, StoreError> {
        self.validate()?;
        let mut builder = StatementBuilder::new(&self.node);
        builder.symbol(vocab::INSTANCE_OF, vocab::DATASET_CLASS);
        builder.text(vocab::SHORT_NAME, &self.short_name);
        builder.text(vocab::LABEL, &self.name);
        builder.text(vocab::DESCRIPTION, &self.description);
        builder.text(vocab::URL, &self.url);
        Ok(builder.finish())
    }
}

impl VariableMetadata {
    pub fn validate(&self) -> Result<(), StoreError> {
        require_node("variable node", &self.node)?;
        require_short_name(&self.short_name)?;
        require_text("variable name", &self.name)?;
        require_node("dataset node", &self.dataset_node)?;
        require_node("corresponding property", &self.corresponds_to_property)?;
        for qualifier in &self.qualifiers {
            require_node("qualifier property", qualifier)?;
        }
        Ok(())
    }

    pub fn to_statements(&self) -> Result<Vec<StatementRecord>, StoreError> {
        self.validate()?;
        let mut builder = StatementBuilder::new(&self.node);
        builder.symbol(vocab::INSTANCE_OF, vocab::VARIABLE_CLASS);
        builder.text(vocab::SHORT_NAME, &self.short_name);
        builder.text(vocab::LABEL, &self.name);
        builder.symbol(vocab::DATASET, &self.dataset_node);
        builder.symbol(vocab::CORRESPONDS_TO_PROPERTY, &self.corresponds_to_property);
        if let Some(description) = &self.description {
            builder.text(vocab::DESCRIPTION, description);
        }
        for qualifier in &self.qualifiers {
            builder.symbol(vocab::HAS_QUALIFIER, qualifier);
        }
        Ok(builder.finish())
    }
}

impl QualifierProperty {
    pub fn validate(&self) -> Result<(), StoreError> {
        require_node("qualifier property", &self.property)?;
        require_text("qualifier label", &self.label)?;
        if let Some(declared) = &self.wikidata_data_type {
            map_declared_datatype(declared)?;
        }
        Ok(())
    }

    pub fn to_statements(&self) -> Result<Vec<StatementRecord>, StoreError> {
        self.validate()?;
        let mut builder = StatementBuilder::new(&self.property);
        builder.text(vocab::LABEL, &self.label);
        if let Some(declared) = &self.wikidata_data_type {
            builder.symbol(vocab::WIKIDATA_DATA_TYPE, declared);
        }
        Ok(builder.finish())
    }
}

/// Single-valued dataset fields; a put replaces whatever these predicates held before.
const DATASET_FIELDS: [&str; 4] = [vocab::SHORT_NAME, vocab::LABEL, vocab::DESCRIPTION, vocab::URL];

const VARIABLE_FIELDS: [&str; 6] = [
    vocab::SHORT_NAME,
    vocab::LABEL,
    vocab::DESCRIPTION,
    vocab::DATASET,
    vocab::CORRESPONDS_TO_PROPERTY,
    vocab::HAS_QUALIFIER,
];

const QUALIFIER_PROPERTY_FIELDS: [&str; 2] = [vocab::LABEL, vocab::WIKIDATA_DATA_TYPE];

impl EdgeStore {
    /// Writes `dataset`, replacing any name, description, short name or url stored for its
    /// node by an earlier put.
    pub fn put_dataset(&self, dataset: &DatasetMetadata) -> Result<ImportStats, StoreError> {
        self.replace_statements(&dataset.node, &DATASET_FIELDS, &dataset.to_statements()?)
    }

    pub fn put_variable(&self, variable: &VariableMetadata) -> Result<ImportStats, StoreError> {
        if self.get_dataset(&variable.dataset_node)?.is_none() {
            return Err(StoreError::not_found(format!(
                "dataset {}",
                variable.dataset_node
            )));
        }
        self.replace_statements(&variable.node, &VARIABLE_FIELDS, &variable.to_statements()?)
    }

    pub fn put_qualifier_property(
        &self,
        property: &QualifierProperty,
    ) -> Result<ImportStats, StoreError> {
        self.replace_statements(
            &property.property,
            &QUALIFIER_PROPERTY_FIELDS,
            &property.to_statements()?,
        )
    }

    pub fn get_dataset(&self, node: &str) -> Result<Option<DatasetMetadata>, StoreError> {
        if !self.is_instance_of(node, vocab::DATASET_CLASS)? {
            return Ok(None);
        }
        Ok(Some(DatasetMetadata {
            node: node.to_string(),
            short_name: self.text_of(node, vocab::SHORT_NAME)?.unwrap_or_default(),
            name: self.text_of(node, vocab::LABEL)?.unwrap_or_default(),
            description: self.text_of(node, vocab::DESCRIPTION)?.unwrap_or_default(),
            url: self.text_of(node, vocab::URL)?.unwrap_or_default(),
        }))
    }

    pub fn dataset_by_short_name(
        &self,
        short_name: &str,
    ) -> Result<Option<DatasetMetadata>, StoreError> {
        let node2 = crate::literal::encode(&Literal::Str(short_name.to_string()));
        for node in self.subjects_with(vocab::SHORT_NAME, &node2)? {
            if let Some(dataset) = self.get_dataset(&node)? {
                return Ok(Some(dataset));
            }
        }
        Ok(None)
    }

    pub fn get_variable(&self, node: &str) -> Result<Option<VariableMetadata>, StoreError> {
        if !self.is_instance_of(node, vocab::VARIABLE_CLASS)? {
            return Ok(None);
        }
        let qualifiers = self
            .lookup_by_subject_predicate(node, vocab::HAS_QUALIFIER)?
            .into_iter()
            .map(|edge| edge.node2)
            .collect();
        Ok(Some(VariableMetadata {
            node: node.to_string(),
            short_name: self.text_of(node, vocab::SHORT_NAME)?.unwrap_or_default(),
            name: self.text_of(node, vocab::LABEL)?.unwrap_or_default(),
            dataset_node: self.text_of(node, vocab::DATASET)?.unwrap_or_default(),
            corresponds_to_property: self
                .text_of(node, vocab::CORRESPONDS_TO_PROPERTY)?
                .unwrap_or_default(),
            description: self.text_of(node, vocab::DESCRIPTION)?,
            qualifiers,
        }))
    }

    /// Node of the variable in `dataset` whose observations use `property`.
    pub fn variable_node_for_property(
        &self,
        dataset: &str,
        property: &str,
    ) -> Result<Option<String>, StoreError> {
        for node in self.subjects_with(vocab::CORRESPONDS_TO_PROPERTY, property)? {
            let in_dataset = self
                .lookup_by_subject_predicate(&node, vocab::DATASET)?
                .iter()
                .any(|edge| edge.node2 == dataset);
            if in_dataset && self.is_instance_of(&node, vocab::VARIABLE_CLASS)? {
                return Ok(Some(node));
            }
        }
        Ok(None)
    }

    pub fn variable_for_property(
        &self,
        dataset: &str,
        property: &str,
    ) -> Result<Option<VariableMetadata>, StoreError> {
        match self.variable_node_for_property(dataset, property)? {
            Some(node) => self.get_variable(&node),
            None => Ok(None),
        }
    }

    fn is_instance_of(&self, node: &str, class: &str) -> Result<bool, StoreError> {
        Ok(self
            .lookup_by_subject_predicate(node, vocab::INSTANCE_OF)?
            .iter()
            .any(|edge| edge.node2 == class))
    }

    /// First string or symbol value of `(node, label)`.
    pub(crate) fn text_of(&self, node: &str, label: &str) -> Result<Option<String>, StoreError> {
        Ok(self
            .statements_by_subject_predicate(node, label)?
            .into_iter()
            .find_map(|record| match record.value {
                EdgeValue::String(value) => Some(value.text),
                EdgeValue::Symbol(value) => Some(value.symbol),
                _ => None,
            }))
    }
}
