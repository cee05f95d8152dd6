//! Derives typed qualifier descriptors (name, output fields, join fragment) from the edges
//! describing a variable. Computed on every call; metadata edits may add or remove
//! qualifiers at any time.

use std::{fmt, sync::LazyLock};

use regex::Regex;
use rusqlite::params;
use serde::Serialize;
use tracing::debug;

use crate::{
    errors::StoreError,
    literal::DataType,
    query::plan::{JoinClause, JoinFragment, JoinKind, SqlFragment, quote_ident},
    store::EdgeStore,
    vocab,
};

static NON_ALNUM_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9]+").expect("name pattern"));

const ONTOLOGY_PREFIXES: [&str; 2] = ["http://wikiba.se/ontology#", "wikibase:"];

/// Alias of the observation edge that qualifier joins hang off.
pub const SUBJECT_ALIAS: &str = "e_main";

/// Reserved name of the qualifier carrying an observation's place.
pub const LOCATION_NAME: &str = "location";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifierType {
    String,
    DateAndTime,
    Quantity,
    Coordinate,
    Symbol,
    Location,
}

impl QualifierType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QualifierType::String => "string",
            QualifierType::DateAndTime => "date_and_time",
            QualifierType::Quantity => "quantity",
            QualifierType::Coordinate => "coordinate",
            QualifierType::Symbol => "symbol",
            QualifierType::Location => "location",
        }
    }
}

impl fmt::Display for QualifierType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<DataType> for QualifierType {
    fn from(data_type: DataType) -> Self {
        match data_type {
            DataType::String => QualifierType::String,
            DataType::DateAndTime => QualifierType::DateAndTime,
            DataType::Quantity => QualifierType::Quantity,
            DataType::Coordinate => QualifierType::Coordinate,
            DataType::Symbol => QualifierType::Symbol,
        }
    }
}

/// Maps a declared Wikidata datatype (bare or ontology-prefixed) to a qualifier type.
pub fn map_declared_datatype(declared: &str) -> Result<QualifierType, StoreError> {
    let bare = ONTOLOGY_PREFIXES
        .iter()
        .find_map(|prefix| declared.strip_prefix(prefix))
        .unwrap_or(declared);
    match bare {
        "GlobeCoordinate" => Ok(QualifierType::Location),
        "Quantity" => Ok(QualifierType::Quantity),
        "Time" => Ok(QualifierType::DateAndTime),
        "String" | "MonolingualText" => Ok(QualifierType::String),
        "ExternalIdentifier" | "WikibaseItem" | "WikibaseProperty" | "Url" => {
            Ok(QualifierType::Symbol)
        }
        _ => Err(StoreError::unknown_datatype(declared)),
    }
}

/// Lowercases `label` and collapses every run of characters outside `[a-z0-9]` into `_`.
pub fn sanitize_name(label: &str) -> String {
    let lower = label.to_lowercase();
    NON_ALNUM_RUN
        .replace_all(&lower, "_")
        .trim_matches('_')
        .to_string()
}

fn well_known(property: &str) -> Option<(QualifierType, Option<&'static str>)> {
    match property {
        vocab::POINT_IN_TIME => Some((QualifierType::DateAndTime, Some("time"))),
        vocab::STATED_IN => Some((QualifierType::Symbol, Some("stated_in"))),
        vocab::LOCATED_IN | vocab::LOCATION => Some((QualifierType::Location, Some(LOCATION_NAME))),
        vocab::COUNTRY => Some((QualifierType::Location, Some("country"))),
        _ => None,
    }
}

/// A typed attribute of an observation, exposed as one or more output columns.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Qualifier {
    pub name: String,
    /// Predicate id of the qualifier edges.
    pub label: String,
    pub data_type: QualifierType,
    pub is_optional: bool,
    pub is_region: bool,
}

impl Qualifier {
    /// Resolution order: declared datatype, well-known predicate, `observed` stored type,
    /// then `string`. A label that sanitizes to nothing takes the reserved `location` name,
    /// which makes the qualifier a region.
    pub fn resolve(
        property: &str,
        declared: Option<&str>,
        label: &str,
        observed: Option<DataType>,
    ) -> Result<Self, StoreError> {
        let known = well_known(property);
        let data_type = match declared {
            Some(declared) => map_declared_datatype(declared)?,
            None => known
                .map(|(ty, _)| ty)
                .or(observed.map(QualifierType::from))
                .unwrap_or(QualifierType::String),
        };
        let name = match known.and_then(|(_, canonical)| canonical) {
            Some(canonical) => canonical.to_string(),
            None => match sanitize_name(label) {
                sanitized if sanitized.is_empty() => LOCATION_NAME.to_string(),
                sanitized => sanitized,
            },
        };
        Ok(Self {
            is_optional: name != "time",
            is_region: data_type == QualifierType::Location || name == LOCATION_NAME,
            name,
            label: property.to_string(),
            data_type,
        })
    }

    fn alias(&self, prefix: &str) -> String {
        quote_ident(&format!("{prefix}_{}", self.name))
    }

    /// Alias of the qualifier's own edge.
    pub fn edge_alias(&self) -> String {
        self.alias("eq")
    }

    /// Node the qualifier points at, used as the location for place filtering.
    pub fn node_expr(&self) -> String {
        format!("{}.node2", self.edge_alias())
    }

    /// Expression of the primary output field.
    pub fn value_expr(&self) -> String {
        let vq = self.alias("vq");
        let sq = self.alias("sq");
        match self.data_type {
            QualifierType::DateAndTime => format!("{vq}.date_and_time"),
            QualifierType::Quantity => format!("{vq}.number"),
            QualifierType::String => format!("{vq}.text"),
            QualifierType::Coordinate => format!(
                "'POINT(' || {vq}.longitude || ' ' || {vq}.latitude || ')'"
            ),
            QualifierType::Location | QualifierType::Symbol => format!("{sq}.text"),
        }
    }

    /// `(output column, SQL expression)` pairs in output order.
    pub fn fields(&self) -> Vec<(String, String)> {
        let name = &self.name;
        let vq = self.alias("vq");
        let sq = self.alias("sq");
        let mut fields = vec![(name.clone(), self.value_expr())];
        match self.data_type {
            QualifierType::DateAndTime => {
                fields.push((format!("{name}_precision"), format!("{vq}.precision")));
            }
            QualifierType::Quantity => {
                fields.push((format!("{name}_unit_id"), format!("{vq}.unit")));
                fields.push((
                    format!("{name}_unit"),
                    format!("COALESCE({sq}.text, {vq}.unit)"),
                ));
            }
            QualifierType::Location | QualifierType::Symbol => {
                fields.push((format!("{name}_id"), self.node_expr()));
            }
            QualifierType::String | QualifierType::Coordinate => {}
        }
        fields
    }

    pub fn field_names(&self) -> Vec<String> {
        self.fields().into_iter().map(|(name, _)| name).collect()
    }

    pub fn owns(&self, column: &str) -> bool {
        self.fields().iter().any(|(name, _)| name == column)
    }

    /// The joins exposing [`Qualifier::fields`], hung off the observation edge.
    pub fn join_fragment(&self) -> JoinFragment {
        let eq = self.edge_alias();
        let vq = self.alias("vq");
        let lq = self.alias("lq");
        let sq = self.alias("sq");
        let kind = if self.is_optional {
            JoinKind::Left
        } else {
            JoinKind::Inner
        };
        let fragment = JoinFragment::new(self.name.clone()).join(JoinClause::new(
            kind,
            "edges",
            eq.clone(),
            SqlFragment::new(format!(
                "{eq}.node1 = {SUBJECT_ALIAS}.id AND {eq}.label = ?"
            ))
            .bind_text(self.label.clone()),
        ));
        let satellite = |table: &'static str| {
            JoinClause::new(
                JoinKind::Left,
                table,
                vq.clone(),
                SqlFragment::new(format!("{vq}.edge_id = {eq}.id")),
            )
        };
        match self.data_type {
            QualifierType::DateAndTime => fragment.join(satellite("dates")),
            QualifierType::String => fragment.join(satellite("strings")),
            QualifierType::Coordinate => fragment.join(satellite("coordinates")),
            QualifierType::Quantity => {
                let (label_edge, label_text) =
                    label_joins(&lq, &sq, &format!("{vq}.unit"));
                fragment
                    .join(satellite("quantities"))
                    .join(label_edge)
                    .join(label_text)
            }
            QualifierType::Location | QualifierType::Symbol => {
                let (label_edge, label_text) = label_joins(&lq, &sq, &self.node_expr());
                fragment.join(label_edge).join(label_text)
            }
        }
    }
}

/// Joins the first `label` edge of `node_expr` (by id) and its string row. Taking a single
/// label edge keeps one output row per observation when a node has several labels.
pub(crate) fn label_joins(edge_alias: &str, text_alias: &str, node_expr: &str) -> (JoinClause, JoinClause) {
    let label_edge = JoinClause::new(
        JoinKind::Left,
        "edges",
        edge_alias.to_string(),
        SqlFragment::new(format!(
            "{edge_alias}.id = (SELECT l.id FROM edges AS l WHERE l.node1 = {node_expr} \
             AND l.label = ? ORDER BY l.id LIMIT 1)"
        ))
        .bind_text(vocab::LABEL),
    );
    let label_text = JoinClause::new(
        JoinKind::Left,
        "strings",
        text_alias.to_string(),
        SqlFragment::new(format!("{text_alias}.edge_id = {edge_alias}.id")),
    );
    (label_edge, label_text)
}

impl EdgeStore {
    /// Qualifiers of `variable`: its declared qualifier properties, or, when it declares
    /// none, the predicates found on the sub-statements of its observations in `dataset`.
    pub fn resolve_qualifiers(
        &self,
        dataset: &str,
        variable: &str,
    ) -> Result<Vec<Qualifier>, StoreError> {
        let declared = self.lookup_by_subject_predicate(variable, vocab::HAS_QUALIFIER)?;
        let mut qualifiers = Vec::with_capacity(declared.len());
        if !declared.is_empty() {
            for edge in declared {
                let property = edge.node2;
                let label = self.node_label(&property)?.unwrap_or_else(|| property.clone());
                let datatype = self.declared_datatype(&property)?;
                qualifiers.push(Qualifier::resolve(
                    &property,
                    datatype.as_deref(),
                    &label,
                    None,
                )?);
            }
        } else {
            let property = self
                .lookup_by_subject_predicate(variable, vocab::CORRESPONDS_TO_PROPERTY)?
                .into_iter()
                .next()
                .map(|edge| edge.node2)
                .ok_or_else(|| {
                    StoreError::not_found(format!(
                        "variable {variable} has no corresponding property"
                    ))
                })?;
            qualifiers = self.discover_qualifiers(dataset, &property)?;
        }
        debug!(
            dataset,
            variable,
            qualifiers = ?qualifiers.iter().map(|q| q.name.as_str()).collect::<Vec<_>>(),
            "qualifiers resolved"
        );
        Ok(qualifiers)
    }

    /// Qualifiers found on the sub-statements of `property` observations in `dataset`,
    /// typed from their stored values. The dataset link itself is not a qualifier.
    pub fn discover_qualifiers(
        &self,
        dataset: &str,
        property: &str,
    ) -> Result<Vec<Qualifier>, StoreError> {
        let mut qualifiers = Vec::new();
        for (predicate, observed) in self.observed_qualifier_predicates(dataset, property)? {
            let label = self
                .node_label(&predicate)?
                .unwrap_or_else(|| predicate.clone());
            qualifiers.push(Qualifier::resolve(
                &predicate,
                None,
                &label,
                Some(observed),
            )?);
        }
        Ok(qualifiers)
    }

    /// Text of the first `label` edge of `node`.
    pub fn node_label(&self, node: &str) -> Result<Option<String>, StoreError> {
        self.text_of(node, vocab::LABEL)
    }

    fn declared_datatype(&self, property: &str) -> Result<Option<String>, StoreError> {
        self.text_of(property, vocab::WIKIDATA_DATA_TYPE)
    }

    fn observed_qualifier_predicates(
        &self,
        dataset: &str,
        property: &str,
    ) -> Result<Vec<(String, DataType)>, StoreError> {
        let mut stmt = self
            .connection()
            .prepare_cached(
                "SELECT q.label, MIN(q.data_type) FROM edges AS e \
                 JOIN edges AS d ON d.node1 = e.id AND d.label = ?1 AND d.node2 = ?2 \
                 JOIN edges AS q ON q.node1 = e.id \
                 WHERE e.label = ?3 AND q.label <> ?1 \
                 GROUP BY q.label ORDER BY q.label",
            )
            .map_err(|e| StoreError::query(e.to_string()))?;
        let rows = stmt
            .query_map(params![vocab::DATASET, dataset, property], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, DataType>(1)?))
            })
            .map_err(|e| StoreError::query(e.to_string()))?;
        let mut predicates = Vec::new();
        for row in rows {
            predicates.push(row.map_err(|e| StoreError::query(e.to_string()))?);
        }
        Ok(predicates)
    }
}
