use rusqlite::{params_from_iter, types::ValueRef};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number as JsonNumber, Value as JsonValue};
use tracing::debug;

use super::plan::{JoinClause, JoinFragment, JoinKind, QueryPlan, SqlFragment};
use crate::{
    errors::StoreError,
    qualifier::{Qualifier, SUBJECT_ALIAS, label_joins},
    store::EdgeStore,
    vocab,
};

const BASE_OWNER: &str = "base";
const SUBJECT_LABEL_OWNER: &str = "main_subject";

/// Columns every observation query can project without a qualifier.
pub const BASE_COLUMNS: [&str; 8] = [
    "main_subject_id",
    "main_subject",
    "value",
    "value_unit",
    "value_unit_id",
    "low_tolerance",
    "high_tolerance",
    "dataset_id",
];

fn base_expr(column: &str) -> Option<&'static str> {
    Some(match column {
        "main_subject_id" => "e_main.node1",
        "main_subject" => "s_subject.text",
        "value" => "q_main.number",
        "value_unit" => "COALESCE(s_unit.text, q_main.unit)",
        "value_unit_id" => "q_main.unit",
        "low_tolerance" => "q_main.low_tolerance",
        "high_tolerance" => "q_main.high_tolerance",
        "dataset_id" => "e_dataset.node2",
        _ => return None,
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdminLevel {
    Country,
    Admin1,
    Admin2,
    Admin3,
}

impl AdminLevel {
    pub const ALL: [AdminLevel; 4] = [
        AdminLevel::Country,
        AdminLevel::Admin1,
        AdminLevel::Admin2,
        AdminLevel::Admin3,
    ];

    /// Member-of predicate linking a place to its enclosing region at this level.
    pub fn predicate(&self) -> &'static str {
        match self {
            AdminLevel::Country => vocab::COUNTRY,
            AdminLevel::Admin1 => vocab::ADMIN1,
            AdminLevel::Admin2 => vocab::ADMIN2,
            AdminLevel::Admin3 => vocab::ADMIN3,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AdminLevel::Country => "country",
            AdminLevel::Admin1 => "admin1",
            AdminLevel::Admin2 => "admin2",
            AdminLevel::Admin3 => "admin3",
        }
    }
}

/// Region ids per admin level; a row matches when any level matches.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceFilter {
    pub country: Vec<String>,
    pub admin1: Vec<String>,
    pub admin2: Vec<String>,
    pub admin3: Vec<String>,
}

impl PlaceFilter {
    pub fn ids(&self, level: AdminLevel) -> &[String] {
        match level {
            AdminLevel::Country => &self.country,
            AdminLevel::Admin1 => &self.admin1,
            AdminLevel::Admin2 => &self.admin2,
            AdminLevel::Admin3 => &self.admin3,
        }
    }

    pub fn with_ids(mut self, level: AdminLevel, ids: Vec<String>) -> Self {
        match level {
            AdminLevel::Country => self.country = ids,
            AdminLevel::Admin1 => self.admin1 = ids,
            AdminLevel::Admin2 => self.admin2 = ids,
            AdminLevel::Admin3 => self.admin3 = ids,
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        AdminLevel::ALL.iter().all(|level| self.ids(*level).is_empty())
    }
}

/// Builds the observation query for `property` in `dataset`.
///
/// `columns` selects the output; an empty slice projects every base and qualifier column.
/// Unknown columns are ignored. Each qualifier contributes its join fragment at most once.
pub fn build_observation_plan(
    property: &str,
    dataset: &str,
    qualifiers: &[Qualifier],
    columns: &[String],
    places: &PlaceFilter,
    limit: i64,
) -> Result<QueryPlan, StoreError> {
    let mut regions = qualifiers.iter().filter(|q| q.is_region);
    let location = regions.next();
    if let Some(extra) = regions.next() {
        return Err(StoreError::ambiguous_location(format!(
            "{} and {} both resolve to a location",
            location.map(|q| q.label.as_str()).unwrap_or_default(),
            extra.label
        )));
    }
    for (i, qualifier) in qualifiers.iter().enumerate() {
        if qualifiers[..i].iter().any(|q| q.name == qualifier.name) {
            return Err(StoreError::query(format!(
                "duplicate qualifier name {}",
                qualifier.name
            )));
        }
    }

    let mut plan = QueryPlan::new(SUBJECT_ALIAS);
    plan.add_fragment(base_fragment());

    let requested: Vec<String> = if columns.is_empty() {
        BASE_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(qualifiers.iter().flat_map(|q| q.field_names()))
            .collect()
    } else {
        columns.to_vec()
    };

    for column in &requested {
        if let Some(expr) = base_expr(column) {
            if column == SUBJECT_LABEL_OWNER {
                plan.add_fragment(subject_label_fragment());
            }
            plan.project(expr, column.clone());
            continue;
        }
        let owner = qualifiers.iter().find(|q| q.owns(column));
        if let Some(qualifier) = owner {
            plan.add_fragment(qualifier.join_fragment());
            if let Some((_, expr)) = qualifier.fields().into_iter().find(|(name, _)| name == column) {
                plan.project(expr, column.clone());
            }
        }
    }
    if plan.projection().is_empty() {
        plan.project("e_main.node1", "main_subject_id");
    }

    plan.filter(SqlFragment::new("e_main.label = ?").bind_text(property));
    plan.filter(SqlFragment::new("e_dataset.node2 = ?").bind_text(dataset));
    let place = place_condition(&mut plan, location, places);
    plan.filter(place);

    plan.order_by("e_main.node1");
    if let Some(time) = qualifiers.iter().find(|q| q.name == "time")
        && plan.has_fragment(&time.name)
    {
        plan.order_by(time.value_expr());
    }
    plan.order_by("e_main.id");
    plan.set_limit(limit);
    Ok(plan)
}

fn base_fragment() -> JoinFragment {
    let (unit_label, unit_text) = label_joins("l_unit", "s_unit", "q_main.unit");
    JoinFragment::new(BASE_OWNER)
        .join(JoinClause::new(
            JoinKind::Inner,
            "quantities",
            "q_main",
            SqlFragment::new("q_main.edge_id = e_main.id"),
        ))
        .join(JoinClause::new(
            JoinKind::Inner,
            "edges",
            "e_dataset",
            SqlFragment::new("e_dataset.node1 = e_main.id AND e_dataset.label = ?")
                .bind_text(vocab::DATASET),
        ))
        .join(unit_label)
        .join(unit_text)
}

fn subject_label_fragment() -> JoinFragment {
    let (label_edge, label_text) = label_joins("l_subject", "s_subject", "e_main.node1");
    JoinFragment::new(SUBJECT_LABEL_OWNER)
        .join(label_edge)
        .join(label_text)
}

fn place_condition(
    plan: &mut QueryPlan,
    location: Option<&Qualifier>,
    places: &PlaceFilter,
) -> SqlFragment {
    if places.is_empty() {
        return SqlFragment::always();
    }
    let node = match location {
        Some(qualifier) => {
            plan.add_fragment(qualifier.join_fragment());
            qualifier.node_expr()
        }
        None => "e_main.node1".to_string(),
    };
    let mut parts = Vec::new();
    for level in AdminLevel::ALL {
        let ids = places.ids(level);
        if ids.is_empty() {
            continue;
        }
        let alias = format!("e_{}", level.as_str());
        plan.add_fragment(JoinFragment::new(format!("place_{}", level.as_str())).join(
            JoinClause::new(
                JoinKind::Left,
                "edges",
                alias.clone(),
                SqlFragment::new(format!("{alias}.node1 = {node} AND {alias}.label = ?"))
                    .bind_text(level.predicate()),
            ),
        ));
        parts.push(SqlFragment::is_in(&format!("{alias}.node2"), ids));
    }
    SqlFragment::any_of(parts)
}

/// One result row; `values` line up with `columns`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ObservationRow {
    pub columns: Vec<String>,
    pub values: Vec<JsonValue>,
}

impl ObservationRow {
    pub fn get(&self, column: &str) -> Option<&JsonValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.values.get(i))
    }

    pub fn to_json(&self) -> JsonValue {
        let map: Map<String, JsonValue> = self
            .columns
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect();
        JsonValue::Object(map)
    }
}

fn json_from_sql(value: ValueRef<'_>) -> JsonValue {
    match value {
        ValueRef::Null => JsonValue::Null,
        ValueRef::Integer(v) => JsonValue::from(v),
        ValueRef::Real(v) => JsonNumber::from_f64(v)
            .map(JsonValue::Number)
            .unwrap_or(JsonValue::Null),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            JsonValue::String(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

impl EdgeStore {
    /// Finds the variable describing `property` in `dataset`, resolves its qualifiers and
    /// builds the observation plan. Without a variable, qualifiers are discovered from the
    /// stored observations.
    pub fn build_observation_query(
        &self,
        property: &str,
        dataset: &str,
        columns: &[String],
        places: &PlaceFilter,
        limit: i64,
    ) -> Result<QueryPlan, StoreError> {
        let qualifiers = match self.variable_node_for_property(dataset, property)? {
            Some(variable) => self.resolve_qualifiers(dataset, &variable)?,
            None => self.discover_qualifiers(dataset, property)?,
        };
        build_observation_plan(property, dataset, &qualifiers, columns, places, limit)
    }

    pub fn fetch_observations(&self, plan: &QueryPlan) -> Result<Vec<ObservationRow>, StoreError> {
        let (sql, params) = plan.render();
        debug!(%sql, params = params.len(), "fetching observations");
        let columns = plan.column_names();
        let mut stmt = self
            .connection()
            .prepare(&sql)
            .map_err(|e| StoreError::query(e.to_string()))?;
        let width = stmt.column_count();
        let rows = stmt
            .query_map(params_from_iter(params.iter()), |row| {
                let mut values = Vec::with_capacity(width);
                for i in 0..width {
                    values.push(json_from_sql(row.get_ref(i)?));
                }
                Ok(values)
            })
            .map_err(|e| StoreError::query(e.to_string()))?;
        let mut out = Vec::new();
        for row in rows {
            let values = row.map_err(|e| StoreError::query(e.to_string()))?;
            out.push(ObservationRow {
                columns: columns.clone(),
                values,
            });
        }
        Ok(out)
    }
}
