use std::fmt::Write as _;

use rusqlite::types::Value;

/// Bound parameter value; rendered as a positional `?`.
pub type SqlParam = Value;

/// `"name"`, doubling embedded quotes. Output columns and qualifier-derived aliases are
/// always quoted since they come from free-text labels.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// A piece of SQL text with the parameters its `?` placeholders bind, in text order.
#[derive(Clone, Debug, PartialEq)]
pub struct SqlFragment {
    pub sql: String,
    pub params: Vec<SqlParam>,
}

impl SqlFragment {
    pub fn new<S: Into<String>>(sql: S) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params<S: Into<String>>(sql: S, params: Vec<SqlParam>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    pub fn bind<P: Into<SqlParam>>(mut self, param: P) -> Self {
        self.params.push(param.into());
        self
    }

    pub fn bind_text<S: Into<String>>(self, text: S) -> Self {
        self.bind(Value::Text(text.into()))
    }

    /// Always-true predicate.
    pub fn always() -> Self {
        Self::new("1=1")
    }

    /// `(a) OR (b) ...`; an empty input degrades to [`SqlFragment::always`].
    pub fn any_of(parts: Vec<SqlFragment>) -> Self {
        if parts.is_empty() {
            return Self::always();
        }
        let mut sql = String::from("(");
        let mut params = Vec::new();
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                sql.push_str(" OR ");
            }
            sql.push('(');
            sql.push_str(&part.sql);
            sql.push(')');
            params.extend(part.params);
        }
        sql.push(')');
        Self { sql, params }
    }

    /// `expr IN (?, ?, ...)` binding each value.
    pub fn is_in(expr: &str, values: &[String]) -> Self {
        let placeholders = vec!["?"; values.len()].join(", ");
        Self {
            sql: format!("{expr} IN ({placeholders})"),
            params: values.iter().cloned().map(Value::Text).collect(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl JoinKind {
    fn keyword(self) -> &'static str {
        match self {
            JoinKind::Inner => "JOIN",
            JoinKind::Left => "LEFT JOIN",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub table: &'static str,
    pub alias: String,
    pub on: SqlFragment,
}

impl JoinClause {
    pub fn new<A: Into<String>>(kind: JoinKind, table: &'static str, alias: A, on: SqlFragment) -> Self {
        Self {
            kind,
            table,
            alias: alias.into(),
            on,
        }
    }
}

/// The joins one owner (the base statement, a qualifier, a place level) contributes.
#[derive(Clone, Debug, PartialEq)]
pub struct JoinFragment {
    pub owner: String,
    pub clauses: Vec<JoinClause>,
}

impl JoinFragment {
    pub fn new<O: Into<String>>(owner: O) -> Self {
        Self {
            owner: owner.into(),
            clauses: Vec::new(),
        }
    }

    pub fn join(mut self, clause: JoinClause) -> Self {
        self.clauses.push(clause);
        self
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Projection {
    pub expr: String,
    pub alias: String,
}

/// A single SELECT over `edges`, assembled from join fragments.
#[derive(Clone, Debug, PartialEq)]
pub struct QueryPlan {
    base_alias: String,
    fragments: Vec<JoinFragment>,
    projection: Vec<Projection>,
    conditions: Vec<SqlFragment>,
    order_by: Vec<String>,
    limit: Option<u64>,
}

impl QueryPlan {
    pub fn new<A: Into<String>>(base_alias: A) -> Self {
        Self {
            base_alias: base_alias.into(),
            fragments: Vec::new(),
            projection: Vec::new(),
            conditions: Vec::new(),
            order_by: Vec::new(),
            limit: None,
        }
    }

    /// Adds `fragment` unless a fragment with the same owner is already present.
    /// Returns whether it was added.
    pub fn add_fragment(&mut self, fragment: JoinFragment) -> bool {
        if self.has_fragment(&fragment.owner) {
            return false;
        }
        self.fragments.push(fragment);
        true
    }

    pub fn has_fragment(&self, owner: &str) -> bool {
        self.fragments.iter().any(|f| f.owner == owner)
    }

    pub fn project<E: Into<String>, A: Into<String>>(&mut self, expr: E, alias: A) {
        self.projection.push(Projection {
            expr: expr.into(),
            alias: alias.into(),
        });
    }

    pub fn filter(&mut self, condition: SqlFragment) {
        self.conditions.push(condition);
    }

    pub fn order_by<E: Into<String>>(&mut self, expr: E) {
        self.order_by.push(expr.into());
    }

    /// A limit of zero or less means unbounded.
    pub fn set_limit(&mut self, limit: i64) {
        self.limit = u64::try_from(limit).ok().filter(|l| *l > 0);
    }

    pub fn fragments(&self) -> &[JoinFragment] {
        &self.fragments
    }

    pub fn projection(&self) -> &[Projection] {
        &self.projection
    }

    pub fn column_names(&self) -> Vec<String> {
        self.projection.iter().map(|p| p.alias.clone()).collect()
    }

    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Renders the SQL text and its parameters in placeholder order.
    pub fn render(&self) -> (String, Vec<SqlParam>) {
        let mut sql = String::from("SELECT ");
        let mut params = Vec::new();

        if self.projection.is_empty() {
            let _ = write!(sql, "{}.id", self.base_alias);
        }
        for (i, column) in self.projection.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let _ = write!(sql, "{} AS {}", column.expr, quote_ident(&column.alias));
        }
        let _ = write!(sql, "\nFROM edges AS {}", self.base_alias);

        for fragment in &self.fragments {
            for clause in &fragment.clauses {
                let _ = write!(
                    sql,
                    "\n{} {} AS {} ON {}",
                    clause.kind.keyword(),
                    clause.table,
                    clause.alias,
                    clause.on.sql
                );
                params.extend(clause.on.params.iter().cloned());
            }
        }

        if !self.conditions.is_empty() {
            sql.push_str("\nWHERE ");
            for (i, condition) in self.conditions.iter().enumerate() {
                if i > 0 {
                    sql.push_str(" AND ");
                }
                sql.push_str(&condition.sql);
                params.extend(condition.params.iter().cloned());
            }
        }

        if !self.order_by.is_empty() {
            let _ = write!(sql, "\nORDER BY {}", self.order_by.join(", "));
        }

        if let Some(limit) = self.limit {
            sql.push_str("\nLIMIT ?");
            params.push(Value::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
        }
        (sql, params)
    }
}
