use rusqlite::{
    Row,
    types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef},
};
use serde::{Deserialize, Serialize};

use crate::literal::{
    self, CoordinateValue, DataType, DateValue, LangString, Literal, Number, QuantityValue,
    ValidationError, is_units_node,
};

/// One statement row: `node1 --label--> node2` plus the tag naming its satellite table.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub node1: String,
    pub label: String,
    pub node2: String,
    pub data_type: DataType,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StringValue {
    pub text: String,
    /// `lang[-suffix]`, absent for plain strings.
    pub language: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolValue {
    pub symbol: String,
}

/// Typed fields of an edge, stored in exactly one satellite table.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EdgeValue {
    String(StringValue),
    Date(DateValue),
    Quantity(QuantityValue),
    Coordinate(CoordinateValue),
    Symbol(SymbolValue),
}

impl EdgeValue {
    pub fn data_type(&self) -> DataType {
        match self {
            EdgeValue::String(_) => DataType::String,
            EdgeValue::Date(_) => DataType::DateAndTime,
            EdgeValue::Quantity(_) => DataType::Quantity,
            EdgeValue::Coordinate(_) => DataType::Coordinate,
            EdgeValue::Symbol(_) => DataType::Symbol,
        }
    }

    pub fn to_literal(&self) -> Literal {
        match self {
            EdgeValue::String(StringValue {
                text,
                language: Some(tag),
            }) => Literal::LangStr(LangString::from_tag(text.clone(), tag)),
            EdgeValue::String(StringValue {
                text,
                language: None,
            }) => Literal::Str(text.clone()),
            EdgeValue::Date(value) => Literal::DateTime(value.clone()),
            EdgeValue::Quantity(value) => Literal::Quantity(value.clone()),
            EdgeValue::Coordinate(value) => Literal::Coordinate(value.clone()),
            EdgeValue::Symbol(value) => Literal::Symbol(value.symbol.clone()),
        }
    }
}

impl From<Literal> for EdgeValue {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Str(text) => EdgeValue::String(StringValue {
                text,
                language: None,
            }),
            Literal::LangStr(value) => EdgeValue::String(StringValue {
                language: Some(value.tag()),
                text: value.text,
            }),
            Literal::Quantity(value) => EdgeValue::Quantity(value),
            Literal::Coordinate(value) => EdgeValue::Coordinate(value),
            Literal::DateTime(value) => EdgeValue::Date(value),
            Literal::Symbol(symbol) => EdgeValue::Symbol(SymbolValue { symbol }),
        }
    }
}

/// An edge together with its satellite value: the unit of import.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatementRecord {
    pub edge: Edge,
    pub value: EdgeValue,
}

impl StatementRecord {
    /// Builds a record from a typed literal; `node2` becomes the literal's canonical text.
    pub fn from_literal<I, N, L>(id: I, node1: N, label: L, literal: Literal) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        L: Into<String>,
    {
        let edge = Edge {
            id: id.into(),
            node1: node1.into(),
            label: label.into(),
            node2: literal::encode(&literal),
            data_type: literal.data_type(),
        };
        Self {
            edge,
            value: EdgeValue::from(literal),
        }
    }

    /// Decodes `raw` and builds the record for it.
    pub fn parse<I, N, L>(id: I, node1: N, label: L, raw: &str) -> Result<Self, ValidationError>
    where
        I: Into<String>,
        N: Into<String>,
        L: Into<String>,
    {
        let literal = literal::decode(raw)?;
        Ok(Self::from_literal(id, node1, label, literal))
    }
}

impl ToSql for Number {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Number::Int(v) => ToSqlOutput::from(*v),
            Number::Float(v) => ToSqlOutput::from(*v),
        })
    }
}

impl FromSql for Number {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        match value {
            ValueRef::Integer(v) => Ok(Number::Int(v)),
            ValueRef::Real(v) => Ok(Number::Float(v)),
            ValueRef::Text(_) => literal::parse_number(value.as_str()?)
                .map_err(|e| FromSqlError::Other(Box::new(e))),
            _ => Err(FromSqlError::InvalidType),
        }
    }
}

impl ToSql for DataType {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for DataType {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: ValidationError| FromSqlError::Other(Box::new(e)))
    }
}

pub(crate) const EDGE_COLUMNS: &str = "id, node1, label, node2, data_type";

pub(crate) fn edge_from_row(row: &Row<'_>) -> rusqlite::Result<Edge> {
    Ok(Edge {
        id: row.get(0)?,
        node1: row.get(1)?,
        label: row.get(2)?,
        node2: row.get(3)?,
        data_type: row.get(4)?,
    })
}

pub(crate) fn satellite_table(data_type: DataType) -> &'static str {
    match data_type {
        DataType::String => "strings",
        DataType::DateAndTime => "dates",
        DataType::Quantity => "quantities",
        DataType::Coordinate => "coordinates",
        DataType::Symbol => "symbols",
    }
}

pub(crate) fn value_select_sql(data_type: DataType) -> &'static str {
    match data_type {
        DataType::String => "SELECT text, language FROM strings WHERE edge_id=?1",
        DataType::DateAndTime => {
            "SELECT date_and_time, precision, calendar FROM dates WHERE edge_id=?1"
        }
        DataType::Quantity => {
            "SELECT number, unit, low_tolerance, high_tolerance FROM quantities WHERE edge_id=?1"
        }
        DataType::Coordinate => {
            "SELECT latitude, longitude, precision FROM coordinates WHERE edge_id=?1"
        }
        DataType::Symbol => "SELECT symbol FROM symbols WHERE edge_id=?1",
    }
}

pub(crate) fn value_from_row(data_type: DataType, row: &Row<'_>) -> rusqlite::Result<EdgeValue> {
    Ok(match data_type {
        DataType::String => EdgeValue::String(StringValue {
            text: row.get(0)?,
            language: row.get(1)?,
        }),
        DataType::DateAndTime => {
            let precision: Option<i64> = row.get(1)?;
            EdgeValue::Date(DateValue {
                date_and_time: row.get(0)?,
                precision: precision.and_then(|p| u8::try_from(p).ok()),
                calendar: row.get(2)?,
            })
        }
        DataType::Quantity => {
            let unit: Option<String> = row.get(1)?;
            let (units_node, si_units) = match unit {
                Some(unit) if is_units_node(&unit) => (Some(unit), None),
                Some(unit) => (None, Some(unit)),
                None => (None, None),
            };
            EdgeValue::Quantity(QuantityValue {
                number: row.get(0)?,
                low_tolerance: row.get(2)?,
                high_tolerance: row.get(3)?,
                si_units,
                units_node,
            })
        }
        DataType::Coordinate => EdgeValue::Coordinate(CoordinateValue {
            latitude: row.get(0)?,
            longitude: row.get(1)?,
            precision: row.get(2)?,
        }),
        DataType::Symbol => EdgeValue::Symbol(SymbolValue {
            symbol: row.get(0)?,
        }),
    })
}
