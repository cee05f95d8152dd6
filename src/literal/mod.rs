//! Codec for the compact literal encoding stored in an edge's `node2` column.
//!
//! Detection is a fixed-priority cascade keyed on the first character:
//!
//! | sigil                      | kind                      | example               |
//! |----------------------------|---------------------------|-----------------------|
//! | `"`                        | string                    | `"hello"`             |
//! | `'`                        | language-qualified string | `'bonjour'@fr`        |
//! | digit, `+`, `-`, `.`       | quantity                  | `5[4,6]Q123`          |
//! | `@`                        | coordinates               | `@45.5/-120.25`       |
//! | `^`                        | date/time                 | `^2021-06-01/11`      |
//! | anything else              | symbol                    | `Q42`                 |
//!
//! Text that starts with a sigil must satisfy that kind's grammar; it never falls back to
//! a symbol. Only text carrying none of the sigils decodes as [`Literal::Symbol`].
//!
//! Encoding is the inverse of decoding: `decode(&encode(&v)) == Ok(v)` for every value the
//! decoder can produce. Re-encoding decoded text is not byte-identical in general, numbers
//! lose `_` separators and trailing zeros, dates are normalized to
//! `YYYY-MM-DDTHH:MM:SS<zone>`.

mod coordinate;
mod date;
mod number;
mod string;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use coordinate::CoordinateValue;
pub use date::DateValue;
pub use number::{Number, QuantityValue, is_units_node, parse_number};
pub use string::LangString;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationErrorKind {
    /// The text does not match the grammar selected by its sigil.
    Syntax,
    /// The text is well formed but a component is outside its domain.
    Range,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationErrorKind::Syntax => write!(f, "syntax"),
            ValidationErrorKind::Range => write!(f, "range"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("literal {kind} error: {detail}")]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    pub detail: String,
}

impl ValidationError {
    pub fn syntax<T: Into<String>>(detail: T) -> Self {
        Self {
            kind: ValidationErrorKind::Syntax,
            detail: detail.into(),
        }
    }

    pub fn range<T: Into<String>>(detail: T) -> Self {
        Self {
            kind: ValidationErrorKind::Range,
            detail: detail.into(),
        }
    }
}

/// Tag stored in `edges.data_type`; selects the satellite table holding typed fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    String,
    DateAndTime,
    Quantity,
    Coordinate,
    Symbol,
}

impl DataType {
    pub const ALL: [DataType; 5] = [
        DataType::String,
        DataType::DateAndTime,
        DataType::Quantity,
        DataType::Coordinate,
        DataType::Symbol,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::String => "string",
            DataType::DateAndTime => "date_and_time",
            DataType::Quantity => "quantity",
            DataType::Coordinate => "coordinate",
            DataType::Symbol => "symbol",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DataType::ALL
            .into_iter()
            .find(|ty| ty.as_str() == s)
            .ok_or_else(|| ValidationError::syntax(format!("unknown data type tag `{s}`")))
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Literal {
    Str(String),
    LangStr(LangString),
    Quantity(QuantityValue),
    Coordinate(CoordinateValue),
    DateTime(DateValue),
    Symbol(String),
}

impl Literal {
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::Str(_) | Literal::LangStr(_) => DataType::String,
            Literal::Quantity(_) => DataType::Quantity,
            Literal::Coordinate(_) => DataType::Coordinate,
            Literal::DateTime(_) => DataType::DateAndTime,
            Literal::Symbol(_) => DataType::Symbol,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(text) => f.write_str(&string::format_string(text)),
            Literal::LangStr(value) => f.write_str(&value.to_literal_text()),
            Literal::Quantity(value) => f.write_str(&value.to_literal_text()),
            Literal::Coordinate(value) => f.write_str(&value.to_literal_text()),
            Literal::DateTime(value) => f.write_str(&value.to_literal_text()),
            Literal::Symbol(symbol) => f.write_str(symbol),
        }
    }
}

impl FromStr for Literal {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode(s)
    }
}

/// Parses `text` into a typed literal, trying each kind in sigil order.
pub fn decode(text: &str) -> Result<Literal, ValidationError> {
    let Some(first) = text.chars().next() else {
        return Err(ValidationError::syntax("empty literal"));
    };
    match first {
        '"' => string::parse_string(text).map(Literal::Str),
        '\'' => string::parse_lang_string(text).map(Literal::LangStr),
        '0'..='9' | '+' | '-' | '.' => number::parse_quantity(text).map(Literal::Quantity),
        '@' => coordinate::parse_coordinate(text).map(Literal::Coordinate),
        '^' => date::parse_date(text).map(Literal::DateTime),
        _ => Ok(Literal::Symbol(text.to_string())),
    }
}

pub fn encode(literal: &Literal) -> String {
    literal.to_string()
}

/// Decodes and re-encodes `text`, yielding the form stored in `edges.node2`.
pub fn canonicalize(text: &str) -> Result<String, ValidationError> {
    decode(text).map(|literal| encode(&literal))
}
