use std::{fmt, sync::LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ValidationError;

const DIGIT_PART: &str = r"[0-9](?:_?[0-9])*";

const SI_UNITS: &[&str] = &[
    "ohms", "mol", "kat", "cd", "Hz", "Pa", "Wb", "lx", "Bq", "Gy", "Sv", "kg", "m", "g", "s",
    "A", "K", "N", "J", "W", "C", "V", "F", "S", "T", "H", "L", "t",
];

/// Python-style numeric literal without sign: integers (decimal, `0x`, `0o`, `0b`), point
/// floats and exponent floats, with optional `_` digit separators.
fn number_pattern() -> String {
    let dec_integer = r"(?:[1-9](?:_?[0-9])*|0+(?:_?0)*)";
    let bin_integer = r"(?:0[bB](?:_?[01])+)";
    let oct_integer = r"(?:0[oO](?:_?[0-7])+)";
    let hex_integer = r"(?:0[xX](?:_?[0-9a-fA-F])+)";
    let integer = format!("(?:{hex_integer}|{oct_integer}|{bin_integer}|{dec_integer})");
    let fraction = format!(r"(?:\.{DIGIT_PART})");
    let point_float = format!(r"(?:(?:{DIGIT_PART})?{fraction}|{DIGIT_PART}\.)");
    let exponent = format!("(?:[eE][-+]?{DIGIT_PART})");
    let exponent_float = format!("(?:(?:{point_float}|{DIGIT_PART}){exponent})");
    let float_number = format!("(?:{exponent_float}|{point_float})");
    format!("(?:{float_number}|{integer})")
}

fn si_pattern() -> String {
    let unit = format!("(?:{})", SI_UNITS.join("|"));
    let power = "(?:-1|2|3)";
    format!("(?:{unit}{power}?(?:[./]{unit}{power}?)*)")
}

static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    let number = number_pattern();
    let pattern = format!(
        r"^(?P<number>[-+]?{number})(?:\[(?P<low>[-+]?{number}),(?P<high>[-+]?{number})\])?(?:(?P<si>{si})|(?P<node>Q[A-Za-z0-9_-]+))?$",
        si = si_pattern(),
    );
    Regex::new(&pattern).expect("quantity pattern")
});

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!("^[-+]?{}$", number_pattern())).expect("number pattern")
});

static UNITS_NODE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Q[A-Za-z0-9_-]+$").expect("units node pattern"));

/// Numeric magnitude; integral literals stay integers, everything else is a float.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_f64(&self) -> f64 {
        match self {
            Number::Int(v) => *v as f64,
            Number::Float(v) => *v,
        }
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Number::Float(_))
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Number::Int(v) => write!(f, "{v}"),
            // Debug always keeps a `.` or an exponent, so the text re-decodes as a float.
            Number::Float(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for Number {
    fn from(value: i64) -> Self {
        Number::Int(value)
    }
}

impl From<f64> for Number {
    fn from(value: f64) -> Self {
        Number::Float(value)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuantityValue {
    pub number: Number,
    pub low_tolerance: Option<f64>,
    pub high_tolerance: Option<f64>,
    pub si_units: Option<String>,
    pub units_node: Option<String>,
}

impl QuantityValue {
    pub fn new<N: Into<Number>>(number: N) -> Self {
        Self {
            number: number.into(),
            low_tolerance: None,
            high_tolerance: None,
            si_units: None,
            units_node: None,
        }
    }

    pub fn with_tolerance(mut self, low: f64, high: f64) -> Self {
        self.low_tolerance = Some(low);
        self.high_tolerance = Some(high);
        self
    }

    /// Sets the unit, routing `Q…` identifiers to `units_node` and the rest to `si_units`.
    pub fn with_unit<T: Into<String>>(mut self, unit: T) -> Self {
        let unit = unit.into();
        if is_units_node(&unit) {
            self.units_node = Some(unit);
            self.si_units = None;
        } else {
            self.si_units = Some(unit);
            self.units_node = None;
        }
        self
    }

    pub fn unit(&self) -> Option<&str> {
        self.units_node.as_deref().or(self.si_units.as_deref())
    }

    pub(super) fn to_literal_text(&self) -> String {
        let mut out = self.number.to_string();
        if let (Some(low), Some(high)) = (self.low_tolerance, self.high_tolerance) {
            out.push('[');
            out.push_str(&format_tolerance(low));
            out.push(',');
            out.push_str(&format_tolerance(high));
            out.push(']');
        }
        if let Some(unit) = self.unit() {
            out.push_str(unit);
        }
        out
    }
}

pub fn is_units_node(text: &str) -> bool {
    UNITS_NODE_RE.is_match(text)
}

pub(super) fn parse_quantity(text: &str) -> Result<QuantityValue, ValidationError> {
    let caps = QUANTITY_RE
        .captures(text)
        .ok_or_else(|| ValidationError::syntax(format!("malformed quantity: {text}")))?;
    let number = number_from_text(&caps["number"])?;
    let low_tolerance = caps
        .name("low")
        .map(|m| number_from_text(m.as_str()).map(|n| n.as_f64()))
        .transpose()?;
    let high_tolerance = caps
        .name("high")
        .map(|m| number_from_text(m.as_str()).map(|n| n.as_f64()))
        .transpose()?;
    Ok(QuantityValue {
        number,
        low_tolerance,
        high_tolerance,
        si_units: caps.name("si").map(|m| m.as_str().to_string()),
        units_node: caps.name("node").map(|m| m.as_str().to_string()),
    })
}

/// Parses a bare signed number using the same rules as the quantity grammar.
pub fn parse_number(text: &str) -> Result<Number, ValidationError> {
    if !NUMBER_RE.is_match(text) {
        return Err(ValidationError::syntax(format!("malformed number: {text}")));
    }
    number_from_text(text)
}

fn number_from_text(text: &str) -> Result<Number, ValidationError> {
    let cleaned = text.replace('_', "");
    let (negative, body) = match cleaned.as_bytes().first() {
        Some(b'-') => (true, &cleaned[1..]),
        Some(b'+') => (false, &cleaned[1..]),
        _ => (false, cleaned.as_str()),
    };
    let lower = body.to_ascii_lowercase();
    let radix = if lower.starts_with("0x") {
        Some(16)
    } else if lower.starts_with("0o") {
        Some(8)
    } else if lower.starts_with("0b") {
        Some(2)
    } else {
        None
    };

    if let Some(radix) = radix {
        let magnitude = u64::from_str_radix(&body[2..], radix)
            .map_err(|e| ValidationError::range(format!("{text}: {e}")))?;
        return Ok(signed_integer(negative, magnitude as i128));
    }

    if body.contains('.') || lower.contains('e') {
        let value: f64 = cleaned
            .parse()
            .map_err(|e| ValidationError::syntax(format!("{text}: {e}")))?;
        if !value.is_finite() {
            return Err(ValidationError::range(format!("{text} is not finite")));
        }
        return Ok(Number::Float(value));
    }

    match body.parse::<i128>() {
        Ok(magnitude) => Ok(signed_integer(negative, magnitude)),
        Err(_) => {
            let value: f64 = cleaned
                .parse()
                .map_err(|e| ValidationError::syntax(format!("{text}: {e}")))?;
            Ok(Number::Float(value))
        }
    }
}

fn signed_integer(negative: bool, magnitude: i128) -> Number {
    let value = if negative { -magnitude } else { magnitude };
    match i64::try_from(value) {
        Ok(v) => Number::Int(v),
        Err(_) => Number::Float(value as f64),
    }
}

fn format_tolerance(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value:?}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_with_e_digit_stays_integer() {
        assert_eq!(number_from_text("0x1e").unwrap(), Number::Int(30));
    }

    #[test]
    fn underscores_are_ignored() {
        assert_eq!(number_from_text("1_000").unwrap(), Number::Int(1000));
        assert_eq!(number_from_text("-2_5.5").unwrap(), Number::Float(-25.5));
    }

    #[test]
    fn oversized_integer_becomes_float() {
        let value = number_from_text("123456789012345678901234567890").unwrap();
        assert!(value.is_float());
    }

    #[test]
    fn float_display_keeps_fraction_marker() {
        assert_eq!(Number::Float(5200.0).to_string(), "5200.0");
        assert_eq!(Number::Int(5200).to_string(), "5200");
    }

    #[test]
    fn integral_tolerances_print_without_fraction() {
        assert_eq!(format_tolerance(4.0), "4");
        assert_eq!(format_tolerance(-0.25), "-0.25");
    }
}
