use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

use super::ValidationError;

pub const MIN_YEAR: i64 = 1583;
pub const MAX_YEAR: i64 = 2100;

// Lax ISO-8601: month 00 and day 00 are accepted here and rejected afterwards, the year is
// matched lazily so basic-form dates (`^20210601`) split into year, month and day.
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"^\^(?P<year>[-+]?[0-9]{4,}?)",
        r"(?:(?P<hy1>-)?(?P<month>1[0-2]|0[0-9])",
        r"(?:(?P<hy2>-)?(?P<day>3[01]|[12][0-9]|0[0-9]))?)?",
        r"(?:T(?P<hour>2[0-4]|[01][0-9])",
        r"(?:(?P<co1>:)?(?P<minute>[0-5][0-9])",
        r"(?:(?P<co2>:)?(?P<second>[0-5][0-9]))?)?",
        r"(?P<zone>Z|[-+](?:2[0-3]|[01][0-9])(?::?[0-5][0-9])?)?)?",
        r"(?:/(?P<precision>1[0-9]|0?[0-9]))?$",
    ))
    .expect("date pattern")
});

/// A point in time normalized to `YYYY-MM-DDTHH:MM:SS<zone>`.
///
/// Missing month/day default to `01`, missing time fields to `00`, a missing zone to `Z`.
/// `precision` follows the Wikidata scale (9 = year, 10 = month, 11 = day, ...).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateValue {
    pub date_and_time: String,
    pub precision: Option<u8>,
    pub calendar: Option<String>,
}

impl DateValue {
    /// Builds a value from a stored `date_and_time`, validating it with the literal grammar.
    pub fn from_stored(
        date_and_time: &str,
        precision: Option<u8>,
        calendar: Option<String>,
    ) -> Result<Self, ValidationError> {
        let parsed = parse_date(&format!("^{date_and_time}"))?;
        if let Some(p) = precision {
            check_precision(p)?;
        }
        Ok(Self {
            date_and_time: parsed.date_and_time,
            precision,
            calendar,
        })
    }

    pub(super) fn to_literal_text(&self) -> String {
        match self.precision {
            Some(precision) => format!("^{}/{}", self.date_and_time, precision),
            None => format!("^{}", self.date_and_time),
        }
    }
}

pub(super) fn parse_date(text: &str) -> Result<DateValue, ValidationError> {
    let caps = DATE_RE
        .captures(text)
        .ok_or_else(|| ValidationError::syntax(format!("malformed date/time: {text}")))?;
    check_separators(&caps, text)?;

    let year: i64 = caps["year"]
        .parse()
        .map_err(|_| ValidationError::range(format!("year out of range: {text}")))?;
    if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
        return Err(ValidationError::range(format!(
            "year {year} outside [{MIN_YEAR}, {MAX_YEAR}]"
        )));
    }
    let month = component(&caps, "month");
    let day = component(&caps, "day");
    if month == Some(0) {
        return Err(ValidationError::range(format!("month 00 in {text}")));
    }
    if day == Some(0) {
        return Err(ValidationError::range(format!("day 00 in {text}")));
    }
    let hour = component(&caps, "hour");
    // End-of-day (24:00:00) is not accepted in any form.
    if hour == Some(24) {
        return Err(ValidationError::range(format!("hour 24 in {text}")));
    }
    let minute = component(&caps, "minute");
    let second = component(&caps, "second");
    let zone = normalize_zone(caps.name("zone").map(|m| m.as_str()));
    let precision = caps
        .name("precision")
        .map(|m| m.as_str().parse::<u8>())
        .transpose()
        .map_err(|_| ValidationError::syntax(format!("bad precision in {text}")))?;
    if let Some(p) = precision {
        check_precision(p)?;
    }

    let date_and_time = format!(
        "{:04}-{:02}-{:02}T{:02}:{:02}:{:02}{}",
        year,
        month.unwrap_or(1),
        day.unwrap_or(1),
        hour.unwrap_or(0),
        minute.unwrap_or(0),
        second.unwrap_or(0),
        zone
    );
    Ok(DateValue {
        date_and_time,
        precision,
        calendar: None,
    })
}

fn component(caps: &Captures<'_>, name: &str) -> Option<u8> {
    caps.name(name).and_then(|m| m.as_str().parse().ok())
}

/// Extended form (`-`/`:` everywhere) or basic form (none at all); mixing is rejected.
fn check_separators(caps: &Captures<'_>, text: &str) -> Result<(), ValidationError> {
    let slots = [
        ("month", "hy1"),
        ("day", "hy2"),
        ("minute", "co1"),
        ("second", "co2"),
    ];
    let mut seen: Option<bool> = None;
    for (field, separator) in slots {
        if caps.name(field).is_none() {
            continue;
        }
        let present = caps.name(separator).is_some();
        match seen {
            None => seen = Some(present),
            Some(expected) if expected != present => {
                return Err(ValidationError::syntax(format!(
                    "mixed basic and extended separators in {text}"
                )));
            }
            Some(_) => {}
        }
    }
    Ok(())
}

fn normalize_zone(zone: Option<&str>) -> String {
    match zone {
        None | Some("Z") => "Z".to_string(),
        Some(offset) => {
            let digits: String = offset[1..].chars().filter(|c| *c != ':').collect();
            let sign = &offset[..1];
            if digits.len() == 2 {
                format!("{sign}{digits}:00")
            } else {
                format!("{sign}{}:{}", &digits[..2], &digits[2..])
            }
        }
    }
}

fn check_precision(precision: u8) -> Result<(), ValidationError> {
    if precision > 19 {
        return Err(ValidationError::range(format!(
            "precision {precision} outside [0, 19]"
        )));
    }
    Ok(())
}
