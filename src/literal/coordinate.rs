use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::ValidationError;

static COORDINATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    let decimal = r"[-+]?(?:[0-9]+(?:\.[0-9]*)?|\.[0-9]+)";
    Regex::new(&format!("^@(?P<lat>{decimal})/(?P<lon>{decimal})$")).expect("coordinate pattern")
});

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoordinateValue {
    pub latitude: f64,
    pub longitude: f64,
    /// Not part of the literal text; only carried by stored rows and exploded columns.
    pub precision: Option<f64>,
}

impl CoordinateValue {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        check_range(latitude, longitude)?;
        Ok(Self {
            latitude,
            longitude,
            precision: None,
        })
    }

    pub(super) fn to_literal_text(&self) -> String {
        format!("@{}/{}", self.latitude, self.longitude)
    }
}

pub(super) fn parse_coordinate(text: &str) -> Result<CoordinateValue, ValidationError> {
    let caps = COORDINATE_RE
        .captures(text)
        .ok_or_else(|| ValidationError::syntax(format!("malformed coordinates: {text}")))?;
    let latitude: f64 = caps["lat"]
        .parse()
        .map_err(|_| ValidationError::syntax(format!("latitude is not numeric: {text}")))?;
    let longitude: f64 = caps["lon"]
        .parse()
        .map_err(|_| ValidationError::syntax(format!("longitude is not numeric: {text}")))?;
    CoordinateValue::new(latitude, longitude)
}

fn check_range(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ValidationError::range(format!(
            "latitude {latitude} outside [-90, 90]"
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ValidationError::range(format!(
            "longitude {longitude} outside [-180, 180]"
        )));
    }
    Ok(())
}
