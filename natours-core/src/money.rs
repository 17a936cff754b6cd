//! Conversion between stored major units and the provider's minor units.

pub fn to_minor_units(major: f64) -> i64 {
    (major * 100.0).round() as i64
}

pub fn from_minor_units(minor: i64) -> f64 {
    minor as f64 / 100.0
}
