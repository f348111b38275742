//! Length units and conversion into the canonical engine unit.
//!
//! Callers may describe products, pallets and containers in millimeters,
//! centimeters or inches. All geometry inside the engine is compared in
//! centimeters only; values are converted once, at the boundary.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Supported length units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub enum LengthUnit {
    #[serde(rename = "mm", alias = "millimeter", alias = "millimeters")]
    Millimeter,
    #[default]
    #[serde(rename = "cm", alias = "centimeter", alias = "centimeters")]
    Centimeter,
    #[serde(rename = "in", alias = "inch", alias = "inches")]
    Inch,
}

/// The single unit every normalized value is expressed in.
pub const CANONICAL_UNIT: LengthUnit = LengthUnit::Centimeter;

impl LengthUnit {
    /// Number of canonical units (cm) in one unit of `self`.
    #[inline]
    pub const fn canonical_factor(self) -> f64 {
        match self {
            LengthUnit::Millimeter => 0.1,
            LengthUnit::Centimeter => 1.0,
            LengthUnit::Inch => 2.54,
        }
    }

    /// Short symbol used in messages and serialized output.
    pub const fn symbol(self) -> &'static str {
        match self {
            LengthUnit::Millimeter => "mm",
            LengthUnit::Centimeter => "cm",
            LengthUnit::Inch => "in",
        }
    }
}

impl std::fmt::Display for LengthUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Converts `value` given in `unit` into centimeters.
///
/// Total over all units. Non-finite input stays non-finite so the validator
/// can still reject it afterwards.
#[inline]
pub fn normalize(value: f64, unit: LengthUnit) -> f64 {
    match unit {
        // Exact for the canonical unit; avoids a pointless multiplication.
        LengthUnit::Centimeter => value,
        LengthUnit::Millimeter => value / 10.0,
        LengthUnit::Inch => value * unit.canonical_factor(),
    }
}
