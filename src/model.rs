//! Data models for pallet and container load planning.
//!
//! This module defines the inputs and outputs of the optimization engine:
//! - `Product`, `Demand`: what should be shipped
//! - `Pallet`, `Container`: reusable templates describing the load carriers
//! - `ProductPlacement`, `PalletArrangement`, `OptimizationResult`: what the engine produced
//!
//! Inputs are never mutated by the engine. Every output is created fresh per
//! optimization call.

use serde::{Deserialize, Deserializer, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use thiserror::Error;
use utoipa::ToSchema;

use crate::types::{BoundingBox, Dimensional, Vec3};
use crate::units::{CANONICAL_UNIT, LengthUnit, normalize};

/// Validation error for template and dimension data.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be a positive number, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn validate_weight_limit(value: f64, name: &str) -> Result<(), ValidationError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ValidationError::InvalidWeight(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

fn missing_number() -> f64 {
    f64::NAN
}

fn zero_weight() -> f64 {
    0.0
}

/// Accepts JSON numbers and numeric strings. Anything else (null, text,
/// objects) becomes NaN, which the validator reports as non-numeric.
fn lenient_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::Number(number)) => number.as_f64().unwrap_or(f64::NAN),
        Some(serde_json::Value::String(text)) => text.trim().parse::<f64>().unwrap_or(f64::NAN),
        _ => f64::NAN,
    })
}

/// Physical extent of a product, pallet or container.
///
/// Values are expressed in `unit`. Use [`Dimensions::to_canonical`] before
/// comparing two values.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({"length": 50.0, "width": 40.0, "height": 30.0, "unit": "cm"}))]
pub struct Dimensions {
    #[serde(default = "missing_number", deserialize_with = "lenient_f64")]
    pub length: f64,
    #[serde(default = "missing_number", deserialize_with = "lenient_f64")]
    pub width: f64,
    #[serde(default = "missing_number", deserialize_with = "lenient_f64")]
    pub height: f64,
    #[serde(default)]
    pub unit: LengthUnit,
}

impl Dimensions {
    /// Creates validated dimensions.
    pub fn new(
        length: f64,
        width: f64,
        height: f64,
        unit: LengthUnit,
    ) -> Result<Self, ValidationError> {
        validate_dimension(length, "Length")?;
        validate_dimension(width, "Width")?;
        validate_dimension(height, "Height")?;
        Ok(Self {
            length,
            width,
            height,
            unit,
        })
    }

    /// Shorthand for centimeter dimensions without validation.
    pub const fn cm(length: f64, width: f64, height: f64) -> Self {
        Self {
            length,
            width,
            height,
            unit: LengthUnit::Centimeter,
        }
    }

    /// Checks that all three values are positive, finite numbers.
    pub fn is_valid(&self) -> bool {
        self.to_canonical().is_valid_dimension()
    }

    /// Returns (length, width, height) in centimeters.
    pub fn to_canonical(&self) -> Vec3 {
        Vec3::new(
            normalize(self.length, self.unit),
            normalize(self.width, self.unit),
            normalize(self.height, self.unit),
        )
    }

    /// Returns a copy expressed in the canonical unit.
    pub fn normalized(&self) -> Self {
        let v = self.to_canonical();
        Self {
            length: v.x,
            width: v.y,
            height: v.z,
            unit: CANONICAL_UNIT,
        }
    }
}

impl Dimensional for Dimensions {
    fn dimensions(&self) -> Vec3 {
        self.to_canonical()
    }
}

/// Catalog product as handed to the engine.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Weight of one unit in kg.
    #[serde(default = "zero_weight", deserialize_with = "lenient_f64")]
    pub weight: f64,
    #[serde(default)]
    pub dimensions: Option<Dimensions>,
}

impl Product {
    pub fn new(id: impl Into<String>, weight: f64, dimensions: Dimensions) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            weight,
            dimensions: Some(dimensions),
        }
    }

    /// Sets a human-readable name.
    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Name used in messages; falls back to the identifier.
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }

    /// Normalized unit size, if the product carries dimensions.
    pub fn canonical_dims(&self) -> Option<Vec3> {
        self.dimensions.as_ref().map(Dimensions::to_canonical)
    }
}

/// A requested (product, quantity) pair.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Demand {
    pub product: Product,
    pub quantity: u32,
}

impl Demand {
    pub fn new(product: Product, quantity: u32) -> Self {
        Self { product, quantity }
    }

    /// Same product with a different quantity.
    pub fn with_quantity(&self, quantity: u32) -> Self {
        Self {
            product: self.product.clone(),
            quantity,
        }
    }
}

/// Pallet template.
///
/// `dimensions` describe the deck (footprint and deck height). The usable
/// stacking height above the deck is `load_height`, in the same unit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "dimensions": {"length": 120.0, "width": 100.0, "height": 15.0, "unit": "cm"},
    "tare_weight": 20.0,
    "max_weight": 1000.0
}))]
pub struct Pallet {
    pub dimensions: Dimensions,
    /// Empty pallet weight in kg.
    pub tare_weight: f64,
    /// Ceiling for tare plus load, in kg.
    pub max_weight: f64,
    #[serde(default)]
    pub load_height: Option<f64>,
}

impl Pallet {
    /// Load height used for a standalone pallet without explicit `load_height`.
    pub const DEFAULT_LOAD_HEIGHT_CM: f64 = 150.0;

    /// Creates a validated pallet template.
    pub fn new(
        dimensions: Dimensions,
        tare_weight: f64,
        max_weight: f64,
    ) -> Result<Self, ValidationError> {
        let pallet = Self {
            dimensions,
            tare_weight,
            max_weight,
            load_height: None,
        };
        pallet.validate()?;
        Ok(pallet)
    }

    /// Standard 120 × 100 × 15 cm pallet, 20 kg tare, 1000 kg ceiling.
    pub fn standard() -> Self {
        Self {
            dimensions: Dimensions::cm(120.0, 100.0, 15.0),
            tare_weight: 20.0,
            max_weight: 1000.0,
            load_height: None,
        }
    }

    /// Sets the usable stacking height (pallet unit).
    pub fn with_load_height(mut self, load_height: f64) -> Self {
        self.load_height = Some(load_height);
        self
    }

    /// Checks geometry, weights and the optional load height.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.dimensions.length, "Pallet length")?;
        validate_dimension(self.dimensions.width, "Pallet width")?;
        validate_dimension(self.dimensions.height, "Pallet height")?;
        validate_weight_limit(self.max_weight, "Pallet max weight")?;
        if !self.tare_weight.is_finite() || self.tare_weight < 0.0 {
            return Err(ValidationError::InvalidWeight(format!(
                "Pallet tare weight must not be negative, got: {}",
                self.tare_weight
            )));
        }
        if self.tare_weight > self.max_weight {
            return Err(ValidationError::InvalidConfiguration(format!(
                "Pallet tare weight {} exceeds its max weight {}",
                self.tare_weight, self.max_weight
            )));
        }
        if let Some(load_height) = self.load_height {
            validate_dimension(load_height, "Pallet load height")?;
        }
        Ok(())
    }

    /// Explicit load height in cm, if set.
    pub fn load_height_cm(&self) -> Option<f64> {
        self.load_height
            .map(|height| normalize(height, self.dimensions.unit))
    }
}

impl Default for Pallet {
    fn default() -> Self {
        Self::standard()
    }
}

impl Dimensional for Pallet {
    fn dimensions(&self) -> Vec3 {
        self.dimensions.to_canonical()
    }
}

/// Shipping container template.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "dimensions": {"length": 1200.0, "width": 240.0, "height": 240.0, "unit": "cm"},
    "max_weight": 26000.0
}))]
pub struct Container {
    pub dimensions: Dimensions,
    /// Ceiling for all pallets including their tare, in kg.
    pub max_weight: f64,
}

impl Container {
    /// Creates a validated container template.
    pub fn new(dimensions: Dimensions, max_weight: f64) -> Result<Self, ValidationError> {
        let container = Self {
            dimensions,
            max_weight,
        };
        container.validate()?;
        Ok(container)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_dimension(self.dimensions.length, "Container length")?;
        validate_dimension(self.dimensions.width, "Container width")?;
        validate_dimension(self.dimensions.height, "Container height")?;
        validate_weight_limit(self.max_weight, "Container max weight")
    }
}

impl Dimensional for Container {
    fn dimensions(&self) -> Vec3 {
        self.dimensions.to_canonical()
    }
}

/// Integer cell offset inside an occupancy space (1 cell = 1 cm).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Position {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0, y: 0, z: 0 };

    #[inline]
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// Size of an item or space in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
pub struct Extent {
    pub length: u32,
    pub width: u32,
    pub height: u32,
}

impl Extent {
    #[inline]
    pub const fn new(length: u32, width: u32, height: u32) -> Self {
        Self {
            length,
            width,
            height,
        }
    }

    /// Number of cells covered.
    #[inline]
    pub fn cells(&self) -> u64 {
        u64::from(self.length)
            .saturating_mul(u64::from(self.width))
            .saturating_mul(u64::from(self.height))
    }
}

impl From<Position> for Vec3 {
    fn from(p: Position) -> Self {
        Vec3::new(f64::from(p.x), f64::from(p.y), f64::from(p.z))
    }
}

impl From<Extent> for Vec3 {
    fn from(e: Extent) -> Self {
        Vec3::new(f64::from(e.length), f64::from(e.width), f64::from(e.height))
    }
}

/// Axis-aligned orientation of a placed item.
///
/// The letters name which of the item's own dimensions (length, width,
/// height) lies along the space's length, width and height axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    /// As declared.
    Lwh,
    /// Turned 90° around the vertical axis.
    Wlh,
    Lhw,
    Hlw,
    Whl,
    Hwl,
}

impl Rotation {
    /// Orientations that keep the declared top side up.
    pub const UPRIGHT: [Rotation; 2] = [Rotation::Lwh, Rotation::Wlh];

    pub const ALL: [Rotation; 6] = [
        Rotation::Lwh,
        Rotation::Wlh,
        Rotation::Lhw,
        Rotation::Hlw,
        Rotation::Whl,
        Rotation::Hwl,
    ];

    /// Permutes an item's extent into the effective (L, W, H) in the space.
    #[inline]
    pub fn apply(self, extent: Extent) -> Extent {
        let Extent {
            length: l,
            width: w,
            height: h,
        } = extent;
        match self {
            Rotation::Lwh => Extent::new(l, w, h),
            Rotation::Wlh => Extent::new(w, l, h),
            Rotation::Lhw => Extent::new(l, h, w),
            Rotation::Hlw => Extent::new(h, l, w),
            Rotation::Whl => Extent::new(w, h, l),
            Rotation::Hwl => Extent::new(h, w, l),
        }
    }

    pub fn is_upright(self) -> bool {
        matches!(self, Rotation::Lwh | Rotation::Wlh)
    }
}

/// One placed unit (or a batch of identical units) on a pallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ProductPlacement {
    pub product_id: String,
    pub position: Position,
    pub rotation: Rotation,
    /// Effective cell extent after rotation.
    pub extent: Extent,
    pub quantity: u32,
}

impl ProductPlacement {
    /// Cell-space bounding box of this placement.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_position_and_dims(self.position.into(), self.extent.into())
    }
}

/// Where a pallet sits inside the container.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PalletSlot {
    pub layer: u32,
    pub row: u32,
    pub column: u32,
    /// `true` when the pallet length runs along the container width.
    pub rotated: bool,
    /// Offset of the pallet's origin corner in the container (cm).
    #[schema(value_type = [f64; 3], example = json!([0.0, 0.0, 0.0]))]
    pub offset: (f64, f64, f64),
}

/// The realized load of one pallet.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct PalletArrangement {
    pub pallet: Pallet,
    pub slot: PalletSlot,
    pub placements: Vec<ProductPlacement>,
    /// Tare plus placed items, in kg.
    pub total_weight: f64,
    /// Occupied share of the pallet load space, in percent.
    pub utilization: f64,
}

impl PalletArrangement {
    /// Units of `product_id` on this pallet.
    pub fn placed_quantity(&self, product_id: &str) -> u64 {
        self.placements
            .iter()
            .filter(|p| p.product_id == product_id)
            .map(|p| u64::from(p.quantity))
            .sum()
    }

    /// Checks that every placement lies inside a load space of `space` cells.
    pub fn fits_within(&self, space: Extent) -> bool {
        let outer = BoundingBox::from_position_and_dims(Position::ORIGIN.into(), space.into());
        self.placements
            .iter()
            .all(|p| p.bounding_box().contained_in(&outer))
    }

    /// Checks whether any two placements share a cell.
    pub fn has_overlap(&self) -> bool {
        let boxes: Vec<BoundingBox> = self
            .placements
            .iter()
            .map(ProductPlacement::bounding_box)
            .collect();
        boxes
            .iter()
            .enumerate()
            .any(|(i, a)| boxes[i + 1..].iter().any(|b| a.intersects(b)))
    }
}

/// Outcome of an optimization call.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct OptimizationResult {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
    /// Occupied volume over container volume, in percent.
    pub utilization: f64,
    pub arrangements: Vec<PalletArrangement>,
    pub remaining: Vec<Demand>,
    /// Products rejected before packing (invalid or oversized).
    #[serde(default)]
    pub invalid_products: Vec<String>,
}

impl OptimizationResult {
    /// Failure result without any geometry.
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
            utilization: 0.0,
            arrangements: Vec::new(),
            remaining: Vec::new(),
            invalid_products: Vec::new(),
        }
    }

    /// Failure result naming the offending products.
    pub fn rejected(message: impl Into<String>, products: Vec<String>) -> Self {
        Self {
            invalid_products: products,
            ..Self::failure(message)
        }
    }

    /// `true` when the run succeeded and nothing was left over.
    pub fn is_complete(&self) -> bool {
        self.success && self.remaining.iter().all(|d| d.quantity == 0)
    }

    pub fn pallet_count(&self) -> usize {
        self.arrangements.len()
    }

    /// Sum of all pallet weights (tare included), in kg.
    pub fn total_weight(&self) -> f64 {
        self.arrangements.iter().map(|a| a.total_weight).sum()
    }

    /// Units of `product_id` placed across all pallets.
    pub fn placed_quantity(&self, product_id: &str) -> u64 {
        self.arrangements
            .iter()
            .map(|a| a.placed_quantity(product_id))
            .sum()
    }

    /// Units of `product_id` that could not be placed.
    pub fn remaining_quantity(&self, product_id: &str) -> u64 {
        self.remaining
            .iter()
            .filter(|d| d.product.id == product_id)
            .map(|d| u64::from(d.quantity))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_reject_non_positive_values() {
        assert!(Dimensions::new(10.0, 20.0, 30.0, LengthUnit::Centimeter).is_ok());
        assert!(matches!(
            Dimensions::new(-10.0, 20.0, 30.0, LengthUnit::Centimeter),
            Err(ValidationError::InvalidDimension(_))
        ));
        assert!(Dimensions::new(10.0, f64::NAN, 30.0, LengthUnit::Inch).is_err());
    }

    #[test]
    fn dimensions_normalize_to_centimeters() {
        let dims = Dimensions::new(500.0, 400.0, 300.0, LengthUnit::Millimeter).unwrap();
        let normalized = dims.normalized();
        assert_eq!(normalized.unit, LengthUnit::Centimeter);
        assert!((normalized.length - 50.0).abs() < 1e-9);
        assert!((normalized.width - 40.0).abs() < 1e-9);
        assert!((normalized.height - 30.0).abs() < 1e-9);
    }

    #[test]
    fn lenient_numbers_accept_strings_and_flag_garbage() {
        let dims: Dimensions =
            serde_json::from_str(r#"{"length": "50", "width": 40, "height": "abc"}"#).unwrap();
        assert_eq!(dims.length, 50.0);
        assert_eq!(dims.width, 40.0);
        assert!(dims.height.is_nan());
        assert_eq!(dims.unit, LengthUnit::Centimeter);
        assert!(!dims.is_valid());

        let missing: Dimensions = serde_json::from_str(r#"{"length": 1, "width": null}"#).unwrap();
        assert!(missing.width.is_nan());
        assert!(missing.height.is_nan());
    }

    #[test]
    fn product_without_dimensions_deserializes() {
        let product: Product = serde_json::from_str(r#"{"id": "p-1", "weight": 5}"#).unwrap();
        assert!(product.dimensions.is_none());
        assert_eq!(product.display_name(), "p-1");
    }

    #[test]
    fn rotation_permutes_extent() {
        let extent = Extent::new(5, 4, 3);
        assert_eq!(Rotation::Lwh.apply(extent), Extent::new(5, 4, 3));
        assert_eq!(Rotation::Wlh.apply(extent), Extent::new(4, 5, 3));
        assert_eq!(Rotation::Hwl.apply(extent), Extent::new(3, 4, 5));
        for rotation in Rotation::ALL {
            assert_eq!(rotation.apply(extent).cells(), 60);
        }
        assert!(Rotation::UPRIGHT.iter().all(|r| r.is_upright()));
        assert!(!Rotation::Lhw.is_upright());
    }

    #[test]
    fn pallet_validation_covers_weights_and_load_height() {
        assert!(Pallet::standard().validate().is_ok());
        assert!(Pallet::new(Dimensions::cm(120.0, 100.0, 15.0), 50.0, 20.0).is_err());
        let bad_height = Pallet::standard().with_load_height(0.0);
        assert!(matches!(
            bad_height.validate(),
            Err(ValidationError::InvalidDimension(_))
        ));
        let in_mm = Pallet {
            dimensions: Dimensions::new(1200.0, 1000.0, 150.0, LengthUnit::Millimeter).unwrap(),
            ..Pallet::standard()
        }
        .with_load_height(1000.0);
        assert!((in_mm.load_height_cm().unwrap() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn container_requires_positive_weight_limit() {
        assert!(Container::new(Dimensions::cm(1200.0, 240.0, 240.0), 0.0).is_err());
        assert!(Container::new(Dimensions::cm(1200.0, 240.0, 240.0), 26000.0).is_ok());
    }

    #[test]
    fn arrangement_detects_overlap() {
        let placement = |x: u32| ProductPlacement {
            product_id: "a".to_string(),
            position: Position::new(x, 0, 0),
            rotation: Rotation::Lwh,
            extent: Extent::new(10, 10, 10),
            quantity: 1,
        };
        let mut arrangement = PalletArrangement {
            pallet: Pallet::standard(),
            slot: PalletSlot {
                layer: 0,
                row: 0,
                column: 0,
                rotated: false,
                offset: (0.0, 0.0, 0.0),
            },
            placements: vec![placement(0), placement(10)],
            total_weight: 20.0,
            utilization: 0.0,
        };
        assert!(!arrangement.has_overlap());
        assert_eq!(arrangement.placed_quantity("a"), 2);

        arrangement.placements.push(placement(5));
        assert!(arrangement.has_overlap());
    }
}
