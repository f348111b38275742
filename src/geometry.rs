//! Discretization helpers shared by the loaders.
//!
//! Canonical lengths (cm) are mapped onto whole cells. Item sizes round up
//! so an item never claims less space than it needs; the tolerance absorbs
//! conversion noise such as 19.685 in × 2.54 = 50.0000000001 cm.

use crate::model::Extent;
use crate::types::{EPSILON_GENERAL, Vec3};

/// Number of cells needed to cover `length` cm (at least one).
#[inline]
pub fn to_cells(length: f64) -> u32 {
    if !length.is_finite() || length <= 0.0 {
        return 1;
    }
    let cells = (length - EPSILON_GENERAL).ceil();
    if cells >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        (cells as u32).max(1)
    }
}

/// Cell extent of a canonical size vector.
#[inline]
pub fn extent_of(dims: Vec3) -> Extent {
    Extent::new(to_cells(dims.x), to_cells(dims.y), to_cells(dims.z))
}

/// How many whole `item` lengths fit into `space` (tolerant floor division).
#[inline]
pub fn fit_count(space: f64, item: f64) -> u32 {
    if item <= 0.0 || !item.is_finite() || !space.is_finite() || space <= 0.0 {
        return 0;
    }
    let count = ((space + EPSILON_GENERAL) / item).floor();
    if count >= f64::from(u32::MAX) {
        u32::MAX
    } else {
        count.max(0.0) as u32
    }
}
