//! Up-front checks on demand entries, run before any geometric work.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::{Demand, Product};

/// Outcome of [`validate`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ToSchema)]
pub struct ValidationReport {
    pub valid: bool,
    /// Every offending product, in input order, without duplicates.
    pub invalid_names: Vec<String>,
}

fn is_positive_number(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

/// Checks one product: dimensions present, numeric and positive; weight
/// numeric and not negative.
pub fn is_packable(product: &Product) -> bool {
    let dims_ok = product.dimensions.as_ref().is_some_and(|dims| {
        is_positive_number(dims.length)
            && is_positive_number(dims.width)
            && is_positive_number(dims.height)
    });
    dims_ok && product.weight.is_finite() && product.weight >= 0.0
}

/// Validates all demands and names every invalid product.
pub fn validate(demands: &[Demand]) -> ValidationReport {
    let mut invalid_names: Vec<String> = Vec::new();
    for demand in demands {
        if is_packable(&demand.product) {
            continue;
        }
        let name = demand.product.display_name();
        if !invalid_names.iter().any(|known| known == name) {
            invalid_names.push(name.to_string());
        }
    }

    ValidationReport {
        valid: invalid_names.is_empty(),
        invalid_names,
    }
}
