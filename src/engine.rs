//! Entry point of the optimization engine.
//!
//! `PackingEngine` owns its configuration and result caches; there is no
//! process-wide state, so independent engines can live side by side (one
//! per test, one per server).

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::{CacheStats, ResultCache, cache_key};
use crate::config::OptimizerConfig;
use crate::model::{Container, Demand, OptimizationResult, Pallet};
use crate::optimizer::{
    LoadEvent, PackingConfig, PalletEnvelope, PalletLoad, load_container_with_progress,
    load_pallet,
};
use crate::space::OccupancySpace;
use crate::types::{Dimensional, EPSILON_GENERAL, Vec3};
use crate::validation::validate;

/// Canonical inputs of an `optimize` call.
#[derive(Serialize)]
struct OptimizeKey<'a> {
    demands: &'a [Demand],
    container: &'a Container,
    pallet: &'a Pallet,
}

/// Canonical inputs of a standalone pallet load.
#[derive(Serialize)]
struct PalletKey<'a> {
    demands: &'a [Demand],
    pallet: &'a Pallet,
}

/// Total order on demands so value-equal lists compare equal regardless of
/// input order.
fn canonical_order(a: &Demand, b: &Demand) -> Ordering {
    let dims_a = a.product.canonical_dims();
    let dims_b = b.product.canonical_dims();
    let dim = |get: fn(&Vec3) -> f64| match (&dims_a, &dims_b) {
        (Some(x), Some(y)) => get(x).total_cmp(&get(y)),
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    };
    a.product
        .id
        .cmp(&b.product.id)
        .then_with(|| dim(|v| v.x))
        .then_with(|| dim(|v| v.y))
        .then_with(|| dim(|v| v.z))
        .then_with(|| a.product.weight.total_cmp(&b.product.weight))
        .then_with(|| a.quantity.cmp(&b.quantity))
        .then_with(|| a.product.name.cmp(&b.product.name))
}

fn canonical_demands(demands: &[Demand]) -> Vec<Demand> {
    let mut sorted = demands.to_vec();
    sorted.sort_by(canonical_order);
    sorted
}

/// Memoizing front end for the pallet and container loaders.
#[derive(Debug)]
pub struct PackingEngine {
    config: PackingConfig,
    results: ResultCache<OptimizationResult>,
    pallet_loads: ResultCache<PalletLoad>,
}

impl Default for PackingEngine {
    fn default() -> Self {
        Self::new(PackingConfig::default(), Self::DEFAULT_CACHE_CAPACITY)
    }
}

impl PackingEngine {
    pub const DEFAULT_CACHE_CAPACITY: usize = 128;

    /// Engine with two fresh caches of `cache_capacity` entries each.
    pub fn new(config: PackingConfig, cache_capacity: usize) -> Self {
        Self::with_caches(
            config,
            ResultCache::new(cache_capacity),
            ResultCache::new(cache_capacity),
        )
    }

    /// Engine configured from the environment-derived optimizer settings.
    pub fn from_config(config: &OptimizerConfig) -> Self {
        Self::new(config.packing_config(), config.cache_capacity())
    }

    /// Engine using caller-provided caches.
    pub fn with_caches(
        config: PackingConfig,
        results: ResultCache<OptimizationResult>,
        pallet_loads: ResultCache<PalletLoad>,
    ) -> Self {
        Self {
            config,
            results,
            pallet_loads,
        }
    }

    pub fn config(&self) -> &PackingConfig {
        &self.config
    }

    /// Statistics of the `optimize` result cache.
    pub fn cache_stats(&self) -> CacheStats {
        self.results.stats()
    }

    /// Statistics of the standalone pallet cache.
    pub fn pallet_cache_stats(&self) -> CacheStats {
        self.pallet_loads.stats()
    }

    /// Plans pallets for `demands` inside `container`.
    ///
    /// Uses the standard pallet when `pallet` is `None`. Every expected
    /// problem is reported in the returned result.
    pub fn optimize(
        &self,
        demands: &[Demand],
        container: &Container,
        pallet: Option<&Pallet>,
    ) -> OptimizationResult {
        self.optimize_with_progress(demands, container, pallet, |_| {})
    }

    /// Like [`Self::optimize`], reporting progress through `on_event`.
    ///
    /// A cache hit only reports `Finished { cached: true, .. }`.
    pub fn optimize_with_progress(
        &self,
        demands: &[Demand],
        container: &Container,
        pallet: Option<&Pallet>,
        mut on_event: impl FnMut(&LoadEvent),
    ) -> OptimizationResult {
        let pallet = pallet.cloned().unwrap_or_default();
        if let Some(rejection) = precheck(demands, container, &pallet) {
            info!(
                reason = rejection.message.as_deref().unwrap_or_default(),
                "optimization rejected"
            );
            return rejection;
        }

        let demands = canonical_demands(demands);
        let key = match cache_key(&OptimizeKey {
            demands: &demands,
            container,
            pallet: &pallet,
        }) {
            Ok(key) => key,
            Err(err) => {
                warn!(error = %err, "could not build cache key, computing uncached");
                return load_container_with_progress(
                    &demands,
                    container,
                    &pallet,
                    &self.config,
                    on_event,
                );
            }
        };

        if let Some(hit) = self.results.get(&key) {
            debug!(pallets = hit.arrangements.len(), "served cached optimization result");
            on_event(&LoadEvent::Finished {
                pallets: hit.arrangements.len(),
                remaining: hit.remaining.iter().map(|d| u64::from(d.quantity)).sum(),
                utilization: hit.utilization,
                cached: true,
            });
            return OptimizationResult::clone(&hit);
        }

        debug!("no cached result, running the container loader");
        let result =
            load_container_with_progress(&demands, container, &pallet, &self.config, on_event);
        info!(
            pallets = result.arrangements.len(),
            utilization = result.utilization,
            remaining = result.remaining.len(),
            "optimization finished"
        );
        OptimizationResult::clone(&self.results.insert(key, result))
    }

    /// Loads a single pallet, memoized like [`Self::optimize`].
    pub fn load_pallet(&self, demands: &[Demand], pallet: &Pallet) -> PalletLoad {
        let demands = canonical_demands(demands);
        match cache_key(&PalletKey {
            demands: &demands,
            pallet,
        }) {
            Ok(key) => PalletLoad::clone(&self.pallet_loads.get_or_insert_with(key, || {
                load_pallet(&demands, pallet, &self.config)
            })),
            Err(err) => {
                warn!(error = %err, "could not build cache key, computing uncached");
                load_pallet(&demands, pallet, &self.config)
            }
        }
    }
}

/// Cheap checks that turn bad input into a failure result before any
/// geometry runs.
fn precheck(
    demands: &[Demand],
    container: &Container,
    pallet: &Pallet,
) -> Option<OptimizationResult> {
    if demands.iter().all(|d| d.quantity == 0) {
        return Some(OptimizationResult::failure("No products to optimize"));
    }

    let report = validate(demands);
    if !report.valid {
        return Some(OptimizationResult::rejected(
            format!(
                "Invalid or missing dimensions for: {}",
                report.invalid_names.join(", ")
            ),
            report.invalid_names,
        ));
    }

    if let Err(err) = container.validate() {
        return Some(OptimizationResult::failure(format!(
            "Invalid container: {}",
            err
        )));
    }
    if let Err(err) = pallet.validate() {
        return Some(OptimizationResult::failure(format!("Invalid pallet: {}", err)));
    }

    let load_space = PalletEnvelope::in_container(pallet, container).load_space();
    if !OccupancySpace::fits_budget(load_space) {
        warn!(?load_space, "pallet load space exceeds the occupancy limit");
        return Some(OptimizationResult::failure(format!(
            "Pallet load space too large: {} x {} x {} cells",
            load_space.length, load_space.width, load_space.height
        )));
    }

    let container_dims = container.dimensions();
    let mut oversized: Vec<String> = Vec::new();
    for demand in demands {
        let fits = demand
            .product
            .dimensions
            .as_ref()
            .is_some_and(|dims| dims.fits_in(&container_dims, EPSILON_GENERAL));
        let name = demand.product.display_name();
        if !fits && !oversized.iter().any(|known| known == name) {
            oversized.push(name.to_string());
        }
    }
    match oversized.len() {
        0 => None,
        1 => Some(OptimizationResult::rejected(
            format!("Product '{}' exceeds the container dimensions", oversized[0]),
            oversized,
        )),
        _ => Some(OptimizationResult::rejected(
            format!(
                "Products exceed the container dimensions: {}",
                oversized.join(", ")
            ),
            oversized,
        )),
    }
}
