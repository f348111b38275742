//! Load planning: items onto pallets, pallets into a container.
//!
//! The pallet loader sequences demands (large, heavy, flat first), asks the
//! placement search for a spot per unit and stops a product on the first
//! weight or space refusal. The container loader lays pallets out in a
//! row/column/layer grid and keeps loading pallets until demand, capacity or
//! the container's weight limit runs out.

use std::cmp::Ordering;

use serde::Serialize;
use tracing::{debug, trace, warn};
use utoipa::ToSchema;

use crate::geometry::{extent_of, fit_count, to_cells};
use crate::model::{
    Container, Demand, Extent, OptimizationResult, Pallet, PalletArrangement, PalletSlot, Position,
    ProductPlacement, Rotation,
};
use crate::search::find_position;
use crate::space::OccupancySpace;
use crate::types::{Dimensional, EPSILON_GENERAL, Vec3};

/// Configuration for the placement heuristic.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PackingConfig {
    /// Scan step = max(1, floor(min(length, width) / scan_divisor)); larger = finer, slower
    pub scan_divisor: u32,
    /// Allow the four orientations that put an item on its side
    pub allow_tipping: bool,
    /// Tighten stepped hits backwards and let them settle downwards
    pub refine_positions: bool,
}

impl PackingConfig {
    pub const DEFAULT_SCAN_DIVISOR: u32 = 20;
    pub const DEFAULT_ALLOW_TIPPING: bool = false;
    pub const DEFAULT_REFINE_POSITIONS: bool = true;

    pub fn builder() -> PackingConfigBuilder {
        PackingConfigBuilder::default()
    }

    /// Candidate orientations in the order they are tried.
    pub fn rotations(&self) -> &'static [Rotation] {
        if self.allow_tipping {
            &Rotation::ALL
        } else {
            &Rotation::UPRIGHT
        }
    }
}

impl Default for PackingConfig {
    fn default() -> Self {
        Self {
            scan_divisor: Self::DEFAULT_SCAN_DIVISOR,
            allow_tipping: Self::DEFAULT_ALLOW_TIPPING,
            refine_positions: Self::DEFAULT_REFINE_POSITIONS,
        }
    }
}

/// Builder for PackingConfig.
#[derive(Clone, Debug, Default)]
pub struct PackingConfigBuilder {
    config: PackingConfig,
}

impl PackingConfigBuilder {
    pub fn scan_divisor(mut self, divisor: u32) -> Self {
        self.config.scan_divisor = divisor.max(1);
        self
    }

    pub fn allow_tipping(mut self, allow: bool) -> Self {
        self.config.allow_tipping = allow;
        self
    }

    pub fn refine_positions(mut self, refine: bool) -> Self {
        self.config.refine_positions = refine;
        self
    }

    pub fn build(self) -> PackingConfig {
        self.config
    }
}

/// Canonical pallet geometry: deck footprint plus usable load height (cm).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PalletEnvelope {
    pub footprint_length: f64,
    pub footprint_width: f64,
    pub deck_height: f64,
    pub load_height: f64,
}

impl PalletEnvelope {
    fn with_load_height(pallet: &Pallet, load_height: f64) -> Self {
        let deck = pallet.dimensions();
        Self {
            footprint_length: deck.x,
            footprint_width: deck.y,
            deck_height: deck.z,
            load_height: load_height.max(0.0),
        }
    }

    /// Envelope of a pallet loaded on its own.
    pub fn standalone(pallet: &Pallet) -> Self {
        let load_height = pallet
            .load_height_cm()
            .unwrap_or(Pallet::DEFAULT_LOAD_HEIGHT_CM);
        Self::with_load_height(pallet, load_height)
    }

    /// Envelope inside a container; without an explicit load height the
    /// pallet may be stacked up to the container ceiling.
    pub fn in_container(pallet: &Pallet, container: &Container) -> Self {
        let load_height = pallet
            .load_height_cm()
            .unwrap_or_else(|| container.dimensions().z - pallet.dimensions().z);
        Self::with_load_height(pallet, load_height)
    }

    /// Height of a loaded pallet, used for layer counting.
    pub fn stack_height(&self) -> f64 {
        self.deck_height + self.load_height
    }

    /// Cell size of the load space above the deck.
    pub fn load_space(&self) -> Extent {
        let cells = |len: f64| if len <= EPSILON_GENERAL { 0 } else { to_cells(len) };
        Extent::new(
            cells(self.footprint_length),
            cells(self.footprint_width),
            cells(self.load_height),
        )
    }
}

/// Pallet grid inside a container.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerPlan {
    /// Pallets along the container length.
    pub columns: u32,
    /// Pallets along the container width.
    pub rows: u32,
    pub layers: u32,
    /// Pallet length runs along the container width.
    pub rotated: bool,
    pitch_x: f64,
    pitch_y: f64,
    pitch_z: f64,
}

impl LayerPlan {
    /// Picks the footprint orientation with the larger per-layer count.
    /// Ties keep the pallet straight.
    pub fn compute(container: Vec3, envelope: &PalletEnvelope) -> Self {
        let (len, wid) = (envelope.footprint_length, envelope.footprint_width);
        let straight = (fit_count(container.x, len), fit_count(container.y, wid));
        let turned = (fit_count(container.x, wid), fit_count(container.y, len));
        let rotated = u64::from(turned.0) * u64::from(turned.1)
            > u64::from(straight.0) * u64::from(straight.1);
        let (columns, rows) = if rotated { turned } else { straight };
        let (pitch_x, pitch_y) = if rotated { (wid, len) } else { (len, wid) };

        let stack_height = envelope.stack_height();
        let layers = if envelope.load_height <= EPSILON_GENERAL {
            0
        } else {
            fit_count(container.z, stack_height)
        };

        Self {
            columns,
            rows,
            layers,
            rotated,
            pitch_x,
            pitch_y,
            pitch_z: stack_height,
        }
    }

    pub fn per_layer(&self) -> u32 {
        self.columns.saturating_mul(self.rows)
    }

    /// Ceiling on the pallet count; not a target.
    pub fn capacity(&self) -> u32 {
        self.per_layer().saturating_mul(self.layers)
    }

    /// Grid slot of the `index`-th pallet (layer, then row, then column).
    pub fn slot(&self, index: u32) -> PalletSlot {
        let per_layer = self.per_layer().max(1);
        let columns = self.columns.max(1);
        let layer = index / per_layer;
        let within = index % per_layer;
        let row = within / columns;
        let column = within % columns;
        PalletSlot {
            layer,
            row,
            column,
            rotated: self.rotated,
            offset: (
                f64::from(column) * self.pitch_x,
                f64::from(row) * self.pitch_y,
                f64::from(layer) * self.pitch_z,
            ),
        }
    }
}

/// All placements of one product on one pallet.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlacedProduct {
    pub product_id: String,
    pub placements: Vec<ProductPlacement>,
}

impl PlacedProduct {
    pub fn quantity(&self) -> u64 {
        self.placements.iter().map(|p| u64::from(p.quantity)).sum()
    }
}

/// Output of a single pallet loader run.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PalletLoad {
    /// Placements grouped per product, in packing order.
    pub products: Vec<PlacedProduct>,
    /// Demand that did not fit (space or weight).
    pub remaining: Vec<Demand>,
    /// Tare plus placed items, in kg.
    pub total_weight: f64,
    /// Occupied share of the load space, in percent.
    pub utilization: f64,
    pub occupied_cells: u64,
}

impl PalletLoad {
    pub fn placed_units(&self) -> u64 {
        self.products.iter().map(PlacedProduct::quantity).sum()
    }

    /// `true` when nothing at all was placed.
    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}

/// Progress events for live visualization.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(tag = "type")]
pub enum LoadEvent {
    /// A new pallet is started.
    PalletStarted { index: u32, slot: PalletSlot },
    /// One unit was placed.
    ItemPlaced {
        pallet: u32,
        product_id: String,
        position: Position,
        rotation: Rotation,
        total_weight: f64,
    },
    /// A pallet received its last item.
    PalletFinished {
        index: u32,
        placed: u64,
        total_weight: f64,
        utilization: f64,
    },
    /// Loading finished (or a cached result was served).
    Finished {
        pallets: usize,
        remaining: u64,
        utilization: f64,
        cached: bool,
    },
}

struct Job<'a> {
    demand: &'a Demand,
    dims: Vec3,
    extent: Extent,
}

/// Volume descending, weight descending, height ascending, then id.
fn packing_order(a: &Job<'_>, b: &Job<'_>) -> Ordering {
    b.dims
        .volume()
        .partial_cmp(&a.dims.volume())
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.demand
                .product
                .weight
                .partial_cmp(&a.demand.product.weight)
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.dims.z.partial_cmp(&b.dims.z).unwrap_or(Ordering::Equal))
        .then_with(|| a.demand.product.id.cmp(&b.demand.product.id))
}

/// Loads a single pallet from `demands`.
///
/// Never fails: zero placements signal that nothing fits at all.
pub fn load_pallet(demands: &[Demand], pallet: &Pallet, config: &PackingConfig) -> PalletLoad {
    let envelope = PalletEnvelope::standalone(pallet);
    load_onto_pallet(
        demands,
        pallet,
        &envelope,
        pallet.max_weight,
        0,
        config,
        &mut |_: &LoadEvent| {},
    )
}

fn load_onto_pallet<F>(
    demands: &[Demand],
    pallet: &Pallet,
    envelope: &PalletEnvelope,
    weight_ceiling: f64,
    index: u32,
    config: &PackingConfig,
    on_event: &mut F,
) -> PalletLoad
where
    F: FnMut(&LoadEvent),
{
    let Some(mut space) = OccupancySpace::new(envelope.load_space()) else {
        warn!(
            pallet = index,
            load_space = ?envelope.load_space(),
            "pallet load space too large to allocate"
        );
        return PalletLoad {
            products: Vec::new(),
            remaining: demands.iter().filter(|d| d.quantity > 0).cloned().collect(),
            total_weight: pallet.tare_weight,
            utilization: 0.0,
            occupied_cells: 0,
        };
    };
    let mut weight = pallet.tare_weight;
    let mut products = Vec::new();
    let mut remaining = Vec::new();
    let mut unusable = Vec::new();

    let mut jobs = Vec::with_capacity(demands.len());
    for demand in demands.iter().filter(|d| d.quantity > 0) {
        match demand.product.canonical_dims() {
            Some(dims) if dims.is_valid_dimension() => jobs.push(Job {
                demand,
                dims,
                extent: extent_of(dims),
            }),
            _ => unusable.push(demand.clone()),
        }
    }
    jobs.sort_by(packing_order);

    for job in &jobs {
        let product = &job.demand.product;
        let mut placements = Vec::new();

        while (placements.len() as u32) < job.demand.quantity {
            if weight + product.weight > weight_ceiling + EPSILON_GENERAL {
                debug!(
                    pallet = index,
                    product = %product.id,
                    weight,
                    weight_ceiling,
                    "weight ceiling reached"
                );
                break;
            }
            let Some(hit) = find_position(job.extent, &space, config) else {
                debug!(pallet = index, product = %product.id, "no free position left");
                break;
            };

            space.place(job.extent, hit.position, hit.rotation);
            weight += product.weight;
            trace!(
                pallet = index,
                product = %product.id,
                position = ?hit.position,
                rotation = ?hit.rotation,
                "placed"
            );
            on_event(&LoadEvent::ItemPlaced {
                pallet: index,
                product_id: product.id.clone(),
                position: hit.position,
                rotation: hit.rotation,
                total_weight: weight,
            });
            placements.push(ProductPlacement {
                product_id: product.id.clone(),
                position: hit.position,
                rotation: hit.rotation,
                extent: hit.rotation.apply(job.extent),
                quantity: 1,
            });
        }

        let placed = placements.len() as u32;
        if placed < job.demand.quantity {
            remaining.push(job.demand.with_quantity(job.demand.quantity - placed));
        }
        if !placements.is_empty() {
            products.push(PlacedProduct {
                product_id: product.id.clone(),
                placements,
            });
        }
    }
    remaining.extend(unusable);

    PalletLoad {
        products,
        remaining,
        total_weight: weight,
        utilization: space.utilization_percent(),
        occupied_cells: space.occupied_cells(),
    }
}

/// Loads pallets into a container until demand, capacity or weight runs out.
pub fn load_container(
    demands: &[Demand],
    container: &Container,
    pallet: &Pallet,
    config: &PackingConfig,
) -> OptimizationResult {
    load_container_with_progress(demands, container, pallet, config, |_| {})
}

/// Like [`load_container`], reporting progress through `on_event`.
pub fn load_container_with_progress(
    demands: &[Demand],
    container: &Container,
    pallet: &Pallet,
    config: &PackingConfig,
    mut on_event: impl FnMut(&LoadEvent),
) -> OptimizationResult {
    let container_dims = container.dimensions();
    let envelope = PalletEnvelope::in_container(pallet, container);
    let plan = LayerPlan::compute(container_dims, &envelope);
    let capacity = plan.capacity();
    debug!(
        columns = plan.columns,
        rows = plan.rows,
        layers = plan.layers,
        rotated = plan.rotated,
        capacity,
        "pallet grid computed"
    );

    let mut remaining: Vec<Demand> = demands.iter().filter(|d| d.quantity > 0).cloned().collect();
    let mut arrangements: Vec<PalletArrangement> = Vec::new();
    let mut container_weight = 0.0;
    let mut occupied_cells: u64 = 0;
    let mut stop_reason: Option<String> = None;

    if capacity == 0 {
        stop_reason = Some("The pallet does not fit into the container".to_string());
    }

    while (arrangements.len() as u32) < capacity && !remaining.is_empty() {
        if container_weight + pallet.tare_weight > container.max_weight + EPSILON_GENERAL {
            stop_reason = Some("Container weight limit reached".to_string());
            break;
        }

        let index = arrangements.len() as u32;
        let slot = plan.slot(index);
        let weight_ceiling = pallet.max_weight.min(container.max_weight - container_weight);
        on_event(&LoadEvent::PalletStarted {
            index,
            slot: slot.clone(),
        });

        let load = load_onto_pallet(
            &remaining,
            pallet,
            &envelope,
            weight_ceiling,
            index,
            config,
            &mut on_event,
        );
        if load.is_empty() {
            debug!(pallet = index, "empty pallet, nothing left that fits");
            stop_reason = Some("Remaining products do not fit on an empty pallet".to_string());
            break;
        }

        let placed = load.placed_units();
        container_weight += load.total_weight;
        occupied_cells += load.occupied_cells;
        on_event(&LoadEvent::PalletFinished {
            index,
            placed,
            total_weight: load.total_weight,
            utilization: load.utilization,
        });
        debug!(
            pallet = index,
            placed,
            weight = load.total_weight,
            utilization = load.utilization,
            "pallet loaded"
        );

        let PalletLoad {
            products,
            remaining: rest,
            total_weight,
            utilization,
            ..
        } = load;
        arrangements.push(PalletArrangement {
            pallet: pallet.clone(),
            slot,
            placements: products.into_iter().flat_map(|p| p.placements).collect(),
            total_weight,
            utilization,
        });
        remaining = rest;
    }

    let container_volume = container_dims.volume();
    let utilization = if container_volume > 0.0 {
        occupied_cells as f64 / container_volume * 100.0
    } else {
        0.0
    };

    let remaining_units: u64 = remaining.iter().map(|d| u64::from(d.quantity)).sum();
    let message = if remaining_units == 0 {
        format!(
            "All products packed onto {} pallet(s)",
            arrangements.len()
        )
    } else {
        let reason = stop_reason
            .unwrap_or_else(|| format!("Container capacity of {} pallet(s) reached", capacity));
        format!("{}; {} unit(s) could not be placed", reason, remaining_units)
    };

    on_event(&LoadEvent::Finished {
        pallets: arrangements.len(),
        remaining: remaining_units,
        utilization,
        cached: false,
    });

    OptimizationResult {
        success: true,
        message: Some(message),
        utilization,
        arrangements,
        remaining,
        invalid_products: Vec::new(),
    }
}
