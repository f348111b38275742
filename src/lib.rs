//! stack_it_now: pallet and container load planning.
//!
//! Products are normalized to centimeters, packed onto pallets with a
//! cell-grid placement heuristic and the resulting pallets are laid out in
//! a container grid. [`engine::PackingEngine`] is the entry point; `api`
//! exposes it over HTTP.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod geometry;
pub mod model;
pub mod optimizer;
pub mod search;
pub mod space;
pub mod types;
pub mod units;
pub mod validation;

pub use engine::PackingEngine;
pub use model::{Container, Demand, Dimensions, OptimizationResult, Pallet, Product};
pub use optimizer::PackingConfig;

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` selects the filter; `info` is used when it is unset or invalid.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .try_init()?;

    Ok(())
}
