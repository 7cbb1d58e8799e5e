//! Domain types used throughout the crate.
//!
//! This module defines:
//!
//! - physical constants (`constants`)
//! - grid identity types (`GridKind`, `Quantity`, `QueryAxis`)
//! - immutable scattering-model snapshots (`StarGeometry`, `DiskParams`, `ObservationParams`)
//! - Stokes accumulators and observation series
//! - fit parameter tables and export schemas
//! - resolved per-subcommand run configurations (`config`)

pub mod config;
pub mod constants;
pub mod types;

pub use config::*;
pub use types::*;
