//! `beatlas-singscat` library crate.
//!
//! The binary (`bss`) is a thin wrapper around this library:
//!
//! - `grid`: BeAtlas SED grid codec, listing and N-D interpolation
//! - `models`: single-scattering dumbbell + disk Stokes model
//! - `fit`: frame conversions, chi2, log-probability, error scan and sampler
//! - `io`: observation logs, ephemerides and result exports

pub mod app;
pub mod cli;
pub mod domain;
pub mod error;
pub mod fit;
pub mod grid;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
