//! Input/output helpers.
//!
//! - observation logs, ephemerides and phase folding (`observations`)
//! - result exports (CSV/JSON) (`export`)
//! - model curve JSON read/write (`curve`)

pub mod curve;
pub mod export;
pub mod observations;

pub use curve::*;
pub use export::*;
pub use observations::*;
