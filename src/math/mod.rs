//! Numerical primitives: coordinate transforms, interpolation and weighted
//! statistics.

pub mod coords;
pub mod interp;
pub mod stats;

pub use coords::*;
pub use interp::*;
pub use stats::*;
