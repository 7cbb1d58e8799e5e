//! Dumbbell + disk single-scattering polarization model.
//!
//! Models are implemented as small, pure functions over an immutable
//! [`SystemSnapshot`](crate::domain::SystemSnapshot), so fitting and search
//! code can evaluate trial parameters without shared state.

pub mod cycle;
pub mod geometry;
pub mod stokes;

pub use cycle::*;
pub use geometry::*;
pub use stokes::*;
