//! Comparing the scattering model with polarimetric observations.
//!
//! Responsibilities:
//!
//! - map Q/U between the intrinsic and the observed frame
//! - estimate the position angle and the reduced χ²
//! - expose a log-probability over the model parameters
//! - scan error bars and sample the parameters (parallel)

pub mod chi2;
pub mod errors;
pub mod frame;
pub mod objective;
pub mod position_angle;
pub mod sampler;

pub use chi2::*;
pub use errors::*;
pub use frame::*;
pub use objective::*;
pub use position_angle::*;
pub use sampler::*;
