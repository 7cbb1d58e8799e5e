//! BeAtlas SED grid: model names, raw inputs, binary codec and interpolation.
//!
//! Responsibilities:
//!
//! - parse model parameters from file names (`names`)
//! - read full-SED tables and luminosity logs (`source`)
//! - build, encode and decode the binary grid plus its text mirror (`codec`)
//! - interpolate spectra between grid nodes (`interpolate`)

pub mod codec;
pub mod interpolate;
pub mod names;
pub mod source;

pub use codec::*;
pub use interpolate::*;
pub use names::*;
pub use source::*;
