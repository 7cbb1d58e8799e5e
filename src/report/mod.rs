//! Terminal reports for grids, model curves and fits.

pub mod format;

pub use format::*;
