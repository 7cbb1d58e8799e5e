//! Physical constants (cgs) needed by the grid normalization and the
//! scattering model.

/// Thomson cross section (cm^2).
pub const SIGMA_T: f64 = 6.65245854533e-25;

/// Solar radius (cm).
pub const R_SUN: f64 = 6.961e10;

/// Solar luminosity (erg/s).
pub const L_SUN: f64 = 3.846e33;

/// Parsec (cm).
pub const PARSEC: f64 = 3.08567758e18;

/// Offset between Julian Date and Modified Julian Date.
pub const MJD_0: f64 = 2400000.5;

/// Substitute for exact-zero Stokes Q before angle computations.
pub const Q_EPSILON: f64 = 1e-34;
