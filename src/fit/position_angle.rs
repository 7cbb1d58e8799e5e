//! Position-angle search.
//!
//! The intrinsic frame of a rotating dumbbell is chosen so that its U
//! averages to zero over the cycle. Given IS-removed observations, the
//! position angle `θs` is the grid angle in `[0°, 180°]` (0.1° steps) whose
//! rotated U has the smallest absolute `1/σ`-weighted mean.

use crate::error::AppError;
use crate::math::{linspace, weighted_avg_and_sigma};

/// Number of trial angles: 0° to 180° inclusive in 0.1° steps.
pub const ANGLE_STEPS: usize = 1801;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionAngleFit {
    /// Best position angle (radians).
    pub ths: f64,
    /// Weighted mean of the rotated U at `ths`.
    pub avg_u: f64,
}

/// `calcavgU0`: grid-search `θs` minimizing `|<P sin 2(θ - θs)>|`.
///
/// `p` and `angle` are the IS-removed polarized fraction and angle; `sig_p`
/// weights each epoch. Ties keep the smallest angle.
pub fn calc_avg_u0(p: &[f64], angle: &[f64], sig_p: &[f64]) -> Result<PositionAngleFit, AppError> {
    if p.is_empty() {
        return Err(AppError::data("position-angle search needs at least one observation"));
    }
    if p.len() != angle.len() || p.len() != sig_p.len() {
        return Err(AppError::data(format!(
            "position-angle inputs differ in length ({}, {}, {})",
            p.len(),
            angle.len(),
            sig_p.len()
        )));
    }

    let mut best: Option<PositionAngleFit> = None;
    for deg in linspace(0.0, 180.0, ANGLE_STEPS) {
        let ths = deg.to_radians();
        let u: Vec<f64> = p
            .iter()
            .zip(angle)
            .map(|(&p, &a)| p * (2.0 * (a - ths)).sin())
            .collect();
        let Some((avg_u, _)) = weighted_avg_and_sigma(&u, sig_p) else {
            continue;
        };
        if best.is_none_or(|b| avg_u.abs() < b.avg_u.abs()) {
            best = Some(PositionAngleFit { ths, avg_u });
        }
    }

    best.ok_or_else(|| AppError::data("position-angle search found no finite weighted mean"))
}
