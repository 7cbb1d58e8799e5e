//! Bracket-based interpolation on a BeAtlas grid.
//!
//! Query components are either fixed or free:
//!
//! - fixed components snap to the nearest listed value
//! - free components are bracketed by their neighbouring listed values and
//!   interpolated (beyond the grid edges the bracket collapses onto the edge)
//!
//! The `2^k` corners (k = number of free components) are looked up by exact
//! identity. Because the grid is non-rectangular a corner may be absent; the
//! default policy returns an all-zero spectrum, strict mode fails instead.

use tracing::debug;

use crate::domain::QueryAxis;
use crate::error::AppError;
use crate::grid::codec::BeAtlasGrid;
use crate::math::{InterpSpace, bracket, combine_corners, corner_weights, find_nearest, unit_offset};

/// What to do when a bracketing corner is not in the grid.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MissingCorner {
    /// Return an all-zero spectrum of the grid's wavelength length.
    #[default]
    Zeros,
    /// Fail with an integrity error naming the corner.
    Strict,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InterpOptions {
    pub space: InterpSpace,
    pub missing: MissingCorner,
}

/// Interpolate a spectrum at `axes` (one component per grid quantity).
pub fn interpolate(
    grid: &BeAtlasGrid,
    axes: &[QueryAxis],
    options: InterpOptions,
) -> Result<Vec<f64>, AppError> {
    let nq = grid.n_quantities();
    if axes.len() != nq {
        return Err(AppError::usage(format!(
            "Query has {} components; the grid has {nq} quantities.",
            axes.len()
        )));
    }

    // Per quantity: (lower, upper) for free components, (v, v) for fixed ones.
    let mut bounds = Vec::with_capacity(nq);
    let mut free = Vec::new();
    for (q, (axis, list)) in axes.iter().zip(&grid.params).enumerate() {
        let empty = || AppError::integrity(format!("Parameter list {q} is empty."));
        match *axis {
            QueryAxis::Fixed(v) => {
                let snapped = find_nearest(list, v).ok_or_else(empty)?;
                bounds.push((snapped, snapped));
            }
            QueryAxis::Free(v) => {
                bounds.push(bracket(list, v).ok_or_else(empty)?);
                free.push(q);
            }
        }
    }

    let t: Vec<f64> = free
        .iter()
        .map(|&q| unit_offset(axes[q].value(), bounds[q].0, bounds[q].1))
        .collect();
    let weights = corner_weights(&t);

    let k = free.len();
    let mut corners: Vec<&[f64]> = Vec::with_capacity(weights.len());
    let mut identity: Vec<f64> = bounds.iter().map(|b| b.0).collect();
    for c in 0..weights.len() {
        for (d, &q) in free.iter().enumerate() {
            let upper = (c >> (k - 1 - d)) & 1 == 1;
            identity[q] = if upper { bounds[q].1 } else { bounds[q].0 };
        }
        match grid.find(&identity) {
            Some(idx) => corners.push(&grid.fluxes[idx]),
            None => {
                debug!(corner = ?identity, "Interpolation corner missing from grid");
                return match options.missing {
                    MissingCorner::Zeros => Ok(vec![0.0; grid.n_wavelengths()]),
                    MissingCorner::Strict => Err(AppError::integrity(format!(
                        "Grid has no model at {identity:?}"
                    ))),
                };
            }
        }
    }

    Ok(combine_corners(&weights, &corners, options.space))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GridKind;

    /// 2 × 2 grid over (mass, cos i) with one mass/cos i pair removed when
    /// `holey` is set.
    fn grid(holey: bool) -> BeAtlasGrid {
        let params = vec![
            vec![4.0, 6.0],
            vec![1.4],
            vec![0.014],
            vec![0.3],
            vec![0.5],
            vec![50.0],
            vec![72.0],
            vec![0.0, 0.5, 1.0],
        ];
        let mut identities = Vec::new();
        let mut fluxes = Vec::new();
        for &m in &params[0] {
            for &mu in &params[7] {
                if holey && m == 6.0 && mu == 1.0 {
                    continue;
                }
                identities.push(vec![m, 1.4, 0.014, 0.3, 0.5, 50.0, 72.0, mu]);
                // log-linear in mass: flux doubles from m=4 to m=6
                let base = 2f64.powf((m - 4.0) / 2.0) * (1.0 + mu);
                fluxes.push(vec![base, 10.0 * base]);
            }
        }
        BeAtlasGrid {
            kind: GridKind::Vdd,
            params,
            lambda: vec![0.5, 1.0],
            identities,
            fluxes,
        }
        .quantized()
    }

    fn query(m: QueryAxis, mu: QueryAxis) -> Vec<QueryAxis> {
        let mut q: Vec<QueryAxis> = [4.0, 1.4, 0.014, 0.3, 0.5, 50.0, 72.0, 0.0]
            .iter()
            .map(|&v| QueryAxis::Fixed(v))
            .collect();
        q[0] = m;
        q[7] = mu;
        q
    }

    #[test]
    fn grid_node_is_reproduced_exactly() {
        let g = grid(false);
        for (idx, id) in g.identities.iter().enumerate() {
            let axes: Vec<QueryAxis> = id.iter().map(|&v| QueryAxis::Free(v)).collect();
            let out = interpolate(&g, &axes, InterpOptions::default()).unwrap();
            for (a, b) in out.iter().zip(&g.fluxes[idx]) {
                assert!((a - b).abs() <= 1e-12 * b.abs());
            }
        }
    }

    #[test]
    fn log_interpolation_between_masses() {
        let g = grid(false);
        let axes = query(QueryAxis::Free(5.0), QueryAxis::Fixed(0.0));
        let out = interpolate(&g, &axes, InterpOptions::default()).unwrap();
        assert!((out[0] - 2f64.sqrt()).abs() < 1e-6);

        let lin = InterpOptions {
            space: InterpSpace::Linear,
            ..InterpOptions::default()
        };
        let out = interpolate(&g, &axes, lin).unwrap();
        assert!((out[0] - 1.5).abs() < 1e-6);
    }

    #[test]
    fn outside_grid_clamps_to_edge() {
        let g = grid(false);
        let below = interpolate(
            &g,
            &query(QueryAxis::Free(1.0), QueryAxis::Fixed(0.0)),
            InterpOptions::default(),
        )
        .unwrap();
        assert!((below[0] - 1.0).abs() < 1e-12);
        let above = interpolate(
            &g,
            &query(QueryAxis::Free(9.0), QueryAxis::Free(3.0)),
            InterpOptions::default(),
        )
        .unwrap();
        assert!((above[0] - 4.0).abs() < 1e-6);
    }

    #[test]
    fn fixed_components_snap_to_nearest() {
        let g = grid(false);
        let out = interpolate(
            &g,
            &query(QueryAxis::Fixed(5.9), QueryAxis::Fixed(0.45)),
            InterpOptions::default(),
        )
        .unwrap();
        assert!((out[0] - 2.0 * 1.5).abs() < 1e-6);
    }

    #[test]
    fn missing_corner_yields_zeros_or_error() {
        let g = grid(true);
        let axes = query(QueryAxis::Free(5.0), QueryAxis::Free(0.75));
        let out = interpolate(&g, &axes, InterpOptions::default()).unwrap();
        assert_eq!(out, vec![0.0; 2]);

        let strict = InterpOptions {
            missing: MissingCorner::Strict,
            ..InterpOptions::default()
        };
        let err = interpolate(&g, &axes, strict).unwrap_err();
        assert_eq!(err.exit_code(), 4);

        // corners that exist still interpolate
        let ok = interpolate(&g, &query(QueryAxis::Free(5.0), QueryAxis::Free(0.25)), strict).unwrap();
        assert!(ok[0] > 0.0);
    }

    #[test]
    fn wrong_query_length_is_usage_error() {
        let g = grid(false);
        let err = interpolate(&g, &[QueryAxis::Free(4.0)], InterpOptions::default()).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }
}
