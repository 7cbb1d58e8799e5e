//! One-dimensional resampling and N-dimensional multilinear interpolation.
//!
//! The N-D interpolator works on the `2^k` corners of a bracketing box. Corners
//! are ordered like a nested loop with the first dimension slowest, so for two
//! dimensions the order is `[F00, F01, F10, F11]`.

use serde::{Deserialize, Serialize};

/// How corner values are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpSpace {
    /// `exp(Σ w · ln F)`; corner values must be positive.
    #[default]
    Log,
    /// `Σ w · F`.
    Linear,
}

/// Piecewise-linear resampling of `(xp, fp)` at `x`.
///
/// `xp` must be increasing. Points outside the table take the edge value.
pub fn interp_linear(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    let n = xp.len().min(fp.len());
    if n == 0 {
        return 0.0;
    }
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[n - 1] {
        return fp[n - 1];
    }
    // First index with xp[i] > x; guaranteed in 1..n by the checks above.
    let hi = xp[..n].partition_point(|&v| v <= x);
    let lo = hi - 1;
    let span = xp[hi] - xp[lo];
    if span == 0.0 {
        return fp[lo];
    }
    let t = (x - xp[lo]) / span;
    fp[lo] + t * (fp[hi] - fp[lo])
}

/// Resample a whole table onto `targets`.
pub fn resample(targets: &[f64], xp: &[f64], fp: &[f64]) -> Vec<f64> {
    targets.iter().map(|&x| interp_linear(x, xp, fp)).collect()
}

/// Bracketing values of `q` in a sorted list.
///
/// Returns `(lower, upper)` with `lower` the largest value `<= q` and `upper`
/// the smallest value `>= q`. Outside the list both collapse onto the nearest
/// edge. Returns `None` only for an empty list.
pub fn bracket(values: &[f64], q: f64) -> Option<(f64, f64)> {
    let first = *values.first()?;
    let last = *values.last()?;
    if q <= first {
        return Some((first, first));
    }
    if q >= last {
        return Some((last, last));
    }
    let lower = values
        .iter()
        .copied()
        .filter(|&v| v <= q)
        .fold(f64::NEG_INFINITY, f64::max);
    let upper = values
        .iter()
        .copied()
        .filter(|&v| v >= q)
        .fold(f64::INFINITY, f64::min);
    Some((lower, upper))
}

/// Value of `values` closest to `q` (first one on ties).
pub fn find_nearest(values: &[f64], q: f64) -> Option<f64> {
    values
        .iter()
        .copied()
        .fold(None, |best: Option<f64>, v| match best {
            Some(b) if (b - q).abs() <= (v - q).abs() => Some(b),
            _ => Some(v),
        })
}

/// Fractional position of `x` in `[x0, x1]`; `0` for a degenerate interval.
pub fn unit_offset(x: f64, x0: f64, x1: f64) -> f64 {
    if x1 == x0 { 0.0 } else { (x - x0) / (x1 - x0) }
}

/// Multilinear corner weights for the fractional offsets `t`.
///
/// The result has `2^t.len()` entries in corner order and sums to 1.
pub fn corner_weights(t: &[f64]) -> Vec<f64> {
    let mut weights = vec![1.0];
    for &ti in t {
        let mut next = Vec::with_capacity(weights.len() * 2);
        for &w in &weights {
            next.push(w * (1.0 - ti));
            next.push(w * ti);
        }
        weights = next;
    }
    weights
}

/// Combine corner spectra with the given weights, element by element.
///
/// Corners with zero weight are skipped so a degenerate axis never evaluates
/// `0 · ln 0`.
pub fn combine_corners(weights: &[f64], corners: &[&[f64]], space: InterpSpace) -> Vec<f64> {
    let width = corners.first().map(|c| c.len()).unwrap_or(0);
    let mut acc = vec![0.0; width];
    for (&w, corner) in weights.iter().zip(corners) {
        if w == 0.0 {
            continue;
        }
        for (a, &f) in acc.iter_mut().zip(corner.iter()) {
            *a += match space {
                InterpSpace::Log => w * f.ln(),
                InterpSpace::Linear => w * f,
            };
        }
    }
    if space == InterpSpace::Log {
        for a in acc.iter_mut() {
            *a = a.exp();
        }
    }
    acc
}

/// Scalar N-D interpolation at `x` inside the box `[x0, x1]`.
pub fn interp_nd(x: &[f64], x0: &[f64], x1: &[f64], fx: &[f64], space: InterpSpace) -> f64 {
    let t: Vec<f64> = x
        .iter()
        .zip(x0.iter().zip(x1))
        .map(|(&xi, (&lo, &hi))| unit_offset(xi, lo, hi))
        .collect();
    let weights = corner_weights(&t);
    let corners: Vec<&[f64]> = fx.iter().map(std::slice::from_ref).collect();
    combine_corners(&weights, &corners, space)
        .first()
        .copied()
        .unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interp_linear_matches_table_and_clamps() {
        let xp = [1.0, 2.0, 4.0];
        let fp = [10.0, 20.0, 0.0];
        assert_eq!(interp_linear(1.0, &xp, &fp), 10.0);
        assert!((interp_linear(1.5, &xp, &fp) - 15.0).abs() < 1e-12);
        assert!((interp_linear(3.0, &xp, &fp) - 10.0).abs() < 1e-12);
        assert_eq!(interp_linear(0.0, &xp, &fp), 10.0);
        assert_eq!(interp_linear(9.0, &xp, &fp), 0.0);
    }

    #[test]
    fn bracket_inside_on_node_and_outside() {
        let v = [0.1, 0.2, 0.4];
        assert_eq!(bracket(&v, 0.3), Some((0.2, 0.4)));
        assert_eq!(bracket(&v, 0.2), Some((0.2, 0.2)));
        assert_eq!(bracket(&v, -1.0), Some((0.1, 0.1)));
        assert_eq!(bracket(&v, 5.0), Some((0.4, 0.4)));
        assert_eq!(bracket(&[], 1.0), None);
    }

    #[test]
    fn nearest_prefers_closest() {
        let v = [1.0, 2.0, 3.5];
        assert_eq!(find_nearest(&v, 2.9), Some(3.5));
        assert_eq!(find_nearest(&v, 1.4), Some(1.0));
        assert_eq!(find_nearest(&[], 1.0), None);
    }

    #[test]
    fn weights_sum_to_one() {
        let w = corner_weights(&[0.25, 0.5, 0.9]);
        assert_eq!(w.len(), 8);
        assert!((w.iter().sum::<f64>() - 1.0).abs() < 1e-12);
        // first dimension slowest
        let w2 = corner_weights(&[0.0, 1.0]);
        assert_eq!(w2, vec![0.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn log_interp_is_geometric_mean_at_midpoint() {
        let v = interp_nd(&[0.5], &[0.0], &[1.0], &[1.0, 100.0], InterpSpace::Log);
        assert!((v - 10.0).abs() < 1e-9);
        let lin = interp_nd(&[0.5], &[0.0], &[1.0], &[1.0, 100.0], InterpSpace::Linear);
        assert!((lin - 50.5).abs() < 1e-12);
    }

    #[test]
    fn degenerate_axis_ignores_zero_corner() {
        let corners: [&[f64]; 2] = [&[2.0, 3.0], &[0.0, 0.0]];
        let out = combine_corners(&corner_weights(&[0.0]), &corners, InterpSpace::Log);
        assert!((out[0] - 2.0).abs() < 1e-12);
        assert!((out[1] - 3.0).abs() < 1e-12);
    }
}
