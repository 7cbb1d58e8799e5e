//! Weighted statistics and phase-series helpers.

/// Weighted mean with weights `1/σ`, and the propagated uncertainty
/// `sqrt(Σσ²)/n`.
///
/// Returns `None` when the inputs are empty or the weights do not sum to a
/// positive finite value.
pub fn weighted_avg_and_sigma(values: &[f64], sigma: &[f64]) -> Option<(f64, f64)> {
    let n = values.len().min(sigma.len());
    if n == 0 {
        return None;
    }
    let mut num = 0.0;
    let mut den = 0.0;
    let mut sig2 = 0.0;
    for (&v, &s) in values.iter().zip(sigma).take(n) {
        let w = 1.0 / s;
        num += w * v;
        den += w;
        sig2 += s * s;
    }
    if !(den.is_finite() && den > 0.0) {
        return None;
    }
    Some((num / den, sig2.sqrt() / n as f64))
}

/// One phase bin.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bin {
    pub center: f64,
    pub value: f64,
    pub sigma: f64,
}

/// Bin `(x, y)` into `nbins` equally spaced centers spanning `[min x, max x]`.
///
/// A point joins every center within half a bin spacing, so points exactly on
/// a boundary count in both neighbours. Empty bins are dropped. Without
/// `yerr` every point has unit uncertainty.
pub fn bin_data(x: &[f64], y: &[f64], yerr: Option<&[f64]>, nbins: usize) -> Vec<Bin> {
    let n = x.len().min(y.len());
    if n == 0 || nbins < 2 {
        return Vec::new();
    }
    let min = x[..n].iter().copied().fold(f64::INFINITY, f64::min);
    let max = x[..n].iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let shift = (max - min) / (nbins - 1) as f64;
    let ones = vec![1.0; n];
    let err = yerr.unwrap_or(&ones);
    if shift == 0.0 {
        return weighted_avg_and_sigma(&y[..n], &err[..n])
            .map(|(value, sigma)| Bin {
                center: min,
                value,
                sigma,
            })
            .into_iter()
            .collect();
    }

    let mut out = Vec::new();
    for i in 0..nbins {
        let center = min + i as f64 * shift;
        let (vals, sigs): (Vec<f64>, Vec<f64>) = (0..n)
            .filter(|&k| (x[k] - center).abs() <= shift / 2.0)
            .map(|k| (y[k], err[k]))
            .unzip();
        if let Some((value, sigma)) = weighted_avg_and_sigma(&vals, &sigs) {
            out.push(Bin {
                center,
                value,
                sigma,
            });
        }
    }
    out
}

/// Sort by phase and wrap the edges for periodic display.
///
/// Points with phase `> 0.8` are repeated at `phase - 1` before the series and
/// points with phase `< 0.2` at `phase + 1` after it.
pub fn extend_phases(phase: &[f64], values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let mut pairs: Vec<(f64, f64)> = phase.iter().copied().zip(values.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.total_cmp(&b.0));

    let head = pairs.iter().filter(|p| p.0 > 0.8).map(|&(ph, v)| (ph - 1.0, v));
    let tail = pairs.iter().filter(|p| p.0 < 0.2).map(|&(ph, v)| (ph + 1.0, v));
    head.chain(pairs.iter().copied()).chain(tail).unzip()
}

/// Fractional part of `x`, keeping the sign (like C `modf`).
pub fn frac(x: f64) -> f64 {
    x - x.trunc()
}

/// `n` evenly spaced values on `[start, stop]`, endpoints included.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            (0..n).map(|i| start + i as f64 * step).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn weighted_average_uses_inverse_sigma() {
        let (avg, sig) = weighted_avg_and_sigma(&[1.0, 3.0], &[1.0, 0.5]).unwrap();
        // weights 1 and 2
        assert!((avg - 7.0 / 3.0).abs() < 1e-12);
        assert!((sig - (1.25f64).sqrt() / 2.0).abs() < 1e-12);
        assert!(weighted_avg_and_sigma(&[], &[]).is_none());
    }

    #[test]
    fn binning_groups_neighbours() {
        let x = [0.0, 0.1, 0.5, 0.9, 1.0];
        let y = [1.0, 3.0, 5.0, 7.0, 9.0];
        let bins = bin_data(&x, &y, None, 3);
        assert_eq!(bins.len(), 3);
        assert!((bins[0].value - 2.0).abs() < 1e-12);
        assert!((bins[1].center - 0.5).abs() < 1e-12);
        assert!((bins[1].value - 5.0).abs() < 1e-12);
        assert!((bins[2].value - 8.0).abs() < 1e-12);
    }

    #[test]
    fn identical_phases_make_one_bin() {
        let bins = bin_data(&[0.4, 0.4, 0.4], &[1.0, 3.0, 2.0], None, 10);
        assert_eq!(bins.len(), 1);
        assert_eq!(bins[0].center, 0.4);
        assert!((bins[0].value - 2.0).abs() < 1e-12);
        assert!((bins[0].sigma - 3f64.sqrt() / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_bins_are_dropped() {
        let bins = bin_data(&[0.0, 1.0], &[2.0, 4.0], None, 5);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[1].center, 1.0);
    }

    #[test]
    fn phase_extension_wraps_edges() {
        let (ph, v) = extend_phases(&[0.5, 0.9, 0.1], &[5.0, 9.0, 1.0]);
        assert_eq!(ph.len(), 5);
        assert!((ph[0] + 0.1).abs() < 1e-12);
        assert_eq!(v[0], 9.0);
        assert_eq!(&ph[1..4], &[0.1, 0.5, 0.9]);
        assert!((ph[4] - 1.1).abs() < 1e-12);
        assert_eq!(v[4], 1.0);
    }

    #[test]
    fn frac_keeps_sign() {
        assert!((frac(2.25) - 0.25).abs() < 1e-12);
        assert!((frac(-0.75) + 0.75).abs() < 1e-12);
    }

    #[test]
    fn linspace_endpoints() {
        let v = linspace(0.0, 1.0, 80);
        assert_eq!(v.len(), 80);
        assert_eq!(v[0], 0.0);
        assert!((v[79] - 1.0).abs() < 1e-12);
    }
}
