//! Error-bar scan around a best-fit snapshot.
//!
//! For each scanned parameter and each direction, the parameter is moved to
//! `best · (1 ± k·step)`, `k = 1, 2, …`, on a fresh copy of the snapshot until
//! the reduced χ² reaches the threshold:
//!
//! - `2 χ²min` for the interstellar terms (Qis, Uis)
//! - `2 χ²min / 1.17741` for every other parameter
//!
//! Steps do not compound: step `k` sits at `best · (1 ± k·step)`, not at the
//! previous value times `(1 ± k·step)`. Bounds are therefore tighter than
//! those of a compounding walk (`v ← v · (1 ± k·step)`) and are not
//! comparable with intervals produced that way.
//!
//! The position angle is held at the best-fit value during the scan. Walks
//! that never reach the threshold within `max_steps` report no bound.

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info};

use crate::domain::{FitParam, SystemSnapshot};
use crate::error::AppError;
use crate::fit::objective::FitProblem;

/// Scanned parameters with their relative step.
pub const SCAN_STEPS: [(FitParam, f64); 7] = [
    (FitParam::Qis, 0.005),
    (FitParam::Uis, 0.005),
    (FitParam::ElectronDensity, 0.05),
    (FitParam::PositionAngle, 0.005),
    (FitParam::PhaseOffset, 0.005),
    (FitParam::DiskDensity, 0.005),
    (FitParam::DiskTilt, 0.05),
];

/// Threshold divisor for parameters other than the interstellar terms.
const HALF_WIDTH_DIVISOR: f64 = 1.17741;

#[derive(Debug, Clone, Copy)]
pub struct ErrorScanOptions {
    pub max_steps: usize,
}

impl Default for ErrorScanOptions {
    fn default() -> Self {
        Self { max_steps: 400 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamInterval {
    pub param: FitParam,
    pub best: f64,
    /// First value past the threshold walking `best · (1 - k·step)`.
    pub down: Option<f64>,
    /// First value past the threshold walking `best · (1 + k·step)`.
    pub up: Option<f64>,
}

impl ParamInterval {
    /// `(min, max)` of the two bounds, when both were found.
    pub fn range(&self) -> Option<(f64, f64)> {
        let (a, b) = (self.down?, self.up?);
        Some((a.min(b), a.max(b)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorScan {
    pub chi2_min: f64,
    pub intervals: Vec<ParamInterval>,
}

pub fn threshold(param: FitParam, chi2_min: f64) -> f64 {
    match param {
        FitParam::Qis | FitParam::Uis => 2.0 * chi2_min,
        _ => 2.0 * chi2_min / HALF_WIDTH_DIVISOR,
    }
}

pub fn error_scan(
    problem: &FitProblem,
    best: &SystemSnapshot,
    opts: ErrorScanOptions,
) -> Result<ErrorScan, AppError> {
    let chi2_min = problem.evaluate_at(best)?.chi2.combined;
    info!(chi2_min, max_steps = opts.max_steps, "scanning parameter errors");

    let walks: Vec<(FitParam, f64, f64)> = SCAN_STEPS
        .iter()
        .flat_map(|&(param, step)| [(param, step, -1.0), (param, step, 1.0)])
        .collect();

    let bounds: Vec<Option<f64>> = walks
        .par_iter()
        .map(|&(param, step, dir)| walk(problem, best, param, step, dir, chi2_min, opts.max_steps))
        .collect();

    let intervals = SCAN_STEPS
        .iter()
        .zip(bounds.chunks(2))
        .map(|(&(param, _), pair)| ParamInterval {
            param,
            best: param.get(best),
            down: pair[0],
            up: pair[1],
        })
        .collect();

    Ok(ErrorScan { chi2_min, intervals })
}

fn walk(
    problem: &FitProblem,
    best: &SystemSnapshot,
    param: FitParam,
    step: f64,
    dir: f64,
    chi2_min: f64,
    max_steps: usize,
) -> Option<f64> {
    let limit = threshold(param, chi2_min);
    let origin = param.get(best);
    for k in 1..=max_steps {
        let value = origin * (1.0 + dir * k as f64 * step);
        let trial = param.with(*best, value);
        let chi2 = problem
            .evaluate_at(&trial)
            .map(|e| e.chi2.combined)
            .unwrap_or(f64::INFINITY);
        if chi2 >= limit {
            debug!(param = param.label(), dir, steps = k, value, chi2, "threshold reached");
            return Some(value);
        }
    }
    debug!(param = param.label(), dir, max_steps, "threshold not reached");
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetSetup;
    use crate::fit::objective::tests::synthetic_observations;
    use crate::fit::objective::{FitProblem, ResidualFrame, default_bounds};

    fn noisy_problem() -> FitProblem {
        let snap = TargetSetup::default().snapshot();
        let mut obs = synthetic_observations(&snap);
        for (k, q) in obs.q.iter_mut().enumerate() {
            *q += if k % 2 == 0 { 0.02 } else { -0.02 };
        }
        FitProblem::new(snap, default_bounds(&snap), obs, ResidualFrame::Observed).unwrap()
    }

    #[test]
    fn thresholds_follow_parameter_class() {
        assert_eq!(threshold(FitParam::Qis, 1.0), 2.0);
        assert!((threshold(FitParam::ElectronDensity, 1.0) - 2.0 / 1.17741).abs() < 1e-12);
    }

    #[test]
    fn exact_fit_stops_after_one_step() {
        let p = crate::fit::objective::tests::problem(ResidualFrame::Observed);
        let scan = error_scan(&p, p.base(), ErrorScanOptions::default()).unwrap();
        assert!(scan.chi2_min < 1e-12);
        let qis = scan.intervals[0];
        assert_eq!(qis.param, FitParam::Qis);
        assert!((qis.down.unwrap() - qis.best * 0.995).abs() < 1e-12);
        assert!((qis.up.unwrap() - qis.best * 1.005).abs() < 1e-12);
    }

    #[test]
    fn noisy_fit_brackets_best_values() {
        let p = noisy_problem();
        let scan = error_scan(&p, p.base(), ErrorScanOptions::default()).unwrap();
        assert!(scan.chi2_min > 0.0);
        assert_eq!(scan.intervals.len(), SCAN_STEPS.len());
        for param in [FitParam::Qis, FitParam::ElectronDensity] {
            let iv = scan.intervals.iter().find(|i| i.param == param).unwrap();
            let (lo, hi) = iv.range().unwrap();
            assert!(lo < iv.best && iv.best < hi, "{param:?}: {lo} {} {hi}", iv.best);
        }
    }

    #[test]
    fn bounds_sit_on_linear_step_multiples() {
        let p = noisy_problem();
        let scan = error_scan(&p, p.base(), ErrorScanOptions::default()).unwrap();
        for (param, step) in SCAN_STEPS {
            let iv = scan.intervals.iter().find(|i| i.param == param).unwrap();
            for (bound, dir) in [(iv.down, -1.0), (iv.up, 1.0)] {
                let Some(v) = bound else { continue };
                let k = (v / iv.best - 1.0) / (dir * step);
                assert!(k >= 0.5, "{param:?}: k = {k}");
                assert!((k - k.round()).abs() < 1e-6, "{param:?}: k = {k}");
            }
        }
    }

    #[test]
    fn zero_valued_parameter_never_moves() {
        let p = noisy_problem();
        let best = FitParam::PhaseOffset.with(*p.base(), 0.0);
        let scan = error_scan(&p, &best, ErrorScanOptions { max_steps: 5 }).unwrap();
        let iv = scan
            .intervals
            .iter()
            .find(|i| i.param == FitParam::PhaseOffset)
            .unwrap();
        assert_eq!(iv.down, None);
        assert_eq!(iv.up, None);
    }
}
