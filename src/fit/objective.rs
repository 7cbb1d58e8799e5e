//! Log-probability objective over the dumbbell + disk parameters.
//!
//! A [`FitProblem`] owns a base snapshot, the prior box of every
//! [`FitParam`] and the phase-folded observations. Free parameters are those
//! not flagged `fixed`; a parameter vector lists their values in
//! [`FitParam::ALL`] order.
//!
//! Every evaluation:
//!
//! - rejects vectors outside the prior box (`-inf`)
//! - re-estimates the position angle from the IS-removed observations
//! - evaluates blobs + disk at the observed phases, in percent
//! - compares in the chosen [`ResidualFrame`] and returns `-χ²/2`

use std::f64::consts::{PI, TAU};

use serde::Serialize;
use tracing::debug;

use crate::domain::{FitParam, ObservationParams, ParamBound, PolObservations, SystemSnapshot};
use crate::error::AppError;
use crate::fit::chi2::{Chi2Result, chi2calc};
use crate::fit::frame::{mod2obs, remove_is, rotate_by_position_angle};
use crate::fit::position_angle::calc_avg_u0;
use crate::models::modcycle_full;

/// Where model and data are compared.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResidualFrame {
    /// Model mapped to the sky (rotated, IS added) against raw Q/U.
    #[default]
    Observed,
    /// Intrinsic model against IS-removed, de-rotated Q/U.
    Intrinsic,
}

/// One model evaluation against the observations.
#[derive(Debug, Clone, Serialize)]
pub struct Evaluation {
    /// Snapshot actually evaluated (position angle as used).
    pub snapshot: SystemSnapshot,
    pub chi2: Chi2Result,
    pub q_model: Vec<f64>,
    pub u_model: Vec<f64>,
    /// Data the model was compared with, in the same frame.
    pub q_data: Vec<f64>,
    pub u_data: Vec<f64>,
}

impl Evaluation {
    pub fn log_probability(&self) -> f64 {
        -0.5 * self.chi2.combined
    }
}

/// Prior box used when none is configured: wide physical ranges around the
/// snapshot values. The position angle is re-searched on every evaluation,
/// so it is fixed.
pub fn default_bounds(snap: &SystemSnapshot) -> Vec<ParamBound> {
    FitParam::ALL
        .iter()
        .map(|&param| {
            let value = param.get(snap);
            let (lower, upper, fixed) = match param {
                FitParam::Inclination => (0.0, PI / 2.0, false),
                FitParam::ElectronDensity | FitParam::DiskDensity => (1e10, 1e14, false),
                FitParam::PhaseOffset => (-PI, PI, false),
                FitParam::PositionAngle => (0.0, PI, true),
                FitParam::Qis | FitParam::Uis => (value - 1.0, value + 1.0, false),
                FitParam::DiskTilt => (-PI / 2.0, PI / 2.0, false),
            };
            ParamBound {
                param,
                lower: lower.min(value),
                value,
                upper: upper.max(value),
                fixed,
            }
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct FitProblem {
    base: SystemSnapshot,
    bounds: Vec<ParamBound>,
    observations: PolObservations,
    frame: ResidualFrame,
}

impl FitProblem {
    /// `bounds` must name every [`FitParam`] exactly once; the base snapshot
    /// takes each bound's `value`.
    pub fn new(
        base: SystemSnapshot,
        bounds: Vec<ParamBound>,
        observations: PolObservations,
        frame: ResidualFrame,
    ) -> Result<Self, AppError> {
        if observations.is_empty() {
            return Err(AppError::data("no observations to fit"));
        }
        let mut ordered = Vec::with_capacity(FitParam::ALL.len());
        for param in FitParam::ALL {
            let mut found = bounds.iter().filter(|b| b.param == param);
            let (Some(bound), None) = (found.next(), found.next()) else {
                return Err(AppError::usage(format!(
                    "parameter '{}' must have exactly one bound",
                    param.label()
                )));
            };
            if !(bound.lower <= bound.upper) {
                return Err(AppError::usage(format!(
                    "bound for '{}' has lower {} above upper {}",
                    param.label(),
                    bound.lower,
                    bound.upper
                )));
            }
            ordered.push(*bound);
        }
        let base = ordered.iter().fold(base, |snap, b| b.param.with(snap, b.value));

        Ok(Self {
            base,
            bounds: ordered,
            observations,
            frame,
        })
    }

    pub fn base(&self) -> &SystemSnapshot {
        &self.base
    }

    pub fn bounds(&self) -> &[ParamBound] {
        &self.bounds
    }

    pub fn observations(&self) -> &PolObservations {
        &self.observations
    }

    pub fn free_params(&self) -> Vec<FitParam> {
        self.bounds.iter().filter(|b| !b.fixed).map(|b| b.param).collect()
    }

    pub fn free_bounds(&self) -> Vec<ParamBound> {
        self.bounds.iter().filter(|b| !b.fixed).copied().collect()
    }

    /// Starting vector (the configured values of the free parameters).
    pub fn initial_vector(&self) -> Vec<f64> {
        self.free_bounds().iter().map(|b| b.value).collect()
    }

    /// Snapshot for a free-parameter vector, or `None` outside the prior box.
    pub fn snapshot_for(&self, values: &[f64]) -> Option<SystemSnapshot> {
        let free = self.free_bounds();
        if values.len() != free.len() {
            return None;
        }
        let mut snap = self.base;
        for (b, &v) in free.iter().zip(values) {
            if !b.contains(v) {
                return None;
            }
            snap = b.param.with(snap, v);
        }
        let fixed_ok = self
            .bounds
            .iter()
            .filter(|b| b.fixed)
            .all(|b| b.contains(b.value));
        fixed_ok.then_some(snap)
    }

    /// `-χ²/2` for a free-parameter vector; `-inf` outside the box or when
    /// the model cannot be evaluated.
    pub fn log_probability(&self, values: &[f64]) -> f64 {
        let Some(snap) = self.snapshot_for(values) else {
            return f64::NEG_INFINITY;
        };
        match self.evaluate(&snap) {
            Ok(eval) => eval.log_probability(),
            Err(err) => {
                debug!(error = %err, "log-probability evaluation failed");
                f64::NEG_INFINITY
            }
        }
    }

    /// Evaluate with the position angle re-estimated for the snapshot's IS.
    pub fn evaluate(&self, snap: &SystemSnapshot) -> Result<Evaluation, AppError> {
        let obs = &self.observations;
        let is = remove_is(&obs.q, &obs.u, snap.obs.qis, snap.obs.uis);
        let pa = calc_avg_u0(&is.p, &is.angle, &obs.sig_p)?;
        let snap = FitParam::PositionAngle.with(*snap, pa.ths);
        self.evaluate_at(&snap)
    }

    /// Evaluate with the snapshot's own position angle.
    pub fn evaluate_at(&self, snap: &SystemSnapshot) -> Result<Evaluation, AppError> {
        let obs = &self.observations;
        let phases: Vec<f64> = obs.phase.iter().map(|ph| ph * TAU).collect();
        let trial = SystemSnapshot {
            obs: ObservationParams { fact: 1.0, ..snap.obs },
            ..*snap
        };

        let (q_model, u_model, q_data, u_data) = match self.frame {
            ResidualFrame::Observed => {
                let (series, _) = modcycle_full(&phases, &trial);
                let series = series.scaled_polarization(100.0);
                let (qm, um) = mod2obs(&series.q, &series.u, &trial.obs);
                (qm, um, obs.q.clone(), obs.u.clone())
            }
            ResidualFrame::Intrinsic => {
                let intrinsic = SystemSnapshot {
                    obs: ObservationParams {
                        phi0: trial.obs.phi0,
                        ..trial.obs.intrinsic()
                    },
                    ..trial
                };
                let (series, _) = modcycle_full(&phases, &intrinsic);
                let series = series.scaled_polarization(100.0);
                let is = remove_is(&obs.q, &obs.u, trial.obs.qis, trial.obs.uis);
                let (q2, u2) = rotate_by_position_angle(&is.p, &is.angle, trial.obs.ths);
                (series.q, series.u, q2, u2)
            }
        };

        let chi2 = chi2calc(&q_model, &u_model, &q_data, &u_data, &obs.sig_p)?;
        if !chi2.combined.is_finite() {
            return Err(AppError::numeric(format!(
                "model chi-square is not finite ({})",
                chi2.combined
            )));
        }

        Ok(Evaluation {
            snapshot: trial,
            chi2,
            q_model,
            u_model,
            q_data,
            u_data,
        })
    }
}
