//! Shared pipelines behind the CLI subcommands.
//!
//! Each `run_*` function takes a resolved config, does the work and returns
//! plain outputs; printing and exporting stay in `app`.

use std::collections::BTreeMap;
use std::f64::consts::TAU;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::domain::{
    FitConfig, FitParam, InterpConfig, ModelConfig, ModelCurveFile, PackConfig, PolObservations, QueryAxis,
    SystemSnapshot, TargetSetup,
};
use crate::error::AppError;
use crate::fit::{
    ErrorScan, ErrorScanOptions, Evaluation, FitProblem, ParamSummary, PositionAngleFit, calc_avg_u0,
    default_bounds, error_scan, mod2obs, qu_angles, remove_is, sample_problem,
};
use crate::grid::{
    BeAtlasGrid, BuildOptions, build_grid, interpolate, list_grid, list_sed_files, read_fullsed2, read_grid,
    read_lambda_file, write_grid, write_text_mirror,
};
use crate::io::{bin_observations, ephemeris_path, find_ephemeris, load_observations, read_ephemeris_table};
use crate::math::linspace;
use crate::models::modcycle_full;

pub const TOOL_NAME: &str = "bss";

/// Build a grid file from a directory of full-SED tables.
pub fn run_pack(config: &PackConfig) -> Result<BeAtlasGrid, AppError> {
    let files = list_sed_files(&config.sed_dir)?;
    let listing = list_grid(&files, config.kind)?;
    let Some((first, _)) = listing.models.first() else {
        return Err(AppError::data(format!(
            "No {:?} models found under '{}'.",
            config.kind,
            config.sed_dir.display()
        )));
    };
    info!(
        files = files.len(),
        models = listing.models.len(),
        records = listing.n_records(),
        "grid listing ready"
    );

    let lambda = match &config.lambda_file {
        Some(path) => read_lambda_file(path)?,
        None => read_fullsed2(first)?
            .observers
            .first()
            .map(|o| o.lambda.clone())
            .ok_or_else(|| AppError::data(format!("'{}' has no spectra.", first.display())))?,
    };

    let grid = build_grid(
        &listing,
        &lambda,
        &BuildOptions {
            ignore_lum: config.ignore_lum,
        },
    )?;
    write_grid(&grid, &config.output)?;
    if let Some(path) = &config.text_mirror {
        write_text_mirror(&grid, path)?;
    }
    Ok(grid)
}

#[derive(Debug, Clone)]
pub struct InterpOutput {
    pub axes: Vec<QueryAxis>,
    pub lambda: Vec<f64>,
    pub flux: Vec<f64>,
}

/// Interpolate one spectrum; every grid quantity must be set or freed.
pub fn run_interp(config: &InterpConfig) -> Result<InterpOutput, AppError> {
    let (grid, _) = read_grid(&config.grid)?;
    let mut axes = Vec::with_capacity(grid.n_quantities());
    for &q in grid.kind.quantities() {
        let fixed = config.fixed.iter().find(|(k, _)| *k == q);
        let free = config.free.iter().find(|(k, _)| *k == q);
        let axis = match (fixed, free) {
            (Some(&(_, v)), None) => QueryAxis::Fixed(v),
            (None, Some(&(_, v))) => QueryAxis::Free(v),
            (Some(_), Some(_)) => {
                return Err(AppError::usage(format!("'{q}' is both --set and --free.")));
            }
            (None, None) => {
                return Err(AppError::usage(format!("Missing value for grid quantity '{q}'.")));
            }
        };
        axes.push(axis);
    }
    for (q, _) in config.fixed.iter().chain(&config.free) {
        if grid.kind.index_of(*q).is_none() {
            return Err(AppError::usage(format!("'{q}' is not a quantity of a {:?} grid.", grid.kind)));
        }
    }

    let flux = interpolate(&grid, &axes, config.options)?;
    if let Some(path) = &config.output {
        write_spectrum(path, &grid.lambda, &flux)?;
    }
    Ok(InterpOutput {
        axes,
        lambda: grid.lambda,
        flux,
    })
}

fn write_spectrum(path: &Path, lambda: &[f64], flux: &[f64]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create spectrum '{}': {e}", path.display())))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "# lambda flux")?;
    for (l, f) in lambda.iter().zip(flux) {
        writeln!(out, "{l:.6e} {f:.6e}")?;
    }
    out.flush()?;
    Ok(())
}

/// Intrinsic and observed-frame model curves on a uniform phase grid.
///
/// `n_phases` points span `[0, 1]`; the endpoint duplicates phase zero and
/// is dropped. Reported phases are shifted by the setup's phase offset.
pub fn model_curve(setup: &TargetSetup, n_phases: usize) -> Result<ModelCurveFile, AppError> {
    if n_phases < 2 {
        return Err(AppError::usage(format!("Need at least 2 phases, got {n_phases}.")));
    }
    let mut phase = linspace(0.0, 1.0, n_phases);
    phase.pop();

    let snap = setup.snapshot();
    let intrinsic_snap = SystemSnapshot {
        obs: snap.obs.intrinsic(),
        ..snap
    };
    let radians: Vec<f64> = phase.iter().map(|p| p * TAU).collect();
    let (series, n3) = modcycle_full(&radians, &intrinsic_snap);
    let intrinsic = series.scaled_polarization(100.0);
    if intrinsic.q.iter().chain(&intrinsic.u).any(|v| !v.is_finite()) {
        return Err(AppError::numeric("Model curve is not finite."));
    }
    let (q_obs, u_obs) = mod2obs(&intrinsic.q, &intrinsic.u, &snap.obs);
    let angle_obs_deg = qu_angles(&q_obs, &u_obs).into_iter().map(f64::to_degrees).collect();
    info!(target = %setup.target, n3, phases = phase.len(), "model curve computed");

    let offset = setup.phase_offset();
    Ok(ModelCurveFile {
        tool: TOOL_NAME.to_string(),
        generated: Utc::now(),
        target: setup.target.clone(),
        setup: setup.clone(),
        phase: phase.iter().map(|p| p + offset).collect(),
        intrinsic,
        q_obs,
        u_obs,
        angle_obs_deg,
    })
}

pub fn run_model(config: &ModelConfig) -> Result<ModelCurveFile, AppError> {
    model_curve(&config.setup, config.n_phases)
}

/// Sampler results as exported and reported.
#[derive(Debug, Clone, Serialize)]
pub struct SamplerReport {
    pub params: Vec<FitParam>,
    pub walkers: usize,
    pub steps: usize,
    pub acceptance: f64,
    pub best_log_prob: f64,
    pub summaries: Vec<ParamSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FitSummary {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub target: String,
    pub n_obs: usize,
    pub period: f64,
    /// Position angle re-estimated for the configured IS (degrees).
    pub position_angle_deg: f64,
    pub avg_u: f64,
    pub chi2: f64,
    pub chi2_q: f64,
    pub chi2_u: f64,
    pub chi2_legacy: (f64, f64),
    pub dof: f64,
    pub log_prob: f64,
    pub best: BTreeMap<String, f64>,
    pub sampler: Option<SamplerReport>,
    pub errors: Option<ErrorScan>,
}

/// All outputs of one `fit` run.
#[derive(Debug, Clone)]
pub struct FitRunOutput {
    pub observations: PolObservations,
    pub position_angle: PositionAngleFit,
    pub evaluation: Evaluation,
    pub sampler: Option<(Vec<FitParam>, crate::fit::SamplerRun)>,
    pub errors: Option<ErrorScan>,
    pub curve: ModelCurveFile,
}

impl FitRunOutput {
    pub fn summary(&self) -> FitSummary {
        let eval = &self.evaluation;
        FitSummary {
            tool: TOOL_NAME.to_string(),
            generated: self.curve.generated,
            target: self.observations.target.clone(),
            n_obs: self.observations.len(),
            period: self.observations.period,
            position_angle_deg: self.position_angle.ths.to_degrees(),
            avg_u: self.position_angle.avg_u,
            chi2: eval.chi2.combined,
            chi2_q: eval.chi2.q,
            chi2_u: eval.chi2.u,
            chi2_legacy: eval.chi2.legacy(),
            dof: eval.chi2.dof,
            log_prob: eval.log_probability(),
            best: FitParam::ALL
                .iter()
                .map(|p| (p.label().to_string(), p.get(&eval.snapshot)))
                .collect(),
            sampler: self.sampler.as_ref().map(|(params, run)| SamplerReport {
                params: params.clone(),
                walkers: run.chains.len(),
                steps: run.chains.first().map_or(0, |c| c.samples.len()),
                acceptance: run.acceptance_fraction(),
                best_log_prob: run.best_log_prob,
                summaries: run.summaries(),
            }),
            errors: self.errors.clone(),
        }
    }
}

/// Load observations, evaluate the configured model, then optionally
/// sample and scan errors around the best snapshot.
pub fn run_fit(config: &FitConfig) -> Result<FitRunOutput, AppError> {
    let table = read_ephemeris_table(&ephemeris_path(config.ephemeris.as_deref())?)?;
    let eph = find_ephemeris(&table, &config.setup.target)?;
    let observations = load_observations(&config.log_dir, &config.setup.target, &eph)?;
    run_fit_with_observations(config, observations)
}

/// The fit pipeline on already-folded observations.
pub fn run_fit_with_observations(
    config: &FitConfig,
    observations: PolObservations,
) -> Result<FitRunOutput, AppError> {
    let observations = match config.nbins {
        Some(n) => bin_observations(&observations, n)?,
        None => observations,
    };

    let snap = config.setup.snapshot();
    let is = remove_is(&observations.q, &observations.u, snap.obs.qis, snap.obs.uis);
    let position_angle = calc_avg_u0(&is.p, &is.angle, &observations.sig_p)?;
    info!(
        ths_deg = position_angle.ths.to_degrees(),
        configured_deg = config.setup.ths,
        "position angle estimated"
    );

    let problem = FitProblem::new(snap, default_bounds(&snap), observations.clone(), config.frame)?;
    let mut evaluation = problem.evaluate(&snap)?;
    info!(chi2 = evaluation.chi2.combined, dof = evaluation.chi2.dof, "configured model evaluated");

    let sampler = match config.sampler {
        Some(opts) => {
            let (params, run) = sample_problem(&problem, opts)?;
            if let Some(best) = problem.snapshot_for(&run.best) {
                let candidate = problem.evaluate(&best)?;
                if candidate.chi2.combined < evaluation.chi2.combined {
                    evaluation = candidate;
                }
            }
            info!(
                acceptance = run.acceptance_fraction(),
                chi2 = evaluation.chi2.combined,
                "sampler finished"
            );
            Some((params, run))
        }
        None => None,
    };

    let errors = match config.error_scan {
        Some(max_steps) => Some(error_scan(&problem, &evaluation.snapshot, ErrorScanOptions { max_steps })?),
        None => None,
    };

    let curve = model_curve(&config.setup, config.n_phases)?;

    Ok(FitRunOutput {
        observations,
        position_angle,
        evaluation,
        sampler,
        errors,
        curve,
    })
}
