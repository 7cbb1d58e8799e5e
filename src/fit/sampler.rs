//! Seeded random-walk Metropolis sampler.
//!
//! Independent walkers start in a small Gaussian ball around a starting
//! vector and take Gaussian proposal steps with per-parameter scales. Each
//! walker owns its RNG (`seed + walker index`), so runs are reproducible and
//! walkers can advance in parallel.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use rayon::prelude::*;
use serde::Serialize;
use tracing::info;

use crate::domain::FitParam;
use crate::error::AppError;
use crate::fit::objective::FitProblem;

/// Attempts at drawing a finite-probability starting point per walker.
const START_ATTEMPTS: usize = 100;

#[derive(Debug, Clone, Copy)]
pub struct SamplerOptions {
    pub walkers: usize,
    pub steps: usize,
    /// Leading steps of every chain dropped from the summaries.
    pub burn_in: usize,
    pub seed: u64,
    /// Proposal sigma as a fraction of each parameter's prior width.
    pub proposal_scale: f64,
}

impl Default for SamplerOptions {
    fn default() -> Self {
        Self {
            walkers: 16,
            steps: 400,
            burn_in: 100,
            seed: 42,
            proposal_scale: 0.02,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WalkerChain {
    pub samples: Vec<Vec<f64>>,
    pub log_prob: Vec<f64>,
    pub accepted: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ParamSummary {
    pub median: f64,
    /// 16th percentile.
    pub lower: f64,
    /// 84th percentile.
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SamplerRun {
    pub chains: Vec<WalkerChain>,
    pub burn_in: usize,
    pub best: Vec<f64>,
    pub best_log_prob: f64,
}

impl SamplerRun {
    pub fn acceptance_fraction(&self) -> f64 {
        let proposed: usize = self.chains.iter().map(|c| c.samples.len()).sum();
        if proposed == 0 {
            return 0.0;
        }
        let accepted: usize = self.chains.iter().map(|c| c.accepted).sum();
        accepted as f64 / proposed as f64
    }

    /// Median and 16/84 percentiles of each parameter after burn-in.
    pub fn summaries(&self) -> Vec<ParamSummary> {
        let dim = self.best.len();
        (0..dim)
            .map(|j| {
                let mut v: Vec<f64> = self
                    .chains
                    .iter()
                    .flat_map(|c| c.samples.iter().skip(self.burn_in).map(move |s| s[j]))
                    .collect();
                v.sort_by(f64::total_cmp);
                ParamSummary {
                    median: percentile(&v, 0.5),
                    lower: percentile(&v, 0.16),
                    upper: percentile(&v, 0.84),
                }
            })
            .collect()
    }
}

fn percentile(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let idx = ((sorted.len() - 1) as f64 * q).round() as usize;
    sorted[idx.min(sorted.len() - 1)]
}

/// Run the sampler over any log-probability function.
pub fn metropolis<F>(
    log_prob: F,
    start: &[f64],
    scales: &[f64],
    opts: SamplerOptions,
) -> Result<SamplerRun, AppError>
where
    F: Fn(&[f64]) -> f64 + Sync,
{
    if opts.walkers == 0 || opts.steps == 0 {
        return Err(AppError::usage("sampler needs at least one walker and one step"));
    }
    if opts.burn_in >= opts.steps {
        return Err(AppError::usage(format!(
            "burn-in ({}) must be shorter than the chain ({} steps)",
            opts.burn_in, opts.steps
        )));
    }
    if start.len() != scales.len() || start.is_empty() {
        return Err(AppError::usage("sampler needs one proposal scale per free parameter"));
    }
    let start_lp = log_prob(start);
    if !start_lp.is_finite() {
        return Err(AppError::data("starting point has zero probability"));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| AppError::numeric(format!("Proposal distribution error: {e}")))?;

    info!(
        walkers = opts.walkers,
        steps = opts.steps,
        dim = start.len(),
        seed = opts.seed,
        "running Metropolis sampler"
    );

    let chains: Vec<WalkerChain> = (0..opts.walkers)
        .into_par_iter()
        .map(|w| {
            let mut rng = StdRng::seed_from_u64(opts.seed.wrapping_add(w as u64));
            run_walker(&log_prob, start, start_lp, scales, opts.steps, normal, &mut rng)
        })
        .collect();

    let mut best = start.to_vec();
    let mut best_log_prob = start_lp;
    for chain in &chains {
        for (s, &lp) in chain.samples.iter().zip(&chain.log_prob) {
            if lp > best_log_prob {
                best_log_prob = lp;
                best.clone_from(s);
            }
        }
    }

    Ok(SamplerRun {
        chains,
        burn_in: opts.burn_in,
        best,
        best_log_prob,
    })
}

fn run_walker<F>(
    log_prob: &F,
    start: &[f64],
    start_lp: f64,
    scales: &[f64],
    steps: usize,
    normal: Normal<f64>,
    rng: &mut StdRng,
) -> WalkerChain
where
    F: Fn(&[f64]) -> f64,
{
    let (mut x, mut lp) = (0..START_ATTEMPTS)
        .map(|_| {
            let x: Vec<f64> = start
                .iter()
                .zip(scales)
                .map(|(&s, &sc)| s + 0.1 * sc * normal.sample(rng))
                .collect();
            let lp = log_prob(&x);
            (x, lp)
        })
        .find(|(_, lp)| lp.is_finite())
        .unwrap_or_else(|| (start.to_vec(), start_lp));

    let mut chain = WalkerChain {
        samples: Vec::with_capacity(steps),
        log_prob: Vec::with_capacity(steps),
        accepted: 0,
    };
    for _ in 0..steps {
        let proposal: Vec<f64> = x
            .iter()
            .zip(scales)
            .map(|(&v, &sc)| v + sc * normal.sample(rng))
            .collect();
        let lp_new = log_prob(&proposal);
        let u: f64 = rng.r#gen();
        if lp_new.is_finite() && u.ln() < lp_new - lp {
            x = proposal;
            lp = lp_new;
            chain.accepted += 1;
        }
        chain.samples.push(x.clone());
        chain.log_prob.push(lp);
    }
    chain
}

/// Sample the free parameters of a fit problem, proposals scaled to each
/// parameter's prior width.
pub fn sample_problem(problem: &FitProblem, opts: SamplerOptions) -> Result<(Vec<FitParam>, SamplerRun), AppError> {
    let free = problem.free_bounds();
    if free.is_empty() {
        return Err(AppError::usage("every parameter is fixed; nothing to sample"));
    }
    let scales: Vec<f64> = free
        .iter()
        .map(|b| (b.upper - b.lower) * opts.proposal_scale)
        .collect();
    let run = metropolis(|x| problem.log_probability(x), &problem.initial_vector(), &scales, opts)?;
    Ok((free.iter().map(|b| b.param).collect(), run))
}
