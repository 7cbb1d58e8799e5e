//! Reduced chi-square of observed-frame Q/U against the model.
//!
//! Degrees of freedom are `2N - 8` (two Stokes values per epoch, seven model
//! parameters plus one). Historically the statistic was reported as a pair of
//! identical halves `((χ²q + χ²u)/dof/2, (χ²q + χ²u)/dof/2)`; that pair is
//! kept as [`Chi2Result::legacy`] and the per-axis values are exposed as well.

use serde::Serialize;

use crate::error::AppError;

/// Model parameters counted against the degrees of freedom.
pub const MODEL_PARAMS: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Chi2Result {
    /// `Σ((Qmod - Qobs)/σ)² / dof`.
    pub q: f64,
    /// `Σ((Umod - Uobs)/σ)² / dof`.
    pub u: f64,
    /// `q + u`.
    pub combined: f64,
    pub dof: f64,
    pub n: usize,
}

impl Chi2Result {
    /// The duplicated half-and-half pair; each entry is `combined / 2`.
    pub fn legacy(&self) -> (f64, f64) {
        (self.combined / 2.0, self.combined / 2.0)
    }
}

pub fn chi2calc(
    q_model: &[f64],
    u_model: &[f64],
    q_obs: &[f64],
    u_obs: &[f64],
    sigma: &[f64],
) -> Result<Chi2Result, AppError> {
    let n = sigma.len();
    if q_model.len() != n || u_model.len() != n || q_obs.len() != n || u_obs.len() != n {
        return Err(AppError::data(format!(
            "chi-square inputs differ in length (model {}/{}, observed {}/{}, sigma {n})",
            q_model.len(),
            u_model.len(),
            q_obs.len(),
            u_obs.len()
        )));
    }
    let dof = 2.0 * n as f64 - MODEL_PARAMS as f64 - 1.0;
    if dof <= 0.0 {
        return Err(AppError::data(format!(
            "{n} observations leave no degrees of freedom (need at least {})",
            (MODEL_PARAMS + 2) / 2 + 1
        )));
    }

    let mut sq = 0.0;
    let mut su = 0.0;
    for k in 0..n {
        let s2 = sigma[k] * sigma[k];
        sq += (q_model[k] - q_obs[k]).powi(2) / s2;
        su += (u_model[k] - u_obs[k]).powi(2) / s2;
    }

    let (q, u) = (sq / dof, su / dof);
    Ok(Chi2Result {
        q,
        u,
        combined: q + u,
        dof,
        n,
    })
}
