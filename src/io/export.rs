//! CSV/JSON exports of fit results.
//!
//! - per-epoch residuals (`--export`)
//! - phase-sorted observations with wrapped edges (`--export-phased`)
//! - sampler chains, one row per walker step (`--export-chain`)
//! - the fit summary as JSON (`--export-summary`)

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use serde::Serialize;

use crate::domain::{FitParam, PolObservations};
use crate::error::AppError;
use crate::fit::{Evaluation, SamplerRun};
use crate::math::extend_phases;

#[derive(Debug, Serialize)]
struct ResidualRow {
    mjd: f64,
    phase: f64,
    q_data: f64,
    u_data: f64,
    sig_p: f64,
    q_model: f64,
    u_model: f64,
    q_resid: f64,
    u_resid: f64,
}

/// Write model vs data per epoch, in the frame the evaluation compared.
pub fn write_residuals_csv(path: &Path, obs: &PolObservations, eval: &Evaluation) -> Result<(), AppError> {
    if eval.q_model.len() != obs.len() {
        return Err(AppError::data(format!(
            "Evaluation has {} epochs but observations have {}.",
            eval.q_model.len(),
            obs.len()
        )));
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create export CSV '{}': {e}", path.display())))?;
    for k in 0..obs.len() {
        writer.serialize(ResidualRow {
            mjd: obs.mjd[k],
            phase: obs.phase[k],
            q_data: eval.q_data[k],
            u_data: eval.u_data[k],
            sig_p: obs.sig_p[k],
            q_model: eval.q_model[k],
            u_model: eval.u_model[k],
            q_resid: eval.q_data[k] - eval.q_model[k],
            u_resid: eval.u_data[k] - eval.u_model[k],
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct PhasedRow {
    phase: f64,
    p: f64,
    q: f64,
    u: f64,
    sig_p: f64,
}

/// Write observations sorted by phase, with the edges wrapped around for
/// periodic plotting (`phase > 0.8` repeated below zero, `< 0.2` above one).
pub fn write_phased_csv(path: &Path, obs: &PolObservations) -> Result<(), AppError> {
    let index: Vec<f64> = (0..obs.len()).map(|k| k as f64).collect();
    let (phase, source) = extend_phases(&obs.phase, &index);

    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create phased CSV '{}': {e}", path.display())))?;
    for (ph, k) in phase.iter().zip(source) {
        let k = k as usize;
        writer.serialize(PhasedRow {
            phase: *ph,
            p: obs.p[k],
            q: obs.q[k],
            u: obs.u[k],
            sig_p: obs.sig_p[k],
        })?;
    }
    writer.flush()?;
    Ok(())
}

/// Write every walker step: `walker,step,log_prob,<param labels…>`.
pub fn write_chain_csv(path: &Path, params: &[FitParam], run: &SamplerRun) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::io(format!("Failed to create chain CSV '{}': {e}", path.display())))?;

    let mut header = vec!["walker".to_string(), "step".to_string(), "log_prob".to_string()];
    header.extend(params.iter().map(|p| p.label().to_string()));
    writer.write_record(&header)?;

    for (w, chain) in run.chains.iter().enumerate() {
        for (step, (sample, lp)) in chain.samples.iter().zip(&chain.log_prob).enumerate() {
            let mut record = vec![w.to_string(), step.to_string(), format!("{lp:.6}")];
            record.extend(sample.iter().map(|v| format!("{v:.8e}")));
            writer.write_record(&record)?;
        }
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary_json<T: Serialize>(path: &Path, summary: &T) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create summary JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), summary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fit::objective::tests::problem;
    use crate::fit::{ResidualFrame, SamplerOptions, sample_problem};

    #[test]
    fn residual_csv_has_one_row_per_epoch() {
        let p = problem(ResidualFrame::Observed);
        let eval = p.evaluate_at(p.base()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("res.csv");
        write_residuals_csv(&path, p.observations(), &eval).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "mjd");
        assert_eq!(&headers[8], "u_resid");
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), p.observations().len());
        let resid: f64 = rows[0][7].parse().unwrap();
        assert!(resid.abs() < 1e-9);
    }

    #[test]
    fn phased_csv_wraps_edges() {
        let p = problem(ResidualFrame::Observed);
        let obs = p.observations();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("phased.csv");
        write_phased_csv(&path, obs).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        // 8 epochs, one above 0.8 and two below 0.2
        assert_eq!(rows.len(), 11);
        let first: f64 = rows[0][0].parse().unwrap();
        assert!((first - (obs.phase[7] - 1.0)).abs() < 1e-12);
        let q_first: f64 = rows[0][2].parse().unwrap();
        assert!((q_first - obs.q[7]).abs() < 1e-9);
        let last: f64 = rows[10][0].parse().unwrap();
        assert!((last - (obs.phase[1] + 1.0)).abs() < 1e-12);
    }

    #[test]
    fn chain_csv_lists_every_step() {
        let p = problem(ResidualFrame::Observed);
        let opts = SamplerOptions {
            walkers: 2,
            steps: 3,
            burn_in: 0,
            ..SamplerOptions::default()
        };
        let (params, run) = sample_problem(&p, opts).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        write_chain_csv(&path, &params, &run).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1 + 2 * 3);
        assert!(lines[0].starts_with("walker,step,log_prob,iang,ne"));
    }

    #[test]
    fn summary_json_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.json");
        write_summary_json(&path, &serde_json::json!({ "chi2": 1.5 })).unwrap();
        let v: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(v["chi2"], 1.5);
    }
}
