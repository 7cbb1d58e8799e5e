//! Plain-text summaries printed by the `bss` subcommands.
//!
//! Every formatter returns a `String`; `app` decides where it goes.

use crate::app::pipeline::{FitRunOutput, FitSummary, InterpOutput};
use crate::domain::{GridKind, ModelCurveFile, PolObservations};
use crate::fit::{ErrorScan, Evaluation};
use crate::grid::{BeAtlasGrid, GridDecodeReport};

/// Header, parameter lists and completeness of a decoded grid.
pub fn format_grid_summary(grid: &BeAtlasGrid, report: &GridDecodeReport, origin: &str) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== BeAtlas grid: {origin} ===\n"));
    out.push_str(&format!(
        "Kind: {} | quantities={} | wavelengths={} | records={}\n",
        kind_name(grid.kind),
        grid.n_quantities(),
        grid.n_wavelengths(),
        grid.n_models()
    ));
    if let (Some(first), Some(last)) = (grid.lambda.first(), grid.lambda.last()) {
        out.push_str(&format!("Lambda: [{first:.4}, {last:.4}]\n"));
    }

    out.push_str("\nParameter lists:\n");
    for (q, list) in grid.kind.quantities().iter().zip(&grid.params) {
        out.push_str(&format!("  {:<5} ({:>3}) {}\n", q.label(), list.len(), fmt_vec(list, 4)));
    }

    let full: usize = grid.params.iter().map(Vec::len).product();
    out.push_str(&format!(
        "\nCoverage: {} of {} parameter combinations ({:.1}%)\n",
        grid.n_models(),
        full,
        100.0 * grid.n_models() as f64 / full.max(1) as f64
    ));
    if report.complete() {
        out.push_str(&format!("Decode: complete ({} bytes)\n", report.file_len));
    } else if report.truncated() {
        out.push_str(&format!(
            "Decode: TRUNCATED, {} of {} records read ({} words missing)\n",
            grid.n_models(),
            report.records_expected,
            report.missing_words
        ));
    } else {
        out.push_str(&format!(
            "Decode: INCOMPLETE, read {} of {} bytes ({} trailing words)\n",
            report.bytes_consumed, report.file_len, report.trailing_words
        ));
    }
    out
}

pub fn format_interp(kind: GridKind, output: &InterpOutput, max_rows: usize) -> String {
    let mut out = String::new();
    let query: Vec<String> = kind
        .quantities()
        .iter()
        .zip(&output.axes)
        .map(|(q, a)| {
            let tag = if a.is_free() { "~" } else { "=" };
            format!("{}{tag}{}", q.label(), a.value())
        })
        .collect();
    out.push_str(&format!("Query: {}\n", query.join(" ")));
    if output.flux.iter().all(|&f| f == 0.0) {
        out.push_str("(missing corner: zero spectrum)\n");
    }

    out.push_str(&format!("{:>14} {:>14}\n", "lambda", "flux"));
    let n = output.lambda.len();
    let stride = n.div_ceil(max_rows.max(1)).max(1);
    for k in (0..n).step_by(stride) {
        out.push_str(&format!("{:>14.6e} {:>14.6e}\n", output.lambda[k], output.flux[k]));
    }
    out
}

pub fn format_model_summary(curve: &ModelCurveFile) -> String {
    let mut out = String::new();
    let s = &curve.setup;
    out.push_str(&format!("=== Dumbbell + disk model: {} ===\n", curve.target));
    out.push_str(&format!(
        "Star: rs={:.2} Rsun | blob d={:.3} rs at {:.2} rs | n0={} | occult={}\n",
        s.rs, s.diamb, s.distb, s.n0, s.occult
    ));
    out.push_str(&format!(
        "Obs: i={:.1} deg | ths={:.1} deg | dlt0={:.3} | ne={:.2e} | IS=({:.3}, {:.3})\n",
        s.iang, s.ths, s.dlt0, s.ne, s.qis, s.uis
    ));
    out.push_str(&format!(
        "Disk: alpha={:.1} deg | H={:.3} rs | ned={:.2e} | steps {}x{}x{}\n",
        s.alpha, s.hd, s.ned, s.ddr, s.dh, s.dphi
    ));

    let p = &curve.intrinsic.p;
    let (pmin, pmax) = min_max(p);
    out.push_str(&format!(
        "Intrinsic P: [{pmin:.4}, {pmax:.4}] % over {} phases\n",
        curve.phase.len()
    ));
    let (qmin, qmax) = min_max(&curve.q_obs);
    let (umin, umax) = min_max(&curve.u_obs);
    out.push_str(&format!(
        "Observed Q: [{qmin:.4}, {qmax:.4}] % | U: [{umin:.4}, {umax:.4}] %\n"
    ));
    out
}

/// Fit statistics, best parameters, optional sampler/error results.
pub fn format_fit_summary(summary: &FitSummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("=== Polarization fit: {} ===\n", summary.target));
    out.push_str(&format!(
        "Observations: n={} | period={:.5} d\n",
        summary.n_obs, summary.period
    ));
    out.push_str(&format!(
        "Position angle: {:.1} deg (<U>={:.2e})\n",
        summary.position_angle_deg, summary.avg_u
    ));
    out.push_str(&format!(
        "Reduced chi2: {:.4} (Q {:.4}, U {:.4}, dof {}) | ln p = {:.4}\n",
        summary.chi2, summary.chi2_q, summary.chi2_u, summary.dof, summary.log_prob
    ));
    out.push_str(&format!(
        "  legacy pair: ({:.4}, {:.4}) (each half of the combined value)\n",
        summary.chi2_legacy.0, summary.chi2_legacy.1
    ));

    out.push_str("\nParameters:\n");
    for (name, value) in &summary.best {
        out.push_str(&format!("  {name:<6} {value:.6e}\n"));
    }

    if let Some(s) = &summary.sampler {
        out.push_str(&format!(
            "\nSampler: {} walkers x {} steps | acceptance {:.2} | best ln p {:.4}\n",
            s.walkers, s.steps, s.acceptance, s.best_log_prob
        ));
        for (param, sum) in s.params.iter().zip(&s.summaries) {
            out.push_str(&format!(
                "  {:<6} {:.6e} (+{:.3e} / -{:.3e})\n",
                param.label(),
                sum.median,
                sum.upper - sum.median,
                sum.median - sum.lower
            ));
        }
    }

    if let Some(scan) = &summary.errors {
        out.push_str(&format_error_scan(scan));
    }
    out
}

fn format_error_scan(scan: &ErrorScan) -> String {
    let mut out = String::new();
    out.push_str(&format!("\nError scan (chi2 min {:.4}):\n", scan.chi2_min));
    out.push_str(format!("{:<6} {:>14} {:>14} {:>14}\n", "param", "best", "down", "up").trim_end());
    out.push('\n');
    out.push_str(format!("{:-<6} {:-<14} {:-<14} {:-<14}\n", "", "", "", "").trim_end());
    out.push('\n');
    for iv in &scan.intervals {
        out.push_str(&format!(
            "{:<6} {:>14.6e} {:>14} {:>14}\n",
            iv.param.label(),
            iv.best,
            fmt_opt(iv.down),
            fmt_opt(iv.up)
        ));
    }
    out
}

/// Per-epoch model vs data in the evaluation's frame.
pub fn format_residual_table(obs: &PolObservations, eval: &Evaluation) -> String {
    let mut out = String::new();
    out.push_str(
        format!(
            "{:>12} {:>7} {:>9} {:>9} {:>9} {:>9} {:>7}\n",
            "mjd", "phase", "q_data", "q_model", "u_data", "u_model", "sig"
        )
        .trim_end(),
    );
    out.push('\n');
    for k in 0..obs.len().min(eval.q_model.len()) {
        out.push_str(&format!(
            "{:>12.4} {:>7.4} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>7.4}\n",
            obs.mjd[k], obs.phase[k], eval.q_data[k], eval.q_model[k], eval.u_data[k], eval.u_model[k], obs.sig_p[k]
        ));
    }
    out
}

pub fn format_fit_run(run: &FitRunOutput, show_table: bool) -> String {
    let mut out = format_fit_summary(&run.summary());
    if show_table {
        out.push('\n');
        out.push_str(&format_residual_table(&run.observations, &run.evaluation));
    }
    out
}

fn kind_name(kind: GridKind) -> &'static str {
    match kind {
        GridKind::Parametric => "parametric",
        GridKind::Vdd => "VDD-ST",
    }
}

fn min_max(v: &[f64]) -> (f64, f64) {
    v.iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.6e}")).unwrap_or_else(|| "-".to_string())
}

fn fmt_vec(v: &[f64], max: usize) -> String {
    let parts: Vec<String> = v.iter().take(max).map(|x| format!("{x}")).collect();
    let more = if v.len() > max { ", ..." } else { "" };
    format!("[{}{more}]", parts.join(", "))
}
