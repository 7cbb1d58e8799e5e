//! Polarimetric observation logs and ephemerides.
//!
//! A target log (`<target>.log`) is a whitespace-separated table with 13
//! columns:
//!
//! `MJD night filt calc ang.ref dth P Q U th sigP sigQU sigth`
//!
//! Only V-band rows (`filt == v`) are used. Phases come from an ephemeris
//! table with rows `target period epoch_jd`; the table path is taken from
//! `--ephemeris` or the `SINGSCAT_EPHEMERIS` variable (a `.env` file is
//! honoured).
//!
//! Malformed rows are skipped and reported, never fatal.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::domain::PolObservations;
use crate::domain::constants::MJD_0;
use crate::error::AppError;
use crate::math::{bin_data, frac};

pub const EPHEMERIS_ENV: &str = "SINGSCAT_EPHEMERIS";

const LOG_COLUMNS: usize = 13;

/// A row-level problem found while reading a table.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// One parsed log row.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRow {
    pub mjd: f64,
    pub night: String,
    pub filter: String,
    pub calc: f64,
    pub ang_ref: f64,
    pub dth: f64,
    pub p: f64,
    pub q: f64,
    pub u: f64,
    pub th: f64,
    pub sig_p: f64,
    pub sig_qu: f64,
    pub sig_th: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ObservationLog {
    pub rows: Vec<LogRow>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ephemeris {
    pub target: String,
    /// Rotation period (days).
    pub period: f64,
    /// Phase-zero epoch (JD).
    pub epoch_jd: f64,
}

impl Ephemeris {
    pub fn epoch_mjd(&self) -> f64 {
        self.epoch_jd - MJD_0
    }

    /// Fractional phase of `mjd`; negative before the epoch.
    pub fn phase(&self, mjd: f64) -> f64 {
        frac((mjd - self.epoch_mjd()) / self.period)
    }
}

pub fn read_observation_log(path: &Path) -> Result<ObservationLog, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read observation log '{}': {e}", path.display())))?;
    Ok(parse_observation_log(&text))
}

pub fn parse_observation_log(text: &str) -> ObservationLog {
    let mut log = ObservationLog::default();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        log.rows_read += 1;
        match parse_log_row(line) {
            Ok(row) => log.rows.push(row),
            Err(message) => log.row_errors.push(RowError { line: idx + 1, message }),
        }
    }
    log
}

fn parse_log_row(line: &str) -> Result<LogRow, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < LOG_COLUMNS {
        return Err(format!("expected {LOG_COLUMNS} columns, found {}", fields.len()));
    }
    let num = |i: usize, name: &str| -> Result<f64, String> {
        fields[i]
            .parse::<f64>()
            .map_err(|_| format!("invalid {name} value '{}'", fields[i]))
    };
    Ok(LogRow {
        mjd: num(0, "MJD")?,
        night: fields[1].to_string(),
        filter: fields[2].to_string(),
        calc: num(3, "calc")?,
        ang_ref: num(4, "ang.ref")?,
        dth: num(5, "dth")?,
        p: num(6, "P")?,
        q: num(7, "Q")?,
        u: num(8, "U")?,
        th: num(9, "th")?,
        sig_p: num(10, "sigP")?,
        sig_qu: num(11, "sigQU")?,
        sig_th: num(12, "sigth")?,
    })
}

pub fn read_ephemeris_table(path: &Path) -> Result<Vec<Ephemeris>, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read ephemeris table '{}': {e}", path.display())))?;
    let mut out = Vec::new();
    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let parsed = match fields.as_slice() {
            [target, period, epoch, ..] => period
                .parse::<f64>()
                .ok()
                .zip(epoch.parse::<f64>().ok())
                .map(|(period, epoch_jd)| Ephemeris {
                    target: target.to_string(),
                    period,
                    epoch_jd,
                }),
            _ => None,
        };
        match parsed {
            Some(e) => out.push(e),
            None => warn!(path = %path.display(), line = idx + 1, "skipping malformed ephemeris row"),
        }
    }
    Ok(out)
}

pub fn find_ephemeris(table: &[Ephemeris], target: &str) -> Result<Ephemeris, AppError> {
    let eph = table
        .iter()
        .find(|e| e.target == target)
        .cloned()
        .ok_or_else(|| AppError::data(format!("No ephemeris for target '{target}'.")))?;
    if !(eph.period.is_finite() && eph.period > 0.0) {
        return Err(AppError::data(format!(
            "Ephemeris for '{target}' has invalid period {}.",
            eph.period
        )));
    }
    Ok(eph)
}

/// Ephemeris table path: the explicit one, else `SINGSCAT_EPHEMERIS`.
pub fn ephemeris_path(explicit: Option<&Path>) -> Result<PathBuf, AppError> {
    if let Some(p) = explicit {
        return Ok(p.to_path_buf());
    }
    dotenvy::dotenv().ok();
    std::env::var(EPHEMERIS_ENV).map(PathBuf::from).map_err(|_| {
        AppError::usage(format!(
            "No ephemeris table: pass --ephemeris or set {EPHEMERIS_ENV}."
        ))
    })
}

/// Keep rows of `filter` and fold them with `eph`.
pub fn fold_observations(
    target: &str,
    rows: &[LogRow],
    eph: &Ephemeris,
    filter: &str,
) -> Result<PolObservations, AppError> {
    let kept: Vec<&LogRow> = rows.iter().filter(|r| r.filter == filter).collect();
    if kept.is_empty() {
        return Err(AppError::data(format!(
            "No '{filter}' observations for target '{target}'."
        )));
    }

    let mut obs = PolObservations {
        target: target.to_string(),
        period: eph.period,
        epoch_mjd: eph.epoch_mjd(),
        ..PolObservations::default()
    };
    for r in kept {
        let phase = eph.phase(r.mjd);
        if phase < 0.0 {
            return Err(AppError::data(format!(
                "Observation at MJD {} precedes the ephemeris epoch (MJD {}).",
                r.mjd,
                eph.epoch_mjd()
            )));
        }
        obs.mjd.push(r.mjd);
        obs.phase.push(phase);
        obs.p.push(r.p);
        obs.q.push(r.q);
        obs.u.push(r.u);
        obs.sig_p.push(r.sig_p);
        obs.sig_th.push(r.sig_th);
    }
    Ok(obs)
}

/// Read `<dir>/<target>.log`, keep V-band rows and phase-fold them.
pub fn load_observations(dir: &Path, target: &str, eph: &Ephemeris) -> Result<PolObservations, AppError> {
    let path = dir.join(format!("{target}.log"));
    let log = read_observation_log(&path)?;
    for err in &log.row_errors {
        warn!(path = %path.display(), line = err.line, message = %err.message, "skipping log row");
    }
    let obs = fold_observations(target, &log.rows, eph, "v")?;
    info!(
        target,
        rows_read = log.rows_read,
        rows_used = obs.len(),
        period = eph.period,
        "loaded observations"
    );
    Ok(obs)
}

/// Weighted phase binning of every observed column.
///
/// P/Q/U are weighted by `sigP`; `sigth` by itself. The MJD column holds the
/// first-cycle date of each bin center.
pub fn bin_observations(obs: &PolObservations, nbins: usize) -> Result<PolObservations, AppError> {
    if nbins < 2 {
        return Err(AppError::usage(format!("Invalid bin count {nbins} (need at least 2).")));
    }
    let p = bin_data(&obs.phase, &obs.p, Some(&obs.sig_p), nbins);
    let q = bin_data(&obs.phase, &obs.q, Some(&obs.sig_p), nbins);
    let u = bin_data(&obs.phase, &obs.u, Some(&obs.sig_p), nbins);
    let th = bin_data(&obs.phase, &obs.sig_th, Some(&obs.sig_th), nbins);
    if p.is_empty() {
        return Err(AppError::data("Binning left no observations."));
    }

    let phase: Vec<f64> = p.iter().map(|b| b.center).collect();
    Ok(PolObservations {
        target: obs.target.clone(),
        period: obs.period,
        epoch_mjd: obs.epoch_mjd,
        mjd: phase.iter().map(|ph| obs.epoch_mjd + ph * obs.period).collect(),
        phase,
        p: p.iter().map(|b| b.value).collect(),
        q: q.iter().map(|b| b.value).collect(),
        u: u.iter().map(|b| b.value).collect(),
        sig_p: p.iter().map(|b| b.sigma).collect(),
        sig_th: th.iter().map(|b| b.sigma).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const LOG: &str = "\
# MJD night filt calc ang.ref dth P Q U th sigP sigQU sigth
55000.10 10jun01 v 1.0 0.0 0.0 0.50 -0.40 0.30 71.6 0.02 0.02 1.1
55000.40 10jun01 b 1.0 0.0 0.0 0.55 -0.45 0.31 72.0 0.02 0.02 1.1
55000.70 10jun01 v 1.0 0.0 0.0 0.52 -0.42 0.28 70.9 0.03 0.03 1.5
55001.00 10jun02 v 1.0 0.0 0.0 bad -0.42 0.28 70.9 0.03 0.03 1.5
55001.30 10jun02 v 1.0 0.0
";

    fn eph() -> Ephemeris {
        Ephemeris {
            target: "sori".to_string(),
            period: 1.2,
            epoch_jd: 54999.5 + MJD_0,
        }
    }

    #[test]
    fn log_rows_and_errors_are_separated() {
        let log = parse_observation_log(LOG);
        assert_eq!(log.rows_read, 5);
        assert_eq!(log.rows.len(), 3);
        assert_eq!(log.row_errors.len(), 2);
        assert_eq!(log.row_errors[0].line, 5);
        assert!(log.row_errors[1].message.contains("columns"));
    }

    #[test]
    fn folding_keeps_v_band_and_phases() {
        let log = parse_observation_log(LOG);
        let obs = fold_observations("sori", &log.rows, &eph(), "v").unwrap();
        assert_eq!(obs.len(), 2);
        assert!((obs.phase[0] - 0.6 / 1.2).abs() < 1e-9);
        assert!((obs.phase[1] - frac(1.2 / 1.2)).abs() < 1e-9);
        assert_eq!(obs.q, vec![-0.40, -0.42]);
        assert!((obs.epoch_mjd - 54999.5).abs() < 1e-9);
    }

    #[test]
    fn observation_before_epoch_is_error() {
        let log = parse_observation_log(LOG);
        let mut e = eph();
        e.epoch_jd += 10.0;
        let err = fold_observations("sori", &log.rows, &e, "v").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn missing_filter_is_error() {
        let log = parse_observation_log(LOG);
        assert!(fold_observations("sori", &log.rows, &eph(), "r").is_err());
    }

    #[test]
    fn ephemeris_table_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mags.txt");
        fs::write(&path, "# tgt P ph0\nsori 1.19081 2442778.819\nbroken x\nhd37017 0.901186 2444628.77\n").unwrap();
        let table = read_ephemeris_table(&path).unwrap();
        assert_eq!(table.len(), 2);
        let e = find_ephemeris(&table, "hd37017").unwrap();
        assert!((e.epoch_mjd() - (2444628.77 - MJD_0)).abs() < 1e-9);
        assert!(find_ephemeris(&table, "nobody").is_err());
    }

    #[test]
    fn explicit_ephemeris_path_wins() {
        let p = ephemeris_path(Some(Path::new("/tmp/x.txt"))).unwrap();
        assert_eq!(p, PathBuf::from("/tmp/x.txt"));
    }

    #[test]
    fn load_reads_target_log() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("sori.log"), LOG).unwrap();
        let obs = load_observations(dir.path(), "sori", &eph()).unwrap();
        assert_eq!(obs.target, "sori");
        assert_eq!(obs.len(), 2);
    }

    #[test]
    fn binning_averages_neighbours() {
        let obs = PolObservations {
            target: "t".to_string(),
            period: 2.0,
            epoch_mjd: 100.0,
            mjd: vec![0.0; 4],
            phase: vec![0.0, 0.1, 0.9, 1.0],
            p: vec![1.0, 1.0, 2.0, 2.0],
            q: vec![1.0, 3.0, 5.0, 7.0],
            u: vec![0.0; 4],
            sig_p: vec![1.0; 4],
            sig_th: vec![1.0; 4],
        };
        let b = bin_observations(&obs, 2).unwrap();
        assert_eq!(b.len(), 2);
        assert!((b.q[0] - 2.0).abs() < 1e-12);
        assert!((b.q[1] - 6.0).abs() < 1e-12);
        assert!((b.mjd[1] - 102.0).abs() < 1e-12);
        assert!(bin_observations(&obs, 1).is_err());
    }
}
