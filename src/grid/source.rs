//! Raw inputs of a grid build: full-SED tables and luminosity logs.
//!
//! Layout expected on disk (one directory per model run):
//!
//! ```text
//! <root>/fullsed/fullsed_mod01_<name>.sed2
//! <root>/mod01/mod01_<name>.log
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

use crate::domain::GridKind;
use crate::domain::constants::L_SUN;
use crate::error::AppError;
use crate::grid::names::{ModelName, model_number};

/// Header lines preceding the data rows of a `.sed2` table.
const SED2_HEADER_LINES: usize = 5;

/// Spectrum seen by one observer direction.
#[derive(Debug, Clone, PartialEq)]
pub struct ObserverSed {
    /// `cos i` of the observer.
    pub mu: f64,
    pub lambda: Vec<f64>,
    pub flux: Vec<f64>,
}

/// Parsed `.sed2` table, one spectrum per observer in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FullSed {
    pub observers: Vec<ObserverSed>,
}

impl FullSed {
    pub fn mu_values(&self) -> Vec<f64> {
        self.observers.iter().map(|o| o.mu).collect()
    }
}

pub fn read_fullsed2(path: &Path) -> Result<FullSed, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read SED '{}': {e}", path.display())))?;
    parse_fullsed2(&text, &path.display().to_string())
}

/// Parse `.sed2` text. Rows are `mu phi lambda flux ...`; rows are grouped by
/// `mu` in order of first appearance.
pub fn parse_fullsed2(text: &str, origin: &str) -> Result<FullSed, AppError> {
    let mut sed = FullSed::default();

    for (idx, line) in text.lines().enumerate().skip(SED2_HEADER_LINES) {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        let cols = trimmed
            .split_whitespace()
            .take(4)
            .map(str::parse::<f64>)
            .collect::<Result<Vec<f64>, _>>()
            .map_err(|e| AppError::data(format!("{origin}:{}: {e}", idx + 1)))?;
        if cols.len() < 4 {
            return Err(AppError::data(format!(
                "{origin}:{}: expected at least 4 columns, found {}",
                idx + 1,
                cols.len()
            )));
        }
        let (mu, lambda, flux) = (cols[0], cols[2], cols[3]);

        match sed.observers.iter_mut().find(|o| o.mu == mu) {
            Some(obs) => {
                obs.lambda.push(lambda);
                obs.flux.push(flux);
            }
            None => sed.observers.push(ObserverSed {
                mu,
                lambda: vec![lambda],
                flux: vec![flux],
            }),
        }
    }

    if sed.observers.is_empty() {
        return Err(AppError::data(format!("{origin}: no SED rows found.")));
    }
    Ok(sed)
}

/// Luminosity log belonging to a full-SED file.
///
/// `.../fullsed/fullsed_modNN_X.sed2` maps to `.../modNN/modNN_X.log`; if that
/// file does not exist, any `*modNN_X.log` in the same directory is accepted.
pub fn luminosity_log_path(sed_path: &Path) -> Result<PathBuf, AppError> {
    let name = sed_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let modn = model_number(&name).ok_or_else(|| {
        AppError::integrity(format!(
            "No log file found for {}: name has no model number",
            sed_path.display()
        ))
    })?;

    let log_dir = sed_path
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join("..")
        .join(format!("mod{modn}"));
    let log_name = name
        .replacen("fullsed_mod", "mod", 1)
        .replace(".sed2", ".log");

    let direct = log_dir.join(&log_name);
    if direct.is_file() {
        return Ok(direct);
    }

    let fallback = fs::read_dir(&log_dir).ok().and_then(|entries| {
        let mut matches: Vec<PathBuf> = entries
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .is_some_and(|n| n.to_string_lossy().ends_with(&log_name))
            })
            .collect();
        matches.sort();
        matches.into_iter().next()
    });

    fallback.ok_or_else(|| {
        AppError::integrity(format!("No log file found for {}", sed_path.display()))
    })
}

/// Bolometric luminosity (erg/s) from a model log.
///
/// Reads the second number on the first line containing `L =`, in solar units.
pub fn read_luminosity(log_path: &Path) -> Result<f64, AppError> {
    let text = fs::read_to_string(log_path)
        .map_err(|e| AppError::io(format!("Failed to read log '{}': {e}", log_path.display())))?;
    let line = text.lines().find(|l| l.contains("L =")).ok_or_else(|| {
        AppError::integrity(format!("Log '{}' has no 'L =' line", log_path.display()))
    })?;
    let value = nth_number(line, 2).ok_or_else(|| {
        AppError::integrity(format!(
            "Log '{}': cannot read luminosity from '{}'",
            log_path.display(),
            line.trim()
        ))
    })?;
    debug!(log = %log_path.display(), l_sun = value, "Read luminosity");
    Ok(value * L_SUN)
}

/// `n`-th (1-based) number on a line, with `=`, `,` and whitespace as
/// separators.
pub fn nth_number(line: &str, n: usize) -> Option<f64> {
    line.split(|c: char| c.is_whitespace() || c == '=' || c == ',')
        .filter_map(|tok| tok.parse::<f64>().ok())
        .nth(n.checked_sub(1)?)
}

/// Wavelength array from a text file: whitespace-separated numbers, `#`
/// comments ignored.
pub fn read_lambda_file(path: &Path) -> Result<Vec<f64>, AppError> {
    let text = fs::read_to_string(path)
        .map_err(|e| AppError::io(format!("Failed to read wavelengths '{}': {e}", path.display())))?;
    let mut lambda = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let data = line.split('#').next().unwrap_or_default();
        for tok in data.split_whitespace() {
            let v = tok.parse::<f64>().map_err(|_| {
                AppError::data(format!("{}:{}: invalid wavelength '{tok}'", path.display(), idx + 1))
            })?;
            lambda.push(v);
        }
    }
    if lambda.is_empty() {
        return Err(AppError::data(format!("'{}' holds no wavelengths", path.display())));
    }
    Ok(lambda)
}

/// All `.sed2` files under `dir`, sorted by path.
pub fn list_sed_files(dir: &Path) -> Result<Vec<PathBuf>, AppError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir) {
        let entry = entry.map_err(|e| AppError::io(format!("Failed to list '{}': {e}", dir.display())))?;
        if entry.file_type().is_file()
            && entry.path().extension().is_some_and(|ext| ext == "sed2")
        {
            files.push(entry.into_path());
        }
    }
    files.sort();
    Ok(files)
}

/// Models of one grid kind and the sorted parameter lists they span.
#[derive(Debug, Clone)]
pub struct GridListing {
    pub kind: GridKind,
    /// Model files of the selected kind, sorted by path.
    pub models: Vec<(PathBuf, ModelName)>,
    /// Sorted unique values per quantity; the last list is `cos i`.
    pub params: Vec<Vec<f64>>,
}

impl GridListing {
    /// Number of grid records: models × observers.
    pub fn n_records(&self) -> usize {
        self.models.len() * self.params.last().map_or(0, Vec::len)
    }
}

/// Scan `files` and collect the models of `kind` with their parameter lists.
///
/// All models are assumed to share the observer set of the first one.
pub fn list_grid(files: &[PathBuf], kind: GridKind) -> Result<GridListing, AppError> {
    let quantities = kind.quantities();
    let mut params: Vec<Vec<f64>> = vec![Vec::new(); quantities.len()];
    let mut models = Vec::new();

    let mut sorted = files.to_vec();
    sorted.sort();

    for path in sorted {
        let name = ModelName::parse(&path.to_string_lossy())?;
        if name.kind != kind {
            continue;
        }
        for (list, &q) in params.iter_mut().zip(quantities) {
            if let Some(v) = name.value(q) {
                push_unique(list, v);
            }
        }
        if models.is_empty() {
            let sed = read_fullsed2(&path)?;
            if let Some(last) = params.last_mut() {
                *last = sed.mu_values();
            }
        }
        models.push((path, name));
    }

    for list in params.iter_mut() {
        list.sort_by(f64::total_cmp);
    }

    Ok(GridListing {
        kind,
        models,
        params,
    })
}

fn push_unique(list: &mut Vec<f64>, v: f64) {
    if !list.contains(&v) {
        list.push(v);
    }
}
