//! Resolved run configurations, one per subcommand.
//!
//! The CLI layer converts parsed arguments into these plain structs so the
//! pipeline never sees clap types.

use std::path::PathBuf;

use crate::domain::{GridKind, Quantity, TargetSetup};
use crate::fit::{ResidualFrame, SamplerOptions};
use crate::grid::InterpOptions;

#[derive(Debug, Clone)]
pub struct PackConfig {
    pub sed_dir: PathBuf,
    pub output: PathBuf,
    pub kind: GridKind,
    pub ignore_lum: bool,
    /// Target wavelength array; defaults to the first model's.
    pub lambda_file: Option<PathBuf>,
    pub text_mirror: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct InterpConfig {
    pub grid: PathBuf,
    pub fixed: Vec<(Quantity, f64)>,
    pub free: Vec<(Quantity, f64)>,
    pub options: InterpOptions,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub setup: TargetSetup,
    /// Phase-grid size including the duplicated endpoint (which is dropped).
    pub n_phases: usize,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FitConfig {
    pub setup: TargetSetup,
    /// Directory holding `<target>.log`.
    pub log_dir: PathBuf,
    pub ephemeris: Option<PathBuf>,
    pub nbins: Option<usize>,
    pub frame: ResidualFrame,
    pub sampler: Option<SamplerOptions>,
    /// Error-scan step cap; `None` skips the scan.
    pub error_scan: Option<usize>,
    pub n_phases: usize,

    pub export_residuals: Option<PathBuf>,
    pub export_phased: Option<PathBuf>,
    pub export_chain: Option<PathBuf>,
    pub export_summary: Option<PathBuf>,
    pub export_curve: Option<PathBuf>,
}
