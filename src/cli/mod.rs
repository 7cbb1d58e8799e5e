//! Command-line parsing for the `bss` tool.
//!
//! Parsing stays here; `app` converts these structs into plain configs
//! before anything numerical runs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{GridKind, Quantity};
use crate::fit::ResidualFrame;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "bss",
    version,
    about = "BeAtlas SED grids and single-scattering polarization models"
)]
pub struct Cli {
    /// Increase log verbosity (`-v` debug, `-vv` trace). `RUST_LOG` wins.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Build a binary grid file from a directory of full-SED tables.
    Pack(PackArgs),
    /// Print the header and completeness of a grid file.
    Inspect(InspectArgs),
    /// Interpolate one spectrum from a grid file.
    Interp(InterpArgs),
    /// Compute intrinsic and observed polarization curves for a target.
    Model(ModelArgs),
    /// Compare a target's observations against the model.
    Fit(FitArgs),
}

#[derive(Debug, Args, Clone)]
pub struct PackArgs {
    /// Directory searched recursively for `fullsed_*.sed2` files.
    pub sed_dir: PathBuf,

    /// Output grid file.
    #[arg(short, long)]
    pub output: PathBuf,

    /// Model family to collect.
    #[arg(long, value_enum, default_value_t = GridKind::Parametric)]
    pub kind: GridKind,

    /// Use the fixed reference flux factor instead of per-model luminosities.
    #[arg(long)]
    pub ignore_lum: bool,

    /// Resample onto the wavelengths in this file (one per token).
    #[arg(long, value_name = "FILE")]
    pub lambda: Option<PathBuf>,

    /// Also write a plain-text mirror of the grid.
    #[arg(long, value_name = "FILE")]
    pub text: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct InspectArgs {
    pub grid: PathBuf,

    /// Write a plain-text mirror of the decoded grid.
    #[arg(long, value_name = "FILE")]
    pub text: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct InterpArgs {
    pub grid: PathBuf,

    /// Fixed component, snapped to the nearest grid value (e.g. `M=10`).
    #[arg(long = "set", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub set: Vec<(Quantity, f64)>,

    /// Free component, interpolated between neighbours (e.g. `cosi=0.5`).
    #[arg(long = "free", value_name = "NAME=VALUE", value_parser = parse_assignment)]
    pub free: Vec<(Quantity, f64)>,

    /// Combine corners linearly instead of in log flux.
    #[arg(long)]
    pub linear: bool,

    /// Fail when a bracketing corner is missing instead of returning zeros.
    #[arg(long)]
    pub strict: bool,

    /// Write the spectrum as `lambda flux` lines.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Rows of the spectrum shown in the terminal.
    #[arg(long, default_value_t = 20)]
    pub rows: usize,
}

/// Target setup: a JSON file plus per-field overrides.
#[derive(Debug, Args, Clone, Default)]
pub struct SetupArgs {
    /// Target name (also selects `<target>.log` and the ephemeris row).
    #[arg(short, long)]
    pub target: Option<String>,

    /// JSON file with a full target setup.
    #[arg(long, value_name = "JSON")]
    pub setup: Option<PathBuf>,

    /// Stellar radius (R_sun).
    #[arg(long)]
    pub rs: Option<f64>,
    /// Blob diameter (stellar radii).
    #[arg(long)]
    pub diamb: Option<f64>,
    /// Blob distance (stellar radii).
    #[arg(long)]
    pub distb: Option<f64>,
    /// Blob grid points per axis.
    #[arg(long)]
    pub n0: Option<usize>,
    /// Blob electron density (cm^-3).
    #[arg(long)]
    pub ne: Option<f64>,
    /// Inclination (degrees).
    #[arg(long)]
    pub iang: Option<f64>,
    /// Phase offset (radians).
    #[arg(long)]
    pub dlt0: Option<f64>,
    /// Position angle (degrees).
    #[arg(long)]
    pub ths: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub qis: Option<f64>,
    #[arg(long, allow_hyphen_values = true)]
    pub uis: Option<f64>,
    /// Disk tilt (degrees).
    #[arg(long, allow_hyphen_values = true)]
    pub alpha: Option<f64>,
    /// Disk height (stellar radii).
    #[arg(long)]
    pub hd: Option<f64>,
    /// Disk electron density (cm^-3).
    #[arg(long)]
    pub ned: Option<f64>,

    /// Ignore stellar occultation of the blob.
    #[arg(long)]
    pub no_occult: bool,
}

#[derive(Debug, Args, Clone)]
pub struct ModelArgs {
    #[command(flatten)]
    pub setup: SetupArgs,

    /// Phase-grid points over one cycle (the duplicate endpoint is dropped).
    #[arg(long, default_value_t = 80)]
    pub phases: usize,

    /// Write the curve as JSON.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Summarize a previously written curve instead of computing one.
    #[arg(long, value_name = "JSON", conflicts_with = "output")]
    pub from: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub setup: SetupArgs,

    /// Directory holding `<target>.log`.
    #[arg(long, default_value = ".")]
    pub log_dir: PathBuf,

    /// Ephemeris table (`target period epoch_jd`); falls back to `SINGSCAT_EPHEMERIS`.
    #[arg(long)]
    pub ephemeris: Option<PathBuf>,

    /// Bin observations into this many phase bins.
    #[arg(long)]
    pub bins: Option<usize>,

    /// Frame in which model and data are compared.
    #[arg(long, value_enum, default_value_t = ResidualFrame::Observed)]
    pub frame: ResidualFrame,

    /// Run the Metropolis sampler around the configured setup.
    #[arg(long)]
    pub sample: bool,

    #[arg(long, default_value_t = 16)]
    pub walkers: usize,

    #[arg(long, default_value_t = 400)]
    pub steps: usize,

    /// Steps dropped from each chain before summarizing.
    #[arg(long, default_value_t = 100)]
    pub burn: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Proposal sigma as a fraction of each parameter's prior width.
    #[arg(long, default_value_t = 0.02)]
    pub proposal_scale: f64,

    /// Scan chi2 thresholds for per-parameter intervals (optional step cap).
    #[arg(long, value_name = "MAX_STEPS", num_args = 0..=1, default_missing_value = "400")]
    pub errors: Option<usize>,

    /// Phase-grid points for the exported model curve.
    #[arg(long, default_value_t = 80)]
    pub phases: usize,

    /// Print the per-epoch residual table.
    #[arg(long)]
    pub table: bool,

    /// Export per-epoch residuals to CSV.
    #[arg(long)]
    pub export: Option<PathBuf>,

    /// Export phase-sorted observations with wrapped edges to CSV.
    #[arg(long = "export-phased")]
    pub export_phased: Option<PathBuf>,

    /// Export sampler chains to CSV.
    #[arg(long = "export-chain")]
    pub export_chain: Option<PathBuf>,

    /// Export the fit summary to JSON.
    #[arg(long = "export-summary")]
    pub export_summary: Option<PathBuf>,

    /// Export the model curve to JSON.
    #[arg(long = "export-curve")]
    pub export_curve: Option<PathBuf>,
}

/// Parse `NAME=VALUE` into a grid quantity and its value.
pub fn parse_assignment(s: &str) -> Result<(Quantity, f64), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected NAME=VALUE, got '{s}'."))?;
    let quantity: Quantity = name.parse()?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("Invalid number '{value}' for '{quantity}'."))?;
    Ok((quantity, value))
}
