//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - parses CLI arguments and sets up logging
//! - converts arguments into run configs
//! - runs the pipelines in [`pipeline`]
//! - prints reports and writes optional exports

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::cli::{Command, FitArgs, InspectArgs, InterpArgs, ModelArgs, PackArgs, SetupArgs};
use crate::domain::{FitConfig, GridKind, InterpConfig, ModelConfig, PackConfig, TargetSetup};
use crate::error::AppError;
use crate::fit::SamplerOptions;
use crate::grid::{InterpOptions, MissingCorner};
use crate::math::InterpSpace;

pub mod pipeline;

/// Entry point for the `bss` binary.
pub fn run() -> Result<(), AppError> {
    let cli = crate::cli::Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Command::Pack(args) => handle_pack(&args),
        Command::Inspect(args) => handle_inspect(&args),
        Command::Interp(args) => handle_interp(&args),
        Command::Model(args) => handle_model(&args),
        Command::Fit(args) => handle_fit(&args),
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn handle_pack(args: &PackArgs) -> Result<(), AppError> {
    let config = pack_config_from_args(args);
    let grid = pipeline::run_pack(&config)?;
    info!(output = %config.output.display(), "grid written");

    let (decoded, report) = crate::grid::read_grid(&config.output)?;
    if decoded.n_models() != grid.n_models() {
        return Err(AppError::integrity(format!(
            "Wrote {} records but read back {}.",
            grid.n_models(),
            decoded.n_models()
        )));
    }
    println!(
        "{}",
        crate::report::format_grid_summary(&decoded, &report, &config.output.display().to_string())
    );
    Ok(())
}

fn handle_inspect(args: &InspectArgs) -> Result<(), AppError> {
    let (grid, report) = crate::grid::read_grid(&args.grid)?;
    println!(
        "{}",
        crate::report::format_grid_summary(&grid, &report, &args.grid.display().to_string())
    );
    if let Some(path) = &args.text {
        crate::grid::write_text_mirror(&grid, path)?;
    }
    Ok(())
}

fn handle_interp(args: &InterpArgs) -> Result<(), AppError> {
    let config = interp_config_from_args(args);
    let out = pipeline::run_interp(&config)?;
    let kind = GridKind::from_n_quantities(out.axes.len())
        .ok_or_else(|| AppError::integrity(format!("No grid kind has {} quantities.", out.axes.len())))?;
    println!("{}", crate::report::format_interp(kind, &out, args.rows));
    Ok(())
}

fn handle_model(args: &ModelArgs) -> Result<(), AppError> {
    if let Some(path) = &args.from {
        let curve = crate::io::curve::read_curve_json(path)?;
        println!("{}", crate::report::format_model_summary(&curve));
        return Ok(());
    }

    let config = model_config_from_args(args)?;
    let curve = pipeline::run_model(&config)?;
    println!("{}", crate::report::format_model_summary(&curve));

    if let Some(path) = &config.output {
        crate::io::curve::write_curve_json(path, &curve)?;
    }
    Ok(())
}

fn handle_fit(args: &FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(args)?;
    let run = pipeline::run_fit(&config)?;
    println!("{}", crate::report::format_fit_run(&run, args.table));

    if let Some(path) = &config.export_residuals {
        crate::io::export::write_residuals_csv(path, &run.observations, &run.evaluation)?;
    }
    if let Some(path) = &config.export_phased {
        crate::io::export::write_phased_csv(path, &run.observations)?;
    }
    if let Some(path) = &config.export_chain {
        let Some((params, chain)) = &run.sampler else {
            return Err(AppError::usage("--export-chain needs --sample."));
        };
        crate::io::export::write_chain_csv(path, params, chain)?;
    }
    if let Some(path) = &config.export_summary {
        crate::io::export::write_summary_json(path, &run.summary())?;
    }
    if let Some(path) = &config.export_curve {
        crate::io::curve::write_curve_json(path, &run.curve)?;
    }
    Ok(())
}

pub fn pack_config_from_args(args: &PackArgs) -> PackConfig {
    PackConfig {
        sed_dir: args.sed_dir.clone(),
        output: args.output.clone(),
        kind: args.kind,
        ignore_lum: args.ignore_lum,
        lambda_file: args.lambda.clone(),
        text_mirror: args.text.clone(),
    }
}

pub fn interp_config_from_args(args: &InterpArgs) -> InterpConfig {
    InterpConfig {
        grid: args.grid.clone(),
        fixed: args.set.clone(),
        free: args.free.clone(),
        options: InterpOptions {
            space: if args.linear {
                InterpSpace::Linear
            } else {
                InterpSpace::Log
            },
            missing: if args.strict {
                MissingCorner::Strict
            } else {
                MissingCorner::Zeros
            },
        },
        output: args.output.clone(),
    }
}

pub fn model_config_from_args(args: &ModelArgs) -> Result<ModelConfig, AppError> {
    Ok(ModelConfig {
        setup: setup_from_args(&args.setup)?,
        n_phases: args.phases,
        output: args.output.clone(),
    })
}

pub fn fit_config_from_args(args: &FitArgs) -> Result<FitConfig, AppError> {
    if args.export_chain.is_some() && !args.sample {
        return Err(AppError::usage("--export-chain needs --sample."));
    }
    Ok(FitConfig {
        setup: setup_from_args(&args.setup)?,
        log_dir: args.log_dir.clone(),
        ephemeris: args.ephemeris.clone(),
        nbins: args.bins,
        frame: args.frame,
        sampler: args.sample.then_some(SamplerOptions {
            walkers: args.walkers,
            steps: args.steps,
            burn_in: args.burn,
            seed: args.seed,
            proposal_scale: args.proposal_scale,
        }),
        error_scan: args.errors,
        n_phases: args.phases,

        export_residuals: args.export.clone(),
        export_phased: args.export_phased.clone(),
        export_chain: args.export_chain.clone(),
        export_summary: args.export_summary.clone(),
        export_curve: args.export_curve.clone(),
    })
}

/// Defaults, then the JSON setup file, then individual overrides.
pub fn setup_from_args(args: &SetupArgs) -> Result<TargetSetup, AppError> {
    let mut setup = match &args.setup {
        Some(path) => read_setup_json(path)?,
        None => TargetSetup::default(),
    };

    if let Some(t) = &args.target {
        setup.target = t.clone();
    }
    let overrides = [
        (args.rs, &mut setup.rs),
        (args.diamb, &mut setup.diamb),
        (args.distb, &mut setup.distb),
        (args.ne, &mut setup.ne),
        (args.iang, &mut setup.iang),
        (args.dlt0, &mut setup.dlt0),
        (args.ths, &mut setup.ths),
        (args.qis, &mut setup.qis),
        (args.uis, &mut setup.uis),
        (args.alpha, &mut setup.alpha),
        (args.hd, &mut setup.hd),
        (args.ned, &mut setup.ned),
    ];
    for (value, slot) in overrides {
        if let Some(v) = value {
            *slot = v;
        }
    }
    if let Some(n0) = args.n0 {
        setup.n0 = n0;
    }
    if args.no_occult {
        setup.occult = false;
    }

    if setup.n0 == 0 || setup.rs <= 0.0 || setup.diamb <= 0.0 {
        return Err(AppError::usage("rs, diamb and n0 must be positive."));
    }
    Ok(setup)
}

fn read_setup_json(path: &Path) -> Result<TargetSetup, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open setup '{}': {e}", path.display())))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::data(format!("Invalid setup JSON '{}': {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::Cli;
    use tempfile::tempdir;

    fn fit_args(argv: &[&str]) -> FitArgs {
        let mut full = vec!["bss", "fit"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Command::Fit(args) => args,
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn overrides_apply_on_top_of_defaults() {
        let args = fit_args(&["-t", "hd37017", "--iang", "60", "--qis", "-0.2", "--no-occult"]);
        let setup = setup_from_args(&args.setup).unwrap();
        assert_eq!(setup.target, "hd37017");
        assert_eq!(setup.iang, 60.0);
        assert_eq!(setup.qis, -0.2);
        assert!(!setup.occult);
        assert_eq!(setup.rs, TargetSetup::default().rs);
    }

    #[test]
    fn setup_json_is_loaded_then_overridden() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("setup.json");
        let mut base = TargetSetup::default();
        base.target = "from_file".to_string();
        base.ne = 5e11;
        std::fs::write(&path, serde_json::to_string(&base).unwrap()).unwrap();

        let args = fit_args(&["--setup", path.to_str().unwrap(), "--ths", "120"]);
        let setup = setup_from_args(&args.setup).unwrap();
        assert_eq!(setup.target, "from_file");
        assert_eq!(setup.ne, 5e11);
        assert_eq!(setup.ths, 120.0);
    }

    #[test]
    fn invalid_setup_json_is_data_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{ not json").unwrap();
        let args = fit_args(&["--setup", path.to_str().unwrap()]);
        let err = setup_from_args(&args.setup).unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn fit_config_wires_sampler_and_scan() {
        let args = fit_args(&["--sample", "--walkers", "8", "--errors", "10", "--bins", "20"]);
        let config = fit_config_from_args(&args).unwrap();
        let sampler = config.sampler.unwrap();
        assert_eq!(sampler.walkers, 8);
        assert_eq!(sampler.burn_in, 100);
        assert_eq!(config.error_scan, Some(10));
        assert_eq!(config.nbins, Some(20));

        let args = fit_args(&[]);
        let config = fit_config_from_args(&args).unwrap();
        assert!(config.sampler.is_none());
        assert!(config.error_scan.is_none());
    }

    #[test]
    fn chain_export_without_sampler_is_usage_error() {
        let args = fit_args(&["--export-chain", "chain.csv"]);
        let err = fit_config_from_args(&args).unwrap_err();
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn interp_flags_select_options() {
        let cli = Cli::try_parse_from(["bss", "interp", "g.bin", "--linear", "--strict"]).unwrap();
        let Command::Interp(args) = cli.command else {
            panic!("expected interp");
        };
        let config = interp_config_from_args(&args);
        assert_eq!(config.options.space, InterpSpace::Linear);
        assert_eq!(config.options.missing, MissingCorner::Strict);
    }
}
