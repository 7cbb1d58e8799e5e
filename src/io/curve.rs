//! Read/write model curve JSON files.
//!
//! A curve file is the portable form of one model run:
//! - the target setup it was computed from
//! - the intrinsic Stokes curve on a uniform phase grid (percent)
//! - the same curve mapped to the observed frame
//!
//! The schema is defined by `domain::ModelCurveFile`.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::domain::ModelCurveFile;
use crate::error::AppError;

pub fn write_curve_json(path: &Path, curve: &ModelCurveFile) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create curve JSON '{}': {e}", path.display())))?;
    serde_json::to_writer_pretty(BufWriter::new(file), curve)
        .map_err(|e| AppError::io(format!("Failed to write curve JSON: {e}")))?;
    Ok(())
}

pub fn read_curve_json(path: &Path) -> Result<ModelCurveFile, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::io(format!("Failed to open curve JSON '{}': {e}", path.display())))?;
    let curve = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| AppError::data(format!("Invalid curve JSON: {e}")))?;
    Ok(curve)
}
