//! BeAtlas grid binary format.
//!
//! Big-endian, 4-byte scalars, sections in this order:
//!
//! 1. `n_quantities, n_wavelengths, n_models` (i32 × 3)
//! 2. length of each parameter list (i32 × Q)
//! 3. each sorted parameter list (f32 × len)
//! 4. shared wavelength array (f32 × W)
//! 5. `n_models` records of `Q` identity floats followed by `W` flux floats
//!
//! The grid is non-rectangular: there is no index to jump to a model directly,
//! lookups scan the identity matrix.
//!
//! Values are stored as f32. In memory they are widened to f64, so identity
//! components and parameter-list entries read from the same file compare
//! exactly.

use std::f64::consts::PI;
use std::fs;
use std::io::Write;
use std::path::Path;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::{debug, info, warn};

use crate::domain::GridKind;
use crate::domain::constants::PARSEC;
use crate::error::AppError;
use crate::grid::source::{GridListing, luminosity_log_path, read_fullsed2, read_luminosity};
use crate::math::resample;

/// In-memory BeAtlas grid.
#[derive(Debug, Clone, PartialEq)]
pub struct BeAtlasGrid {
    pub kind: GridKind,
    /// Sorted values per quantity, in on-disk order.
    pub params: Vec<Vec<f64>>,
    pub lambda: Vec<f64>,
    /// One identity vector (length Q) per record.
    pub identities: Vec<Vec<f64>>,
    /// One spectrum (length W) per record.
    pub fluxes: Vec<Vec<f64>>,
}

/// Outcome of a decode beyond the grid itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridDecodeReport {
    pub bytes_consumed: usize,
    pub file_len: usize,
    /// Unread trailing data in 4-byte words (0 when the file was fully read).
    pub trailing_words: usize,
    /// Words the header promises beyond the end of the file (truncation).
    pub missing_words: usize,
    /// Records the header announces; the grid holds the complete ones.
    pub records_expected: usize,
}

impl GridDecodeReport {
    pub fn complete(&self) -> bool {
        self.trailing_words == 0 && self.missing_words == 0 && self.bytes_consumed == self.file_len
    }

    pub fn truncated(&self) -> bool {
        self.missing_words > 0
    }
}

/// Options for building a grid from full-SED files.
#[derive(Debug, Clone, Default)]
pub struct BuildOptions {
    /// Skip luminosity normalization and use the fixed reference factor.
    pub ignore_lum: bool,
}

impl BeAtlasGrid {
    pub fn n_quantities(&self) -> usize {
        self.params.len()
    }

    pub fn n_wavelengths(&self) -> usize {
        self.lambda.len()
    }

    pub fn n_models(&self) -> usize {
        self.identities.len()
    }

    /// Index of the record whose identity equals `identity` exactly.
    pub fn find(&self, identity: &[f64]) -> Option<usize> {
        self.identities.iter().position(|id| id.as_slice() == identity)
    }

    /// Check shapes and that every identity component is a listed value.
    pub fn validate(&self) -> Result<(), AppError> {
        let nq = self.n_quantities();
        if nq != self.kind.n_quantities() {
            return Err(AppError::integrity(format!(
                "{nq} parameter lists for a {:?} grid (expected {})",
                self.kind,
                self.kind.n_quantities()
            )));
        }
        if self.fluxes.len() != self.identities.len() {
            return Err(AppError::integrity(format!(
                "{} identities but {} spectra",
                self.identities.len(),
                self.fluxes.len()
            )));
        }
        let nlb = self.n_wavelengths();
        for (i, (id, flux)) in self.identities.iter().zip(&self.fluxes).enumerate() {
            if id.len() != nq || flux.len() != nlb {
                return Err(AppError::integrity(format!(
                    "record {i}: identity length {} / spectrum length {} (expected {nq} / {nlb})",
                    id.len(),
                    flux.len()
                )));
            }
            for (q, (&v, list)) in id.iter().zip(&self.params).enumerate() {
                if !list.contains(&v) {
                    return Err(AppError::integrity(format!(
                        "record {i}: value {v} of {} is not in its parameter list",
                        self.kind.quantities()[q]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Round every value through f32, as the file stores it.
    pub fn quantized(mut self) -> Self {
        let q = |v: &mut f64| *v = *v as f32 as f64;
        self.params.iter_mut().flatten().for_each(q);
        self.lambda.iter_mut().for_each(q);
        self.identities.iter_mut().flatten().for_each(q);
        self.fluxes.iter_mut().flatten().for_each(q);
        self
    }
}

/// Serialize a grid into the binary layout.
pub fn encode_grid(grid: &BeAtlasGrid) -> Result<Bytes, AppError> {
    grid.validate()?;
    let nq = grid.n_quantities();
    let nlb = grid.n_wavelengths();
    let nm = grid.n_models();
    let list_len: usize = grid.params.iter().map(Vec::len).sum();
    let words = 3 + nq + list_len + nlb + nm * (nq + nlb);
    let mut buf = BytesMut::with_capacity(words * 4);

    for n in [nq, nlb, nm] {
        buf.put_i32(to_i32(n)?);
    }
    for list in &grid.params {
        buf.put_i32(to_i32(list.len())?);
    }
    for &v in grid.params.iter().flatten() {
        buf.put_f32(v as f32);
    }
    for &v in &grid.lambda {
        buf.put_f32(v as f32);
    }
    for (id, flux) in grid.identities.iter().zip(&grid.fluxes) {
        for &v in id.iter().chain(flux) {
            buf.put_f32(v as f32);
        }
    }
    Ok(buf.freeze())
}

/// Parse the binary layout. A length mismatch is reported, not rejected.
///
/// Headers, parameter lists and wavelengths must be present. Records are
/// read while complete ones remain; a short tail ends the grid early and is
/// counted in the report.
pub fn decode_grid(data: &[u8], origin: &str) -> Result<(BeAtlasGrid, GridDecodeReport), AppError> {
    let file_len = data.len();
    let mut buf = data;

    let nq = read_count(&mut buf, origin, "n_quantities")?;
    let nlb = read_count(&mut buf, origin, "n_wavelengths")?;
    let nm = read_count(&mut buf, origin, "n_models")?;
    let kind = GridKind::from_n_quantities(nq).ok_or_else(|| {
        AppError::data(format!("{origin}: unsupported number of quantities {nq}"))
    })?;

    let mut lens = Vec::with_capacity(nq);
    for q in kind.quantities() {
        lens.push(read_count(&mut buf, origin, q.label())?);
    }
    let mut params = Vec::with_capacity(nq);
    for (len, q) in lens.iter().zip(kind.quantities()) {
        params.push(read_floats(&mut buf, *len, origin, q.label())?);
    }
    let lambda = read_floats(&mut buf, nlb, origin, "wavelengths")?;

    let record_words = nq + nlb;
    let fitting = buf.remaining() / (record_words * 4).max(1);
    let mut identities = Vec::with_capacity(nm.min(fitting));
    let mut fluxes = Vec::with_capacity(nm.min(fitting));
    for _ in 0..nm {
        if buf.remaining() < record_words * 4 {
            break;
        }
        identities.push((0..nq).map(|_| buf.get_f32() as f64).collect());
        fluxes.push((0..nlb).map(|_| buf.get_f32() as f64).collect());
    }

    let header_words = 3 + nq + lens.iter().sum::<usize>() + nlb;
    let expected_bytes = (header_words + nm.saturating_mul(record_words)).saturating_mul(4);
    let trailing = buf.remaining();
    let report = GridDecodeReport {
        bytes_consumed: file_len - trailing,
        file_len,
        trailing_words: trailing / 4,
        missing_words: expected_bytes.saturating_sub(file_len).div_ceil(4),
        records_expected: nm,
    };
    if report.complete() {
        debug!(origin, n_models = nm, "Grid completely read");
    } else if report.truncated() {
        warn!(
            origin,
            bytes_consumed = report.bytes_consumed,
            file_len,
            records_read = identities.len(),
            records_expected = nm,
            missing_words = report.missing_words,
            "Grid file truncated"
        );
    } else {
        warn!(
            origin,
            bytes_consumed = report.bytes_consumed,
            file_len,
            difference_words = report.trailing_words,
            "Grid not completely read"
        );
    }

    Ok((
        BeAtlasGrid {
            kind,
            params,
            lambda,
            identities,
            fluxes,
        },
        report,
    ))
}

pub fn write_grid(grid: &BeAtlasGrid, path: &Path) -> Result<(), AppError> {
    let bytes = encode_grid(grid)?;
    fs::write(path, &bytes)
        .map_err(|e| AppError::io(format!("Failed to write grid '{}': {e}", path.display())))?;
    info!(path = %path.display(), n_models = grid.n_models(), "Grid file saved");
    Ok(())
}

pub fn read_grid(path: &Path) -> Result<(BeAtlasGrid, GridDecodeReport), AppError> {
    let data = fs::read(path)
        .map_err(|e| AppError::io(format!("Failed to read grid '{}': {e}", path.display())))?;
    decode_grid(&data, &path.display().to_string())
}

/// Plain-text mirror: one line per logical block (headers, each parameter
/// list, wavelengths, then identity and spectrum of every record).
pub fn write_text_mirror(grid: &BeAtlasGrid, path: &Path) -> Result<(), AppError> {
    let file = fs::File::create(path)
        .map_err(|e| AppError::io(format!("Failed to create '{}': {e}", path.display())))?;
    let mut out = std::io::BufWriter::new(file);

    let header2: Vec<usize> = grid.params.iter().map(Vec::len).collect();
    writeln!(
        out,
        "{} {} {}",
        grid.n_quantities(),
        grid.n_wavelengths(),
        grid.n_models()
    )?;
    writeln!(out, "{}", join(&header2))?;
    for list in &grid.params {
        writeln!(out, "{}", join(list))?;
    }
    writeln!(out, "{}", join(&grid.lambda))?;
    for (id, flux) in grid.identities.iter().zip(&grid.fluxes) {
        writeln!(out, "{}", join(id))?;
        writeln!(out, "{}", join(flux))?;
    }
    out.flush()?;
    info!(path = %path.display(), "Text mirror saved");
    Ok(())
}

/// Flux normalization factor `L / (4π d²)`.
///
/// With a luminosity, `d = 10 pc`; without one, `L = 1` and `d² = 4π`.
pub fn flux_scale(luminosity: Option<f64>) -> f64 {
    match luminosity {
        Some(l) => {
            let d = 10.0 * PARSEC;
            l / (4.0 * PI * d * d)
        }
        None => 1.0 / (4.0 * PI * 4.0 * PI),
    }
}

/// Build a grid from a model listing, resampling every spectrum onto `lambda`.
///
/// A missing luminosity log aborts the whole build.
pub fn build_grid(
    listing: &GridListing,
    lambda: &[f64],
    options: &BuildOptions,
) -> Result<BeAtlasGrid, AppError> {
    let cos_i = listing.params.last().cloned().unwrap_or_default();
    let mut identities = Vec::with_capacity(listing.n_records());
    let mut fluxes = Vec::with_capacity(listing.n_records());

    for (path, name) in &listing.models {
        let sed = read_fullsed2(path)?;
        let luminosity = if options.ignore_lum {
            None
        } else {
            Some(read_luminosity(&luminosity_log_path(path)?)?)
        };
        let scale = flux_scale(luminosity);

        for &mu in &cos_i {
            let obs = sed.observers.iter().find(|o| o.mu == mu).ok_or_else(|| {
                AppError::integrity(format!(
                    "{}: no observer with cos i = {mu}",
                    path.display()
                ))
            })?;
            let flux = if obs.lambda.len() == lambda.len() {
                obs.flux.clone()
            } else {
                resample(lambda, &obs.lambda, &obs.flux)
            };
            identities.push(name.identity(mu));
            fluxes.push(flux.into_iter().map(|f| f * scale).collect());
        }
        debug!(model = %path.display(), "Model added to grid");
    }

    let grid = BeAtlasGrid {
        kind: listing.kind,
        params: listing.params.clone(),
        lambda: lambda.to_vec(),
        identities,
        fluxes,
    }
    .quantized();
    grid.validate()?;
    Ok(grid)
}

fn read_count(buf: &mut &[u8], origin: &str, what: &str) -> Result<usize, AppError> {
    if buf.remaining() < 4 {
        return Err(truncated(origin, what));
    }
    let v = buf.get_i32();
    usize::try_from(v)
        .map_err(|_| AppError::data(format!("{origin}: negative count {v} for {what}")))
}

fn read_floats(buf: &mut &[u8], n: usize, origin: &str, what: &str) -> Result<Vec<f64>, AppError> {
    if buf.remaining() < n.saturating_mul(4) {
        return Err(truncated(origin, what));
    }
    Ok((0..n).map(|_| buf.get_f32() as f64).collect())
}

fn truncated(origin: &str, what: &str) -> AppError {
    AppError::data(format!("{origin}: file ends before {what}"))
}

fn to_i32(n: usize) -> Result<i32, AppError> {
    i32::try_from(n).map_err(|_| AppError::data(format!("count {n} does not fit the grid header")))
}

fn join<T: std::fmt::Display>(values: &[T]) -> String {
    values
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_grid() -> BeAtlasGrid {
        // Two free-ish axes (mass, cos i); others single valued.
        let params = vec![
            vec![4.0, 5.0],
            vec![1.4],
            vec![0.014],
            vec![0.3],
            vec![0.5],
            vec![50.0],
            vec![72.0],
            vec![0.0, 1.0],
        ];
        let mut identities = Vec::new();
        let mut fluxes = Vec::new();
        for &m in &params[0] {
            for &mu in &params[7] {
                identities.push(vec![m, 1.4, 0.014, 0.3, 0.5, 50.0, 72.0, mu]);
                fluxes.push(vec![m + mu + 1.0, 2.0 * (m + mu + 1.0), 4.0]);
            }
        }
        BeAtlasGrid {
            kind: GridKind::Vdd,
            params,
            lambda: vec![0.5, 1.0, 2.0],
            identities,
            fluxes,
        }
        .quantized()
    }

    #[test]
    fn encode_decode_round_trip() {
        let grid = sample_grid();
        let bytes = encode_grid(&grid).unwrap();
        let expected_words = 3 + 8 + 10 + 3 + 4 * (8 + 3);
        assert_eq!(bytes.len(), expected_words * 4);

        let (back, report) = decode_grid(&bytes, "mem").unwrap();
        assert!(report.complete());
        assert_eq!(back, grid);
        back.validate().unwrap();
    }

    #[test]
    fn header_is_big_endian() {
        let bytes = encode_grid(&sample_grid()).unwrap();
        assert_eq!(&bytes[0..4], &[0, 0, 0, 8]);
        assert_eq!(&bytes[4..8], &[0, 0, 0, 3]);
        assert_eq!(&bytes[8..12], &[0, 0, 0, 4]);
    }

    #[test]
    fn trailing_bytes_are_reported_not_rejected() {
        let mut data = encode_grid(&sample_grid()).unwrap().to_vec();
        data.extend_from_slice(&[0u8; 8]);
        let (grid, report) = decode_grid(&data, "mem").unwrap();
        assert_eq!(grid.n_models(), 4);
        assert!(!report.complete());
        assert_eq!(report.trailing_words, 2);
    }

    #[test]
    fn truncated_file_keeps_complete_records() {
        let grid = sample_grid();
        let data = encode_grid(&grid).unwrap();
        let (partial, report) = decode_grid(&data[..data.len() - 4], "mem").unwrap();

        assert_eq!(partial.n_models(), 3);
        assert_eq!(partial.identities[..], grid.identities[..3]);
        assert_eq!(partial.fluxes[..], grid.fluxes[..3]);
        assert_eq!(partial.lambda, grid.lambda);
        partial.validate().unwrap();

        assert!(report.truncated());
        assert!(!report.complete());
        assert_eq!(report.missing_words, 1);
        assert_eq!(report.records_expected, 4);
        // the partial last record (8 + 3 - 1 words) stays unread
        assert_eq!(report.trailing_words, 10);
        assert_eq!(report.bytes_consumed, data.len() - 4 - 40);
    }

    #[test]
    fn truncated_header_is_data_error() {
        let data = encode_grid(&sample_grid()).unwrap();
        // cut inside the wavelength array
        let cut = (3 + 8 + 10 + 1) * 4;
        let err = decode_grid(&data[..cut], "mem").unwrap_err();
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn file_round_trip_and_text_mirror() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.bin");
        let grid = sample_grid();
        write_grid(&grid, &path).unwrap();
        let (back, report) = read_grid(&path).unwrap();
        assert!(report.complete());
        assert_eq!(back, grid);

        let txt = dir.path().join("grid.bin.txt");
        write_text_mirror(&grid, &txt).unwrap();
        let text = std::fs::read_to_string(&txt).unwrap();
        // headers + 8 lists + lambda + 2 lines per record
        assert_eq!(text.lines().count(), 2 + 8 + 1 + 2 * 4);
        assert_eq!(text.lines().next(), Some("8 3 4"));
    }

    #[test]
    fn validate_rejects_unlisted_component() {
        let mut grid = sample_grid();
        grid.identities[0][0] = 4.5;
        assert!(matches!(grid.validate(), Err(AppError::Integrity(_))));
    }

    #[test]
    fn flux_scale_variants() {
        let reference = flux_scale(None);
        assert!((reference - 1.0 / (16.0 * PI * PI)).abs() < 1e-15);
        let d = 10.0 * PARSEC;
        assert!((flux_scale(Some(1.0)) * 4.0 * PI * d * d - 1.0).abs() < 1e-12);
    }

    fn write_model(dir: &Path, name: &str, lum: Option<f64>) {
        let fullsed = dir.join("fullsed");
        std::fs::create_dir_all(&fullsed).unwrap();
        let mut text = String::from("h\nh\nh\nh\nh\n");
        for mu in [1.0, 0.0] {
            for (lb, f) in [(0.5, 2.0), (1.5, 4.0)] {
                text.push_str(&format!("{mu} 0 {lb} {f}\n"));
            }
        }
        std::fs::write(fullsed.join(format!("fullsed_{name}.sed2")), text).unwrap();
        if let Some(l) = lum {
            let mod_dir = dir.join(&name[..5]);
            std::fs::create_dir_all(&mod_dir).unwrap();
            std::fs::write(mod_dir.join(format!("{name}.log")), format!("R = 3.0 L = {l}\n")).unwrap();
        }
    }

    #[test]
    fn build_resamples_and_normalizes() {
        let dir = tempfile::tempdir().unwrap();
        let name = "mod01_sig0.50_h072_Rd050.0_Be_M04.20_ob1.40_H0.30_Z0.014_bE_Ell";
        write_model(dir.path(), name, Some(100.0));
        let files = crate::grid::source::list_sed_files(dir.path()).unwrap();
        let listing = crate::grid::source::list_grid(&files, GridKind::Vdd).unwrap();

        let lambda = [0.5, 1.0, 1.5];
        let grid = build_grid(&listing, &lambda, &BuildOptions::default()).unwrap();
        assert_eq!(grid.n_models(), 2);
        assert_eq!(grid.identities[0][7], 0.0);

        let scale = flux_scale(Some(100.0 * crate::domain::constants::L_SUN));
        let mid = grid.fluxes[0][1];
        assert!(((mid / scale) - 3.0).abs() < 1e-5);

        let plain = build_grid(&listing, &lambda, &BuildOptions { ignore_lum: true }).unwrap();
        assert!((plain.fluxes[1][0] / flux_scale(None) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn build_without_log_fails_whole_grid() {
        let dir = tempfile::tempdir().unwrap();
        write_model(
            dir.path(),
            "mod01_sig0.50_h072_Rd050.0_Be_M04.20_ob1.40_H0.30_Z0.014_bE_Ell",
            Some(10.0),
        );
        write_model(
            dir.path(),
            "mod02_sig0.50_h072_Rd050.0_Be_M05.00_ob1.40_H0.30_Z0.014_bE_Ell",
            None,
        );
        let files = crate::grid::source::list_sed_files(dir.path()).unwrap();
        let listing = crate::grid::source::list_grid(&files, GridKind::Vdd).unwrap();
        let err = build_grid(&listing, &[0.5, 1.5], &BuildOptions::default()).unwrap_err();
        assert!(matches!(err, AppError::Integrity(_)));
    }
}
