//! Shared domain types.
//!
//! Scattering-model parameters are plain `Copy` value structs. Every model
//! evaluation receives a full snapshot by value, so trial evaluations (error
//! scans, sampler walkers) never share mutable state.

use std::fmt;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::domain::constants::R_SUN;

/// Which family of BeAtlas models a grid holds.
///
/// Parametric disks carry the power-law index `n` (9 quantities); VDD-ST
/// disks do not (8 quantities).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GridKind {
    Parametric,
    Vdd,
}

impl GridKind {
    pub fn n_quantities(self) -> usize {
        self.quantities().len()
    }

    /// Quantities in on-disk order.
    pub fn quantities(self) -> &'static [Quantity] {
        match self {
            GridKind::Parametric => &[
                Quantity::Mass,
                Quantity::Rotation,
                Quantity::Metallicity,
                Quantity::Hydrogen,
                Quantity::Sigma0,
                Quantity::DiskRadius,
                Quantity::ScaleHeight,
                Quantity::PowerLaw,
                Quantity::CosInclination,
            ],
            GridKind::Vdd => &[
                Quantity::Mass,
                Quantity::Rotation,
                Quantity::Metallicity,
                Quantity::Hydrogen,
                Quantity::Sigma0,
                Quantity::DiskRadius,
                Quantity::ScaleHeight,
                Quantity::CosInclination,
            ],
        }
    }

    pub fn from_n_quantities(n: usize) -> Option<Self> {
        match n {
            9 => Some(GridKind::Parametric),
            8 => Some(GridKind::Vdd),
            _ => None,
        }
    }

    /// Position of `quantity` in a model identity vector, if present.
    pub fn index_of(self, quantity: Quantity) -> Option<usize> {
        self.quantities().iter().position(|&q| q == quantity)
    }
}

/// One physical parameter of the BeAtlas grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    Mass,
    Rotation,
    Metallicity,
    Hydrogen,
    Sigma0,
    DiskRadius,
    ScaleHeight,
    PowerLaw,
    CosInclination,
}

impl Quantity {
    /// Short label used in file names and on the command line.
    pub fn label(self) -> &'static str {
        match self {
            Quantity::Mass => "M",
            Quantity::Rotation => "ob",
            Quantity::Metallicity => "Z",
            Quantity::Hydrogen => "H",
            Quantity::Sigma0 => "sig",
            Quantity::DiskRadius => "Rd",
            Quantity::ScaleHeight => "h",
            Quantity::PowerLaw => "n",
            Quantity::CosInclination => "cosi",
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let q = match s.trim() {
            "M" | "mass" => Quantity::Mass,
            "ob" | "W" | "rotation" => Quantity::Rotation,
            "Z" | "metallicity" => Quantity::Metallicity,
            "H" | "hydrogen" => Quantity::Hydrogen,
            "sig" | "sig0" | "sigma" => Quantity::Sigma0,
            "Rd" | "radius" => Quantity::DiskRadius,
            "h" | "height" => Quantity::ScaleHeight,
            "n" | "PLn" => Quantity::PowerLaw,
            "cosi" | "mu" => Quantity::CosInclination,
            other => return Err(format!("Unknown grid quantity '{other}'.")),
        };
        Ok(q)
    }
}

/// One component of an interpolation query.
///
/// `Fixed` components are snapped to the nearest listed grid value; `Free`
/// components are interpolated between their bracketing grid values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum QueryAxis {
    Fixed(f64),
    Free(f64),
}

impl QueryAxis {
    pub fn value(self) -> f64 {
        match self {
            QueryAxis::Fixed(v) | QueryAxis::Free(v) => v,
        }
    }

    pub fn is_free(self) -> bool {
        matches!(self, QueryAxis::Free(_))
    }
}

/// Star and blob geometry (cgs lengths).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StarGeometry {
    /// Stellar radius.
    pub rs: f64,
    /// Blob diameter.
    pub diamb: f64,
    /// Distance of the blob center from the stellar center.
    pub distb: f64,
    /// Voxel subdivisions per axis of the blob bounding cube.
    pub n0: usize,
    /// Apply stellar occultation.
    pub occult: bool,
}

/// Annular disk discretization and physical parameters (cgs lengths, radians).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiskParams {
    pub rdi: f64,
    pub rdf: f64,
    pub height: f64,
    /// Tilt of the disk plane relative to the rotation axis.
    pub alpha: f64,
    /// Disk electron density (cm^-3).
    pub ned: f64,
    pub dh: usize,
    pub ddr: usize,
    pub dphi: usize,
}

/// Observer-side parameters (radians for angles, percent or fraction for Stokes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservationParams {
    pub qis: f64,
    pub uis: f64,
    /// Blob electron density (cm^-3).
    pub ne: f64,
    /// Rotational phase offset (radians).
    pub phi0: f64,
    /// Position-angle rotation on the sky (radians).
    pub ths: f64,
    /// Inclination of the rotation axis (radians).
    pub iang: f64,
    /// Scale applied to the polarized signal.
    pub fact: f64,
}

impl ObservationParams {
    /// The intrinsic frame: no interstellar offset, no phase shift, no rotation.
    pub fn intrinsic(self) -> Self {
        Self {
            qis: 0.0,
            uis: 0.0,
            phi0: 0.0,
            ths: 0.0,
            fact: 1.0,
            ..self
        }
    }
}

/// A full immutable parameter snapshot for one model evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SystemSnapshot {
    pub star: StarGeometry,
    pub disk: DiskParams,
    pub obs: ObservationParams,
}

/// Stokes parameters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stokes {
    pub i: f64,
    pub p: f64,
    pub q: f64,
    pub u: f64,
}

impl Add for Stokes {
    type Output = Stokes;

    fn add(self, rhs: Stokes) -> Stokes {
        Stokes {
            i: self.i + rhs.i,
            p: self.p + rhs.p,
            q: self.q + rhs.q,
            u: self.u + rhs.u,
        }
    }
}

impl AddAssign for Stokes {
    fn add_assign(&mut self, rhs: Stokes) {
        *self = *self + rhs;
    }
}

/// Stokes parameters over a sequence of rotational phases.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StokesSeries {
    pub i: Vec<f64>,
    pub p: Vec<f64>,
    pub q: Vec<f64>,
    pub u: Vec<f64>,
}

impl StokesSeries {
    pub fn from_samples(samples: &[Stokes]) -> Self {
        Self {
            i: samples.iter().map(|s| s.i).collect(),
            p: samples.iter().map(|s| s.p).collect(),
            q: samples.iter().map(|s| s.q).collect(),
            u: samples.iter().map(|s| s.u).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.q.len()
    }

    pub fn is_empty(&self) -> bool {
        self.q.is_empty()
    }

    /// Multiply Q/U/P by `factor` (e.g. 100 to express polarization in percent).
    pub fn scaled_polarization(mut self, factor: f64) -> Self {
        for v in self.p.iter_mut().chain(self.q.iter_mut()).chain(self.u.iter_mut()) {
            *v *= factor;
        }
        self
    }
}

/// Phase-folded polarimetric observations of one target.
#[derive(Debug, Clone, Default)]
pub struct PolObservations {
    pub target: String,
    pub period: f64,
    /// Reference epoch (MJD).
    pub epoch_mjd: f64,
    pub mjd: Vec<f64>,
    /// Rotational phase in `[0, 1)`.
    pub phase: Vec<f64>,
    pub p: Vec<f64>,
    pub q: Vec<f64>,
    pub u: Vec<f64>,
    pub sig_p: Vec<f64>,
    pub sig_th: Vec<f64>,
}

impl PolObservations {
    pub fn len(&self) -> usize {
        self.phase.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phase.is_empty()
    }
}

/// Parameters of the log-probability objective, in table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitParam {
    Inclination,
    ElectronDensity,
    PhaseOffset,
    PositionAngle,
    Qis,
    Uis,
    DiskTilt,
    DiskDensity,
}

impl FitParam {
    pub const ALL: [FitParam; 8] = [
        FitParam::Inclination,
        FitParam::ElectronDensity,
        FitParam::PhaseOffset,
        FitParam::PositionAngle,
        FitParam::Qis,
        FitParam::Uis,
        FitParam::DiskTilt,
        FitParam::DiskDensity,
    ];

    pub fn label(self) -> &'static str {
        match self {
            FitParam::Inclination => "iang",
            FitParam::ElectronDensity => "ne",
            FitParam::PhaseOffset => "phi0",
            FitParam::PositionAngle => "ths",
            FitParam::Qis => "Qis",
            FitParam::Uis => "Uis",
            FitParam::DiskTilt => "alpha",
            FitParam::DiskDensity => "ned",
        }
    }

    pub fn get(self, snap: &SystemSnapshot) -> f64 {
        match self {
            FitParam::Inclination => snap.obs.iang,
            FitParam::ElectronDensity => snap.obs.ne,
            FitParam::PhaseOffset => snap.obs.phi0,
            FitParam::PositionAngle => snap.obs.ths,
            FitParam::Qis => snap.obs.qis,
            FitParam::Uis => snap.obs.uis,
            FitParam::DiskTilt => snap.disk.alpha,
            FitParam::DiskDensity => snap.disk.ned,
        }
    }

    /// Return a copy of `snap` with this parameter replaced.
    pub fn with(self, snap: SystemSnapshot, value: f64) -> SystemSnapshot {
        let mut out = snap;
        match self {
            FitParam::Inclination => out.obs.iang = value,
            FitParam::ElectronDensity => out.obs.ne = value,
            FitParam::PhaseOffset => out.obs.phi0 = value,
            FitParam::PositionAngle => out.obs.ths = value,
            FitParam::Qis => out.obs.qis = value,
            FitParam::Uis => out.obs.uis = value,
            FitParam::DiskTilt => out.disk.alpha = value,
            FitParam::DiskDensity => out.disk.ned = value,
        }
        out
    }
}

/// Prior box and fixed flag for one fit parameter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParamBound {
    pub param: FitParam,
    pub lower: f64,
    pub value: f64,
    pub upper: f64,
    pub fixed: bool,
}

impl ParamBound {
    pub fn contains(&self, v: f64) -> bool {
        v >= self.lower && v <= self.upper
    }
}

/// User-facing target configuration.
///
/// Lengths are in stellar radii (the star radius itself in solar radii) and
/// angles in degrees, as they are usually quoted. `snapshot()` converts to
/// the cgs/radian snapshot the model works with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetSetup {
    pub target: String,
    /// Stellar radius (R_sun).
    pub rs: f64,
    /// Blob diameter (stellar radii).
    pub diamb: f64,
    /// Blob distance (stellar radii).
    pub distb: f64,
    pub n0: usize,
    pub ne: f64,
    /// Inclination (degrees).
    pub iang: f64,
    /// Phase offset (radians).
    pub dlt0: f64,
    /// Position angle (degrees).
    pub ths: f64,
    pub qis: f64,
    pub uis: f64,
    /// Disk inner radius (stellar radii); `None` means `distb - diamb/2`.
    pub rdi: Option<f64>,
    /// Disk outer radius (stellar radii); `None` means `distb + diamb/2`.
    pub rdf: Option<f64>,
    /// Disk height (stellar radii).
    pub hd: f64,
    /// Disk tilt (degrees); applied with a negative sign.
    pub alpha: f64,
    pub dh: usize,
    pub ddr: usize,
    pub dphi: usize,
    pub ned: f64,
    pub occult: bool,
}

impl Default for TargetSetup {
    fn default() -> Self {
        Self {
            target: "sori".to_string(),
            rs: 4.28,
            diamb: 2.0 / 3.0,
            distb: 2.4,
            n0: 5,
            ne: 1e12,
            iang: 75.0,
            dlt0: -0.17,
            ths: 150.3,
            qis: -0.350,
            uis: 0.025,
            rdi: None,
            rdf: None,
            hd: 0.01,
            alpha: 28.0,
            dh: 1,
            ddr: 3,
            dphi: 180,
            ned: 2.7e12,
            occult: true,
        }
    }
}

impl TargetSetup {
    pub fn snapshot(&self) -> SystemSnapshot {
        let rs = self.rs * R_SUN;
        let diamb = self.diamb * rs;
        let distb = self.distb * rs;
        let rdi = self.rdi.map(|v| v * rs).unwrap_or(distb - diamb / 2.0);
        let rdf = self.rdf.map(|v| v * rs).unwrap_or(distb + diamb / 2.0);

        SystemSnapshot {
            star: StarGeometry {
                rs,
                diamb,
                distb,
                n0: self.n0,
                occult: self.occult,
            },
            disk: DiskParams {
                rdi,
                rdf,
                height: self.hd * rs,
                alpha: -self.alpha.to_radians(),
                ned: self.ned,
                dh: self.dh,
                ddr: self.ddr,
                dphi: self.dphi,
            },
            obs: ObservationParams {
                qis: self.qis,
                uis: self.uis,
                ne: self.ne,
                phi0: self.dlt0,
                ths: self.ths.to_radians(),
                iang: self.iang.to_radians(),
                fact: 1.0,
            },
        }
    }

    /// Phase offset in phase units (`dlt0 / 2π`).
    pub fn phase_offset(&self) -> f64 {
        self.dlt0 / std::f64::consts::TAU
    }
}

/// Exported model curve (JSON).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelCurveFile {
    pub tool: String,
    pub generated: DateTime<Utc>,
    pub target: String,
    pub setup: TargetSetup,
    /// Phase grid in `[0, 1)`, shifted by the phase offset.
    pub phase: Vec<f64>,
    /// Intrinsic model (percent).
    pub intrinsic: StokesSeries,
    /// Observed-frame Q (percent).
    pub q_obs: Vec<f64>,
    /// Observed-frame U (percent).
    pub u_obs: Vec<f64>,
    /// Observed-frame position angle (degrees).
    pub angle_obs_deg: Vec<f64>,
}
