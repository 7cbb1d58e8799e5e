//! Stokes curves over a rotation cycle.
//!
//! Two antipodal blobs sit at azimuth offsets `±π/2` from the blob lattice;
//! the disk shares the star's rotation. A phase `φ` (radians) maps to the
//! azimuth shift `φ - phi0` for the disk and `±π/2 + φ - phi0` for the blobs.
//!
//! Phases are independent and evaluated in parallel.

use std::f64::consts::FRAC_PI_2;

use rayon::prelude::*;

use crate::domain::constants::Q_EPSILON;
use crate::domain::{Stokes, StokesSeries, SystemSnapshot};
use crate::math::Spherical;
use crate::models::geometry::{disk_outside_blobs, diskcoords, geogen};
use crate::models::stokes::{stokes_blob, stokes_disk};

const BLOB_OFFSETS: [f64; 2] = [FRAC_PI_2, -FRAC_PI_2];

/// Which scatterers contribute to a cycle.
///
/// `BlobsAndDisk` adds the disk once per blob offset (twice per phase), the
/// weighting the σ Ori E `ned` calibration was made with.
/// `BlobsAndSingleDisk` adds it once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Components {
    Blobs,
    Disk,
    BlobsAndDisk,
    BlobsAndSingleDisk,
}

impl Components {
    fn blobs(self) -> bool {
        !matches!(self, Components::Disk)
    }

    /// How many times the disk term enters one phase.
    fn disk_count(self) -> usize {
        match self {
            Components::Blobs => 0,
            Components::Disk | Components::BlobsAndSingleDisk => 1,
            Components::BlobsAndDisk => BLOB_OFFSETS.len(),
        }
    }
}

/// Voxel lattices for one snapshot at phase zero.
#[derive(Debug, Clone)]
pub struct SystemGeometry {
    pub blob: Vec<Spherical>,
    /// Disk voxels outside both blobs.
    pub disk: Vec<Spherical>,
}

impl SystemGeometry {
    pub fn new(snap: &SystemSnapshot) -> Self {
        let blob = geogen(&snap.star).points;
        let disk = disk_outside_blobs(&diskcoords(&snap.disk), &snap.star);
        Self { blob, disk }
    }

    /// Number of blob voxels (`n3`).
    pub fn n3(&self) -> usize {
        self.blob.len()
    }

    /// Stokes parameters at one rotational phase (radians).
    pub fn stokes_at(&self, phase: f64, snap: &SystemSnapshot, components: Components) -> Stokes {
        let shift = phase - snap.obs.phi0;
        let disk = match components.disk_count() {
            0 => Stokes::default(),
            _ => stokes_disk(&self.disk, shift, &snap.star, &snap.disk, &snap.obs),
        };
        let mut total = Stokes::default();
        match components {
            Components::BlobsAndDisk => {
                for offset in BLOB_OFFSETS {
                    total += stokes_blob(&self.blob, offset + shift, &snap.star, &snap.obs);
                    total += disk;
                }
            }
            _ => {
                if components.blobs() {
                    for offset in BLOB_OFFSETS {
                        total += stokes_blob(&self.blob, offset + shift, &snap.star, &snap.obs);
                    }
                }
                for _ in 0..components.disk_count() {
                    total += disk;
                }
            }
        }
        total
    }

    /// Stokes curves over `phases` (radians), with exact-zero Q replaced.
    pub fn cycle(&self, phases: &[f64], snap: &SystemSnapshot, components: Components) -> StokesSeries {
        let samples: Vec<Stokes> = phases
            .par_iter()
            .map(|&ph| self.stokes_at(ph, snap, components))
            .collect();
        let mut series = StokesSeries::from_samples(&samples);
        q0check(&mut series.q);
        series
    }
}

/// Replace exact-zero Q values so angle computations stay defined.
pub fn q0check(q: &mut [f64]) {
    for v in q.iter_mut() {
        if *v == 0.0 {
            *v = Q_EPSILON;
        }
    }
}

/// Blobs only.
pub fn modcycle(phases: &[f64], snap: &SystemSnapshot) -> (StokesSeries, usize) {
    let geom = SystemGeometry::new(snap);
    (geom.cycle(phases, snap, Components::Blobs), geom.n3())
}

/// Blobs plus disk, the disk counted once per blob.
pub fn modcycle_full(phases: &[f64], snap: &SystemSnapshot) -> (StokesSeries, usize) {
    let geom = SystemGeometry::new(snap);
    (geom.cycle(phases, snap, Components::BlobsAndDisk), geom.n3())
}

/// Blobs plus a single disk term.
pub fn modcycle_single_disk(phases: &[f64], snap: &SystemSnapshot) -> (StokesSeries, usize) {
    let geom = SystemGeometry::new(snap);
    (geom.cycle(phases, snap, Components::BlobsAndSingleDisk), geom.n3())
}

/// Disk only.
pub fn modcycle_disk(phases: &[f64], snap: &SystemSnapshot) -> (StokesSeries, usize) {
    let geom = SystemGeometry::new(snap);
    (geom.cycle(phases, snap, Components::Disk), geom.n3())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetSetup;
    use crate::math::linspace;
    use std::f64::consts::{PI, TAU};

    fn phases() -> Vec<f64> {
        let mut p = linspace(0.0, TAU, 25);
        p.pop();
        p
    }

    #[test]
    fn full_cycle_counts_disk_per_blob() {
        let snap = TargetSetup::default().snapshot();
        let ph = phases();
        let (blobs, n3) = modcycle(&ph, &snap);
        let (disk, _) = modcycle_disk(&ph, &snap);
        let (full, n3_full) = modcycle_full(&ph, &snap);
        assert_eq!(n3, n3_full);
        for k in 0..ph.len() {
            let scale = (blobs.u[k].abs() + disk.u[k].abs() + blobs.q[k].abs() + disk.q[k].abs()).max(1e-30);
            assert!((full.u[k] - (blobs.u[k] + 2.0 * disk.u[k])).abs() <= 1e-9 * scale);
            assert!((full.i[k] - (blobs.i[k] + 2.0 * disk.i[k])).abs() <= 1e-12 * full.i[k]);
        }
    }

    #[test]
    fn single_disk_cycle_is_sum_of_parts() {
        let snap = TargetSetup::default().snapshot();
        let ph = phases();
        let (blobs, _) = modcycle(&ph, &snap);
        let (disk, _) = modcycle_disk(&ph, &snap);
        let (single, _) = modcycle_single_disk(&ph, &snap);
        for k in 0..ph.len() {
            let scale = (blobs.u[k].abs() + disk.u[k].abs() + blobs.q[k].abs() + disk.q[k].abs()).max(1e-30);
            assert!((single.u[k] - (blobs.u[k] + disk.u[k])).abs() <= 1e-9 * scale);
            assert!((single.i[k] - (blobs.i[k] + disk.i[k])).abs() <= 1e-12 * single.i[k]);
        }
    }

    #[test]
    fn antipodal_blobs_repeat_every_half_turn() {
        let snap = TargetSetup::default().snapshot();
        let (a, _) = modcycle(&[0.3], &snap);
        let (b, _) = modcycle(&[0.3 + PI], &snap);
        assert!((a.q[0] - b.q[0]).abs() < 1e-9 * a.p[0].max(1e-30));
        assert!((a.i[0] - b.i[0]).abs() < 1e-12);
    }

    #[test]
    fn phase_offset_shifts_curve() {
        let mut snap = TargetSetup::default().snapshot();
        snap.obs.phi0 = 0.4;
        let (shifted, _) = modcycle_full(&[1.0], &snap);
        snap.obs.phi0 = 0.0;
        let (plain, _) = modcycle_full(&[0.6], &snap);
        assert!((shifted.q[0] - plain.q[0]).abs() < 1e-12 * plain.p[0].max(1e-30));
    }

    #[test]
    fn model_produces_finite_polarization() {
        let snap = TargetSetup::default().snapshot();
        let (full, n3) = modcycle_full(&phases(), &snap);
        assert!(n3 > 0);
        assert!(full.p.iter().all(|v| v.is_finite()));
        assert!(full.p.iter().any(|&v| v > 0.0));
        assert!(full.i.iter().all(|&v| v > 0.0));
    }

    #[test]
    fn q0check_replaces_only_exact_zero() {
        let mut q = vec![0.0, 1e-40, -0.0, 2.0];
        q0check(&mut q);
        assert_eq!(q, vec![Q_EPSILON, 1e-40, Q_EPSILON, 2.0]);
    }
}
