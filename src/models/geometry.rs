//! Voxel lattices for the blob and the tilted disk.
//!
//! Both lattices are returned in spherical coordinates centred on the star,
//! at rotational phase zero. The blob lattice is centred on the +x axis at the
//! blob distance; callers place the two blobs by shifting the azimuth.

use std::f64::consts::TAU;

use nalgebra::Vector3;

use crate::domain::{DiskParams, StarGeometry};
use crate::math::{Spherical, axis_rotation, cart2sph};

/// Blob voxels: centres of the `n0³` sub-cubes of the blob's bounding cube
/// that lie inside the blob sphere.
#[derive(Debug, Clone, PartialEq)]
pub struct BlobVoxels {
    pub points: Vec<Spherical>,
}

impl BlobVoxels {
    /// Number of voxels retained (`n3`).
    pub fn n3(&self) -> usize {
        self.points.len()
    }
}

/// Build the blob lattice.
///
/// The bounding cube has side `diamb` and is split into `n0` cells per axis;
/// cell centres within `diamb / 2` of the blob centre are kept. For `n0 >= 2`
/// at least the eight cells around the centre survive, and for `n0 >= 3` the
/// cube corners are always cut.
pub fn geogen(star: &StarGeometry) -> BlobVoxels {
    let n0 = star.n0;
    let dr = star.diamb / n0 as f64;
    let radius = star.diamb / 2.0;
    let offsets: Vec<f64> = (0..n0)
        .map(|k| (k as f64 + 0.5 - n0 as f64 / 2.0) * dr)
        .collect();

    let mut points = Vec::new();
    for &dx in &offsets {
        for &dy in &offsets {
            for &dz in &offsets {
                if (dx * dx + dy * dy + dz * dz).sqrt() <= radius {
                    points.push(cart2sph(&Vector3::new(star.distb + dx, dy, dz)));
                }
            }
        }
    }
    BlobVoxels { points }
}

/// Build the disk lattice: `ddr` radii × `dh` heights × `dphi` azimuths, then
/// tilt the disk plane by `alpha` about the y axis.
///
/// Radii sit at the centres of `ddr` equal steps between `rdi` and `rdf`;
/// heights at the centres of `dh` equal steps across `height` (a single layer
/// lies in the midplane); azimuths at `k · 2π/dphi`.
pub fn diskcoords(disk: &DiskParams) -> Vec<Spherical> {
    let dr = (disk.rdf - disk.rdi) / disk.ddr as f64;
    let tilt = axis_rotation(0.0, 0.0, disk.alpha);

    let mut points = Vec::with_capacity(disk.ddr * disk.dh * disk.dphi);
    for i in 0..disk.ddr {
        let r = disk.rdi + dr * (i as f64 + 0.5);
        for j in 0..disk.dh {
            let z = disk.height * ((j as f64 + 0.5) / disk.dh as f64 - 0.5);
            for k in 0..disk.dphi {
                let phi = TAU * k as f64 / disk.dphi as f64;
                let (s, c) = phi.sin_cos();
                let v = tilt * Vector3::new(r * c, r * s, z);
                points.push(cart2sph(&v));
            }
        }
    }
    points
}

/// Keep-mask for disk voxels: `false` for voxels inside either blob.
///
/// At phase zero the blobs sit on the y axis at `±distb`.
pub fn outside_blobs_mask(disk: &[Spherical], star: &StarGeometry) -> Vec<bool> {
    let radius = star.diamb / 2.0;
    let centres = [
        Vector3::new(0.0, star.distb, 0.0),
        Vector3::new(0.0, -star.distb, 0.0),
    ];
    disk.iter()
        .map(|p| {
            let v = p.to_cartesian();
            centres.iter().all(|c| (v - c).norm() >= radius)
        })
        .collect()
}

/// Disk voxels that do not overlap the blobs.
pub fn disk_outside_blobs(disk: &[Spherical], star: &StarGeometry) -> Vec<Spherical> {
    disk.iter()
        .zip(outside_blobs_mask(disk, star))
        .filter_map(|(p, keep)| keep.then_some(*p))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetSetup;
    use crate::domain::constants::R_SUN;

    fn star(n0: usize) -> StarGeometry {
        let rs = 4.28 * R_SUN;
        StarGeometry {
            rs,
            diamb: 2.0 / 3.0 * rs,
            distb: 2.4 * rs,
            n0,
            occult: true,
        }
    }

    #[test]
    fn worked_example_keeps_some_but_not_all_cells() {
        let n3 = geogen(&star(5)).n3();
        assert!(n3 > 0);
        assert!(n3 < 125);
    }

    #[test]
    fn every_resolution_from_two_has_voxels() {
        for n0 in 2..=12 {
            let blob = geogen(&star(n0));
            assert!(blob.n3() > 0, "n0 = {n0}");
            assert!(blob.n3() <= n0 * n0 * n0);
        }
        assert_eq!(geogen(&star(2)).n3(), 8);
    }

    #[test]
    fn blob_voxels_lie_inside_blob() {
        let s = star(6);
        let centre = Vector3::new(s.distb, 0.0, 0.0);
        for p in geogen(&s).points {
            assert!((p.to_cartesian() - centre).norm() <= s.diamb / 2.0 + 1.0);
        }
    }

    #[test]
    fn disk_lattice_size_and_radii() {
        let snap = TargetSetup::default().snapshot();
        let disk = diskcoords(&snap.disk);
        assert_eq!(disk.len(), 3 * 180);
        for p in &disk {
            assert!(p.r >= snap.disk.rdi - 1.0 && p.r <= snap.disk.rdf + 1.0);
        }
    }

    #[test]
    fn untilted_single_layer_lies_in_midplane() {
        let mut snap = TargetSetup::default().snapshot();
        snap.disk.alpha = 0.0;
        for p in diskcoords(&snap.disk) {
            assert!((p.th - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
        }
    }

    #[test]
    fn blob_mask_removes_overlapping_disk_cells() {
        let snap = TargetSetup::default().snapshot();
        let disk = diskcoords(&snap.disk);
        let kept = disk_outside_blobs(&disk, &snap.star);
        assert!(kept.len() < disk.len());
        assert!(!kept.is_empty());
    }
}
