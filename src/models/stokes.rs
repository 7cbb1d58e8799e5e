//! Single Thomson-scattering Stokes integrals over voxel lattices.
//!
//! Each voxel scatters stellar light with intensity `P0 (1 + cos²χ)`, where
//! `P0` carries the optical depth of the voxel, the dilution of the stellar
//! disk (finite-star depolarization factor included) and the voxel's solid
//! angle. Q and U follow from the voxel position projected on the sky after
//! tilting the rotation axis by the inclination.
//!
//! Occultation (when enabled) applies to voxels whose sky projection falls on
//! the stellar disk:
//!
//! - `z < 0`: the voxel is hidden behind the star and contributes nothing
//! - `z > 0`: the voxel transits the star and removes the starlight it
//!   scatters out of the line of sight from the intensity

use std::f64::consts::PI;

use nalgebra::Vector3;

use crate::domain::constants::SIGMA_T;
use crate::domain::{DiskParams, ObservationParams, StarGeometry, Stokes};
use crate::math::{Spherical, axis_rotation};

/// Unpolarized stellar intensity added to every blob integral.
const STELLAR_INTENSITY: f64 = 0.5;

/// Stokes sum of the blob voxels rotated by `phi_shift` in azimuth.
///
/// Returns `I = 0.5 + ΣIᵢ` and `fact`-scaled P/Q/U sums.
pub fn stokes_blob(
    voxels: &[Spherical],
    phi_shift: f64,
    star: &StarGeometry,
    obs: &ObservationParams,
) -> Stokes {
    let n3 = voxels.len();
    if n3 == 0 {
        return Stokes {
            i: STELLAR_INTENSITY,
            ..Stokes::default()
        };
    }
    let rl = (4.0 * PI / 3.0 / n3 as f64).cbrt() * star.diamb / 2.0;
    let area = rl * rl;
    let mut sum = integrate(voxels, phi_shift, star, obs, |_| area, obs.ne * SIGMA_T * rl);
    sum.i += STELLAR_INTENSITY;
    sum
}

/// Stokes sum of the disk voxels rotated by `phi_shift` in azimuth.
pub fn stokes_disk(
    voxels: &[Spherical],
    phi_shift: f64,
    star: &StarGeometry,
    disk: &DiskParams,
    obs: &ObservationParams,
) -> Stokes {
    let rl = (disk.rdf - disk.rdi) / disk.ddr as f64;
    let tau = disk.ned * SIGMA_T * rl;
    let arc = 2.0 * PI / disk.dphi as f64;
    let layer = disk.height / disk.dh as f64;
    integrate(voxels, phi_shift, star, obs, |r| arc * r * layer, tau)
}

fn integrate(
    voxels: &[Spherical],
    phi_shift: f64,
    star: &StarGeometry,
    obs: &ObservationParams,
    area: impl Fn(f64) -> f64,
    tau: f64,
) -> Stokes {
    let tilt = axis_rotation(0.0, obs.iang, 0.0);
    let (sin_i, cos_i) = obs.iang.sin_cos();
    let transit_loss = (-tau).exp();
    let rs2 = star.rs * star.rs;

    let mut sum = Stokes::default();
    for voxel in voxels {
        let r = voxel.r;
        let phi = voxel.phi + phi_shift;
        let (sin_th, cos_th) = voxel.th.sin_cos();
        let (sin_phi, cos_phi) = phi.sin_cos();
        let v: Vector3<f64> = tilt * Vector3::new(r * sin_th * cos_phi, r * sin_th * sin_phi, r * cos_th);

        let dilution = (star.rs / r).powi(2);
        let solid = area(r) / (r * r);
        let p0 = 3.0 / 8.0 * tau * 0.5 * dilution * (1.0 - dilution).max(0.0).sqrt() * solid;
        let cos_chi = sin_i * sin_th * cos_phi + cos_i * cos_th;

        let mut s = Stokes {
            i: p0 * (1.0 + cos_chi * cos_chi),
            p: 0.0,
            q: p0 * ((v.x / r).powi(2) - (v.y / r).powi(2)),
            u: p0 * (2.0 * v.x * v.y / (r * r)),
        };
        s.p = s.q.hypot(s.u);

        if star.occult && v.x * v.x + v.y * v.y < rs2 {
            if v.z < 0.0 {
                continue;
            }
            if v.z > 0.0 {
                s.i -= dilution * transit_loss * solid / (4.0 * PI);
            }
        }
        sum += s;
    }

    Stokes {
        i: sum.i,
        p: obs.fact * sum.p,
        q: obs.fact * sum.q,
        u: obs.fact * sum.u,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::TargetSetup;
    use crate::math::cart2sph;

    fn setup(occult: bool) -> (StarGeometry, ObservationParams) {
        let snap = TargetSetup::default().snapshot();
        let mut star = snap.star;
        star.occult = occult;
        let mut obs = snap.obs.intrinsic();
        obs.iang = 0.0;
        (star, obs)
    }

    fn voxel_at(star: &StarGeometry, x: f64, y: f64, z: f64) -> Vec<Spherical> {
        vec![cart2sph(&Vector3::new(x * star.rs, y * star.rs, z * star.rs))]
    }

    #[test]
    fn hidden_voxel_loses_all_signal() {
        let (star, obs) = setup(true);
        let vox = voxel_at(&star, 0.5, 0.3, -2.0);
        let s = stokes_blob(&vox, 0.0, &star, &obs);
        assert_eq!(s.p, 0.0);
        assert_eq!(s.q, 0.0);
        assert_eq!(s.u, 0.0);
        assert_eq!(s.i, STELLAR_INTENSITY);

        let (free, _) = setup(false);
        let visible = stokes_blob(&vox, 0.0, &free, &obs);
        assert!(visible.p > 0.0);
    }

    #[test]
    fn transiting_voxel_has_reduced_intensity() {
        let (star, obs) = setup(true);
        let (free, _) = setup(false);
        let vox = voxel_at(&star, 0.5, 0.3, 2.0);
        let occulted = stokes_blob(&vox, 0.0, &star, &obs);
        let clear = stokes_blob(&vox, 0.0, &free, &obs);
        assert!(occulted.i < clear.i);
        assert!(occulted.i - STELLAR_INTENSITY != 0.0);
        assert_eq!(occulted.q, clear.q);
        assert_eq!(occulted.p, clear.p);
    }

    #[test]
    fn voxel_off_the_stellar_disk_is_unaffected() {
        let (star, obs) = setup(true);
        let (free, _) = setup(false);
        let vox = voxel_at(&star, 2.0, 0.3, -1.0);
        assert_eq!(
            stokes_blob(&vox, 0.0, &star, &obs),
            stokes_blob(&vox, 0.0, &free, &obs)
        );
    }

    #[test]
    fn quarter_turn_flips_q_sign() {
        let (_, obs) = setup(false);
        let (star, _) = setup(false);
        let vox = voxel_at(&star, 2.0, 0.0, 0.0);
        let a = stokes_blob(&vox, 0.0, &star, &obs);
        let b = stokes_blob(&vox, std::f64::consts::FRAC_PI_2, &star, &obs);
        assert!(a.q > 0.0);
        assert!((a.q + b.q).abs() < 1e-12 * a.q.abs());
        assert!((a.p - b.p).abs() < 1e-12 * a.p.abs());
    }

    #[test]
    fn voxel_inside_star_contributes_no_polarization() {
        let (star, obs) = setup(false);
        let vox = voxel_at(&star, 0.5, 0.0, 0.0);
        let s = stokes_blob(&vox, 0.0, &star, &obs);
        assert_eq!(s.q, 0.0);
        assert!(s.i.is_finite());
    }

    #[test]
    fn fact_scales_polarization_only() {
        let (star, mut obs) = setup(false);
        let vox = voxel_at(&star, 2.0, 1.0, 0.5);
        let one = stokes_blob(&vox, 0.0, &star, &obs);
        obs.fact = 3.0;
        let three = stokes_blob(&vox, 0.0, &star, &obs);
        assert_eq!(one.i, three.i);
        assert!((three.q - 3.0 * one.q).abs() < 1e-15);
    }

    #[test]
    fn disk_integral_has_no_stellar_term() {
        let snap = TargetSetup::default().snapshot();
        let s = stokes_disk(&[], 0.0, &snap.star, &snap.disk, &snap.obs);
        assert_eq!(s, Stokes::default());
    }
}
