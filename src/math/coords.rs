//! Spherical/Cartesian conversions and fixed-axis rotations.
//!
//! Angles follow the physics convention: `th` is the polar angle measured from
//! +z, `phi` the azimuth measured from +x towards +y.

use nalgebra::{Rotation3, Vector3};

/// Radius substituted for the origin so polar angles stay finite.
const ORIGIN_RADIUS: f64 = 1e-9;

/// A point in spherical coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spherical {
    pub r: f64,
    pub th: f64,
    pub phi: f64,
}

impl Spherical {
    pub fn new(r: f64, th: f64, phi: f64) -> Self {
        Self { r, th, phi }
    }

    pub fn to_cartesian(self) -> Vector3<f64> {
        sph2cart(self.r, self.th, self.phi)
    }
}

pub fn sph2cart(r: f64, th: f64, phi: f64) -> Vector3<f64> {
    let (sin_th, cos_th) = th.sin_cos();
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vector3::new(r * sin_th * cos_phi, r * sin_th * sin_phi, r * cos_th)
}

/// Cartesian to spherical. The origin maps to `r = 1e-9`, `th = π/2`.
pub fn cart2sph(v: &Vector3<f64>) -> Spherical {
    let mut r = v.norm();
    if r == 0.0 {
        r = ORIGIN_RADIUS;
    }
    let th = (v.z / r).clamp(-1.0, 1.0).acos();
    let phi = v.y.atan2(v.x);
    Spherical { r, th, phi }
}

/// Rotation `Rz(ang_xy) · Ry(ang_zx) · Rx(ang_yz)`.
///
/// `ang_xy` turns within the xy plane (about z), `ang_yz` within the yz plane
/// (about x) and `ang_zx` within the zx plane (about y).
pub fn axis_rotation(ang_xy: f64, ang_yz: f64, ang_zx: f64) -> Rotation3<f64> {
    Rotation3::from_euler_angles(ang_yz, ang_zx, ang_xy)
}

/// Apply [`axis_rotation`] to a single vector.
pub fn cart_rot(v: &Vector3<f64>, ang_xy: f64, ang_yz: f64, ang_zx: f64) -> Vector3<f64> {
    axis_rotation(ang_xy, ang_yz, ang_zx) * v
}
