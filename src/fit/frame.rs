//! Intrinsic ↔ observed polarization frames.
//!
//! Observed Stokes Q/U are the intrinsic ones rotated on the sky by the
//! position angle `θs` plus a constant interstellar term `(Qis, Uis)`.

use std::f64::consts::PI;

use crate::domain::ObservationParams;
use crate::domain::constants::Q_EPSILON;

/// Polarization angle of `(q, u)` folded into `[0, π)`.
///
/// `q == 0` is treated as `1e-34`.
pub fn qu_angle(q: f64, u: f64) -> f64 {
    let q = if q == 0.0 { Q_EPSILON } else { q };
    let mut ang = (u / q).atan();
    if q <= 0.0 {
        ang += PI;
    } else if u < 0.0 {
        ang += 2.0 * PI;
    }
    ang /= 2.0;
    if ang >= PI {
        ang -= PI;
    }
    ang
}

pub fn qu_angles(q: &[f64], u: &[f64]) -> Vec<f64> {
    q.iter().zip(u).map(|(&q, &u)| qu_angle(q, u)).collect()
}

/// Rotate `(q, u)` by `rot` on the sky, keeping the polarized fraction.
pub fn rotate_qu(q: f64, u: f64, rot: f64) -> (f64, f64) {
    let p = q.hypot(u);
    let twice = 2.0 * (qu_angle(q, u) + rot);
    (p * twice.cos(), p * twice.sin())
}

/// Intrinsic model → observed frame: rotate by `θs`, add `(Qis, Uis)`.
pub fn mod2obs(q: &[f64], u: &[f64], obs: &ObservationParams) -> (Vec<f64>, Vec<f64>) {
    q.iter()
        .zip(u)
        .map(|(&q, &u)| {
            let (qr, ur) = rotate_qu(q, u, obs.ths);
            (qr + obs.qis, ur + obs.uis)
        })
        .unzip()
}

/// Observed → intrinsic frame: remove `(Qis, Uis)`, rotate by `-θs`.
pub fn obs2mod(q: &[f64], u: &[f64], obs: &ObservationParams) -> (Vec<f64>, Vec<f64>) {
    q.iter()
        .zip(u)
        .map(|(&q, &u)| rotate_qu(q - obs.qis, u - obs.uis, -obs.ths))
        .unzip()
}

/// Observations with the interstellar term removed.
#[derive(Debug, Clone, Default)]
pub struct IsRemoved {
    pub p: Vec<f64>,
    pub q: Vec<f64>,
    pub u: Vec<f64>,
    pub angle: Vec<f64>,
}

pub fn remove_is(q: &[f64], u: &[f64], qis: f64, uis: f64) -> IsRemoved {
    let q1: Vec<f64> = q.iter().map(|v| v - qis).collect();
    let u1: Vec<f64> = u.iter().map(|v| v - uis).collect();
    IsRemoved {
        p: q1.iter().zip(&u1).map(|(q, u)| q.hypot(*u)).collect(),
        angle: qu_angles(&q1, &u1),
        q: q1,
        u: u1,
    }
}

/// Q/U of `p` at angles `angle - ths` (the intrinsic frame for position
/// angle `ths`).
pub fn rotate_by_position_angle(p: &[f64], angle: &[f64], ths: f64) -> (Vec<f64>, Vec<f64>) {
    p.iter()
        .zip(angle)
        .map(|(&p, &a)| {
            let twice = 2.0 * (a - ths);
            (p * twice.cos(), p * twice.sin())
        })
        .unzip()
}
