//! BeAtlas model file names.
//!
//! Model parameters are encoded in the file name as fixed-width fields that
//! follow a tag, e.g.
//!
//! ```text
//! fullsed_mod01_PLn3.5_sig0.50_h072_Rd050.0_Be_M04.20_ob1.40_H0.30_Z0.014_bE_Ell.sed2
//! ```
//!
//! Field order in the name does not matter; each field is located by its tag.
//! A `_PL` tag marks a parametric-disk model (one extra quantity, `n`).

use crate::domain::{GridKind, Quantity};
use crate::error::AppError;

/// Tag and width of the name field holding `quantity`.
fn field_tag(quantity: Quantity) -> Option<(&'static str, usize)> {
    match quantity {
        Quantity::Mass => Some(("_M", 5)),
        Quantity::Rotation => Some(("_ob", 4)),
        Quantity::Metallicity => Some(("_Z", 5)),
        Quantity::Hydrogen => Some(("_H", 4)),
        Quantity::Sigma0 => Some(("_sig", 4)),
        Quantity::ScaleHeight => Some(("_h", 3)),
        Quantity::DiskRadius => Some(("_Rd", 5)),
        Quantity::PowerLaw => Some(("_PLn", 3)),
        Quantity::CosInclination => None,
    }
}

/// Parameters parsed from one model file name.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelName {
    pub kind: GridKind,
    pub mass: f64,
    pub rotation: f64,
    pub metallicity: f64,
    pub hydrogen: f64,
    pub sigma0: f64,
    pub disk_radius: f64,
    pub scale_height: f64,
    pub power_law: Option<f64>,
}

impl ModelName {
    /// Parse the parameters from a file name (a full path is accepted).
    pub fn parse(name: &str) -> Result<Self, AppError> {
        let base = name.rsplit('/').next().unwrap_or(name);
        let parametric = base.contains("_PL");
        let field = |quantity: Quantity| -> Result<f64, AppError> {
            let (tag, width) = field_tag(quantity)
                .ok_or_else(|| AppError::data(format!("No name field for {quantity}.")))?;
            read_field(base, tag, width)
        };

        Ok(Self {
            kind: if parametric {
                GridKind::Parametric
            } else {
                GridKind::Vdd
            },
            mass: field(Quantity::Mass)?,
            rotation: field(Quantity::Rotation)?,
            metallicity: field(Quantity::Metallicity)?,
            hydrogen: field(Quantity::Hydrogen)?,
            sigma0: field(Quantity::Sigma0)?,
            disk_radius: field(Quantity::DiskRadius)?,
            scale_height: field(Quantity::ScaleHeight)?,
            power_law: if parametric {
                Some(field(Quantity::PowerLaw)?)
            } else {
                None
            },
        })
    }

    /// Value of `quantity`; `None` for the inclination (not part of the name)
    /// and for `n` on VDD models.
    pub fn value(&self, quantity: Quantity) -> Option<f64> {
        match quantity {
            Quantity::Mass => Some(self.mass),
            Quantity::Rotation => Some(self.rotation),
            Quantity::Metallicity => Some(self.metallicity),
            Quantity::Hydrogen => Some(self.hydrogen),
            Quantity::Sigma0 => Some(self.sigma0),
            Quantity::DiskRadius => Some(self.disk_radius),
            Quantity::ScaleHeight => Some(self.scale_height),
            Quantity::PowerLaw => self.power_law,
            Quantity::CosInclination => None,
        }
    }

    /// Identity vector for one observer, in on-disk quantity order.
    pub fn identity(&self, cos_i: f64) -> Vec<f64> {
        self.kind
            .quantities()
            .iter()
            .map(|&q| self.value(q).unwrap_or(cos_i))
            .collect()
    }
}

/// Model number (`NN` in `fullsed_modNN`), if the name carries one.
pub fn model_number(name: &str) -> Option<&str> {
    let start = name.find("fullsed_mod")? + "fullsed_mod".len();
    name.get(start..start + 2)
}

fn read_field(name: &str, tag: &str, width: usize) -> Result<f64, AppError> {
    let start = find_tag(name, tag)
        .ok_or_else(|| AppError::data(format!("Model name '{name}' has no '{tag}' field.")))?
        + tag.len();
    let raw = name
        .get(start..(start + width).min(name.len()))
        .unwrap_or_default();
    raw.parse::<f64>().map_err(|_| {
        AppError::data(format!(
            "Model name '{name}': field '{tag}' has non-numeric value '{raw}'."
        ))
    })
}

/// First occurrence of `tag` followed by a digit, so `_M` skips `_Mod...`.
fn find_tag(name: &str, tag: &str) -> Option<usize> {
    name.match_indices(tag)
        .map(|(i, _)| i)
        .find(|&i| {
            name[i + tag.len()..]
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_digit())
        })
}
