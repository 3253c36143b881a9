use crate::model::love::LoveNumbers;
use crate::prelude::GravityError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Average density of the Earth [g/cm^3]
pub const RHO_E: f64 = 5.517;
/// Average radius of the Earth [cm]
pub const RAD_E: f64 = 6.371e8;
/// Geocentric gravitational constant [cm^3/s^2]
pub const GM: f64 = 3.986004418e20;
/// Standard gravitational acceleration [cm/s^2]
pub const G_WMO: f64 = 980.665;

/// Output units for converted harmonics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    /// Fully normalized geoid coefficients
    Norm,
    /// Centimeters of water equivalent thickness
    Cmwe,
    /// Millimeters of water equivalent thickness
    Mmwe,
    /// Millimeters of geoid height
    MmGeoid,
    /// Millimeters of elastic crustal uplift
    MmUplift,
    /// Microgal gravitational perturbation
    MicroGal,
    /// Millibars of equivalent surface pressure
    Mbar,
}

impl Unit {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Norm => "norm",
            Self::Cmwe => "cmwe",
            Self::Mmwe => "mmwe",
            Self::MmGeoid => "mmGH",
            Self::MmUplift => "mmCU",
            Self::MicroGal => "microGal",
            Self::Mbar => "mbar",
        }
    }
}

impl FromStr for Unit {
    type Err = GravityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unit = match s.trim() {
            "norm" => Self::Norm,
            "cmwe" | "cmWE" => Self::Cmwe,
            "mmwe" | "mmWE" => Self::Mmwe,
            "mmGH" => Self::MmGeoid,
            "mmCU" => Self::MmUplift,
            "microGal" => Self::MicroGal,
            "mbar" => Self::Mbar,
            other => {
                return Err(GravityError::InvalidInput(format!("unknown unit {}", other)))
            }
        };
        Ok(unit)
    }
}

/// Degree-dependent factors converting geoid coefficients to physical units.
#[derive(Debug, Clone, PartialEq)]
pub struct HarmonicUnits {
    pub norm: Vec<f64>,
    pub cmwe: Vec<f64>,
    pub mmwe: Vec<f64>,
    pub mm_geoid: Vec<f64>,
    pub mm_uplift: Vec<f64>,
    pub micro_gal: Vec<f64>,
    pub mbar: Vec<f64>,
}

impl HarmonicUnits {
    pub fn new(love: &LoveNumbers) -> Self {
        let degrees = love.kl.len();
        let mut units = Self {
            norm: vec![1.0; degrees],
            cmwe: vec![0.0; degrees],
            mmwe: vec![0.0; degrees],
            mm_geoid: vec![10.0 * RAD_E; degrees],
            mm_uplift: vec![0.0; degrees],
            micro_gal: vec![0.0; degrees],
            mbar: vec![0.0; degrees],
        };
        for l in 0..degrees {
            let fl = l as f64;
            let one_plus_k = 1.0 + love.kl[l];
            // no mass equivalent for a vanishing 1+kl (degree one in CM)
            if one_plus_k.abs() > f64::EPSILON {
                units.cmwe[l] = RHO_E * RAD_E * (2.0 * fl + 1.0) / (3.0 * one_plus_k);
                units.mm_uplift[l] = 10.0 * RAD_E * love.hl[l] / one_plus_k;
            }
            units.mmwe[l] = 10.0 * units.cmwe[l];
            units.mbar[l] = G_WMO * units.cmwe[l] / 1000.0;
            units.micro_gal[l] = 1.0e6 * GM * (fl + 1.0) / RAD_E.powi(2);
        }
        units
    }

    pub fn factors(&self, unit: Unit) -> &[f64] {
        match unit {
            Unit::Norm => &self.norm,
            Unit::Cmwe => &self.cmwe,
            Unit::Mmwe => &self.mmwe,
            Unit::MmGeoid => &self.mm_geoid,
            Unit::MmUplift => &self.mm_uplift,
            Unit::MicroGal => &self.micro_gal,
            Unit::Mbar => &self.mbar,
        }
    }
}
