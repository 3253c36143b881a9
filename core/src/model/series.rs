use crate::prelude::{GravityError, GravityResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CoefficientKind {
    Cosine,
    Sine,
}

/// Monthly values of a single coefficient, such as SLR C20 or geocenter C11.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoefficientSeries {
    pub degree: usize,
    pub order: usize,
    pub kind: CoefficientKind,
    pub month: Vec<u32>,
    pub values: Vec<f64>,
}

impl CoefficientSeries {
    pub fn validate(&self) -> GravityResult<()> {
        if self.order > self.degree {
            return Err(GravityError::InvalidInput(format!(
                "order {} exceeds degree {}",
                self.order, self.degree
            )));
        }
        if self.kind == CoefficientKind::Sine && self.order == 0 {
            return Err(GravityError::InvalidInput(format!(
                "S{}0 is identically zero",
                self.degree
            )));
        }
        if self.month.len() != self.values.len() {
            return Err(GravityError::ShapeMismatch(format!(
                "{} months for {} values",
                self.month.len(),
                self.values.len()
            )));
        }
        Ok(())
    }

    pub fn value_for(&self, month: u32) -> GravityResult<f64> {
        self.month
            .iter()
            .position(|&m| m == month)
            .map(|index| self.values[index])
            .ok_or(GravityError::MissingMonth(month))
    }

    pub fn label(&self) -> String {
        let prefix = match self.kind {
            CoefficientKind::Cosine => 'C',
            CoefficientKind::Sine => 'S',
        };
        format!("{}{}{}", prefix, self.degree, self.order)
    }
}

/// Monthly polar motion in arcseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolarMotion {
    pub month: Vec<u32>,
    pub xp: Vec<f64>,
    pub yp: Vec<f64>,
}

impl PolarMotion {
    pub fn validate(&self) -> GravityResult<()> {
        if self.xp.len() != self.month.len() || self.yp.len() != self.month.len() {
            return Err(GravityError::ShapeMismatch(format!(
                "{} months for {} xp and {} yp values",
                self.month.len(),
                self.xp.len(),
                self.yp.len()
            )));
        }
        Ok(())
    }

    pub fn pole_for(&self, month: u32) -> GravityResult<(f64, f64)> {
        self.month
            .iter()
            .position(|&m| m == month)
            .map(|index| (self.xp[index], self.yp[index]))
            .ok_or(GravityError::MissingMonth(month))
    }
}
