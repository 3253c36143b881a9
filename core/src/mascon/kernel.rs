use crate::mascon::design::MasconDesign;
use crate::math::legendre::LegendreTable;
use crate::math::lstsq::LeastSquares;
use crate::model::harmonics::Harmonics;
use crate::model::spatial::{GridSpec, SpatialGrid};
use crate::prelude::GravityResult;
use crate::processing::synthesis::harmonic_summation;
use log::debug;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

/// Harmonic sensitivity kernel of one mascon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensitivityKernel {
    pub name: String,
    /// Mass of one centimeter of water over the mascon [g].
    pub area: f64,
    /// Kernel coefficients; the epoch carries the mascon area.
    pub harmonics: Harmonics,
}

impl SensitivityKernel {
    pub fn to_grid(&self, spec: &GridSpec, table: Option<&LegendreTable>) -> GravityResult<SpatialGrid> {
        let mut grid = spec.empty_grid();
        grid.data = harmonic_summation(
            self.harmonics.clm_epoch(0),
            self.harmonics.slm_epoch(0),
            &grid.lon,
            &grid.lat,
            self.harmonics.lmax,
            self.harmonics.mmax,
            table,
        )?;
        grid.time = self.area;
        Ok(grid)
    }
}

/// Kernel coefficients `A[i, k]`, the mass response of mascon `k` to a unit
/// value of harmonic row `i`.
pub fn kernel_coefficients(design: &MasconDesign, rcond: f64, damping: f64) -> GravityResult<DMatrix<f64>> {
    let solver = LeastSquares::new(design.fit_matrix.clone(), rcond)?.with_damping(damping)?;
    debug!(
        "kernel inversion of {}x{} design with rank {}",
        solver.rows(),
        solver.cols(),
        solver.rank()
    );
    let pinv = solver.pseudo_inverse();
    let mut coefficients = pinv.transpose();
    for (i, &factor) in design.fit_factor.iter().enumerate() {
        coefficients.row_mut(i).scale_mut(factor);
    }
    for (k, &area) in design.total_area.iter().enumerate() {
        coefficients.column_mut(k).scale_mut(area);
    }
    Ok(coefficients)
}

pub fn sensitivity_kernels(
    design: &MasconDesign,
    rcond: f64,
    damping: f64,
) -> GravityResult<Vec<SensitivityKernel>> {
    let coefficients = kernel_coefficients(design, rcond, damping)?;
    design
        .names
        .iter()
        .enumerate()
        .map(|(k, name)| -> GravityResult<SensitivityKernel> {
            let values: Vec<f64> = coefficients
                .column(k)
                .iter()
                .zip(&design.inv_fit_factor)
                .map(|(a, inv)| a * inv)
                .collect();
            let mut harmonics = design.layout.scatter(&values)?;
            harmonics.time = vec![design.total_area[k]];
            Ok(SensitivityKernel {
                name: name.clone(),
                area: design.total_area[k],
                harmonics,
            })
        })
        .collect()
}
