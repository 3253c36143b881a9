use crate::mascon::design::MasconDesign;
use crate::math::lstsq::LeastSquares;
use crate::math::{MatrixHelper, StatsHelper};
use crate::model::harmonics::Harmonics;
use crate::prelude::{GravityError, GravityResult};
use log::{debug, info};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Regional mass time series recovered by the least-squares mascon fit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasconSeries {
    pub names: Vec<String>,
    /// Mass of one centimeter of water over each mascon [g].
    pub areas: Vec<f64>,
    pub time: Vec<f64>,
    pub month: Vec<u32>,
    /// Equivalent water thickness `[mascon, epoch]` [cm].
    pub cmwe: Array2<f64>,
    /// Mass `[mascon, epoch]` [Gt].
    pub gt: Array2<f64>,
}

impl MasconSeries {
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|candidate| candidate == name)
    }
}

/// Fits the mascon amplitudes of every epoch of `data` independently.
pub fn fit_time_series(
    design: &MasconDesign,
    data: &Harmonics,
    rcond: f64,
    damping: f64,
) -> GravityResult<MasconSeries> {
    data.validate()?;
    if data.epochs() == 0 {
        return Err(GravityError::InvalidInput("no epochs to fit".into()));
    }
    let solver = LeastSquares::new(design.fit_matrix.clone(), rcond)?.with_damping(damping)?;
    let fit_factor = DVector::from_column_slice(&design.fit_factor);

    let fits = (0..data.epochs())
        .into_par_iter()
        .map(|t| -> GravityResult<(DVector<f64>, f64)> {
            let observed = design.layout.gather(data, t)?.component_mul(&fit_factor);
            let solution = solver.solve(&observed)?;
            let residual = &design.fit_matrix * &solution - &observed;
            Ok((solution, StatsHelper::rms(residual.as_slice())))
        })
        .collect::<GravityResult<Vec<(DVector<f64>, f64)>>>()?;
    let (solutions, residuals): (Vec<DVector<f64>>, Vec<f64>) = fits.into_iter().unzip();
    debug!(
        "largest fit residual rms {:e}",
        residuals.iter().copied().fold(0.0, f64::max)
    );

    let n_mascons = design.n_mascons();
    let cmwe = MatrixHelper::to_array2(&DMatrix::from_columns(&solutions));
    let areas = Array1::from_vec(design.total_area.clone()).insert_axis(Axis(1));
    let gt = &cmwe * &areas / 1e15;
    info!(
        "fitted {} mascons over {} epochs (rank {})",
        n_mascons,
        data.epochs(),
        solver.rank()
    );

    Ok(MasconSeries {
        names: design.names.clone(),
        areas: design.total_area.clone(),
        time: data.time.clone(),
        month: data.month.clone(),
        cmwe,
        gt,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mascon::design::tests::{love, mascons};
    use crate::mascon::design::{FitMethod, HarmonicLayout};
    use approx::assert_relative_eq;

    fn design(lmax: usize) -> MasconDesign {
        MasconDesign::new(
            &mascons(lmax),
            vec!["NORTH".into(), "SOUTH".into()],
            HarmonicLayout::new(1, lmax, lmax).unwrap(),
            &love(lmax),
            &vec![1.0; lmax + 1],
            FitMethod::Mass,
        )
        .unwrap()
    }

    fn combination(lmax: usize, amplitudes: &[(f64, f64)]) -> Harmonics {
        let parts = mascons(lmax);
        let mut data = Harmonics::zeros(lmax, lmax, amplitudes.len());
        for (t, &(a, b)) in amplitudes.iter().enumerate() {
            data.month[t] = 10 + t as u32;
            data.time[t] = 2002.8 + t as f64 / 12.0;
            for l in 0..=lmax {
                for m in 0..=l {
                    data.clm[[l, m, t]] = a * parts[0].clm[[l, m, 0]] + b * parts[1].clm[[l, m, 0]];
                    data.slm[[l, m, t]] = a * parts[0].slm[[l, m, 0]] + b * parts[1].slm[[l, m, 0]];
                }
            }
        }
        data
    }

    #[test]
    fn noise_free_combination_recovered() {
        let lmax = 10;
        let design = design(lmax);
        let data = combination(lmax, &[(2.0, 3.0), (-1.0, 0.5), (0.0, 0.0)]);
        let series = fit_time_series(&design, &data, -1.0, 0.0).unwrap();
        assert_relative_eq!(series.cmwe[[0, 0]], 2.0, max_relative = 1e-8);
        assert_relative_eq!(series.cmwe[[1, 0]], 3.0, max_relative = 1e-8);
        assert_relative_eq!(series.cmwe[[0, 1]], -1.0, max_relative = 1e-8);
        assert_relative_eq!(series.cmwe[[1, 1]], 0.5, max_relative = 1e-8);
        assert_eq!(series.cmwe[[0, 2]], 0.0);
        assert_relative_eq!(
            series.gt[[1, 0]],
            3.0 * design.total_area[1] / 1e15,
            max_relative = 1e-8
        );
        assert_eq!(series.month, vec![10, 11, 12]);
        assert_eq!(series.index_of("SOUTH"), Some(1));
    }

    #[test]
    fn damping_biases_toward_zero() {
        let lmax = 6;
        let design = design(lmax);
        let data = combination(lmax, &[(2.0, 3.0)]);
        let damped = fit_time_series(&design, &data, -1.0, 1e-15).unwrap();
        assert!(damped.cmwe[[0, 0]].abs() < 2.0);
    }

    #[test]
    fn truncated_data_rejected() {
        let design = design(6);
        let data = combination(4, &[(1.0, 1.0)]);
        assert!(matches!(
            fit_time_series(&design, &data, -1.0, 0.0),
            Err(GravityError::ShapeMismatch(_))
        ));
    }
}
