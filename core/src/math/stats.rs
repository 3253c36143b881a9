use crate::prelude::{GravityError, GravityResult};
use nalgebra::{Matrix3, Vector3};

pub struct StatsHelper;

impl StatsHelper {
    pub fn rms(samples: &[f64]) -> f64 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = samples.iter().map(|&v| v * v).sum();
        (sum_sq / samples.len() as f64).sqrt()
    }

    /// Least-squares quadratic `c0 + c1*x + c2*x^2` through the samples.
    pub fn polyfit_quadratic(x: &[f64], y: &[f64]) -> GravityResult<[f64; 3]> {
        if x.len() != y.len() {
            return Err(GravityError::ShapeMismatch(format!(
                "{} abscissae for {} values",
                x.len(),
                y.len()
            )));
        }
        if x.len() < 3 {
            return Err(GravityError::InvalidInput(format!(
                "quadratic fit needs 3 points, got {}",
                x.len()
            )));
        }
        let mut normal = Matrix3::zeros();
        let mut rhs = Vector3::zeros();
        for (&xi, &yi) in x.iter().zip(y) {
            let basis = Vector3::new(1.0, xi, xi * xi);
            normal += basis * basis.transpose();
            rhs += basis * yi;
        }
        let solution = normal
            .lu()
            .solve(&rhs)
            .ok_or_else(|| GravityError::Singular("degenerate abscissae for quadratic fit".into()))?;
        Ok([solution[0], solution[1], solution[2]])
    }

    pub fn evaluate_quadratic(coefficients: &[f64; 3], x: f64) -> f64 {
        coefficients[0] + coefficients[1] * x + coefficients[2] * x * x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn rms_zero_sequence_yields_zero() {
        assert_eq!(StatsHelper::rms(&[]), 0.0);
        assert_eq!(StatsHelper::rms(&[0.0, 0.0]), 0.0);
    }

    #[test]
    fn rms_handles_single_value() {
        assert_eq!(StatsHelper::rms(&[4.0]), 4.0);
    }

    #[test]
    fn quadratic_fit_recovers_exact_parabola() {
        let x = [-2.0, -1.0, 0.0, 1.0, 2.0];
        let y: Vec<f64> = x.iter().map(|&v| 1.5 - 0.5 * v + 2.0 * v * v).collect();
        let fit = StatsHelper::polyfit_quadratic(&x, &y).unwrap();
        assert_abs_diff_eq!(fit[0], 1.5, epsilon = 1e-10);
        assert_abs_diff_eq!(fit[1], -0.5, epsilon = 1e-10);
        assert_abs_diff_eq!(fit[2], 2.0, epsilon = 1e-10);
        assert_abs_diff_eq!(StatsHelper::evaluate_quadratic(&fit, 3.0), 18.0, epsilon = 1e-9);
    }

    #[test]
    fn quadratic_fit_rejects_short_or_degenerate_input() {
        assert!(StatsHelper::polyfit_quadratic(&[0.0, 1.0], &[0.0, 1.0]).is_err());
        assert!(StatsHelper::polyfit_quadratic(&[1.0, 1.0, 1.0], &[0.0, 1.0, 2.0]).is_err());
    }
}
