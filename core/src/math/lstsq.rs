use crate::prelude::{GravityError, GravityResult};
use nalgebra::{DMatrix, DVector};

/// SVD-backed least-squares solver for a fixed design matrix.
///
/// Singular values at or below `rcond * s_max` are discarded; a negative
/// `rcond` selects machine precision. An optional Tikhonov damping term
/// replaces `1/s` with `s / (s^2 + damping)`.
#[derive(Debug, Clone)]
pub struct LeastSquares {
    u: DMatrix<f64>,
    singular: DVector<f64>,
    v_t: DMatrix<f64>,
    cutoff: f64,
    damping: f64,
}

impl LeastSquares {
    pub fn new(design: DMatrix<f64>, rcond: f64) -> GravityResult<Self> {
        let (rows, cols) = design.shape();
        if rows == 0 || cols == 0 {
            return Err(GravityError::InvalidInput(format!(
                "empty {}x{} design matrix",
                rows, cols
            )));
        }
        if design.iter().any(|value| !value.is_finite()) {
            return Err(GravityError::InvalidInput(
                "design matrix contains non-finite values".into(),
            ));
        }

        let svd = design.svd(true, true);
        let u = svd
            .u
            .ok_or_else(|| GravityError::Singular("left singular vectors unavailable".into()))?;
        let v_t = svd
            .v_t
            .ok_or_else(|| GravityError::Singular("right singular vectors unavailable".into()))?;
        let singular = svd.singular_values;
        let s_max = singular.iter().copied().fold(0.0, f64::max);
        if s_max <= 0.0 {
            return Err(GravityError::Singular("design matrix is identically zero".into()));
        }
        let rcond = if rcond < 0.0 { f64::EPSILON } else { rcond };

        Ok(Self {
            u,
            singular,
            v_t,
            cutoff: rcond * s_max,
            damping: 0.0,
        })
    }

    pub fn with_damping(mut self, damping: f64) -> GravityResult<Self> {
        if !(damping >= 0.0 && damping.is_finite()) {
            return Err(GravityError::InvalidInput(format!(
                "damping must be a non-negative number, got {}",
                damping
            )));
        }
        self.damping = damping;
        Ok(self)
    }

    pub fn rows(&self) -> usize {
        self.u.nrows()
    }

    pub fn cols(&self) -> usize {
        self.v_t.ncols()
    }

    pub fn rank(&self) -> usize {
        self.singular.iter().filter(|&&s| s > self.cutoff).count()
    }

    fn filter(&self, s: f64) -> f64 {
        if s <= self.cutoff {
            0.0
        } else if self.damping > 0.0 {
            s / (s * s + self.damping)
        } else {
            1.0 / s
        }
    }

    pub fn solve(&self, rhs: &DVector<f64>) -> GravityResult<DVector<f64>> {
        if rhs.len() != self.rows() {
            return Err(GravityError::ShapeMismatch(format!(
                "right-hand side of length {} for {} rows",
                rhs.len(),
                self.rows()
            )));
        }
        let mut projected = self.u.tr_mul(rhs);
        for (value, &s) in projected.iter_mut().zip(self.singular.iter()) {
            *value *= self.filter(s);
        }
        Ok(self.v_t.tr_mul(&projected))
    }

    /// The (possibly damped) pseudo-inverse, of shape `cols x rows`.
    pub fn pseudo_inverse(&self) -> DMatrix<f64> {
        let mut v = self.v_t.transpose();
        for (j, &s) in self.singular.iter().enumerate() {
            let factor = self.filter(s);
            v.column_mut(j).scale_mut(factor);
        }
        v * self.u.transpose()
    }
}
