//! Fully normalized associated Legendre functions.
//!
//! Uses the 4π geodesy normalization without the Condon-Shortley phase:
//! sectoral terms are seeded from `P11 = sqrt(3) sin θ` and each column is
//! completed with the standard three-term recursion in degree. Derivatives
//! are taken with respect to colatitude using the m±1 form, which stays
//! finite at the poles.

use ndarray::Array3;

#[derive(Debug, Clone)]
pub struct LegendreTable {
    pub lmax: usize,
    /// `plm[l, m, i]` evaluated at the i-th point.
    pub plm: Array3<f64>,
    /// `dplm[l, m, i]` derivative with respect to colatitude.
    pub dplm: Array3<f64>,
}

impl LegendreTable {
    /// Evaluates the table at `x = cos(colatitude)`.
    pub fn compute(lmax: usize, x: &[f64]) -> Self {
        let size = lmax + 1;
        let mut plm = Array3::zeros((size, size, x.len()));
        let mut dplm = Array3::zeros((size, size, x.len()));

        for (i, &xi) in x.iter().enumerate() {
            let u = (1.0 - xi * xi).max(0.0).sqrt();
            plm[[0, 0, i]] = 1.0;
            for m in 1..=lmax {
                let factor = if m == 1 {
                    3.0_f64.sqrt()
                } else {
                    let fm = m as f64;
                    ((2.0 * fm + 1.0) / (2.0 * fm)).sqrt()
                };
                plm[[m, m, i]] = factor * u * plm[[m - 1, m - 1, i]];
            }
            for m in 0..=lmax {
                let fm = m as f64;
                for l in (m + 1)..=lmax {
                    let fl = l as f64;
                    let a = ((2.0 * fl - 1.0) * (2.0 * fl + 1.0) / ((fl - fm) * (fl + fm))).sqrt();
                    let recurrence = a * xi * plm[[l - 1, m, i]];
                    plm[[l, m, i]] = if l >= m + 2 {
                        let b = ((2.0 * fl + 1.0) * (fl + fm - 1.0) * (fl - fm - 1.0)
                            / ((fl - fm) * (fl + fm) * (2.0 * fl - 3.0)))
                            .sqrt();
                        recurrence - b * plm[[l - 2, m, i]]
                    } else {
                        recurrence
                    };
                }
            }
            for l in 1..=lmax {
                let fl = l as f64;
                dplm[[l, 0, i]] = -(fl * (fl + 1.0) / 2.0).sqrt() * plm[[l, 1, i]];
                for m in 1..=l {
                    let fm = m as f64;
                    let c = if m == 1 { 2.0 } else { 1.0 };
                    let lower = 0.5 * (c * (fl + fm) * (fl - fm + 1.0)).sqrt() * plm[[l, m - 1, i]];
                    let upper = if m < l {
                        0.5 * ((fl - fm) * (fl + fm + 1.0)).sqrt() * plm[[l, m + 1, i]]
                    } else {
                        0.0
                    };
                    dplm[[l, m, i]] = lower - upper;
                }
            }
        }

        Self { lmax, plm, dplm }
    }

    /// Evaluates the table at geographic latitudes in degrees.
    pub fn from_latitudes(lmax: usize, latitudes: &[f64]) -> Self {
        let x: Vec<f64> = latitudes.iter().map(|lat| lat.to_radians().sin()).collect();
        Self::compute(lmax, &x)
    }

    pub fn points(&self) -> usize {
        self.plm.dim().2
    }
}
