use crate::prelude::{GravityError, GravityResult};
use ndarray::{concatenate, s, Array2, Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Time series of fully normalized spherical harmonic coefficients.
///
/// Coefficient arrays are indexed `[l, m, t]`. Entries with `m > l` and the
/// sine terms of order zero are always zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Harmonics {
    pub lmax: usize,
    pub mmax: usize,
    pub clm: Array3<f64>,
    pub slm: Array3<f64>,
    /// Epoch of each field in decimal years.
    pub time: Vec<f64>,
    /// GRACE month label of each field (1 = January 2002).
    pub month: Vec<u32>,
}

impl Harmonics {
    pub fn zeros(lmax: usize, mmax: usize, epochs: usize) -> Self {
        let mmax = mmax.min(lmax);
        Self {
            lmax,
            mmax,
            clm: Array3::zeros((lmax + 1, mmax + 1, epochs)),
            slm: Array3::zeros((lmax + 1, mmax + 1, epochs)),
            time: vec![0.0; epochs],
            month: vec![0; epochs],
        }
    }

    /// Wraps a static field as a single-epoch series.
    pub fn from_field(clm: Array2<f64>, slm: Array2<f64>) -> GravityResult<Self> {
        if clm.dim() != slm.dim() {
            return Err(GravityError::ShapeMismatch(format!(
                "clm {:?} vs slm {:?}",
                clm.dim(),
                slm.dim()
            )));
        }
        let (lp1, mp1) = clm.dim();
        if lp1 == 0 || mp1 == 0 || mp1 > lp1 {
            return Err(GravityError::ShapeMismatch(format!(
                "invalid coefficient shape {:?}",
                clm.dim()
            )));
        }
        let harmonics = Self {
            lmax: lp1 - 1,
            mmax: mp1 - 1,
            clm: clm.insert_axis(Axis(2)),
            slm: slm.insert_axis(Axis(2)),
            time: vec![0.0],
            month: vec![0],
        };
        Ok(harmonics)
    }

    pub fn epochs(&self) -> usize {
        self.time.len()
    }

    /// Checks array shapes against the declared degree, order and epochs.
    pub fn validate(&self) -> GravityResult<()> {
        if self.mmax > self.lmax {
            return Err(GravityError::ShapeMismatch(format!(
                "mmax {} exceeds lmax {}",
                self.mmax, self.lmax
            )));
        }
        if self.month.len() != self.time.len() {
            return Err(GravityError::ShapeMismatch(format!(
                "{} months for {} epochs",
                self.month.len(),
                self.time.len()
            )));
        }
        let expected = (self.lmax + 1, self.mmax + 1, self.epochs());
        for (label, array) in [("clm", &self.clm), ("slm", &self.slm)] {
            if array.dim() != expected {
                return Err(GravityError::ShapeMismatch(format!(
                    "{} has shape {:?}, expected {:?}",
                    label,
                    array.dim(),
                    expected
                )));
            }
        }
        Ok(())
    }

    pub fn clm_epoch(&self, t: usize) -> ArrayView2<'_, f64> {
        self.clm.index_axis(Axis(2), t)
    }

    pub fn slm_epoch(&self, t: usize) -> ArrayView2<'_, f64> {
        self.slm.index_axis(Axis(2), t)
    }

    /// Returns a copy limited to degree `lmax` and order `mmax`.
    pub fn truncate(&self, lmax: usize, mmax: usize) -> GravityResult<Self> {
        let mmax = mmax.min(lmax);
        if lmax > self.lmax || mmax > self.mmax {
            return Err(GravityError::ShapeMismatch(format!(
                "cannot truncate L{}/M{} harmonics to L{}/M{}",
                self.lmax, self.mmax, lmax, mmax
            )));
        }
        Ok(Self {
            lmax,
            mmax,
            clm: self.clm.slice(s![..lmax + 1, ..mmax + 1, ..]).to_owned(),
            slm: self.slm.slice(s![..lmax + 1, ..mmax + 1, ..]).to_owned(),
            time: self.time.clone(),
            month: self.month.clone(),
        })
    }

    /// Stacks the epochs of several series with identical truncation.
    pub fn from_list(items: &[Harmonics]) -> GravityResult<Self> {
        let first = items
            .first()
            .ok_or_else(|| GravityError::InvalidInput("empty harmonics list".into()))?;
        if let Some(other) = items
            .iter()
            .find(|h| h.lmax != first.lmax || h.mmax != first.mmax)
        {
            return Err(GravityError::ShapeMismatch(format!(
                "L{}/M{} mixed with L{}/M{}",
                first.lmax, first.mmax, other.lmax, other.mmax
            )));
        }
        let clm_views: Vec<_> = items.iter().map(|h| h.clm.view()).collect();
        let slm_views: Vec<_> = items.iter().map(|h| h.slm.view()).collect();
        let clm = concatenate(Axis(2), &clm_views)
            .map_err(|err| GravityError::ShapeMismatch(err.to_string()))?;
        let slm = concatenate(Axis(2), &slm_views)
            .map_err(|err| GravityError::ShapeMismatch(err.to_string()))?;
        Ok(Self {
            lmax: first.lmax,
            mmax: first.mmax,
            clm,
            slm,
            time: items.iter().flat_map(|h| h.time.iter().copied()).collect(),
            month: items.iter().flat_map(|h| h.month.iter().copied()).collect(),
        })
    }

    pub fn epoch(&self, t: usize) -> GravityResult<Self> {
        if t >= self.epochs() {
            return Err(GravityError::InvalidInput(format!(
                "epoch {} out of range for {} epochs",
                t,
                self.epochs()
            )));
        }
        Ok(self.select_epochs(&[t]))
    }

    /// Keeps epochs with month labels in `[start, end]` not listed in `missing`.
    pub fn select_months(&self, start: u32, end: u32, missing: &[u32]) -> GravityResult<Self> {
        let indices: Vec<usize> = self
            .month
            .iter()
            .enumerate()
            .filter(|(_, month)| {
                (start..=end).contains(*month) && !missing.contains(*month)
            })
            .map(|(t, _)| t)
            .collect();
        if indices.is_empty() {
            return Err(GravityError::InvalidInput(format!(
                "no epochs between months {} and {}",
                start, end
            )));
        }
        Ok(self.select_epochs(&indices))
    }

    fn select_epochs(&self, indices: &[usize]) -> Self {
        Self {
            lmax: self.lmax,
            mmax: self.mmax,
            clm: self.clm.select(Axis(2), indices),
            slm: self.slm.select(Axis(2), indices),
            time: indices.iter().map(|&t| self.time[t]).collect(),
            month: indices.iter().map(|&t| self.month[t]).collect(),
        }
    }

    /// Adds `other`; a single-epoch `other` is broadcast across all epochs.
    pub fn add(&mut self, other: &Harmonics) -> GravityResult<()> {
        self.combine(other, 1.0)
    }

    /// Subtracts `other`; a single-epoch `other` is broadcast across all epochs.
    pub fn subtract(&mut self, other: &Harmonics) -> GravityResult<()> {
        self.combine(other, -1.0)
    }

    fn combine(&mut self, other: &Harmonics, sign: f64) -> GravityResult<()> {
        self.check_covered_by(other)?;
        let (lp1, mp1) = (self.lmax + 1, self.mmax + 1);
        let other_clm = other.clm.slice(s![..lp1, ..mp1, ..]);
        let other_slm = other.slm.slice(s![..lp1, ..mp1, ..]);
        if other.epochs() == 1 {
            let static_clm = other_clm.index_axis(Axis(2), 0);
            let static_slm = other_slm.index_axis(Axis(2), 0);
            for mut plane in self.clm.axis_iter_mut(Axis(2)) {
                plane.scaled_add(sign, &static_clm);
            }
            for mut plane in self.slm.axis_iter_mut(Axis(2)) {
                plane.scaled_add(sign, &static_slm);
            }
        } else if other.epochs() == self.epochs() {
            self.clm.scaled_add(sign, &other_clm);
            self.slm.scaled_add(sign, &other_slm);
        } else {
            return Err(GravityError::ShapeMismatch(format!(
                "{} epochs combined with {} epochs",
                self.epochs(),
                other.epochs()
            )));
        }
        Ok(())
    }

    /// Subtracts the field of `other` carrying the same month label as each epoch.
    pub fn subtract_matching_months(&mut self, other: &Harmonics) -> GravityResult<()> {
        self.check_covered_by(other)?;
        let (lp1, mp1) = (self.lmax + 1, self.mmax + 1);
        for (t, month) in self.month.clone().into_iter().enumerate() {
            let source = other
                .month
                .iter()
                .position(|&m| m == month)
                .ok_or(GravityError::MissingMonth(month))?;
            let mut clm = self.clm.slice_mut(s![.., .., t]);
            clm -= &other.clm.slice(s![..lp1, ..mp1, source]);
            let mut slm = self.slm.slice_mut(s![.., .., t]);
            slm -= &other.slm.slice(s![..lp1, ..mp1, source]);
        }
        Ok(())
    }

    fn check_covered_by(&self, other: &Harmonics) -> GravityResult<()> {
        if other.lmax < self.lmax || other.mmax < self.mmax {
            return Err(GravityError::ShapeMismatch(format!(
                "L{}/M{} field cannot correct L{}/M{} harmonics",
                other.lmax, other.mmax, self.lmax, self.mmax
            )));
        }
        Ok(())
    }

    pub fn scale(&mut self, factor: f64) {
        self.clm.mapv_inplace(|v| v * factor);
        self.slm.mapv_inplace(|v| v * factor);
    }

    /// Time-mean field as a single epoch.
    pub fn mean(&self) -> GravityResult<Self> {
        let clm = self
            .clm
            .mean_axis(Axis(2))
            .ok_or_else(|| GravityError::InvalidInput("mean of empty series".into()))?;
        let slm = self
            .slm
            .mean_axis(Axis(2))
            .ok_or_else(|| GravityError::InvalidInput("mean of empty series".into()))?;
        let mut mean = Self::from_field(clm, slm)?;
        mean.time = vec![self.time.iter().sum::<f64>() / self.epochs() as f64];
        Ok(mean)
    }

    /// Multiplies every coefficient of degree `l` by `weights[l]`.
    pub fn convolve(&mut self, weights: &[f64]) -> GravityResult<()> {
        if weights.len() <= self.lmax {
            return Err(GravityError::ShapeMismatch(format!(
                "{} degree weights for lmax {}",
                weights.len(),
                self.lmax
            )));
        }
        for (l, &weight) in weights.iter().take(self.lmax + 1).enumerate() {
            self.clm.slice_mut(s![l, .., ..]).mapv_inplace(|v| v * weight);
            self.slm.slice_mut(s![l, .., ..]).mapv_inplace(|v| v * weight);
        }
        Ok(())
    }

    /// Amplitude of each degree, indexed `[l, t]`.
    pub fn degree_amplitude(&self) -> Array2<f64> {
        let mut amplitude = Array2::zeros((self.lmax + 1, self.epochs()));
        for l in 0..=self.lmax {
            for t in 0..self.epochs() {
                let power: f64 = (0..=l.min(self.mmax))
                    .map(|m| self.clm[[l, m, t]].powi(2) + self.slm[[l, m, t]].powi(2))
                    .sum();
                amplitude[[l, t]] = power.sqrt();
            }
        }
        amplitude
    }
}
