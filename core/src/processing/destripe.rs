use crate::math::stats::StatsHelper;
use crate::model::harmonics::Harmonics;
use crate::prelude::{GravityError, GravityResult, HarmonicStage};
use log::debug;
use ndarray::{s, ArrayViewMut1};
use serde::{Deserialize, Serialize};

/// Parameters of the Swenson & Wahr (2006) decorrelation filter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DestripeConfig {
    pub amplitude: f64,
    pub decay: f64,
    pub min_window: usize,
    pub start_order: usize,
    pub lmin: usize,
}

impl Default for DestripeConfig {
    fn default() -> Self {
        Self {
            amplitude: 30.0,
            decay: 10.0,
            min_window: 5,
            start_order: 5,
            lmin: 2,
        }
    }
}

impl DestripeConfig {
    /// Number of same-parity coefficients in the smoothing window of order `m`.
    pub fn window(&self, m: usize) -> usize {
        let width = (self.amplitude * (-(m as f64) / self.decay).exp() + 1.0).floor() as usize;
        let width = width.max(self.min_window);
        if width % 2 == 0 {
            width + 1
        } else {
            width
        }
    }
}

pub struct DestripeStage {
    config: DestripeConfig,
}

impl DestripeStage {
    pub fn new(config: DestripeConfig) -> GravityResult<Self> {
        if config.min_window < 3 || config.decay <= 0.0 || config.amplitude < 0.0 {
            return Err(GravityError::InvalidInput(format!(
                "invalid destriping parameters {:?}",
                config
            )));
        }
        Ok(Self { config })
    }

    fn filter_run(&self, degrees: &[usize], window: usize, mut run: ArrayViewMut1<f64>) -> GravityResult<()> {
        let n = degrees.len();
        if n < 3 {
            return Ok(());
        }
        let width = window.min(n);
        let original: Vec<f64> = degrees.iter().map(|&l| run[l]).collect();
        for (i, &l) in degrees.iter().enumerate() {
            let start = i.saturating_sub(width / 2).min(n - width);
            let x: Vec<f64> = degrees[start..start + width]
                .iter()
                .map(|&d| d as f64 - l as f64)
                .collect();
            let fit = StatsHelper::polyfit_quadratic(&x, &original[start..start + width])?;
            run[l] = original[i] - StatsHelper::evaluate_quadratic(&fit, 0.0);
        }
        Ok(())
    }
}

impl HarmonicStage for DestripeStage {
    fn name(&self) -> &str {
        "destripe"
    }

    fn apply(&self, harmonics: &mut Harmonics) -> GravityResult<()> {
        let lmax = harmonics.lmax;
        for m in self.config.start_order..=harmonics.mmax {
            let window = self.config.window(m);
            let first = m.max(self.config.lmin);
            for parity in 0..2 {
                let degrees: Vec<usize> = (first..=lmax).filter(|l| l % 2 == parity).collect();
                for t in 0..harmonics.epochs() {
                    self.filter_run(&degrees, window, harmonics.clm.slice_mut(s![.., m, t]))?;
                    self.filter_run(&degrees, window, harmonics.slm.slice_mut(s![.., m, t]))?;
                }
            }
            debug!("destriped order {} with window {}", m, window);
        }
        Ok(())
    }
}
