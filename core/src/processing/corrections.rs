use crate::model::harmonics::Harmonics;
use crate::model::series::{CoefficientKind, CoefficientSeries, PolarMotion};
use crate::prelude::{GravityError, GravityResult, HarmonicStage};
use crate::processing::synthesis::redistribute_over_ocean;
use log::{debug, warn};
use ndarray::s;

/// Reference epoch of GIA trends in decimal years.
pub const GIA_REFERENCE_EPOCH: f64 = 2003.3;

/// Removes a glacial isostatic adjustment trend `rate * (t - epoch)`.
pub struct GiaStage {
    rate: Harmonics,
    epoch: f64,
}

impl GiaStage {
    pub fn new(rate: Harmonics, epoch: f64) -> GravityResult<Self> {
        rate.validate()?;
        if rate.epochs() != 1 {
            return Err(GravityError::InvalidInput(format!(
                "GIA rate must be a single field, got {} epochs",
                rate.epochs()
            )));
        }
        Ok(Self { rate, epoch })
    }
}

impl HarmonicStage for GiaStage {
    fn name(&self) -> &str {
        "gia"
    }

    fn apply(&self, harmonics: &mut Harmonics) -> GravityResult<()> {
        let rate = self.rate.truncate(harmonics.lmax, harmonics.mmax)?;
        let rate_clm = rate.clm_epoch(0);
        let rate_slm = rate.slm_epoch(0);
        for t in 0..harmonics.epochs() {
            let elapsed = harmonics.time[t] - self.epoch;
            harmonics
                .clm
                .slice_mut(s![.., .., t])
                .scaled_add(-elapsed, &rate_clm);
            harmonics
                .slm
                .slice_mut(s![.., .., t])
                .scaled_add(-elapsed, &rate_slm);
        }
        Ok(())
    }
}

/// Removes monthly fields such as de-aliasing corrections or modelled mass.
pub struct RemoveStage {
    fields: Vec<Harmonics>,
    ocean: Option<Harmonics>,
}

impl RemoveStage {
    pub fn new(fields: Vec<Harmonics>) -> GravityResult<Self> {
        for field in &fields {
            field.validate()?;
        }
        Ok(Self {
            fields,
            ocean: None,
        })
    }

    /// Spreads the removed mass uniformly over the ocean before removal.
    pub fn redistribute_over(mut self, ocean: Harmonics) -> GravityResult<Self> {
        ocean.validate()?;
        self.ocean = Some(ocean);
        Ok(self)
    }
}

impl HarmonicStage for RemoveStage {
    fn name(&self) -> &str {
        "remove"
    }

    fn apply(&self, harmonics: &mut Harmonics) -> GravityResult<()> {
        for field in &self.fields {
            let mut field = field.truncate(harmonics.lmax, harmonics.mmax)?;
            if let Some(ocean) = &self.ocean {
                redistribute_over_ocean(&mut field, ocean)?;
            }
            if field.epochs() == 1 && field.month[0] == 0 {
                harmonics.subtract(&field)?;
            } else {
                harmonics.subtract_matching_months(&field)?;
            }
        }
        Ok(())
    }
}

/// Replaces low-degree coefficients (SLR C20/C30, geocenter) month by month.
pub struct ReplaceStage {
    series: Vec<CoefficientSeries>,
}

impl ReplaceStage {
    pub fn new(series: Vec<CoefficientSeries>) -> GravityResult<Self> {
        for item in &series {
            item.validate()?;
        }
        Ok(Self { series })
    }
}

impl HarmonicStage for ReplaceStage {
    fn name(&self) -> &str {
        "replace"
    }

    fn apply(&self, harmonics: &mut Harmonics) -> GravityResult<()> {
        for series in &self.series {
            if series.degree > harmonics.lmax || series.order > harmonics.mmax {
                warn!(
                    "skipping {} replacement beyond L{}/M{}",
                    series.label(),
                    harmonics.lmax,
                    harmonics.mmax
                );
                continue;
            }
            let target = match series.kind {
                CoefficientKind::Cosine => &mut harmonics.clm,
                CoefficientKind::Sine => &mut harmonics.slm,
            };
            for (t, &month) in harmonics.month.iter().enumerate() {
                target[[series.degree, series.order, t]] = series.value_for(month)?;
            }
            debug!("replaced {} for {} epochs", series.label(), harmonics.month.len());
        }
        Ok(())
    }
}

/// IERS 2010 conventional mean pole `(xp, yp)` in arcseconds.
pub fn mean_pole(year: f64) -> (f64, f64) {
    let t = year - 2000.0;
    let (x_mas, y_mas) = if year < 2010.0 {
        (
            55.974 + 1.8243 * t + 0.18413 * t.powi(2) + 0.007024 * t.powi(3),
            346.346 + 1.7896 * t - 0.10729 * t.powi(2) - 0.000908 * t.powi(3),
        )
    } else {
        (23.513 + 7.6141 * t, 358.891 - 0.6287 * t)
    };
    (x_mas / 1000.0, y_mas / 1000.0)
}

/// Degree-2 order-1 perturbation of the solid-earth and ocean pole tides.
pub fn pole_tide(year: f64, xp: f64, yp: f64) -> (f64, f64) {
    let (x_mean, y_mean) = mean_pole(year);
    let m1 = xp - x_mean;
    let m2 = -(yp - y_mean);
    let solid_c21 = -1.333e-9 * (m1 + 0.0115 * m2);
    let solid_s21 = -1.333e-9 * (m2 - 0.0115 * m1);
    let ocean_c21 = -2.1778e-10 * (m1 - 0.01724 * m2);
    let ocean_s21 = -1.7232e-10 * (m2 - 0.03365 * m1);
    (solid_c21 + ocean_c21, solid_s21 + ocean_s21)
}

/// Removes the pole tide from C21 and S21 using monthly polar motion.
pub struct PoleTideStage {
    motion: PolarMotion,
}

impl PoleTideStage {
    pub fn new(motion: PolarMotion) -> GravityResult<Self> {
        motion.validate()?;
        Ok(Self { motion })
    }
}

impl HarmonicStage for PoleTideStage {
    fn name(&self) -> &str {
        "pole-tide"
    }

    fn apply(&self, harmonics: &mut Harmonics) -> GravityResult<()> {
        if harmonics.lmax < 2 || harmonics.mmax < 1 {
            warn!("pole tide skipped for L{}/M{}", harmonics.lmax, harmonics.mmax);
            return Ok(());
        }
        for t in 0..harmonics.epochs() {
            let (xp, yp) = self.motion.pole_for(harmonics.month[t])?;
            let (c21, s21) = pole_tide(harmonics.time[t], xp, yp);
            harmonics.clm[[2, 1, t]] -= c21;
            harmonics.slm[[2, 1, t]] -= s21;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn monthly(months: &[u32]) -> Harmonics {
        let mut h = Harmonics::zeros(4, 4, months.len());
        for (t, &month) in months.iter().enumerate() {
            h.month[t] = month;
            h.time[t] = 2002.0 + (month as f64 - 0.5) / 12.0;
        }
        h
    }

    #[test]
    fn gia_trend_removed_relative_to_epoch() {
        let mut h = monthly(&[1, 13]);
        h.time = vec![2003.3, 2005.3];
        let mut rate = Harmonics::zeros(6, 6, 1);
        rate.clm[[2, 0, 0]] = 1e-11;
        rate.slm[[3, 1, 0]] = -2e-11;
        GiaStage::new(rate, GIA_REFERENCE_EPOCH)
            .unwrap()
            .apply(&mut h)
            .unwrap();
        assert_abs_diff_eq!(h.clm[[2, 0, 0]], 0.0, epsilon = 1e-20);
        assert_abs_diff_eq!(h.clm[[2, 0, 1]], -2e-11, epsilon = 1e-20);
        assert_abs_diff_eq!(h.slm[[3, 1, 1]], 4e-11, epsilon = 1e-20);
    }

    #[test]
    fn gia_requires_single_field() {
        assert!(GiaStage::new(Harmonics::zeros(2, 2, 3), GIA_REFERENCE_EPOCH).is_err());
    }

    #[test]
    fn remove_matches_months_and_redistributes() {
        let mut h = monthly(&[5, 6]);
        let mut field = monthly(&[6, 5]);
        field.clm[[0, 0, 0]] = 0.4;
        field.clm[[2, 0, 1]] = 1.0;
        let mut ocean = Harmonics::zeros(4, 4, 1);
        ocean.clm[[0, 0, 0]] = 0.8;
        ocean.clm[[2, 0, 0]] = 0.2;

        let stage = RemoveStage::new(vec![field])
            .unwrap()
            .redistribute_over(ocean)
            .unwrap();
        stage.apply(&mut h).unwrap();
        // month 5: field C20 = 1.0, no degree zero mass
        assert_abs_diff_eq!(h.clm[[2, 0, 0]], -1.0, epsilon = 1e-15);
        // month 6: C00 = 0.4 replaced by half the ocean function
        assert_abs_diff_eq!(h.clm[[0, 0, 1]], 0.0, epsilon = 1e-15);
        assert_abs_diff_eq!(h.clm[[2, 0, 1]], 0.1, epsilon = 1e-15);
    }

    #[test]
    fn remove_fails_on_missing_month() {
        let mut h = monthly(&[5, 7]);
        let stage = RemoveStage::new(vec![monthly(&[5, 6])]).unwrap();
        assert!(matches!(stage.apply(&mut h), Err(GravityError::MissingMonth(7))));
    }

    #[test]
    fn replace_overwrites_low_degrees() {
        let mut h = monthly(&[3, 4]);
        let c20 = CoefficientSeries {
            degree: 2,
            order: 0,
            kind: CoefficientKind::Cosine,
            month: vec![3, 4],
            values: vec![-4.8416e-4, -4.8417e-4],
        };
        let s11 = CoefficientSeries {
            degree: 1,
            order: 1,
            kind: CoefficientKind::Sine,
            month: vec![4, 3],
            values: vec![2e-10, 1e-10],
        };
        ReplaceStage::new(vec![c20, s11])
            .unwrap()
            .apply(&mut h)
            .unwrap();
        assert_eq!(h.clm[[2, 0, 1]], -4.8417e-4);
        assert_eq!(h.slm[[1, 1, 0]], 1e-10);
    }

    #[test]
    fn mean_pole_matches_published_epochs() {
        let (x, y) = mean_pole(2000.0);
        assert_abs_diff_eq!(x, 0.055974, epsilon = 1e-12);
        assert_abs_diff_eq!(y, 0.346346, epsilon = 1e-12);
        let (x, y) = mean_pole(2010.0);
        assert_abs_diff_eq!(x, 0.023513 + 0.076141, epsilon = 1e-12);
        assert_abs_diff_eq!(y, 0.358891 - 0.006287, epsilon = 1e-12);
    }

    #[test]
    fn pole_tide_vanishes_on_mean_pole() {
        let (x, y) = mean_pole(2012.5);
        let (c21, s21) = pole_tide(2012.5, x, y);
        assert_abs_diff_eq!(c21, 0.0, epsilon = 1e-20);
        assert_abs_diff_eq!(s21, 0.0, epsilon = 1e-20);

        let (c21, _) = pole_tide(2012.5, x + 0.1, y);
        assert_abs_diff_eq!(c21, -1.333e-10 - 2.1778e-11, epsilon = 1e-18);
    }

    #[test]
    fn pole_tide_stage_adjusts_c21() {
        let mut h = monthly(&[100]);
        let (x, y) = mean_pole(h.time[0]);
        let motion = PolarMotion {
            month: vec![100],
            xp: vec![x + 0.1],
            yp: vec![y],
        };
        PoleTideStage::new(motion).unwrap().apply(&mut h).unwrap();
        assert!(h.clm[[2, 1, 0]] > 0.0);
    }
}
