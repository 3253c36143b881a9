use crate::model::harmonics::Harmonics;
use crate::model::love::LoveNumbers;
use crate::model::series::CoefficientKind;
use crate::model::units::{RAD_E, RHO_E};
use crate::prelude::{GravityError, GravityResult};
use crate::processing::synthesis::redistribute_over_ocean;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Ordering of harmonic coefficients in the rows of the design matrix.
///
/// All cosine terms come first (`l = lmin..=lmax`, `m = 0..=min(l, mmax)`),
/// followed by the sine terms with `m` starting at one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarmonicLayout {
    pub lmin: usize,
    pub lmax: usize,
    pub mmax: usize,
}

impl HarmonicLayout {
    pub fn new(lmin: usize, lmax: usize, mmax: usize) -> GravityResult<Self> {
        if lmin > lmax {
            return Err(GravityError::InvalidInput(format!(
                "lmin {} exceeds lmax {}",
                lmin, lmax
            )));
        }
        Ok(Self {
            lmin,
            lmax,
            mmax: mmax.min(lmax),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, CoefficientKind)> + '_ {
        let cosine = (self.lmin..=self.lmax).flat_map(move |l| {
            (0..=l.min(self.mmax)).map(move |m| (l, m, CoefficientKind::Cosine))
        });
        let sine = (self.lmin..=self.lmax).flat_map(move |l| {
            (1..=l.min(self.mmax)).map(move |m| (l, m, CoefficientKind::Sine))
        });
        cosine.chain(sine)
    }

    pub fn n_harm(&self) -> usize {
        (self.lmin..=self.lmax)
            .map(|l| 2 * l.min(self.mmax) + 1)
            .sum()
    }

    /// Coefficients of epoch `t` in row order.
    pub fn gather(&self, harmonics: &Harmonics, t: usize) -> GravityResult<DVector<f64>> {
        self.check_covered_by(harmonics)?;
        if t >= harmonics.epochs() {
            return Err(GravityError::InvalidInput(format!(
                "epoch {} of {}",
                t,
                harmonics.epochs()
            )));
        }
        Ok(DVector::from_iterator(
            self.n_harm(),
            self.iter().map(|(l, m, kind)| match kind {
                CoefficientKind::Cosine => harmonics.clm[[l, m, t]],
                CoefficientKind::Sine => harmonics.slm[[l, m, t]],
            }),
        ))
    }

    /// Places row-ordered values into a single-epoch field of degree `lmax`.
    pub fn scatter(&self, values: &[f64]) -> GravityResult<Harmonics> {
        if values.len() != self.n_harm() {
            return Err(GravityError::ShapeMismatch(format!(
                "{} values for {} harmonics",
                values.len(),
                self.n_harm()
            )));
        }
        let mut harmonics = Harmonics::zeros(self.lmax, self.mmax, 1);
        for ((l, m, kind), &value) in self.iter().zip(values) {
            match kind {
                CoefficientKind::Cosine => harmonics.clm[[l, m, 0]] = value,
                CoefficientKind::Sine => harmonics.slm[[l, m, 0]] = value,
            }
        }
        Ok(harmonics)
    }

    fn check_covered_by(&self, harmonics: &Harmonics) -> GravityResult<()> {
        if harmonics.lmax < self.lmax || harmonics.mmax < self.mmax {
            return Err(GravityError::ShapeMismatch(format!(
                "L{}/M{} harmonics for an L{}/M{} layout",
                harmonics.lmax, harmonics.mmax, self.lmax, self.mmax
            )));
        }
        Ok(())
    }
}

/// Quantity the mascon fit is performed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FitMethod {
    /// Equivalent water thickness
    Mass,
    /// Geoid height
    Geoid,
}

impl FitMethod {
    pub fn from_code(code: u8) -> GravityResult<Self> {
        match code {
            1 => Ok(FitMethod::Mass),
            2 => Ok(FitMethod::Geoid),
            other => Err(GravityError::InvalidInput(format!(
                "unknown fit method {}",
                other
            ))),
        }
    }
}

/// Design matrix relating mascon amplitudes to harmonic coefficients.
#[derive(Debug, Clone)]
pub struct MasconDesign {
    pub layout: HarmonicLayout,
    pub method: FitMethod,
    pub names: Vec<String>,
    /// Mass of one centimeter of water over each mascon [g].
    pub total_area: Vec<f64>,
    /// Mascon coefficients, one column per mascon.
    pub matrix: DMatrix<f64>,
    pub fit_factor: Vec<f64>,
    pub inv_fit_factor: Vec<f64>,
    /// `matrix` with each row scaled by `fit_factor`.
    pub fit_matrix: DMatrix<f64>,
}

impl MasconDesign {
    pub fn new(
        mascons: &[Harmonics],
        names: Vec<String>,
        layout: HarmonicLayout,
        love: &LoveNumbers,
        weights: &[f64],
        method: FitMethod,
    ) -> GravityResult<Self> {
        let areas = mascon_areas(mascons)?;
        Self::build(mascons, names, areas, layout, love, weights, method)
    }

    /// Builds the design from mascons whose mass is balanced by a uniform
    /// ocean layer. Areas are taken from the mascons before redistribution.
    pub fn with_ocean(
        mascons: &[Harmonics],
        names: Vec<String>,
        layout: HarmonicLayout,
        love: &LoveNumbers,
        weights: &[f64],
        method: FitMethod,
        ocean: &Harmonics,
    ) -> GravityResult<Self> {
        let areas = mascon_areas(mascons)?;
        let balanced = mascons
            .iter()
            .map(|mascon| -> GravityResult<Harmonics> {
                let mut balanced = mascon.truncate(layout.lmax, layout.mmax)?;
                redistribute_over_ocean(&mut balanced, ocean)?;
                Ok(balanced)
            })
            .collect::<GravityResult<Vec<Harmonics>>>()?;
        Self::build(&balanced, names, areas, layout, love, weights, method)
    }

    fn build(
        mascons: &[Harmonics],
        names: Vec<String>,
        total_area: Vec<f64>,
        layout: HarmonicLayout,
        love: &LoveNumbers,
        weights: &[f64],
        method: FitMethod,
    ) -> GravityResult<Self> {
        if names.len() != mascons.len() {
            return Err(GravityError::ShapeMismatch(format!(
                "{} names for {} mascons",
                names.len(),
                mascons.len()
            )));
        }
        let n_harm = layout.n_harm();
        if n_harm < mascons.len() {
            return Err(GravityError::InvalidInput(format!(
                "{} harmonics cannot resolve {} mascons",
                n_harm,
                mascons.len()
            )));
        }
        if love.lmax() < layout.lmax || weights.len() <= layout.lmax {
            return Err(GravityError::ShapeMismatch(format!(
                "Love numbers to L{} and {} weights for L{}",
                love.lmax(),
                weights.len(),
                layout.lmax
            )));
        }

        let mut fit_factor = Vec::with_capacity(n_harm);
        let mut inv_fit_factor = Vec::with_capacity(n_harm);
        for (l, _, _) in layout.iter() {
            let one_plus_k = 1.0 + love.kl[l];
            let degree = 2.0 * l as f64 + 1.0;
            match method {
                FitMethod::Mass => {
                    if one_plus_k.abs() <= f64::EPSILON {
                        return Err(GravityError::InvalidInput(format!(
                            "1 + k{} vanishes; raise lmin above {}",
                            l, l
                        )));
                    }
                    fit_factor.push(weights[l] * degree / one_plus_k);
                    inv_fit_factor.push(0.75 * one_plus_k / (PI * RHO_E * RAD_E.powi(3) * degree));
                }
                FitMethod::Geoid => {
                    fit_factor.push(weights[l]);
                    inv_fit_factor.push(1.0);
                }
            }
        }

        let mut matrix = DMatrix::zeros(n_harm, mascons.len());
        for (k, mascon) in mascons.iter().enumerate() {
            matrix.set_column(k, &layout.gather(mascon, 0)?);
        }

        let mut fit_matrix = matrix.clone();
        for (i, &factor) in fit_factor.iter().enumerate() {
            fit_matrix.row_mut(i).scale_mut(factor);
        }

        Ok(Self {
            layout,
            method,
            names,
            total_area,
            matrix,
            fit_factor,
            inv_fit_factor,
            fit_matrix,
        })
    }

    pub fn n_mascons(&self) -> usize {
        self.matrix.ncols()
    }
}

/// Mass of one centimeter of water over each mascon [g].
fn mascon_areas(mascons: &[Harmonics]) -> GravityResult<Vec<f64>> {
    if mascons.is_empty() {
        return Err(GravityError::InvalidInput("no mascons supplied".into()));
    }
    mascons
        .iter()
        .enumerate()
        .map(|(k, mascon)| -> GravityResult<f64> {
            mascon.validate()?;
            if mascon.epochs() != 1 {
                return Err(GravityError::InvalidInput(format!(
                    "mascon {} holds {} fields, expected one",
                    k,
                    mascon.epochs()
                )));
            }
            Ok(4.0 * PI * RAD_E.powi(3) * RHO_E * mascon.clm[[0, 0, 0]] / 3.0)
        })
        .collect()
}

/// Mascon name from a file stem: upper case, with the `_L<lmax>` tag removed.
pub fn mascon_name(stem: &str, lmax: usize) -> String {
    stem.to_uppercase().replace(&format!("_L{}", lmax), "")
}
