//! Conversion between spherical harmonics and regular grids.

use crate::math::legendre::LegendreTable;
use crate::model::harmonics::Harmonics;
use crate::model::love::LoveNumbers;
use crate::model::spatial::{GridSpec, SpatialGrid};
use crate::model::units::{HarmonicUnits, Unit};
use crate::prelude::{GravityError, GravityResult};
use ndarray::{s, Array2, ArrayView2};
use rayon::prelude::*;
use std::f64::consts::PI;

fn trig_table(order: usize, lon: &[f64]) -> (Array2<f64>, Array2<f64>) {
    let mut cos_table = Array2::zeros((order + 1, lon.len()));
    let mut sin_table = Array2::zeros((order + 1, lon.len()));
    for m in 0..=order {
        for (j, phi) in lon.iter().enumerate() {
            let angle = m as f64 * phi.to_radians();
            cos_table[[m, j]] = angle.cos();
            sin_table[[m, j]] = angle.sin();
        }
    }
    (cos_table, sin_table)
}

fn resolve_table<'a>(
    table: Option<&'a LegendreTable>,
    owned: &'a mut Option<LegendreTable>,
    lmax: usize,
    lat: &[f64],
) -> GravityResult<&'a LegendreTable> {
    match table {
        Some(table) => {
            if table.lmax < lmax || table.points() != lat.len() {
                return Err(GravityError::ShapeMismatch(format!(
                    "Legendre table L{} at {} points for L{} at {} latitudes",
                    table.lmax,
                    table.points(),
                    lmax,
                    lat.len()
                )));
            }
            Ok(table)
        }
        None => Ok(owned.insert(LegendreTable::from_latitudes(lmax, lat))),
    }
}

/// Sums a harmonic field onto a grid; the result is indexed `[lat, lon]`.
pub fn harmonic_summation(
    clm: ArrayView2<f64>,
    slm: ArrayView2<f64>,
    lon: &[f64],
    lat: &[f64],
    lmax: usize,
    mmax: usize,
    table: Option<&LegendreTable>,
) -> GravityResult<Array2<f64>> {
    let mmax = mmax.min(lmax);
    let (lp1, mp1) = clm.dim();
    if lp1 <= lmax || mp1 <= mmax || slm.dim() != clm.dim() {
        return Err(GravityError::ShapeMismatch(format!(
            "coefficients {:?}/{:?} for L{}/M{}",
            clm.dim(),
            slm.dim(),
            lmax,
            mmax
        )));
    }
    let mut owned = None;
    let table = resolve_table(table, &mut owned, lmax, lat)?;
    let (cos_table, sin_table) = trig_table(mmax, lon);

    let rows: Vec<Vec<f64>> = (0..lat.len())
        .into_par_iter()
        .map(|i| {
            let mut d_cos = vec![0.0; mmax + 1];
            let mut d_sin = vec![0.0; mmax + 1];
            for m in 0..=mmax {
                for l in m..=lmax {
                    let p = table.plm[[l, m, i]];
                    d_cos[m] += clm[[l, m]] * p;
                    d_sin[m] += slm[[l, m]] * p;
                }
            }
            (0..lon.len())
                .map(|j| {
                    (0..=mmax)
                        .map(|m| d_cos[m] * cos_table[[m, j]] + d_sin[m] * sin_table[[m, j]])
                        .sum::<f64>()
                })
                .collect::<Vec<f64>>()
        })
        .collect();

    let mut spatial = Array2::zeros((lat.len(), lon.len()));
    for (i, row) in rows.into_iter().enumerate() {
        for (j, value) in row.into_iter().enumerate() {
            spatial[[i, j]] = value;
        }
    }
    Ok(spatial)
}

/// Converts a field of centimeters water equivalent into geoid harmonics.
pub fn spatial_to_harmonics(
    grid: &SpatialGrid,
    lmax: usize,
    mmax: usize,
    love: &LoveNumbers,
    table: Option<&LegendreTable>,
) -> GravityResult<Harmonics> {
    grid.validate()?;
    if love.lmax() < lmax {
        return Err(GravityError::ShapeMismatch(format!(
            "Love numbers to L{} for L{} harmonics",
            love.lmax(),
            lmax
        )));
    }
    let mmax = mmax.min(lmax);
    let (dlon, dlat) = grid.spacing();
    let mut columns = grid.lon.len();
    let span = grid.lon[columns - 1] - grid.lon[0];
    if (span.abs() - 360.0).abs() < 1e-6 {
        // -180 and 180 are the same meridian
        columns -= 1;
    }
    let lon = &grid.lon[..columns];
    let data = grid.data.slice(s![.., ..columns]);

    let mut owned = None;
    let table = resolve_table(table, &mut owned, lmax, &grid.lat)?;
    let (cos_table, sin_table) = trig_table(mmax, lon);
    let units = HarmonicUnits::new(love);
    let cell = dlon.to_radians() * dlat.to_radians();

    let mut d_cos = Array2::<f64>::zeros((mmax + 1, grid.lat.len()));
    let mut d_sin = Array2::<f64>::zeros((mmax + 1, grid.lat.len()));
    for (i, lat) in grid.lat.iter().enumerate() {
        let weight = (90.0 - lat).to_radians().sin() * cell;
        for m in 0..=mmax {
            let mut cos_sum = 0.0;
            let mut sin_sum = 0.0;
            for j in 0..columns {
                cos_sum += data[[i, j]] * cos_table[[m, j]];
                sin_sum += data[[i, j]] * sin_table[[m, j]];
            }
            d_cos[[m, i]] = cos_sum * weight;
            d_sin[[m, i]] = sin_sum * weight;
        }
    }

    let mut clm = Array2::zeros((lmax + 1, mmax + 1));
    let mut slm = Array2::zeros((lmax + 1, mmax + 1));
    for l in 0..=lmax {
        if units.cmwe[l] == 0.0 {
            continue;
        }
        let coeff = 1.0 / (4.0 * PI * units.cmwe[l]);
        for m in 0..=l.min(mmax) {
            let mut cos_sum = 0.0;
            let mut sin_sum = 0.0;
            for i in 0..grid.lat.len() {
                let p = table.plm[[l, m, i]];
                cos_sum += p * d_cos[[m, i]];
                sin_sum += p * d_sin[[m, i]];
            }
            clm[[l, m]] = coeff * cos_sum;
            if m > 0 {
                slm[[l, m]] = coeff * sin_sum;
            }
        }
    }

    let mut harmonics = Harmonics::from_field(clm, slm)?;
    harmonics.time = vec![grid.time];
    harmonics.month = vec![grid.month.unwrap_or(0)];
    Ok(harmonics)
}

/// Harmonics of one centimeter of water spread over the ocean cells of a
/// land-sea mask (ocean > 0.5).
pub fn ocean_harmonics(
    mask: &SpatialGrid,
    lmax: usize,
    mmax: usize,
    love: &LoveNumbers,
) -> GravityResult<Harmonics> {
    let mut ocean = mask.clone();
    ocean.data.mapv_inplace(|v| if v > 0.5 { 1.0 } else { 0.0 });
    spatial_to_harmonics(&ocean, lmax, mmax, love, None)
}

/// Moves the degree-zero mass of every epoch into a uniform ocean layer.
pub fn redistribute_over_ocean(harmonics: &mut Harmonics, ocean: &Harmonics) -> GravityResult<()> {
    if ocean.lmax < harmonics.lmax || ocean.mmax < harmonics.mmax {
        return Err(GravityError::ShapeMismatch(format!(
            "L{}/M{} ocean function for L{}/M{} harmonics",
            ocean.lmax, ocean.mmax, harmonics.lmax, harmonics.mmax
        )));
    }
    if ocean.epochs() != 1 {
        return Err(GravityError::InvalidInput(format!(
            "ocean function holds {} fields, expected one",
            ocean.epochs()
        )));
    }
    let ocean_c00 = ocean.clm[[0, 0, 0]];
    if ocean_c00 == 0.0 {
        return Err(GravityError::InvalidInput("ocean function has no area".into()));
    }
    let (lp1, mp1) = (harmonics.lmax + 1, harmonics.mmax + 1);
    let ocean_clm = ocean.clm.slice(s![..lp1, ..mp1, 0]);
    let ocean_slm = ocean.slm.slice(s![..lp1, ..mp1, 0]);
    for t in 0..harmonics.epochs() {
        let ratio = harmonics.clm[[0, 0, t]] / ocean_c00;
        harmonics
            .clm
            .slice_mut(s![.., .., t])
            .scaled_add(-ratio, &ocean_clm);
        harmonics
            .slm
            .slice_mut(s![.., .., t])
            .scaled_add(-ratio, &ocean_slm);
    }
    Ok(())
}

/// Converts every epoch to a grid in `unit`, applying degree `weights`.
pub fn to_spatial_series(
    harmonics: &Harmonics,
    unit: Unit,
    weights: &[f64],
    spec: &GridSpec,
    love: &LoveNumbers,
) -> GravityResult<Vec<SpatialGrid>> {
    if love.lmax() < harmonics.lmax {
        return Err(GravityError::ShapeMismatch(format!(
            "Love numbers to L{} for L{} harmonics",
            love.lmax(),
            harmonics.lmax
        )));
    }
    let units = HarmonicUnits::new(love);
    let factors: Vec<f64> = units
        .factors(unit)
        .iter()
        .zip(weights)
        .map(|(factor, weight)| factor * weight)
        .collect();
    let mut scaled = harmonics.clone();
    scaled.convolve(&factors)?;

    let template = spec.empty_grid();
    let table = LegendreTable::from_latitudes(scaled.lmax, &template.lat);
    (0..scaled.epochs())
        .into_par_iter()
        .map(|t| -> GravityResult<SpatialGrid> {
            let data = harmonic_summation(
                scaled.clm_epoch(t),
                scaled.slm_epoch(t),
                &template.lon,
                &template.lat,
                scaled.lmax,
                scaled.mmax,
                Some(&table),
            )?;
            Ok(SpatialGrid {
                lon: template.lon.clone(),
                lat: template.lat.clone(),
                data,
                time: scaled.time[t],
                month: Some(scaled.month[t]),
            })
        })
        .collect()
}
