use crate::prelude::{GravityError, GravityResult};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// PREM load Love number tables distributed with the processing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LoveNumberDataset {
    /// Han and Wahr (1995)
    HanWahr1995,
    /// Gegout (2005)
    Gegout2005,
    /// Wang et al. (2012)
    Wang2012,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoveColumn {
    Degree,
    Hl,
    Kl,
    Ll,
    Other,
}

impl LoveNumberDataset {
    pub fn from_index(index: u8) -> GravityResult<Self> {
        match index {
            0 => Ok(Self::HanWahr1995),
            1 => Ok(Self::Gegout2005),
            2 => Ok(Self::Wang2012),
            other => Err(GravityError::InvalidInput(format!(
                "unknown load Love number dataset {}",
                other
            ))),
        }
    }

    pub fn file_name(&self) -> &'static str {
        match self {
            Self::HanWahr1995 => "love_numbers",
            Self::Gegout2005 => "Load_Love2_CE.dat",
            Self::Wang2012 => "PREM-LLNs-truncated.dat",
        }
    }

    fn header_lines(&self) -> usize {
        match self {
            Self::HanWahr1995 => 2,
            Self::Gegout2005 => 3,
            Self::Wang2012 => 1,
        }
    }

    fn columns(&self) -> &'static [LoveColumn] {
        use LoveColumn::*;
        match self {
            Self::HanWahr1995 => &[Degree, Hl, Kl, Ll],
            Self::Gegout2005 => &[Degree, Hl, Ll, Kl],
            Self::Wang2012 => &[Degree, Hl, Ll, Kl, Other, Other],
        }
    }
}

/// Reference frame of the degree one load Love numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReferenceFrame {
    /// Center of surface figure
    CF,
    /// Center of mass of the Earth system
    CM,
    /// Center of mass of the solid Earth
    CE,
}

impl FromStr for ReferenceFrame {
    type Err = GravityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CF" => Ok(Self::CF),
            "CM" => Ok(Self::CM),
            "CE" => Ok(Self::CE),
            other => Err(GravityError::InvalidInput(format!(
                "unknown reference frame {}",
                other
            ))),
        }
    }
}

// degree one values in the CE frame, used when a table starts at degree 2
const CE_DEGREE_ONE: (f64, f64, f64) = (-0.269, 0.0, 0.134);

/// Load Love numbers `(hl, kl, ll)` for degrees `0..=lmax`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoveNumbers {
    pub hl: Vec<f64>,
    pub kl: Vec<f64>,
    pub ll: Vec<f64>,
}

impl LoveNumbers {
    pub fn new(hl: Vec<f64>, kl: Vec<f64>, ll: Vec<f64>) -> GravityResult<Self> {
        if hl.len() != kl.len() || kl.len() != ll.len() || hl.is_empty() {
            return Err(GravityError::ShapeMismatch(format!(
                "love number lengths hl={} kl={} ll={}",
                hl.len(),
                kl.len(),
                ll.len()
            )));
        }
        Ok(Self { hl, kl, ll })
    }

    pub fn lmax(&self) -> usize {
        self.kl.len() - 1
    }

    pub fn read<P: AsRef<Path>>(
        path: P,
        lmax: usize,
        dataset: LoveNumberDataset,
        frame: ReferenceFrame,
    ) -> GravityResult<Self> {
        let contents = fs::read_to_string(path.as_ref())?;
        Self::parse(&contents, lmax, dataset, frame)
    }

    /// Parses a Love number table and converts degree one to `frame`.
    pub fn parse(
        contents: &str,
        lmax: usize,
        dataset: LoveNumberDataset,
        frame: ReferenceFrame,
    ) -> GravityResult<Self> {
        let columns = dataset.columns();
        let mut rows: Vec<(usize, f64, f64, f64)> = Vec::new();
        for (index, line) in contents.lines().enumerate().skip(dataset.header_lines()) {
            let tokens: Vec<&str> = line.split_whitespace().collect();
            if tokens.is_empty() || tokens[0].starts_with('#') {
                continue;
            }
            if tokens.len() < columns.len() {
                return Err(GravityError::Parse {
                    line: index + 1,
                    message: format!("expected {} columns, found {}", columns.len(), tokens.len()),
                });
            }
            let (mut degree, mut hl, mut kl, mut ll) = (0usize, 0.0, 0.0, 0.0);
            for (column, token) in columns.iter().zip(&tokens) {
                let value = parse_fortran_float(token).ok_or_else(|| GravityError::Parse {
                    line: index + 1,
                    message: format!("invalid number {}", token),
                })?;
                match column {
                    LoveColumn::Degree => degree = value.round() as usize,
                    LoveColumn::Hl => hl = value,
                    LoveColumn::Kl => kl = value,
                    LoveColumn::Ll => ll = value,
                    LoveColumn::Other => {}
                }
            }
            rows.push((degree, hl, kl, ll));
        }
        if rows.is_empty() {
            return Err(GravityError::InvalidInput("empty load Love number table".into()));
        }
        rows.sort_by_key(|row| row.0);

        let size = lmax + 1;
        let (mut hl, mut kl, mut ll) = (vec![0.0; size], vec![0.0; size], vec![0.0; size]);
        if size > 1 {
            hl[1] = CE_DEGREE_ONE.0;
            kl[1] = CE_DEGREE_ONE.1;
            ll[1] = CE_DEGREE_ONE.2;
        }
        for &(degree, h, k, l) in rows.iter().filter(|row| row.0 <= lmax) {
            hl[degree] = h;
            kl[degree] = k;
            ll[degree] = l;
        }

        let table_max = rows[rows.len() - 1].0;
        if lmax > table_max {
            if rows.len() < 2 {
                return Err(GravityError::InvalidInput(
                    "at least two degrees needed to extrapolate Love numbers".into(),
                ));
            }
            log::warn!(
                "extrapolating load Love numbers from degree {} to {}",
                table_max,
                lmax
            );
            let (l1, h1, k1, ll1) = rows[rows.len() - 2];
            let (l2, h2, k2, ll2) = rows[rows.len() - 1];
            let span = (l2 - l1) as f64;
            for degree in (table_max + 1)..=lmax {
                let step = (degree - l2) as f64 / span;
                hl[degree] = h2 + (h2 - h1) * step;
                kl[degree] = k2 + (k2 - k1) * step;
                ll[degree] = ll2 + (ll2 - ll1) * step;
            }
        }

        let mut love = Self::new(hl, kl, ll)?;
        love.apply_reference_frame(frame);
        Ok(love)
    }

    /// Shifts the CE degree one numbers by the isomorphic frame parameter.
    fn apply_reference_frame(&mut self, frame: ReferenceFrame) {
        if self.kl.len() < 2 {
            return;
        }
        let alpha = match frame {
            ReferenceFrame::CF => (self.hl[1] + 2.0 * self.ll[1]) / 3.0,
            ReferenceFrame::CM => 1.0,
            ReferenceFrame::CE => 0.0,
        };
        self.hl[1] -= alpha;
        self.kl[1] -= alpha;
        self.ll[1] -= alpha;
    }
}

fn parse_fortran_float(token: &str) -> Option<f64> {
    token.replace(['D', 'd'], "e").parse().ok()
}
