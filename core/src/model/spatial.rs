use crate::prelude::{GravityError, GravityResult};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Placement of grid points relative to the degree spacing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GridInterval {
    /// Points on cell edges, -180..180 and 90..-90 inclusive
    Endpoints,
    /// Points at cell centers, offset by half the spacing
    Centered,
}

impl GridInterval {
    pub fn from_code(code: u8) -> GravityResult<Self> {
        match code {
            1 => Ok(Self::Endpoints),
            2 => Ok(Self::Centered),
            other => Err(GravityError::InvalidInput(format!(
                "unknown grid interval {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub dlon: f64,
    pub dlat: f64,
    pub interval: GridInterval,
}

impl GridSpec {
    pub fn new(dlon: f64, dlat: f64, interval: GridInterval) -> GravityResult<Self> {
        if !(dlon > 0.0 && dlat > 0.0) {
            return Err(GravityError::InvalidInput(format!(
                "grid spacing must be positive, got {}x{}",
                dlon, dlat
            )));
        }
        Ok(Self {
            dlon,
            dlat,
            interval,
        })
    }

    pub fn longitudes(&self) -> Vec<f64> {
        match self.interval {
            GridInterval::Endpoints => {
                let count = (360.0 / self.dlon + 1.0).floor() as usize;
                (0..count).map(|i| -180.0 + self.dlon * i as f64).collect()
            }
            GridInterval::Centered => {
                let count = centered_count(360.0, self.dlon);
                (0..count)
                    .map(|i| -180.0 + self.dlon / 2.0 + self.dlon * i as f64)
                    .collect()
            }
        }
    }

    pub fn latitudes(&self) -> Vec<f64> {
        match self.interval {
            GridInterval::Endpoints => {
                let count = (180.0 / self.dlat + 1.0).floor() as usize;
                (0..count).map(|i| 90.0 - self.dlat * i as f64).collect()
            }
            GridInterval::Centered => {
                let count = centered_count(180.0, self.dlat);
                (0..count)
                    .map(|i| 90.0 - self.dlat / 2.0 - self.dlat * i as f64)
                    .collect()
            }
        }
    }

    pub fn empty_grid(&self) -> SpatialGrid {
        let lon = self.longitudes();
        let lat = self.latitudes();
        let data = Array2::zeros((lat.len(), lon.len()));
        SpatialGrid {
            lon,
            lat,
            data,
            time: 0.0,
            month: None,
        }
    }
}

/// Cell centers spanning `extent` at `step`; a final partial cell still gets a point.
fn centered_count(extent: f64, step: f64) -> usize {
    (extent / step - 1e-9).ceil() as usize
}

/// Field on a regular latitude/longitude grid, indexed `[lat, lon]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpatialGrid {
    pub lon: Vec<f64>,
    pub lat: Vec<f64>,
    pub data: Array2<f64>,
    pub time: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub month: Option<u32>,
}

impl SpatialGrid {
    pub fn validate(&self) -> GravityResult<()> {
        if self.data.dim() != (self.lat.len(), self.lon.len()) {
            return Err(GravityError::ShapeMismatch(format!(
                "grid data {:?} for {} latitudes and {} longitudes",
                self.data.dim(),
                self.lat.len(),
                self.lon.len()
            )));
        }
        if self.lat.len() < 2 || self.lon.len() < 2 {
            return Err(GravityError::InvalidInput(
                "grid needs at least two latitudes and longitudes".into(),
            ));
        }
        Ok(())
    }

    /// Absolute spacing `(dlon, dlat)` in degrees taken from the first cells.
    pub fn spacing(&self) -> (f64, f64) {
        let dlon = (self.lon[1] - self.lon[0]).abs();
        let dlat = (self.lat[1] - self.lat[0]).abs();
        (dlon, dlat)
    }
}
