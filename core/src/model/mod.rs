pub mod harmonics;
pub mod love;
pub mod series;
pub mod spatial;
pub mod units;

pub use harmonics::Harmonics;
pub use love::{LoveNumberDataset, LoveNumbers, ReferenceFrame};
pub use series::{CoefficientKind, CoefficientSeries, PolarMotion};
pub use spatial::{GridInterval, GridSpec, SpatialGrid};
pub use units::{HarmonicUnits, Unit};
