//! Spherical-harmonic processing core for GRACE/GRACE-FO monthly gravity fields.
//!
//! The modules cover harmonic containers, Legendre synthesis, the correction
//! and filtering pipeline, unit conversion, and the least-squares mascon
//! procedure used for sensitivity kernels and regional mass time series.

pub mod mascon;
pub mod math;
pub mod model;
pub mod prelude;
pub mod processing;
pub mod telemetry;

pub use model::harmonics::Harmonics;
pub use prelude::{GravityError, GravityResult, HarmonicStage};
