//! Least-squares mascon estimation: design matrices, sensitivity kernels and
//! regional mass time series.

pub mod design;
pub mod fit;
pub mod kernel;

pub use design::{mascon_name, FitMethod, HarmonicLayout, MasconDesign};
pub use fit::{fit_time_series, MasconSeries};
pub use kernel::{kernel_coefficients, sensitivity_kernels, SensitivityKernel};
