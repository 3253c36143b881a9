pub mod legendre;
pub mod lstsq;
pub mod matrix;
pub mod smoothing;
pub mod stats;

pub use legendre::LegendreTable;
pub use lstsq::LeastSquares;
pub use matrix::MatrixHelper;
pub use smoothing::gauss_weights;
pub use stats::StatsHelper;
