use crate::model::harmonics::Harmonics;

/// Common error type for the harmonic processing core.
#[derive(thiserror::Error, Debug)]
pub enum GravityError {
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("month {0} not available")]
    MissingMonth(u32),
    #[error("ill-posed system: {0}")]
    Singular(String),
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type GravityResult<T> = Result<T, GravityError>;

/// A correction or filter applied in place to a harmonic time series.
pub trait HarmonicStage: Send + Sync {
    fn name(&self) -> &str;
    fn apply(&self, harmonics: &mut Harmonics) -> GravityResult<()>;
}
