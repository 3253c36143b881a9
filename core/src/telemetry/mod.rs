pub mod log;
pub mod metrics;

pub use log::{LogManager, RunLog};
pub use metrics::{Counts, JobMetrics};
