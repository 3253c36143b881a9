pub mod corrections;
pub mod destripe;
pub mod pipeline;
pub mod synthesis;

pub use corrections::{GiaStage, PoleTideStage, RemoveStage, ReplaceStage, GIA_REFERENCE_EPOCH};
pub use destripe::{DestripeConfig, DestripeStage};
pub use pipeline::Pipeline;
pub use synthesis::{
    harmonic_summation, ocean_harmonics, redistribute_over_ocean, spatial_to_harmonics,
    to_spatial_series,
};
