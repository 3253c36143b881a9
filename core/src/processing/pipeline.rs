use crate::model::harmonics::Harmonics;
use crate::prelude::{GravityResult, HarmonicStage};
use crate::telemetry::log::LogManager;

/// Ordered chain of corrections applied to a harmonic series.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn HarmonicStage>>,
    logger: LogManager,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage<S: HarmonicStage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn push(&mut self, stage: Box<dyn HarmonicStage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub fn run(&self, harmonics: &mut Harmonics) -> GravityResult<()> {
        harmonics.validate()?;
        for stage in &self.stages {
            stage.apply(harmonics)?;
            self.logger.record(&format!(
                "applied {} to {} epochs (L{}/M{})",
                stage.name(),
                harmonics.epochs(),
                harmonics.lmax,
                harmonics.mmax
            ));
        }
        Ok(())
    }
}
