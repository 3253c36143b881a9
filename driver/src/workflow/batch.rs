use crate::workflow::config::ParameterFile;
use crate::workflow::runner::{Analysis, Runner};
use anyhow::Context;
use gracecore::telemetry::{Counts, JobMetrics, RunLog};
use log::{error, info, warn};
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Runs one analysis over many parameter files, serially or on a thread pool.
pub struct Batch {
    runner: Runner,
    analysis: Analysis,
    processes: usize,
    write_logs: bool,
    metrics: JobMetrics,
}

impl Batch {
    pub fn new(runner: Runner, analysis: Analysis, processes: usize, write_logs: bool) -> Self {
        Self {
            runner,
            analysis,
            processes,
            write_logs,
            metrics: JobMetrics::new(),
        }
    }

    pub fn run(&self, files: &[PathBuf]) -> anyhow::Result<Counts> {
        if self.processes == 0 {
            for file in files {
                self.run_job(file);
            }
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(self.processes)
                .build()
                .context("building worker pool")?;
            pool.install(|| files.par_iter().for_each(|file| self.run_job(file)));
        }

        let counts = self.metrics.snapshot();
        info!(
            "{} jobs completed, {} failed",
            counts.completed, counts.failed
        );
        if counts.failed > 0 {
            anyhow::bail!("{} of {} jobs failed", counts.failed, files.len());
        }
        Ok(counts)
    }

    fn run_job(&self, path: &Path) {
        info!("starting {}", path.display());
        let loaded = ParameterFile::load(path);
        let outcome = loaded
            .as_ref()
            .map_err(|err| anyhow::anyhow!("{:#}", err))
            .and_then(|file| self.runner.execute(self.analysis, file));

        let parameters = loaded
            .as_ref()
            .map(|file| file.values().clone())
            .unwrap_or_default();
        let directory = loaded
            .as_ref()
            .ok()
            .and_then(|file| file.get("DIRECTORY").map(|raw| file.resolve(raw)))
            .or_else(|| path.parent().map(Path::to_path_buf))
            .unwrap_or_default();

        match outcome {
            Ok(outputs) => {
                self.metrics.record_completed();
                info!("finished {} with {} outputs", path.display(), outputs.len());
                if self.write_logs {
                    self.write_log(&directory, path, &parameters, Ok(outputs.as_slice()));
                }
            }
            Err(err) => {
                self.metrics.record_failed();
                error!("job {} failed: {:#}", path.display(), err);
                if self.write_logs {
                    let chain: Vec<String> = err.chain().map(|cause| cause.to_string()).collect();
                    self.write_log(&directory, path, &parameters, Err(chain.as_slice()));
                }
            }
        }
    }

    fn write_log(
        &self,
        directory: &Path,
        path: &Path,
        parameters: &BTreeMap<String, String>,
        outcome: Result<&[PathBuf], &[String]>,
    ) {
        let failed = outcome.is_err();
        let result = std::fs::create_dir_all(directory)
            .and_then(|_| RunLog::create_unique(directory, self.analysis.log_prefix(), failed))
            .and_then(|mut log| {
                match outcome {
                    Ok(outputs) => log.write_success(path, parameters, outputs)?,
                    Err(errors) => log.write_failure(path, parameters, errors)?,
                }
                Ok(log.path().to_path_buf())
            });
        match result {
            Ok(log_path) => info!("run log {}", log_path.display()),
            Err(err) => warn!("could not write run log in {}: {}", directory.display(), err),
        }
    }
}
