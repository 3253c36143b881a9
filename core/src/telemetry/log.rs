use chrono::Local;
use log::info;
use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Milestone logger shared by processing chains.
pub struct LogManager {
    scope: String,
}

impl LogManager {
    pub fn new(scope: &str) -> Self {
        Self {
            scope: scope.to_string(),
        }
    }

    pub fn record(&self, message: &str) {
        info!("[{}] {}", self.scope, message);
    }
}

impl Default for LogManager {
    fn default() -> Self {
        Self::new("pipeline")
    }
}

/// Plain-text report of a single job, written next to its outputs.
pub struct RunLog {
    path: PathBuf,
    file: File,
}

impl RunLog {
    /// Creates `<prefix>_run_<date>_PID-<pid>.log` (or `_failed_run_`) in
    /// `directory`, appending `_N` until the name is unused.
    pub fn create_unique(directory: &Path, prefix: &str, failed: bool) -> std::io::Result<Self> {
        let kind = if failed { "failed_run" } else { "run" };
        let stem = format!(
            "{}_{}_{}_PID-{}",
            prefix,
            kind,
            Local::now().format("%Y-%m-%d"),
            std::process::id()
        );
        let mut counter = 1;
        let mut path = directory.join(format!("{}.log", stem));
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok(Self { path, file }),
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    path = directory.join(format!("{}_{}.log", stem, counter));
                    counter += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_header(
        &mut self,
        parameter_file: &Path,
        parameters: &BTreeMap<String, String>,
    ) -> std::io::Result<()> {
        writeln!(
            self.file,
            "PARAMETER FILE:\n{}\n",
            absolute(parameter_file).display()
        )?;
        writeln!(self.file, "PARAMETERS:")?;
        for (key, value) in parameters {
            writeln!(self.file, "{}: {}", key, value)?;
        }
        Ok(())
    }

    pub fn write_success(
        &mut self,
        parameter_file: &Path,
        parameters: &BTreeMap<String, String>,
        outputs: &[PathBuf],
    ) -> std::io::Result<()> {
        self.write_header(parameter_file, parameters)?;
        writeln!(self.file, "\nOUTPUT FILES:")?;
        for output in outputs {
            writeln!(self.file, "{}", output.display())?;
        }
        self.file.flush()
    }

    pub fn write_failure(
        &mut self,
        parameter_file: &Path,
        parameters: &BTreeMap<String, String>,
        errors: &[String],
    ) -> std::io::Result<()> {
        self.write_header(parameter_file, parameters)?;
        writeln!(self.file, "\nTRACEBACK ERROR:")?;
        for (depth, message) in errors.iter().enumerate() {
            if depth == 0 {
                writeln!(self.file, "{}", message)?;
            } else {
                writeln!(self.file, "  caused by: {}", message)?;
            }
        }
        self.file.flush()
    }
}

/// Joins a relative path onto the working directory.
fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .unwrap_or_else(|_| path.to_path_buf())
}
