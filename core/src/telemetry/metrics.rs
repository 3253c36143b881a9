use std::sync::Mutex;

/// Completed and failed job counts, shared across worker threads.
pub struct JobMetrics {
    inner: Mutex<Counts>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub completed: usize,
    pub failed: usize,
}

impl JobMetrics {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Counts::default()),
        }
    }

    pub fn record_completed(&self) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.completed += 1;
        }
    }

    pub fn record_failed(&self) {
        if let Ok(mut counts) = self.inner.lock() {
            counts.failed += 1;
        }
    }

    pub fn snapshot(&self) -> Counts {
        self.inner.lock().map(|counts| *counts).unwrap_or_default()
    }
}

impl Default for JobMetrics {
    fn default() -> Self {
        Self::new()
    }
}
