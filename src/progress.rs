use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    /// Free-form status line, e.g. which method is being tried.
    Phase(String),
    Sequence {
        name: String,
        success: bool,
        fetched: usize,
        total: usize,
    },
    Warning(String),
}

/// Progress surface supplied by the caller. The engine reports outcomes
/// through `event` and polls `is_cancelled` once per chunk.
pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);

    fn is_cancelled(&self) -> bool {
        false
    }
}

pub struct SilentProgress;

impl ProgressSink for SilentProgress {
    fn event(&self, _event: ProgressEvent) {}
}

/// Shared cancellation switch a UI can flip while a fetch is running.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Completeness {
    Complete,
    /// At least half succeeded.
    Partial,
    /// Fewer than half succeeded.
    Critical,
}

/// Per-session counters.
#[derive(Debug, Clone, Default)]
pub struct FetchProgress {
    total: usize,
    fetched: usize,
    succeeded: usize,
}

impl FetchProgress {
    pub fn new(total: usize) -> Self {
        Self {
            total,
            fetched: 0,
            succeeded: 0,
        }
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn fetched(&self) -> usize {
        self.fetched
    }

    pub fn succeeded(&self) -> usize {
        self.succeeded
    }

    pub fn record(&mut self, name: &str, success: bool, sink: &dyn ProgressSink) {
        self.fetched += 1;
        if success {
            self.succeeded += 1;
        }
        sink.event(ProgressEvent::Sequence {
            name: name.to_string(),
            success,
            fetched: self.fetched,
            total: self.total,
        });
    }

    pub fn completeness(&self) -> Completeness {
        if self.succeeded >= self.total {
            Completeness::Complete
        } else if self.succeeded * 2 < self.total {
            Completeness::Critical
        } else {
            Completeness::Partial
        }
    }

    /// Logs and reports a shortfall; never turns it into an error.
    pub fn report_shortfall(&self, method: &str, sink: &dyn ProgressSink) -> Completeness {
        let completeness = self.completeness();
        let message = format!(
            "{method}: fetched {} of {} sequences",
            self.succeeded, self.total
        );
        match completeness {
            Completeness::Complete => {}
            Completeness::Partial => {
                info!(method, succeeded = self.succeeded, total = self.total, "partial fetch");
                sink.event(ProgressEvent::Phase(message));
            }
            Completeness::Critical => {
                warn!(method, succeeded = self.succeeded, total = self.total, "most sequences were not found");
                sink.event(ProgressEvent::Warning(message));
            }
        }
        completeness
    }
}
