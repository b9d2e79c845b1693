use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::FetchContext;
use crate::domain::SequenceRequest;
use crate::error::FetchError;
use crate::fetcher::SequenceFetcher;
use crate::method::{FetchMethod, FetchMode};
use crate::progress::{Completeness, ProgressEvent, ProgressSink};
use crate::session::SessionOutcome;
use crate::store::SequenceStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodStatus {
    Ok,
    Failed,
    Skipped,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
pub struct MethodOutcome {
    pub attempt: usize,
    pub method: String,
    pub mode: String,
    pub sequences: usize,
    pub status: MethodStatus,
    pub succeeded: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completeness: Option<Completeness>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FetchReport {
    pub started_at: DateTime<Utc>,
    pub success: bool,
    pub cancelled: bool,
    pub attempts: usize,
    pub requested: usize,
    pub fetched: usize,
    pub missing: Vec<String>,
    pub methods: Vec<MethodOutcome>,
    pub warnings: Vec<String>,
    pub bytes_sent: u64,
    pub bytes_received: u64,
}

impl FetchReport {
    fn new(requested: usize) -> Self {
        Self {
            started_at: Utc::now(),
            success: false,
            cancelled: false,
            attempts: 0,
            requested,
            fetched: 0,
            missing: Vec::new(),
            methods: Vec::new(),
            warnings: Vec::new(),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }
}

/// Requests that share the same method at one attempt.
#[derive(Debug)]
pub struct RetryGroup<'a> {
    pub method: &'a FetchMethod,
    pub requests: Vec<SequenceRequest>,
}

/// Groups the requests still missing a sequence by the method their source
/// assigns at `attempt`, in first-seen method order. Requests whose method
/// list is exhausted are dropped.
pub fn retry_groups<'a>(
    ctx: &'a FetchContext,
    attempt: usize,
    requests: &[SequenceRequest],
    store: &SequenceStore,
) -> Vec<RetryGroup<'a>> {
    let mut groups: Vec<RetryGroup<'a>> = Vec::new();
    for request in requests.iter().filter(|request| store.needs_sequence(request)) {
        let Some(method) = ctx.method_at(request.source.as_deref(), attempt) else {
            continue;
        };
        match groups.iter_mut().find(|group| group.method.name == method.name) {
            Some(group) => group.requests.push(request.clone()),
            None => groups.push(RetryGroup {
                method,
                requests: vec![request.clone()],
            }),
        }
    }
    groups
}

/// Drives a bulk fetch across the configured methods, falling back per source
/// until every request has a sequence or no method is left.
pub struct Orchestrator<S, H, C, D>
where
    S: SequenceFetcher,
    H: SequenceFetcher,
    C: SequenceFetcher,
    D: SequenceFetcher,
{
    socket: S,
    http: H,
    command: C,
    database: D,
}

impl<S, H, C, D> Orchestrator<S, H, C, D>
where
    S: SequenceFetcher,
    H: SequenceFetcher,
    C: SequenceFetcher,
    D: SequenceFetcher,
{
    pub fn new(socket: S, http: H, command: C, database: D) -> Self {
        Self {
            socket,
            http,
            command,
            database,
        }
    }

    pub fn bulk_fetch(
        &self,
        ctx: &FetchContext,
        requests: &[SequenceRequest],
        store: &mut SequenceStore,
        progress: &dyn ProgressSink,
    ) -> Result<FetchReport, FetchError> {
        let mut report = FetchReport::new(requests.len());
        let mut failures = Vec::new();
        let mut any_success = false;

        'attempts: for attempt in 0..ctx.max_attempts() {
            let groups = retry_groups(ctx, attempt, requests, store);
            if groups.is_empty() {
                break;
            }
            report.attempts = attempt + 1;
            info!(attempt = attempt + 1, groups = groups.len(), "fetch attempt");

            for group in groups {
                if progress.is_cancelled() {
                    report.cancelled = true;
                    break 'attempts;
                }
                let method = group.method;
                let count = group.requests.len();
                let mut outcome = MethodOutcome {
                    attempt: attempt + 1,
                    method: method.name.clone(),
                    mode: method.mode.label().to_string(),
                    sequences: count,
                    status: MethodStatus::Skipped,
                    succeeded: 0,
                    completeness: None,
                    error: None,
                };

                if matches!(method.mode, FetchMode::None) {
                    report.methods.push(outcome);
                    continue;
                }

                progress.event(ProgressEvent::Phase(format!(
                    "fetching {count} sequences with {method}"
                )));
                match self.dispatch(ctx, method, &group.requests, store, progress) {
                    Ok(session) => {
                        any_success = true;
                        report.bytes_sent += session.bytes_sent;
                        report.bytes_received += session.bytes_received;
                        outcome.succeeded = session.succeeded;
                        outcome.completeness = Some(session.completeness);
                        outcome.status = if session.cancelled {
                            MethodStatus::Cancelled
                        } else {
                            MethodStatus::Ok
                        };
                        report.methods.push(outcome);
                        if session.cancelled {
                            report.cancelled = true;
                            break 'attempts;
                        }
                    }
                    Err(err) if err.is_fatal() => return Err(err),
                    Err(err) => {
                        let message =
                            format!("method {} failed for {count} sequences: {err}", method.name);
                        warn!(method = %method.name, sequences = count, error = %err, "fetch method failed");
                        progress.event(ProgressEvent::Warning(message.clone()));
                        outcome.status = MethodStatus::Failed;
                        outcome.error = Some(err.to_string());
                        report.methods.push(outcome);
                        failures.push(message);
                    }
                }
            }
        }

        report.missing = requests
            .iter()
            .filter(|request| store.needs_sequence(request))
            .map(|request| request.name.to_string())
            .collect();
        report.fetched = requests.len() - report.missing.len();

        if !any_success && !report.cancelled {
            if !failures.is_empty() {
                return Err(FetchError::AllMethodsFailed(failures.join("; ")));
            }
            if !report.missing.is_empty() {
                return Err(FetchError::AllMethodsFailed(format!(
                    "no usable fetch method for {} sequences",
                    report.missing.len()
                )));
            }
        }

        report.success = any_success || report.missing.is_empty();
        report.warnings = failures;
        info!(
            fetched = report.fetched,
            requested = report.requested,
            attempts = report.attempts,
            cancelled = report.cancelled,
            "bulk fetch finished"
        );
        Ok(report)
    }

    fn dispatch(
        &self,
        ctx: &FetchContext,
        method: &FetchMethod,
        requests: &[SequenceRequest],
        store: &mut SequenceStore,
        progress: &dyn ProgressSink,
    ) -> Result<SessionOutcome, FetchError> {
        match &method.mode {
            FetchMode::Socket(_) => self.socket.fetch(ctx, method, requests, store, progress),
            FetchMode::Http(_) => self.http.fetch(ctx, method, requests, store, progress),
            FetchMode::Command(_) => self.command.fetch(ctx, method, requests, store, progress),
            FetchMode::Database(_) => self.database.fetch(ctx, method, requests, store, progress),
            FetchMode::None => Ok(SessionOutcome::empty()),
        }
    }
}
