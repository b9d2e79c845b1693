use crate::config::FetchContext;
use crate::domain::SequenceRequest;
use crate::error::FetchError;
use crate::method::{FetchMethod, OutputFormat};
use crate::parser::{CompactParser, EmblParser, FastaParser, RecordParser};
use crate::progress::ProgressSink;
use crate::session::SessionOutcome;
use crate::store::SequenceStore;

/// A backend able to fetch one group of requests with one method.
pub trait SequenceFetcher: Send + Sync {
    fn fetch(
        &self,
        ctx: &FetchContext,
        method: &FetchMethod,
        requests: &[SequenceRequest],
        store: &mut SequenceStore,
        progress: &dyn ProgressSink,
    ) -> Result<SessionOutcome, FetchError>;
}

impl<T: SequenceFetcher + ?Sized> SequenceFetcher for &T {
    fn fetch(
        &self,
        ctx: &FetchContext,
        method: &FetchMethod,
        requests: &[SequenceRequest],
        store: &mut SequenceStore,
        progress: &dyn ProgressSink,
    ) -> Result<SessionOutcome, FetchError> {
        (**self).fetch(ctx, method, requests, store, progress)
    }
}

/// Stand-in for a backend that is not wired up.
#[derive(Debug, Clone, Copy)]
pub struct UnavailableFetcher {
    backend: &'static str,
}

impl UnavailableFetcher {
    pub fn new(backend: &'static str) -> Self {
        Self { backend }
    }
}

impl SequenceFetcher for UnavailableFetcher {
    fn fetch(
        &self,
        _ctx: &FetchContext,
        _method: &FetchMethod,
        _requests: &[SequenceRequest],
        _store: &mut SequenceStore,
        _progress: &dyn ProgressSink,
    ) -> Result<SessionOutcome, FetchError> {
        Err(FetchError::BackendUnavailable(self.backend.to_string()))
    }
}

/// Parser for pfetch-style responses, as served over the socket or an HTTP
/// proxy.
pub fn server_parser(
    method: &FetchMethod,
    requests: &[SequenceRequest],
) -> Result<Box<dyn RecordParser>, FetchError> {
    match method.format {
        OutputFormat::Embl => Ok(Box::new(EmblParser::new(requests.to_vec()))),
        OutputFormat::Fasta => Ok(Box::new(CompactParser::new(requests.to_vec()))),
        OutputFormat::Gff => Err(method.unsupported_format()),
    }
}

/// Parser for the output of a local fetch command.
pub fn command_parser(
    method: &FetchMethod,
    requests: &[SequenceRequest],
) -> Result<Box<dyn RecordParser>, FetchError> {
    match method.format {
        OutputFormat::Embl => Ok(Box::new(EmblParser::new(requests.to_vec()))),
        OutputFormat::Fasta => Ok(Box::new(FastaParser::new(requests.to_vec()))),
        OutputFormat::Gff => Err(method.unsupported_format()),
    }
}

pub(crate) fn wrong_mode(method: &FetchMethod, expected: &str) -> FetchError {
    FetchError::InvalidMethod {
        method: method.name.clone(),
        reason: format!("expected {expected} mode, found {}", method.mode.label()),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::method::{DatabaseParams, FetchMode};
    use crate::progress::SilentProgress;

    fn method(format: OutputFormat) -> FetchMethod {
        FetchMethod {
            name: "local-db".to_string(),
            format,
            mode: FetchMode::Database(DatabaseParams {
                location: "/data/seq.db".into(),
            }),
        }
    }

    #[test]
    fn unavailable_backend_reports_itself() {
        let method = method(OutputFormat::Embl);
        let ctx = FetchContext::with_methods(vec![method.clone()]);
        let err = UnavailableFetcher::new("database")
            .fetch(&ctx, &method, &[], &mut SequenceStore::new(), &SilentProgress)
            .unwrap_err();
        assert_matches!(err, FetchError::BackendUnavailable(name) if name == "database");
    }

    #[test]
    fn gff_has_no_parser() {
        let err = server_parser(&method(OutputFormat::Gff), &[]).err().unwrap();
        assert_matches!(err, FetchError::UnsupportedFormat { .. });
        assert!(command_parser(&method(OutputFormat::Fasta), &[]).is_ok());
    }
}
