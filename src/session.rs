use serde::Serialize;
use tracing::{debug, info};

use crate::connection::{Channel, ReadOutcome};
use crate::domain::{SequenceName, SequenceRequest};
use crate::error::{FetchError, ParseError};
use crate::parser::{Finalized, RecordParser};
use crate::progress::{Completeness, FetchProgress, ProgressEvent, ProgressSink};
use crate::store::SequenceStore;
use crate::wire::encode_request;

/// How one session over a channel ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionOutcome {
    pub requested: usize,
    pub fetched: usize,
    pub succeeded: usize,
    pub cancelled: bool,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub completeness: Completeness,
}

impl SessionOutcome {
    /// Outcome for a group with nothing to do.
    pub fn empty() -> Self {
        Self {
            requested: 0,
            fetched: 0,
            succeeded: 0,
            cancelled: false,
            bytes_sent: 0,
            bytes_received: 0,
            completeness: Completeness::Complete,
        }
    }
}

/// One request/response exchange: sends the request on a channel, then reads
/// caller-sized chunks into a parser until end of stream.
pub struct FetchSession<C: Channel, P: RecordParser> {
    channel: C,
    parser: P,
    chunk_size: usize,
    bytes_sent: u64,
    bytes_received: u64,
}

impl<C: Channel, P: RecordParser> FetchSession<C, P> {
    pub fn new(channel: C, parser: P, chunk_size: usize) -> Self {
        Self {
            channel,
            parser,
            chunk_size: chunk_size.max(1),
            bytes_sent: 0,
            bytes_received: 0,
        }
    }

    /// Sends one frame per token, then the terminator.
    pub fn send_request<'a>(
        &mut self,
        options: &str,
        names: impl IntoIterator<Item = &'a SequenceName>,
    ) -> Result<(), FetchError> {
        for frame in encode_request(options, names) {
            if let Err(err) = self.channel.send(&frame) {
                self.channel.shutdown();
                return Err(err.into());
            }
            self.bytes_sent += frame.len() as u64;
        }
        Ok(())
    }

    /// Counts bytes already delivered out of band (e.g. an HTTP form body).
    pub fn note_sent(&mut self, bytes: usize) {
        self.bytes_sent += bytes as u64;
    }

    pub fn run(
        mut self,
        requests: &[SequenceRequest],
        store: &mut SequenceStore,
        sink: &dyn ProgressSink,
        method: &str,
    ) -> Result<SessionOutcome, FetchError> {
        info!(method, sequences = requests.len(), "fetch session started");
        let mut progress = FetchProgress::new(requests.len());
        let mut buf = vec![0u8; self.chunk_size];
        let mut finalized = Vec::new();

        loop {
            if sink.is_cancelled() {
                self.parser.cancel();
                self.channel.shutdown();
                info!(method, fetched = progress.fetched(), "fetch session cancelled");
                sink.event(ProgressEvent::Phase(format!("{method}: cancelled")));
                return Ok(self.outcome(&progress, true));
            }

            match self.channel.read_chunk(&mut buf) {
                ReadOutcome::Received(count) => {
                    self.bytes_received += count as u64;
                    let fed = self.parser.feed(&buf[..count], &mut finalized);
                    Self::drain(&mut finalized, requests, store, &mut progress, sink);
                    if let Err(err) = fed {
                        self.channel.shutdown();
                        return Err(self.parse_failure(err));
                    }
                }
                ReadOutcome::EndOfStream => {
                    let finished = self.parser.finish(&mut finalized);
                    Self::drain(&mut finalized, requests, store, &mut progress, sink);
                    finished.map_err(|err| self.parse_failure(err))?;
                    break;
                }
                ReadOutcome::Error(cause) => {
                    self.channel.shutdown();
                    return Err(FetchError::Receive(cause));
                }
            }
        }

        self.channel.shutdown();
        let outcome = self.outcome(&progress, false);
        debug!(
            method,
            bytes_sent = outcome.bytes_sent,
            bytes_received = outcome.bytes_received,
            "session byte counts"
        );
        progress.report_shortfall(method, sink);
        info!(
            method,
            succeeded = outcome.succeeded,
            total = outcome.requested,
            "fetch session finished"
        );
        Ok(outcome)
    }

    /// Data past the last answered request breaks request ordering.
    fn parse_failure(&self, err: ParseError) -> FetchError {
        if self.parser.is_finished() {
            FetchError::Protocol(err.to_string())
        } else {
            FetchError::Parse(err)
        }
    }

    fn drain(
        finalized: &mut Vec<Finalized>,
        requests: &[SequenceRequest],
        store: &mut SequenceStore,
        progress: &mut FetchProgress,
        sink: &dyn ProgressSink,
    ) {
        for done in finalized.drain(..) {
            let success = done.succeeded();
            let name = requests
                .get(done.index)
                .map(|request| request.name.to_string())
                .unwrap_or_else(|| done.record.name.clone());
            debug!(sequence = %name, success, "record finalized");
            progress.record(&name, success, sink);
            store.merge(done.record);
        }
    }

    fn outcome(&self, progress: &FetchProgress, cancelled: bool) -> SessionOutcome {
        SessionOutcome {
            requested: progress.total(),
            fetched: progress.fetched(),
            succeeded: progress.succeeded(),
            cancelled,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            completeness: progress.completeness(),
        }
    }
}
