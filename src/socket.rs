use tracing::debug;

use crate::config::FetchContext;
use crate::connection::Connection;
use crate::domain::SequenceRequest;
use crate::error::FetchError;
use crate::fetcher::{SequenceFetcher, server_parser, wrong_mode};
use crate::method::{FetchMethod, FetchMode};
use crate::progress::ProgressSink;
use crate::session::{FetchSession, SessionOutcome};
use crate::store::SequenceStore;

/// Talks the pfetch line protocol directly over TCP.
#[derive(Debug, Clone, Copy, Default)]
pub struct SocketFetcher;

impl SequenceFetcher for SocketFetcher {
    fn fetch(
        &self,
        ctx: &FetchContext,
        method: &FetchMethod,
        requests: &[SequenceRequest],
        store: &mut SequenceStore,
        progress: &dyn ProgressSink,
    ) -> Result<SessionOutcome, FetchError> {
        let FetchMode::Socket(params) = &method.mode else {
            return Err(wrong_mode(method, "socket"));
        };
        if requests.is_empty() {
            return Ok(SessionOutcome::empty());
        }

        let options = method.request_options()?;
        let parser = server_parser(method, requests)?;
        let connection = Connection::open(&params.host, params.port)?;
        debug!(peer = %connection.peer(), options, "sending request");

        let mut session = FetchSession::new(connection, parser, ctx.chunk_size);
        session.send_request(options, requests.iter().map(|request| &request.name))?;
        session.run(requests, store, progress, &method.name)
    }
}
