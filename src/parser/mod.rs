//! Incremental record parsers.
//!
//! Parsers are fed whatever chunk a read produced and keep every piece of
//! position state in their own fields, so a record may be split across
//! reads at any byte.

mod compact;
mod embl;
mod fasta;

use std::collections::VecDeque;
use std::fmt;

pub use compact::CompactParser;
pub use embl::{EmblMachine, EmblParser, Effect, FeatureTag, ParserState};
pub use fasta::FastaParser;

use crate::domain::{SequenceRecord, SequenceRequest};
use crate::error::ParseError;
use crate::iupac::complement_in_place;

/// Literal the server sends in place of a record it cannot find.
pub const NO_MATCH: &[u8] = b"no match";

const CONTEXT_BYTES: usize = 48;

/// A completed record for the request at `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finalized {
    pub index: usize,
    pub record: SequenceRecord,
}

impl Finalized {
    pub fn succeeded(&self) -> bool {
        self.record.has_sequence()
    }
}

pub trait RecordParser {
    /// Consumes one chunk, pushing every record completed within it.
    fn feed(&mut self, chunk: &[u8], out: &mut Vec<Finalized>) -> Result<(), ParseError>;

    /// Called once at end of stream; completes a record still in progress.
    fn finish(&mut self, out: &mut Vec<Finalized>) -> Result<(), ParseError>;

    fn cancel(&mut self);

    fn is_cancelled(&self) -> bool;

    /// True once every request has been answered.
    fn is_finished(&self) -> bool;
}

impl<P: RecordParser + ?Sized> RecordParser for Box<P> {
    fn feed(&mut self, chunk: &[u8], out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        (**self).feed(chunk, out)
    }

    fn finish(&mut self, out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        (**self).finish(out)
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }
}

impl<P: RecordParser + ?Sized> RecordParser for &mut P {
    fn feed(&mut self, chunk: &[u8], out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        (**self).feed(chunk, out)
    }

    fn finish(&mut self, out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        (**self).finish(out)
    }

    fn cancel(&mut self) {
        (**self).cancel()
    }

    fn is_cancelled(&self) -> bool {
        (**self).is_cancelled()
    }

    fn is_finished(&self) -> bool {
        (**self).is_finished()
    }
}

/// Builds the stored record from raw accumulated residues.
pub(crate) fn finished_sequence(request: &SequenceRequest, mut residues: Vec<u8>) -> Option<String> {
    if residues.is_empty() || residues.eq_ignore_ascii_case(NO_MATCH) {
        return None;
    }
    if request.needs_complement() {
        complement_in_place(&mut residues);
    }
    Some(residues.into_iter().map(char::from).collect())
}

pub(crate) fn text_field(bytes: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(bytes).trim().to_string();
    (!text.is_empty()).then_some(text)
}

/// The last bytes seen, quoted in parse errors.
#[derive(Debug, Default)]
pub(crate) struct RecentBytes {
    bytes: VecDeque<u8>,
}

impl RecentBytes {
    pub(crate) fn push(&mut self, byte: u8) {
        if self.bytes.len() == CONTEXT_BYTES {
            self.bytes.pop_front();
        }
        self.bytes.push_back(byte);
    }
}

impl fmt::Display for RecentBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (front, back) = self.bytes.as_slices();
        write!(
            f,
            "{}{}",
            String::from_utf8_lossy(front),
            String::from_utf8_lossy(back)
        )
    }
}

pub(crate) fn parse_error(
    message: impl Into<String>,
    byte: u8,
    state: impl fmt::Debug,
    request: Option<&SequenceRequest>,
    recent: &RecentBytes,
) -> ParseError {
    ParseError {
        message: message.into(),
        byte: char::from(byte),
        state: format!("{state:?}"),
        sequence: request
            .map(|request| request.name.to_string())
            .unwrap_or_else(|| "<no pending request>".to_string()),
        context: recent.to_string(),
    }
}
