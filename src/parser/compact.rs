use crate::domain::{SequenceRecord, SequenceRequest};
use crate::error::ParseError;

use super::{Finalized, NO_MATCH, RecentBytes, RecordParser, finished_sequence, parse_error};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompactState {
    Reading,
    Finished,
    Cancelled,
}

/// Parser for compact responses: one line per request, holding either the
/// residues or the literal `no match`.
#[derive(Debug)]
pub struct CompactParser {
    requests: Vec<SequenceRequest>,
    current: usize,
    /// Bytes of the current line not yet finalized; carried across chunks.
    fragment: Vec<u8>,
    /// The fragment is still a prefix of `no match` and has not been validated.
    sentinel_candidate: bool,
    state: CompactState,
    recent: RecentBytes,
}

impl CompactParser {
    pub fn new(requests: Vec<SequenceRequest>) -> Self {
        let state = if requests.is_empty() {
            CompactState::Finished
        } else {
            CompactState::Reading
        };
        Self {
            requests,
            current: 0,
            fragment: Vec::new(),
            sentinel_candidate: false,
            state,
            recent: RecentBytes::default(),
        }
    }

    /// Bytes carried over from an unfinished line.
    pub fn fragment(&self) -> &[u8] {
        &self.fragment
    }

    fn consume(&mut self, byte: u8, out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        match byte {
            b'\n' => self.end_line(out),
            b'\r' => Ok(()),
            _ if self.state == CompactState::Finished => Err(self.error(
                "server returned more records than were requested",
                byte,
            )),
            _ if self.fragment.is_empty() => {
                self.sentinel_candidate = true;
                self.fragment.push(byte);
                self.settle_candidate()
            }
            _ if self.sentinel_candidate => {
                self.fragment.push(byte);
                self.settle_candidate()
            }
            _ => self.push_residue(byte),
        }
    }

    /// Validates the held bytes once they can no longer spell `no match`.
    fn settle_candidate(&mut self) -> Result<(), ParseError> {
        if is_sentinel_prefix(&self.fragment) {
            return Ok(());
        }
        self.validate_held()
    }

    fn validate_held(&mut self) -> Result<(), ParseError> {
        self.sentinel_candidate = false;
        let held = std::mem::take(&mut self.fragment);
        for held_byte in held {
            self.push_residue(held_byte)?;
        }
        Ok(())
    }

    fn push_residue(&mut self, byte: u8) -> Result<(), ParseError> {
        let kind = self.requests[self.current].kind;
        match kind.accept(byte) {
            Some(residue) => {
                self.fragment.push(residue);
                Ok(())
            }
            None => Err(self.error("invalid sequence character", byte)),
        }
    }

    fn end_line(&mut self, out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        if self.state != CompactState::Reading {
            return Ok(());
        }
        let is_sentinel =
            self.sentinel_candidate && self.fragment.eq_ignore_ascii_case(NO_MATCH);
        if self.sentinel_candidate && !is_sentinel {
            self.validate_held()?;
        }

        let request = &self.requests[self.current];
        let mut record = SequenceRecord::named(request.name.as_str());
        let residues = std::mem::take(&mut self.fragment);
        if !is_sentinel {
            record.sequence = finished_sequence(request, residues);
        }
        out.push(Finalized {
            index: self.current,
            record,
        });

        self.sentinel_candidate = false;
        self.current += 1;
        if self.current == self.requests.len() {
            self.state = CompactState::Finished;
        }
        Ok(())
    }

    fn error(&self, message: &str, byte: u8) -> ParseError {
        parse_error(
            message,
            byte,
            self.state,
            self.requests.get(self.current),
            &self.recent,
        )
    }
}

impl RecordParser for CompactParser {
    fn feed(&mut self, chunk: &[u8], out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        if self.state == CompactState::Cancelled {
            return Ok(());
        }
        for &byte in chunk {
            self.recent.push(byte);
            self.consume(byte, out)?;
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        if self.state == CompactState::Reading && !self.fragment.is_empty() {
            self.end_line(out)?;
        }
        if self.state != CompactState::Cancelled {
            self.state = CompactState::Finished;
        }
        Ok(())
    }

    fn cancel(&mut self) {
        self.state = CompactState::Cancelled;
    }

    fn is_cancelled(&self) -> bool {
        self.state == CompactState::Cancelled
    }

    fn is_finished(&self) -> bool {
        self.current >= self.requests.len()
    }
}

fn is_sentinel_prefix(bytes: &[u8]) -> bool {
    bytes.len() <= NO_MATCH.len() && NO_MATCH[..bytes.len()].eq_ignore_ascii_case(bytes)
}
