use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

use crate::domain::{SequenceRecord, SequenceRequest};
use crate::error::ParseError;

use super::{Finalized, RecentBytes, RecordParser, finished_sequence, parse_error};

fn header_regex() -> &'static Regex {
    static HEADER: OnceLock<Regex> = OnceLock::new();
    HEADER.get_or_init(|| {
        Regex::new(r"^>\s*(?:[A-Za-z]{2,3}\|)?(?P<accession>[^\s|]+)")
            .expect("valid FASTA header regex")
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FastaState {
    Reading,
    Finished,
    Cancelled,
}

/// Multi-record FASTA parser for command backends. Records are matched to
/// requests by accession, so the output order does not need to follow the
/// request order; headers that match no request are skipped.
#[derive(Debug)]
pub struct FastaParser {
    requests: Vec<SequenceRequest>,
    by_name: HashMap<String, usize>,
    answered: Vec<bool>,
    line: Vec<u8>,
    current: Option<(usize, Vec<u8>)>,
    skipping: bool,
    state: FastaState,
    recent: RecentBytes,
}

impl FastaParser {
    pub fn new(requests: Vec<SequenceRequest>) -> Self {
        let by_name = requests
            .iter()
            .enumerate()
            .map(|(index, request)| (request.name.as_str().to_string(), index))
            .collect();
        let answered = vec![false; requests.len()];
        Self {
            requests,
            by_name,
            answered,
            line: Vec::new(),
            current: None,
            skipping: false,
            state: FastaState::Reading,
            recent: RecentBytes::default(),
        }
    }

    fn end_line(&mut self, out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        let line = std::mem::take(&mut self.line);
        if line.first() == Some(&b'>') {
            self.complete(out);
            let header = String::from_utf8_lossy(&line);
            let index = header_regex()
                .captures(&header)
                .and_then(|caps| caps.name("accession"))
                .and_then(|accession| self.lookup(accession.as_str()));
            match index {
                Some(index) => {
                    self.current = Some((index, Vec::new()));
                    self.skipping = false;
                }
                None => self.skipping = true,
            }
            return Ok(());
        }
        if self.skipping {
            return Ok(());
        }
        let Some((index, residues)) = self.current.as_mut() else {
            if line.iter().all(u8::is_ascii_whitespace) {
                return Ok(());
            }
            return Err(parse_error(
                "sequence data before the first FASTA header",
                line[0],
                self.state,
                None,
                &self.recent,
            ));
        };
        let kind = self.requests[*index].kind;
        for byte in line {
            if byte.is_ascii_whitespace() {
                continue;
            }
            match kind.accept(byte) {
                Some(residue) => residues.push(residue),
                None => {
                    return Err(parse_error(
                        "invalid sequence character",
                        byte,
                        self.state,
                        self.requests.get(*index),
                        &self.recent,
                    ));
                }
            }
        }
        Ok(())
    }

    /// Exact name first, then the name without a version suffix.
    fn lookup(&self, accession: &str) -> Option<usize> {
        self.by_name.get(accession).copied().or_else(|| {
            self.requests.iter().position(|request| {
                request
                    .name
                    .as_str()
                    .split_once('.')
                    .map(|(stem, _)| stem == accession)
                    .unwrap_or(false)
            })
        })
    }

    fn complete(&mut self, out: &mut Vec<Finalized>) {
        let Some((index, residues)) = self.current.take() else {
            return;
        };
        if self.answered[index] {
            return;
        }
        self.answered[index] = true;
        let request = &self.requests[index];
        let mut record = SequenceRecord::named(request.name.as_str());
        record.sequence = finished_sequence(request, residues);
        out.push(Finalized { index, record });
    }
}

impl RecordParser for FastaParser {
    fn feed(&mut self, chunk: &[u8], out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        if self.state == FastaState::Cancelled {
            return Ok(());
        }
        for &byte in chunk {
            self.recent.push(byte);
            match byte {
                b'\n' => self.end_line(out)?,
                b'\r' => {}
                _ => self.line.push(byte),
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        if self.state == FastaState::Cancelled {
            return Ok(());
        }
        if !self.line.is_empty() {
            self.end_line(out)?;
        }
        self.complete(out);
        self.state = FastaState::Finished;
        Ok(())
    }

    fn cancel(&mut self) {
        self.state = FastaState::Cancelled;
    }

    fn is_cancelled(&self) -> bool {
        self.state == FastaState::Cancelled
    }

    fn is_finished(&self) -> bool {
        self.answered.iter().all(|answered| *answered)
    }
}
