use crate::domain::{SeqKind, SequenceRecord, SequenceRequest};
use crate::error::ParseError;

use super::{Finalized, RecentBytes, RecordParser, finished_sequence, parse_error, text_field};

/// Feature-table qualifiers whose values are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureTag {
    TissueType,
    Strain,
}

impl FeatureTag {
    fn classify(name: &[u8]) -> Option<Self> {
        match name {
            b"tissue_type" => Some(FeatureTag::TissueType),
            b"strain" => Some(FeatureTag::Strain),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserState {
    AtLineStart,
    ReadingSectionId,
    SequenceHeader,
    SequenceBody,
    Organism,
    GeneName,
    FeatureType,
    FeatureTagName,
    FeatureUnquotedValue(FeatureTag),
    FeatureQuotedValue(FeatureTag),
    Ignore,
    Finished,
    Cancelled,
}

/// Side effect of a single transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    None,
    /// The record in progress ended; `no_match` marks the failure sentinel.
    RecordEnd { no_match: bool },
}

/// Where a quoted value stands after an embedded newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Continuation {
    Inline,
    /// Still inside the two-byte line id of a continuation line.
    SkipId(u8),
    SkipIndent,
}

#[derive(Debug, Default, Clone)]
struct RecordBuffer {
    sequence: Vec<u8>,
    organism: Vec<u8>,
    gene_name: Vec<u8>,
    tissue_type: Vec<u8>,
    strain: Vec<u8>,
}

impl RecordBuffer {
    fn tag_value(&mut self, tag: FeatureTag) -> &mut Vec<u8> {
        match tag {
            FeatureTag::TissueType => &mut self.tissue_type,
            FeatureTag::Strain => &mut self.strain,
        }
    }
}

/// Byte-level EMBL state machine. All position state lives in this struct,
/// so the stream may be split anywhere between calls to [`transition`].
///
/// [`transition`]: EmblMachine::transition
#[derive(Debug)]
pub struct EmblMachine {
    state: ParserState,
    section_id: [u8; 2],
    tag_name: Vec<u8>,
    found_end_quote: bool,
    continuation: Continuation,
    pending_space: bool,
    line_has_text: bool,
    /// Every request is answered but the current line is still being skipped.
    finish_after_line: bool,
    record: Option<RecordBuffer>,
}

impl EmblMachine {
    pub fn new() -> Self {
        Self {
            state: ParserState::AtLineStart,
            section_id: [0; 2],
            tag_name: Vec::new(),
            found_end_quote: false,
            continuation: Continuation::Inline,
            pending_space: false,
            line_has_text: false,
            finish_after_line: false,
            record: None,
        }
    }

    pub fn state(&self) -> ParserState {
        self.state
    }

    pub fn has_record(&self) -> bool {
        self.record.is_some()
    }

    /// Applies one byte. `kind` is the alphabet of the request in progress.
    pub fn transition(&mut self, byte: u8, kind: SeqKind) -> Result<Effect, &'static str> {
        loop {
            match self.state {
                ParserState::AtLineStart => {
                    if byte != b'\n' && byte != b'\r' {
                        self.record.get_or_insert_with(RecordBuffer::default);
                        self.section_id[0] = byte;
                        self.state = ParserState::ReadingSectionId;
                    }
                }
                ParserState::ReadingSectionId => {
                    if byte == b'\n' {
                        self.state = ParserState::AtLineStart;
                    } else {
                        self.section_id[1] = byte;
                        return Ok(self.enter_section());
                    }
                }
                ParserState::SequenceHeader => {
                    if byte == b'\n' {
                        self.state = ParserState::SequenceBody;
                    }
                }
                ParserState::SequenceBody => {
                    if byte == b'/' {
                        self.section_id[0] = byte;
                        self.state = ParserState::ReadingSectionId;
                    } else if let Some(residue) = kind.accept(byte) {
                        self.buffer().sequence.push(residue);
                    }
                }
                ParserState::Organism | ParserState::GeneName => self.header_text(byte),
                ParserState::FeatureType => match byte {
                    b'\n' => self.state = ParserState::AtLineStart,
                    b'/' => {
                        self.tag_name.clear();
                        self.state = ParserState::FeatureTagName;
                    }
                    _ => {}
                },
                ParserState::FeatureTagName => match byte {
                    b'=' => {
                        self.state = match FeatureTag::classify(&self.tag_name) {
                            Some(tag) => ParserState::FeatureUnquotedValue(tag),
                            None => ParserState::Ignore,
                        };
                    }
                    b'\n' => self.state = ParserState::AtLineStart,
                    _ => self.tag_name.push(byte),
                },
                ParserState::FeatureUnquotedValue(tag) => match byte {
                    b'"' => {
                        let value = self.buffer().tag_value(tag);
                        if !value.is_empty() {
                            value.extend_from_slice(b", ");
                        }
                        self.found_end_quote = false;
                        self.continuation = Continuation::Inline;
                        self.pending_space = false;
                        self.state = ParserState::FeatureQuotedValue(tag);
                    }
                    b'\n' => self.state = ParserState::AtLineStart,
                    _ => {}
                },
                ParserState::FeatureQuotedValue(tag) => {
                    if self.found_end_quote {
                        self.found_end_quote = false;
                        if byte == b'"' {
                            self.append_value(tag, b'"');
                            return Ok(Effect::None);
                        }
                        // The value really ended; this byte belongs to the feature line.
                        self.state = ParserState::FeatureType;
                        continue;
                    }
                    self.quoted_value(tag, byte);
                }
                ParserState::Ignore => {
                    if byte == b'\n' {
                        self.state = if std::mem::take(&mut self.finish_after_line) {
                            ParserState::Finished
                        } else {
                            ParserState::AtLineStart
                        };
                    }
                }
                ParserState::Finished => {
                    if !byte.is_ascii_whitespace() {
                        return Err("server returned more records than were requested");
                    }
                }
                ParserState::Cancelled => {}
            }
            return Ok(Effect::None);
        }
    }

    /// Marks every request answered; later bytes must be whitespace. A line
    /// being skipped (the rest of `no match`, or of an `SQ` line) runs to its
    /// newline first.
    pub fn finish_all(&mut self) {
        match self.state {
            ParserState::Cancelled => {}
            ParserState::Ignore => self.finish_after_line = true,
            _ => self.state = ParserState::Finished,
        }
    }

    /// End of stream: nothing more can arrive.
    pub fn end_of_stream(&mut self) {
        self.finish_after_line = false;
        if self.state != ParserState::Cancelled {
            self.state = ParserState::Finished;
        }
    }

    pub fn cancel(&mut self) {
        self.state = ParserState::Cancelled;
    }

    fn enter_section(&mut self) -> Effect {
        self.line_has_text = false;
        let id = self.section_id;
        match &id {
            b"SQ" => {
                if self.buffer().sequence.is_empty() {
                    self.state = ParserState::SequenceHeader;
                } else {
                    self.state = ParserState::Ignore;
                    return Effect::RecordEnd { no_match: false };
                }
            }
            b"OS" => self.state = ParserState::Organism,
            b"GN" => self.state = ParserState::GeneName,
            b"FT" => self.state = ParserState::FeatureType,
            b"//" => {
                self.state = ParserState::Ignore;
                return Effect::RecordEnd { no_match: false };
            }
            id if id.eq_ignore_ascii_case(b"no") => {
                self.state = ParserState::Ignore;
                return Effect::RecordEnd { no_match: true };
            }
            _ => self.state = ParserState::Ignore,
        }
        Effect::None
    }

    fn header_text(&mut self, byte: u8) {
        if byte == b'\n' {
            self.state = ParserState::AtLineStart;
            return;
        }
        if byte == b'\r' || (!self.line_has_text && byte.is_ascii_whitespace()) {
            return;
        }
        let organism = self.state == ParserState::Organism;
        let first_on_line = !self.line_has_text;
        self.line_has_text = true;
        let buffer = self.buffer();
        let field = if organism {
            &mut buffer.organism
        } else {
            &mut buffer.gene_name
        };
        if first_on_line && !field.is_empty() {
            field.push(b' ');
        }
        field.push(byte);
    }

    fn quoted_value(&mut self, tag: FeatureTag, byte: u8) {
        match self.continuation {
            Continuation::SkipId(remaining) => {
                self.continuation = if remaining > 1 {
                    Continuation::SkipId(remaining - 1)
                } else {
                    Continuation::SkipIndent
                };
                return;
            }
            Continuation::SkipIndent if byte.is_ascii_whitespace() => return,
            Continuation::SkipIndent => {
                self.continuation = Continuation::Inline;
                self.pending_space = true;
            }
            Continuation::Inline => {}
        }
        match byte {
            b'\n' => self.continuation = Continuation::SkipId(2),
            b'\r' => {}
            b'"' => self.found_end_quote = true,
            _ => self.append_value(tag, byte),
        }
    }

    fn append_value(&mut self, tag: FeatureTag, byte: u8) {
        let pending_space = std::mem::take(&mut self.pending_space);
        let value = self.buffer().tag_value(tag);
        if pending_space {
            value.push(b' ');
        }
        value.push(byte);
    }

    fn buffer(&mut self) -> &mut RecordBuffer {
        self.record.get_or_insert_with(RecordBuffer::default)
    }

    fn take_record(&mut self) -> RecordBuffer {
        self.record.take().unwrap_or_default()
    }
}

impl Default for EmblMachine {
    fn default() -> Self {
        Self::new()
    }
}

/// Full-record parser: drives [`EmblMachine`] and finalizes one record per
/// request, in request order.
#[derive(Debug)]
pub struct EmblParser {
    requests: Vec<SequenceRequest>,
    current: usize,
    machine: EmblMachine,
    recent: RecentBytes,
}

impl EmblParser {
    pub fn new(requests: Vec<SequenceRequest>) -> Self {
        let mut machine = EmblMachine::new();
        if requests.is_empty() {
            machine.finish_all();
        }
        Self {
            requests,
            current: 0,
            machine,
            recent: RecentBytes::default(),
        }
    }

    pub fn state(&self) -> ParserState {
        self.machine.state()
    }

    fn complete(&mut self, no_match: bool, out: &mut Vec<Finalized>) {
        let buffer = self.machine.take_record();
        let Some(request) = self.requests.get(self.current) else {
            return;
        };
        let mut record = SequenceRecord::named(request.name.as_str());
        if !no_match {
            record.sequence = finished_sequence(request, buffer.sequence);
        }
        record.organism = text_field(&buffer.organism);
        record.gene_name = text_field(&buffer.gene_name);
        record.tissue_type = text_field(&buffer.tissue_type);
        record.strain = text_field(&buffer.strain);
        out.push(Finalized {
            index: self.current,
            record,
        });

        self.current += 1;
        if self.current == self.requests.len() {
            self.machine.finish_all();
        }
    }
}

impl RecordParser for EmblParser {
    fn feed(&mut self, chunk: &[u8], out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        for &byte in chunk {
            if self.machine.state() == ParserState::Cancelled {
                return Ok(());
            }
            self.recent.push(byte);
            let kind = self
                .requests
                .get(self.current)
                .map(|request| request.kind)
                .unwrap_or(SeqKind::Nucleotide);
            let state = self.machine.state();
            match self.machine.transition(byte, kind) {
                Ok(Effect::None) => {}
                Ok(Effect::RecordEnd { no_match }) => self.complete(no_match, out),
                Err(message) => {
                    return Err(parse_error(
                        message,
                        byte,
                        state,
                        self.requests.get(self.current),
                        &self.recent,
                    ));
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<Finalized>) -> Result<(), ParseError> {
        if self.machine.state() == ParserState::Cancelled {
            return Ok(());
        }
        if self.machine.has_record() && self.current < self.requests.len() {
            self.complete(false, out);
        }
        self.machine.end_of_stream();
        Ok(())
    }

    fn cancel(&mut self) {
        self.machine.cancel();
    }

    fn is_cancelled(&self) -> bool {
        self.machine.state() == ParserState::Cancelled
    }

    fn is_finished(&self) -> bool {
        self.current >= self.requests.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nucleotide(names: &[&str]) -> Vec<SequenceRequest> {
        names
            .iter()
            .map(|name| SequenceRequest::new(name.parse().unwrap(), SeqKind::Nucleotide))
            .collect()
    }

    fn feed_bytes(machine: &mut EmblMachine, bytes: &[u8]) -> Vec<Effect> {
        bytes
            .iter()
            .map(|byte| machine.transition(*byte, SeqKind::Nucleotide).unwrap())
            .filter(|effect| *effect != Effect::None)
            .collect()
    }

    #[test]
    fn section_ids_drive_state() {
        let mut machine = EmblMachine::new();
        feed_bytes(&mut machine, b"OS");
        assert_eq!(machine.state(), ParserState::Organism);
        feed_bytes(&mut machine, b"   Homo sapiens\nFT");
        assert_eq!(machine.state(), ParserState::FeatureType);
        feed_bytes(&mut machine, b"   source  1..10\nXX");
        assert_eq!(machine.state(), ParserState::Ignore);
        feed_bytes(&mut machine, b"\nSQ");
        assert_eq!(machine.state(), ParserState::SequenceHeader);
        feed_bytes(&mut machine, b"   Sequence 10 BP;\n");
        assert_eq!(machine.state(), ParserState::SequenceBody);
    }

    #[test]
    fn terminator_and_sentinel_end_records() {
        let mut machine = EmblMachine::new();
        let effects = feed_bytes(&mut machine, b"SQ   x\n     acgt 4\n//\nno match\n");
        assert_eq!(
            effects,
            vec![
                Effect::RecordEnd { no_match: false },
                Effect::RecordEnd { no_match: true }
            ]
        );
    }

    #[test]
    fn tag_values_wait_for_opening_quote() {
        let mut machine = EmblMachine::new();
        feed_bytes(&mut machine, b"FT   source 1..5\nFT        /strain=");
        assert_eq!(
            machine.state(),
            ParserState::FeatureUnquotedValue(FeatureTag::Strain)
        );
        feed_bytes(&mut machine, b"\"K12");
        assert_eq!(
            machine.state(),
            ParserState::FeatureQuotedValue(FeatureTag::Strain)
        );
        feed_bytes(&mut machine, b"\"\n");
        assert_eq!(machine.state(), ParserState::AtLineStart);
    }

    #[test]
    fn unknown_tags_are_ignored() {
        let mut machine = EmblMachine::new();
        feed_bytes(&mut machine, b"FT        /note=");
        assert_eq!(machine.state(), ParserState::Ignore);
    }

    #[test]
    fn sq_after_populated_sequence_finalizes_record() {
        let mut machine = EmblMachine::new();
        let effects = feed_bytes(&mut machine, b"SQ\nacgt/x\nSQ");
        assert_eq!(effects, vec![Effect::RecordEnd { no_match: false }]);
        assert_eq!(machine.state(), ParserState::Ignore);
    }

    #[test]
    fn last_sentinel_skips_rest_of_line_before_finishing() {
        let mut parser = EmblParser::new(nucleotide(&["A"]));
        let mut out = Vec::new();
        parser.feed(b"no match", &mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert!(!out[0].succeeded());
        assert_eq!(parser.state(), ParserState::Ignore);
        parser.feed(b"\n\n", &mut out).unwrap();
        assert_eq!(parser.state(), ParserState::Finished);
    }

    #[test]
    fn line_after_last_sentinel_is_surplus() {
        let mut parser = EmblParser::new(nucleotide(&["A"]));
        let err = parser
            .feed(b"no match\nno match\n", &mut Vec::new())
            .unwrap_err();
        assert_eq!(err.byte, 'n');
        assert_eq!(err.state, "Finished");
    }

    #[test]
    fn end_of_stream_completes_record_in_progress() {
        let mut parser = EmblParser::new(nucleotide(&["A"]));
        let mut out = Vec::new();
        parser.feed(b"SQ   Sequence\n     acgtn", &mut out).unwrap();
        assert!(out.is_empty());
        parser.finish(&mut out).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].record.sequence.as_deref(), Some("acgtn"));
        assert_eq!(parser.state(), ParserState::Finished);
    }

    #[test]
    fn surplus_record_is_an_error() {
        let mut parser = EmblParser::new(nucleotide(&["A"]));
        let err = parser
            .feed(b"SQ\n acgt\n//\nID   extra\n", &mut Vec::new())
            .unwrap_err();
        assert!(err.message.contains("more records"));
        assert_eq!(err.byte, 'I');
        assert_eq!(err.state, "Finished");
    }

    #[test]
    fn cancel_stops_consumption() {
        let mut parser = EmblParser::new(nucleotide(&["A"]));
        parser.cancel();
        let mut out = Vec::new();
        parser.feed(b"SQ\n acgt\n//\n", &mut out).unwrap();
        parser.finish(&mut out).unwrap();
        assert!(out.is_empty());
        assert_eq!(parser.state(), ParserState::Cancelled);
    }
}
