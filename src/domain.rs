use std::fmt;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::FetchError;
pub use crate::iupac::SeqKind;

/// A sequence name as sent to the server. Names are single wire tokens, so
/// whitespace is never allowed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceName(String);

impl SequenceName {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SequenceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SequenceName {
    type Err = FetchError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && trimmed
                .bytes()
                .all(|byte| byte.is_ascii_graphic() && byte != b'"');
        if !is_valid {
            return Err(FetchError::InvalidSequenceName(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Strand {
    #[default]
    Forward,
    Reverse,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceRequest {
    pub name: SequenceName,
    pub kind: SeqKind,
    pub strand: Strand,
    pub source: Option<String>,
}

impl SequenceRequest {
    pub fn new(name: SequenceName, kind: SeqKind) -> Self {
        Self {
            name,
            kind,
            strand: Strand::Forward,
            source: None,
        }
    }

    pub fn with_strand(mut self, strand: Strand) -> Self {
        self.strand = strand;
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Reverse-strand nucleotide records are stored complemented.
    pub fn needs_complement(&self) -> bool {
        self.strand == Strand::Reverse && self.kind == SeqKind::Nucleotide
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct SequenceRecord {
    pub name: String,
    pub sequence: Option<String>,
    pub organism: Option<String>,
    pub gene_name: Option<String>,
    pub tissue_type: Option<String>,
    pub strain: Option<String>,
}

impl SequenceRecord {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn has_sequence(&self) -> bool {
        self.sequence
            .as_deref()
            .map(|seq| !seq.is_empty())
            .unwrap_or(false)
    }

    pub fn has_metadata(&self) -> bool {
        self.organism.is_some()
            || self.gene_name.is_some()
            || self.tissue_type.is_some()
            || self.strain.is_some()
    }
}
