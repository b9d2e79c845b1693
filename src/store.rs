use std::collections::HashMap;
use std::fs;
use std::io::Write;

use camino::Utf8Path;

use crate::domain::{SequenceRecord, SequenceRequest};
use crate::error::FetchError;

const FASTA_LINE_WIDTH: usize = 60;

/// Caller-side store of fetched records, keyed by sequence name and kept in
/// first-insertion order.
#[derive(Debug, Clone, Default)]
pub struct SequenceStore {
    order: Vec<String>,
    records: HashMap<String, SequenceRecord>,
}

impl SequenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Takes ownership of a finalized record. Fields already present are
    /// kept, so a fallback method only fills gaps.
    pub fn merge(&mut self, record: SequenceRecord) {
        match self.records.get_mut(&record.name) {
            Some(existing) => {
                fill(&mut existing.sequence, record.sequence);
                fill(&mut existing.organism, record.organism);
                fill(&mut existing.gene_name, record.gene_name);
                fill(&mut existing.tissue_type, record.tissue_type);
                fill(&mut existing.strain, record.strain);
            }
            None => {
                self.order.push(record.name.clone());
                self.records.insert(record.name.clone(), record);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&SequenceRecord> {
        self.records.get(name)
    }

    pub fn needs_sequence(&self, request: &SequenceRequest) -> bool {
        !self
            .records
            .get(request.name.as_str())
            .map(SequenceRecord::has_sequence)
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn records(&self) -> impl Iterator<Item = &SequenceRecord> {
        self.order.iter().filter_map(|name| self.records.get(name))
    }

    pub fn to_fasta(&self) -> String {
        let mut out = String::new();
        for record in self.records() {
            let Some(sequence) = record.sequence.as_deref() else {
                continue;
            };
            out.push('>');
            out.push_str(&record.name);
            if let Some(organism) = &record.organism {
                out.push(' ');
                out.push_str(organism);
            }
            out.push('\n');
            for line in sequence.as_bytes().chunks(FASTA_LINE_WIDTH) {
                out.push_str(&String::from_utf8_lossy(line));
                out.push('\n');
            }
        }
        out
    }

    /// Writes the FASTA export through a temp file in the target directory.
    pub fn write_fasta(&self, path: &Utf8Path) -> Result<(), FetchError> {
        let parent = path
            .parent()
            .filter(|parent| !parent.as_str().is_empty())
            .unwrap_or(Utf8Path::new("."));
        fs::create_dir_all(parent.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        let mut temp = tempfile::Builder::new()
            .prefix("seqfetch-fasta")
            .tempfile_in(parent.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        temp.write_all(self.to_fasta().as_bytes())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        temp.persist(path.as_std_path())
            .map_err(|err| FetchError::Filesystem(err.to_string()))?;
        Ok(())
    }
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.is_none() {
        *slot = value;
    }
}
