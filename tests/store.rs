use camino::Utf8PathBuf;

use seqfetch::domain::{SeqKind, SequenceRecord, SequenceRequest};
use seqfetch::store::SequenceStore;

fn record(name: &str, sequence: Option<&str>) -> SequenceRecord {
    let mut record = SequenceRecord::named(name);
    record.sequence = sequence.map(str::to_string);
    record
}

#[test]
fn records_keep_insertion_order() {
    let mut store = SequenceStore::new();
    store.merge(record("B", Some("cc")));
    store.merge(record("A", Some("gg")));
    store.merge(record("B", None));
    let names = store.records().map(|record| record.name.as_str()).collect::<Vec<_>>();
    assert_eq!(names, vec!["B", "A"]);
}

#[test]
fn failed_record_can_be_filled_by_later_method() {
    let mut store = SequenceStore::new();
    let request = SequenceRequest::new("A".parse().unwrap(), SeqKind::Nucleotide);
    store.merge(record("A", None));
    assert!(store.needs_sequence(&request));
    store.merge(record("A", Some("acgt")));
    assert!(!store.needs_sequence(&request));
}

#[test]
fn write_fasta_persists_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("out/seqs.fa")).unwrap();
    let mut store = SequenceStore::new();
    let mut first = record("AB000263", Some("acgt"));
    first.organism = Some("Homo sapiens".to_string());
    store.merge(first);
    store.merge(record("MISSING", None));

    store.write_fasta(&path).unwrap();
    let written = std::fs::read_to_string(&path).unwrap();
    assert_eq!(written, ">AB000263 Homo sapiens\nacgt\n");

    let leftovers = std::fs::read_dir(path.parent().unwrap())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_name().to_string_lossy().starts_with("seqfetch-fasta"))
        .count();
    assert_eq!(leftovers, 0);
}
