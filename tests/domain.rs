use assert_matches::assert_matches;

use seqfetch::domain::{SeqKind, SequenceName, SequenceRecord, SequenceRequest, Strand};
use seqfetch::error::FetchError;

#[test]
fn parse_sequence_name_valid() {
    let name: SequenceName = " AB000263.1 ".parse().unwrap();
    assert_eq!(name.as_str(), "AB000263.1");
}

#[test]
fn parse_sequence_name_invalid() {
    for value in ["", "two words", "tab\tname", "quo\"te"] {
        let err = value.parse::<SequenceName>().unwrap_err();
        assert_matches!(err, FetchError::InvalidSequenceName(_));
    }
}

#[test]
fn peptides_are_never_complemented() {
    let request = SequenceRequest::new("P69905".parse().unwrap(), SeqKind::Peptide)
        .with_strand(Strand::Reverse);
    assert!(!request.needs_complement());
}

#[test]
fn record_success_requires_sequence() {
    let mut record = SequenceRecord::named("A");
    record.organism = Some("Homo sapiens".to_string());
    assert!(record.has_metadata());
    assert!(!record.has_sequence());
    record.sequence = Some(String::new());
    assert!(!record.has_sequence());
}

#[test]
fn record_serializes_to_json() {
    let mut record = SequenceRecord::named("A");
    record.sequence = Some("acgt".to_string());
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["name"], "A");
    assert_eq!(json["sequence"], "acgt");
    assert!(json["strain"].is_null());
}
