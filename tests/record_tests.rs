use seqstream::{
    encode_fastq, records_are_mates, BytesSequenceRecord, SeqError, SequenceRecord,
};

fn record(name: &str, sequence: &str, qualities: Option<&str>) -> SequenceRecord {
    SequenceRecord::new(
        name.to_string(),
        sequence.to_string(),
        qualities.map(str::to_string),
    )
    .unwrap()
}

#[test]
fn constructor_validates_ascii() {
    let result = SequenceRecord::new("r\u{fc}1".to_string(), "AC".to_string(), None);
    assert!(matches!(result, Err(SeqError::NonAscii { .. })));
}

#[test]
fn constructor_validates_lengths() {
    let result = SequenceRecord::new(
        "r1".to_string(),
        "ACGT".to_string(),
        Some("!!".to_string()),
    );
    match result {
        Err(SeqError::LengthMismatch {
            seq_len, qual_len, ..
        }) => {
            assert_eq!(seq_len, 4);
            assert_eq!(qual_len, 2);
        }
        other => panic!("expected LengthMismatch, got {:?}", other),
    }
}

#[test]
fn id_and_comment_split_on_first_whitespace_run() {
    let plain = record("read1", "A", None);
    assert_eq!(plain.id(), b"read1");
    assert_eq!(plain.comment(), None);

    let spaced = record("read1  trailing words", "A", None);
    assert_eq!(spaced.id(), b"read1");
    assert_eq!(spaced.comment(), Some(&b"trailing words"[..]));

    let tabbed = record("read1\tcomment", "A", None);
    assert_eq!(tabbed.id(), b"read1");
    assert_eq!(tabbed.comment(), Some(&b"comment"[..]));

    let empty_comment = record("read1 ", "A", None);
    assert_eq!(empty_comment.id(), b"read1");
    assert_eq!(empty_comment.comment(), None);
}

#[test]
fn slices_compose() {
    let r = record("r", "ACGTACGTAC", Some("0123456789"));
    let composed = r.slice(2..8).slice(1..3);
    let direct = r.slice(3..5);
    assert_eq!(composed, direct);
    assert_eq!(composed.sequence(), "TA");
    assert_eq!(composed.qualities().map(String::as_str), Some("34"));
    assert_eq!(composed.name(), "r");
}

#[test]
fn slice_clamps_out_of_bounds_ends() {
    let r = record("r", "ACGT", Some("!!!!"));
    assert_eq!(r.slice(2..100).sequence(), "GT");
    assert_eq!(r.slice(10..20).sequence(), "");
    assert!(r.slice(10..20).is_empty());
}

#[test]
fn stepped_slice_takes_every_nth_base() {
    let r = record("r", "ACGTACGT", Some("01234567"));
    let stepped = r.slice_step(1..8, 3);
    assert_eq!(stepped.sequence(), "CAT");
    assert_eq!(stepped.qualities().map(String::as_str), Some("147"));
}

#[test]
fn reverse_complement_is_involutive() {
    let r = record("r", "ACGTNacgtn", Some("0123456789"));
    let rc = r.reverse_complement();
    assert_eq!(rc.sequence(), "nacgtNACGT");
    assert_eq!(rc.qualities().map(String::as_str), Some("9876543210"));
    assert_eq!(rc.name(), "r");
    assert_eq!(rc.reverse_complement(), r);
}

#[test]
fn equality_includes_optional_qualities() {
    let with = record("r", "AC", Some("!!"));
    let with_same = record("r", "AC", Some("!!"));
    let without = record("r", "AC", None);
    let without_same = record("r", "AC", None);
    assert_eq!(with, with_same);
    assert_eq!(without, without_same);
    assert_ne!(with, without);
    assert_ne!(with, record("r", "AC", Some("!#")));
    assert_ne!(with, record("q", "AC", Some("!!")));
}

#[test]
fn fastq_bytes_layouts() {
    let r = record("r1 comment", "ACGT", Some("!!!!"));
    assert_eq!(r.fastq_bytes(false).unwrap(), b"@r1 comment\nACGT\n+\n!!!!\n");
    assert_eq!(
        r.fastq_bytes(true).unwrap(),
        b"@r1 comment\nACGT\n+r1 comment\n!!!!\n"
    );

    let no_qualities = record("r1", "ACGT", None);
    assert!(matches!(
        no_qualities.fastq_bytes(false),
        Err(SeqError::QualitiesRequired)
    ));
}

#[test]
fn encode_fastq_assembles_exact_bytes() {
    assert_eq!(encode_fastq(b"n", b"AC", b"!!", false), b"@n\nAC\n+\n!!\n");
    assert_eq!(encode_fastq(b"n", b"AC", b"!!", true), b"@n\nAC\n+n\n!!\n");
    assert_eq!(encode_fastq(b"", b"", b"", false), b"@\n\n+\n\n");
}

#[test]
fn qualities_round_trip_as_bytes() {
    let r = record("r", "AC", Some("!~"));
    assert_eq!(r.qualities_as_bytes(), Some(&b"!~"[..]));
    assert_eq!(record("r", "AC", None).qualities_as_bytes(), None);
}

#[test]
fn mate_identification() {
    let r1 = record("read/1 x", "A", None);
    let r2 = record("read/2 y", "A", None);
    let r3 = record("read/3", "A", None);
    let other = record("readB", "A", None);
    assert!(r1.is_mate(&r2));
    assert!(r1.is_mate(&r3));
    assert!(!r1.is_mate(&other));
    // Symmetry and reflexivity.
    assert!(r2.is_mate(&r1));
    assert!(r1.is_mate(&r1));

    assert!(records_are_mates(&[&r1, &r2, &r3]));
    assert!(!records_are_mates(&[&r1, &r2, &other]));
}

#[test]
#[should_panic(expected = "at least two records")]
fn records_are_mates_requires_two_arguments() {
    let r = record("read", "A", None);
    records_are_mates(&[&r]);
}

#[test]
fn setters_revalidate_and_reset_caches() {
    let mut r = record("old_id comment", "ACGT", Some("!!!!"));
    assert_eq!(r.id(), b"old_id");

    r.set_name("new another".to_string()).unwrap();
    assert_eq!(r.id(), b"new");
    assert_eq!(r.comment(), Some(&b"another"[..]));

    assert!(matches!(
        r.set_sequence("AC".to_string()),
        Err(SeqError::LengthMismatch { .. })
    ));
    r.set_qualities(None).unwrap();
    r.set_sequence("AC".to_string()).unwrap();
    assert_eq!(r.len(), 2);

    assert!(matches!(
        r.set_qualities(Some("!!!".to_string())),
        Err(SeqError::LengthMismatch { .. })
    ));
    assert!(matches!(
        r.set_name("caf\u{e9}".to_string()),
        Err(SeqError::NonAscii { .. })
    ));
}

#[test]
fn bytes_flavor_has_identical_semantics() {
    let r: BytesSequenceRecord =
        BytesSequenceRecord::new(b"r1 desc".to_vec(), b"ACGT".to_vec(), Some(b"!!!!".to_vec()))
            .unwrap();
    assert_eq!(r.id(), b"r1");
    assert_eq!(r.comment(), Some(&b"desc"[..]));
    assert_eq!(r.len(), 4);
    assert_eq!(r.slice(1..3).sequence(), b"CG");
    assert_eq!(r.reverse_complement().sequence(), b"ACGT");
    assert_eq!(r.fastq_bytes(false).unwrap(), b"@r1 desc\nACGT\n+\n!!!!\n");

    let result = BytesSequenceRecord::new(b"r\xff".to_vec(), b"AC".to_vec(), None);
    assert!(matches!(result, Err(SeqError::NonAscii { byte: 0xff })));
}
