use seqstream::{
    FastqParser, FastqParserBuilder, FastqReader, FastqWriter, Result, SeqError, SequenceRecord,
};
use std::io::{Cursor, Read, Write};
use tempfile::NamedTempFile;

fn parse_all(data: &[u8]) -> Result<Vec<SequenceRecord>> {
    FastqParser::new(Cursor::new(data.to_vec())).collect()
}

fn parse_error(data: &[u8]) -> SeqError {
    match parse_all(data) {
        Err(error) => error,
        Ok(records) => panic!("expected an error, got {} records", records.len()),
    }
}

#[test]
fn single_record_without_repeated_header() {
    let mut parser = FastqParser::new(Cursor::new(b"@r1\nACGT\n+\n!!!!\n".to_vec()));
    let record = parser.next_record().unwrap().unwrap();
    assert_eq!(record.name(), "r1");
    assert_eq!(record.sequence(), "ACGT");
    assert_eq!(record.qualities().map(String::as_str), Some("!!!!"));
    assert_eq!(parser.first_record_repeated_header(), Some(false));
    assert!(parser.next_record().unwrap().is_none());
    assert_eq!(parser.records_emitted(), 1);
}

#[test]
fn crlf_and_repeated_header() {
    let mut parser = FastqParser::new(Cursor::new(
        b"@r1 desc\r\nAC\r\n+r1 desc\r\nBB\r\n".to_vec(),
    ));
    let record = parser.next_record().unwrap().unwrap();
    assert_eq!(record.name(), "r1 desc");
    assert_eq!(record.sequence(), "AC");
    assert_eq!(record.qualities().map(String::as_str), Some("BB"));
    assert_eq!(parser.first_record_repeated_header(), Some(true));
    assert_eq!(record.id(), b"r1");
    assert_eq!(record.comment(), Some(&b"desc"[..]));
}

#[test]
fn missing_final_newline() {
    let records = parse_all(b"@r\nA\n+\n!").unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name(), "r");
    assert_eq!(records[0].sequence(), "A");
    assert_eq!(records[0].qualities().map(String::as_str), Some("!"));
}

#[test]
fn repeated_header_mismatch() {
    match parse_error(b"@r1\nAC\n+r2\n!!\n") {
        SeqError::HeaderMismatch { line } => assert_eq!(line, 2),
        other => panic!("expected HeaderMismatch, got {:?}", other),
    }
}

#[test]
fn empty_input_yields_no_records() {
    assert!(parse_all(b"").unwrap().is_empty());
}

#[test]
fn multiple_records_in_file_order() {
    let records = parse_all(b"@a\nAC\n+\n!!\n@b\nGGTT\n+\nIIII\n").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name(), "a");
    assert_eq!(records[1].name(), "b");
}

#[test]
fn bad_header_reports_character_and_line() {
    match parse_error(b"r1\nAC\n+\n!!\n") {
        SeqError::BadHeader { found, line } => {
            assert_eq!(found, 'r');
            assert_eq!(line, 0);
        }
        other => panic!("expected BadHeader, got {:?}", other),
    }
}

#[test]
fn bad_header_line_counts_emitted_records() {
    match parse_error(b"@a\nAC\n+\n!!\nxx\nAC\n+\n!!\n") {
        SeqError::BadHeader { found, line } => {
            assert_eq!(found, 'x');
            assert_eq!(line, 4);
        }
        other => panic!("expected BadHeader, got {:?}", other),
    }
}

#[test]
fn bad_separator() {
    match parse_error(b"@r1\nAC\n*\n!!\n") {
        SeqError::BadSeparator { found, line } => {
            assert_eq!(found, '*');
            assert_eq!(line, 2);
        }
        other => panic!("expected BadSeparator, got {:?}", other),
    }
}

#[test]
fn sequence_quality_length_mismatch() {
    match parse_error(b"@r1\nACGT\n+\n!!!\n") {
        SeqError::LengthMismatch {
            seq_len,
            qual_len,
            line,
        } => {
            assert_eq!(seq_len, 4);
            assert_eq!(qual_len, 3);
            assert_eq!(line, Some(3));
        }
        other => panic!("expected LengthMismatch, got {:?}", other),
    }
}

#[test]
fn non_ascii_input_is_rejected() {
    match parse_error(b"@r1\nAC\xc3\x9c\n+\n!!!\n") {
        SeqError::NonAscii { byte } => assert_eq!(byte, 0xc3),
        other => panic!("expected NonAscii, got {:?}", other),
    }
}

#[test]
fn premature_eof_reports_line() {
    // Ends cleanly after two lines; the record is incomplete.
    match parse_error(b"@r\nACGT\n") {
        SeqError::PrematureEof { line } => assert_eq!(line, 2),
        other => panic!("expected PrematureEof, got {:?}", other),
    }
    // The synthetic newline does not count towards the line number.
    match parse_error(b"@r\nACGT") {
        SeqError::PrematureEof { line } => assert_eq!(line, 1),
        other => panic!("expected PrematureEof, got {:?}", other),
    }
}

#[test]
fn errors_are_terminal() {
    let mut parser = FastqParser::new(Cursor::new(b"@a\nAC\n+\n!!\nbroken".to_vec()));
    assert!(parser.next().unwrap().is_ok());
    assert!(parser.next().unwrap().is_err());
    assert!(parser.next().is_none());
    assert!(parser.next().is_none());
}

#[test]
fn quality_line_may_start_with_at_sign() {
    let records = parse_all(b"@a\nACGT\n+\n@@@@\n@b\nAC\n+\n!!\n").unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].qualities().map(String::as_str), Some("@@@@"));
}

#[test]
fn tiny_initial_buffer_grows_transparently() {
    let data = b"@long_read_name with a comment\nACGTACGTACGTACGT\n+\nIIIIIIIIIIIIIIII\n";
    let parser: FastqParser<_, String> = FastqParserBuilder::new()
        .initial_buffer_size(1)
        .build(Cursor::new(data.to_vec()))
        .unwrap();
    let records: Vec<_> = parser.collect::<Result<_>>().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].len(), 16);
}

#[test]
fn zero_buffer_size_is_rejected() {
    let result: Result<FastqParser<_, String>> = FastqParserBuilder::new()
        .initial_buffer_size(0)
        .build(Cursor::new(Vec::new()));
    assert!(matches!(result, Err(SeqError::Config(_))));
}

#[test]
fn custom_record_constructor_is_used() {
    let parser: FastqParser<_, String> = FastqParserBuilder::new()
        .record_fn(|mut name, sequence, qualities| {
            name.extend_from_slice(b":renamed");
            SequenceRecord::new(
                String::from_utf8(name).unwrap(),
                String::from_utf8(sequence).unwrap(),
                Some(String::from_utf8(qualities).unwrap()),
            )
        })
        .build(Cursor::new(b"@r1\nAC\n+\n!!\n".to_vec()))
        .unwrap();
    let records: Vec<_> = parser.collect::<Result<_>>().unwrap();
    assert_eq!(records[0].name(), "r1:renamed");
}

#[test]
fn serialization_round_trips_lf_input() {
    let input = b"@a\nAC\n+\n!!\n@b x\nGGTT\n+\nIIII\n";
    let mut parser = FastqParser::new(Cursor::new(input.to_vec()));
    let first = parser.next_record().unwrap().unwrap();
    let two_headers = parser.first_record_repeated_header().unwrap();

    let mut output = Vec::new();
    output.extend_from_slice(&first.fastq_bytes(two_headers).unwrap());
    for record in parser {
        output.extend_from_slice(&record.unwrap().fastq_bytes(two_headers).unwrap());
    }
    assert_eq!(output, input);
}

#[test]
fn parsing_a_serialized_record_round_trips() {
    let original = SequenceRecord::new(
        "r9 comment".to_string(),
        "ACGTN".to_string(),
        Some("!~I#$".to_string()),
    )
    .unwrap();
    for two_headers in [false, true] {
        let bytes = original.fastq_bytes(two_headers).unwrap();
        let records = parse_all(&bytes).unwrap();
        assert_eq!(records, vec![original.clone()]);
    }
}

#[test]
fn serialization_normalizes_crlf_and_keeps_header_style() {
    let input = b"@r1 desc\r\nAC\r\n+r1 desc\r\nBB\r\n";
    let mut parser = FastqParser::new(Cursor::new(input.to_vec()));
    let record = parser.next_record().unwrap().unwrap();
    let two_headers = parser.first_record_repeated_header().unwrap();
    assert_eq!(
        record.fastq_bytes(two_headers).unwrap(),
        b"@r1 desc\nAC\n+r1 desc\nBB\n"
    );
}

struct LyingReader;

impl Read for LyingReader {
    fn read(&mut self, _buf: &mut [u8]) -> std::io::Result<usize> {
        Ok(usize::MAX)
    }
}

#[test]
fn oversized_read_violates_reader_contract() {
    let mut parser = FastqParser::new(LyingReader);
    assert!(matches!(
        parser.next_record(),
        Err(SeqError::ReaderContract { .. })
    ));
}

#[test]
fn file_reader_parses_plain_files() {
    let data = b"@SEQ_1\nACGT\n+\nIIII\n@SEQ_2\nTGCA\n+\nJJJJ\n";
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(data).unwrap();

    let reader: FastqReader = FastqReader::from_path(temp_file.path()).unwrap();
    let records: Vec<_> = reader.collect::<Result<_>>().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].name(), "SEQ_1");
    assert_eq!(records[1].name(), "SEQ_2");
}

#[test]
fn file_reader_parses_gzip_files() {
    use flate2::write::GzEncoder;
    use flate2::Compression;

    let data = b"@SEQ_1\nACGT\n+\nIIII\n";
    let mut temp_file = NamedTempFile::with_suffix(".fastq.gz").unwrap();

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    let compressed = encoder.finish().unwrap();
    temp_file.write_all(&compressed).unwrap();

    let reader: FastqReader = FastqReader::from_path(temp_file.path()).unwrap();
    let records: Vec<_> = reader.collect::<Result<_>>().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].name(), "SEQ_1");
}

#[test]
fn writer_round_trips_through_a_file() {
    let mut temp_file = NamedTempFile::new().unwrap();
    {
        let mut writer = FastqWriter::new(temp_file.as_file_mut());
        let record =
            SequenceRecord::new("r1".to_string(), "ACGT".to_string(), Some("!!!!".to_string()))
                .unwrap();
        writer.write_record(&record).unwrap();
        writer.flush().unwrap();
    }
    let mut written = String::new();
    let mut reopened = std::fs::File::open(temp_file.path()).unwrap();
    reopened.read_to_string(&mut written).unwrap();
    assert_eq!(written, "@r1\nACGT\n+\n!!!!\n");
}

#[test]
fn parallel_parser_preserves_record_order() {
    let mut data = Vec::new();
    for i in 0..1000 {
        data.extend_from_slice(format!("@SEQ_{}\nACGTACGTACGT\n+\nIIIIIIIIIIII\n", i).as_bytes());
    }
    let parser = seqstream::ParallelParser::new(data);
    let records = parser.parse().unwrap();
    assert_eq!(records.len(), 1000);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record.name(), &format!("SEQ_{}", i));
    }
}
