use std::io::Read;
use std::ops::Range;

use crate::buffer::RecordBuffer;
use crate::error::{Result, SeqError};
use crate::record::{SeqText, SequenceRecord};
use crate::simd;

const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

type RecordFn<T> =
    Box<dyn FnMut(Vec<u8>, Vec<u8>, Vec<u8>) -> Result<SequenceRecord<T>> + Send>;

/// Byte spans of one complete record inside the parser buffer.
struct Spans {
    name: Range<usize>,
    sequence: Range<usize>,
    qualities: Range<usize>,
    repeated_header: bool,
    next_start: usize,
}

/// Streaming FASTQ parser.
///
/// Reads four-line records from any [`Read`] source through a single
/// growable buffer that is re-used across records. Newline positions are
/// located with a vectorized byte scan; every refill is ASCII-checked as a
/// whole so records can be emitted without per-field validation. CRLF line
/// endings and a missing final newline are tolerated.
///
/// The parser is an iterator over `Result<SequenceRecord<T>>`. Any error is
/// terminal: the iterator yields it once and then behaves as exhausted.
pub struct FastqParser<R: Read, T: SeqText = String> {
    reader: R,
    buf: RecordBuffer,
    records_emitted: u64,
    eof: bool,
    newline_appended: bool,
    finished: bool,
    failed: bool,
    first_repeated_header: Option<bool>,
    record_fn: Option<RecordFn<T>>,
}

impl<R: Read> FastqParser<R, String> {
    pub fn new(reader: R) -> Self {
        FastqParser::with_options(reader, DEFAULT_BUFFER_SIZE, None)
    }
}

impl<R: Read, T: SeqText> FastqParser<R, T> {
    fn with_options(reader: R, initial_buffer_size: usize, record_fn: Option<RecordFn<T>>) -> Self {
        FastqParser {
            reader,
            buf: RecordBuffer::with_capacity(initial_buffer_size),
            records_emitted: 0,
            eof: false,
            newline_appended: false,
            finished: false,
            failed: false,
            first_repeated_header: None,
            record_fn,
        }
    }

    /// Number of records emitted so far.
    #[inline]
    pub fn records_emitted(&self) -> u64 {
        self.records_emitted
    }

    /// Whether the first record's `+` line repeated the header.
    ///
    /// `None` until the first record has been parsed. Writers use this to
    /// reproduce the input's separator style for the rest of the stream.
    #[inline]
    pub fn first_record_repeated_header(&self) -> Option<bool> {
        self.first_repeated_header
    }

    /// Pull the next record. `Ok(None)` signals a clean end of stream.
    pub fn next_record(&mut self) -> Result<Option<SequenceRecord<T>>> {
        if self.finished || self.failed {
            return Ok(None);
        }
        match self.advance() {
            Ok(Some(record)) => Ok(Some(record)),
            Ok(None) => {
                self.finished = true;
                Ok(None)
            }
            Err(error) => {
                self.failed = true;
                Err(error)
            }
        }
    }

    fn advance(&mut self) -> Result<Option<SequenceRecord<T>>> {
        loop {
            if let Some(spans) = self.locate_record()? {
                let data = self.buf.data();
                let name = data[spans.name].to_vec();
                let sequence = data[spans.sequence].to_vec();
                let qualities = data[spans.qualities].to_vec();
                if self.first_repeated_header.is_none() {
                    self.first_repeated_header = Some(spans.repeated_header);
                }
                let consumed = spans.next_start - self.buf.start();
                self.buf.consume(consumed);
                self.records_emitted += 1;
                let record = match &mut self.record_fn {
                    Some(make_record) => make_record(name, sequence, qualities)?,
                    None => SequenceRecord::from_validated(
                        T::from_ascii(name),
                        T::from_ascii(sequence),
                        Some(T::from_ascii(qualities)),
                    ),
                };
                return Ok(Some(record));
            }

            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                if !self.newline_appended && self.buf.residual().last() != Some(&b'\n') {
                    self.buf.push_byte(b'\n');
                    self.newline_appended = true;
                    continue;
                }
                let mut newlines = simd::count_chars(self.buf.residual(), b'\n') as u64;
                if self.newline_appended {
                    newlines -= 1;
                }
                return Err(SeqError::PrematureEof {
                    line: 4 * self.records_emitted + newlines,
                });
            }

            if self.refill()? == 0 {
                self.eof = true;
            }
        }
    }

    /// Find the spans of the next complete record, or `None` when the
    /// buffer does not yet hold four newlines.
    fn locate_record(&self) -> Result<Option<Spans>> {
        let data = self.buf.data();
        let start = self.buf.start();
        if start >= data.len() {
            return Ok(None);
        }
        let Some(n1) = simd::find_char(data, b'\n', start) else {
            return Ok(None);
        };
        let Some(n2) = simd::find_char(data, b'\n', n1 + 1) else {
            return Ok(None);
        };
        let Some(n3) = simd::find_char(data, b'\n', n2 + 1) else {
            return Ok(None);
        };
        let Some(n4) = simd::find_char(data, b'\n', n3 + 1) else {
            return Ok(None);
        };

        let line = |offset: u64| 4 * self.records_emitted + offset;
        if data[start] != b'@' {
            return Err(SeqError::BadHeader {
                found: data[start] as char,
                line: line(0),
            });
        }
        let strip_cr = |line_start: usize, newline: usize| {
            if newline > line_start && data[newline - 1] == b'\r' {
                newline - 1
            } else {
                newline
            }
        };
        let name = start + 1..strip_cr(start + 1, n1);
        let sequence = n1 + 1..strip_cr(n1 + 1, n2);
        let separator = n2 + 1;
        if data[separator] != b'+' {
            return Err(SeqError::BadSeparator {
                found: data[separator] as char,
                line: line(2),
            });
        }
        let second_header = separator + 1..strip_cr(separator + 1, n3);
        let repeated_header = !second_header.is_empty();
        if repeated_header && data[second_header] != data[name.clone()] {
            return Err(SeqError::HeaderMismatch { line: line(2) });
        }
        let qualities = n3 + 1..strip_cr(n3 + 1, n4);
        if qualities.len() != sequence.len() {
            return Err(SeqError::LengthMismatch {
                seq_len: sequence.len(),
                qual_len: qualities.len(),
                line: Some(line(3)),
            });
        }
        Ok(Some(Spans {
            name,
            sequence,
            qualities,
            repeated_header,
            next_start: n4 + 1,
        }))
    }

    /// One buffer refill; the newly read bytes must be pure ASCII.
    fn refill(&mut self) -> Result<usize> {
        let new_bytes = self.buf.refill(&mut self.reader)?;
        let count = new_bytes.len();
        let fresh = &self.buf.data()[new_bytes];
        if !simd::is_ascii(fresh) {
            let byte = fresh.iter().copied().find(|b| b & 0x80 != 0).unwrap_or(0);
            return Err(SeqError::NonAscii { byte });
        }
        Ok(count)
    }
}

impl<R: Read, T: SeqText> Iterator for FastqParser<R, T> {
    type Item = Result<SequenceRecord<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    }
}

/// Configures a [`FastqParser`].
pub struct FastqParserBuilder<T: SeqText = String> {
    initial_buffer_size: usize,
    record_fn: Option<RecordFn<T>>,
}

impl<T: SeqText> Default for FastqParserBuilder<T> {
    fn default() -> Self {
        FastqParserBuilder {
            initial_buffer_size: DEFAULT_BUFFER_SIZE,
            record_fn: None,
        }
    }
}

impl<T: SeqText> FastqParserBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial size of the record buffer; it doubles on demand, so this
    /// only bounds the first allocation. Must be at least 1.
    pub fn initial_buffer_size(mut self, size: usize) -> Self {
        self.initial_buffer_size = size;
        self
    }

    /// Replace the fast internal record constructor. The callable receives
    /// the decoded name, sequence and qualities of every record.
    pub fn record_fn<F>(mut self, make_record: F) -> Self
    where
        F: FnMut(Vec<u8>, Vec<u8>, Vec<u8>) -> Result<SequenceRecord<T>> + Send + 'static,
    {
        self.record_fn = Some(Box::new(make_record));
        self
    }

    pub fn build<R: Read>(self, reader: R) -> Result<FastqParser<R, T>> {
        if self.initial_buffer_size < 1 {
            return Err(SeqError::Config(
                "initial_buffer_size must be at least 1".into(),
            ));
        }
        Ok(FastqParser::with_options(
            reader,
            self.initial_buffer_size,
            self.record_fn,
        ))
    }
}
