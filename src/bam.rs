use std::io::{self, Read};

use log::debug;

use crate::buffer::RecordBuffer;
use crate::error::{Result, SeqError};
use crate::record::{SeqText, SequenceRecord};
use crate::simd;

const DEFAULT_READ_IN_SIZE: usize = 64 * 1024;
const BAM_MAGIC: [u8; 4] = *b"BAM\x01";
// reference_id, pos, l_read_name, mapq, bin, n_cigar_op, flag, l_seq,
// next_ref_id, next_pos, tlen.
const FIXED_HEADER_SIZE: usize = 32;
const FLAG_UNMAPPED_SINGLE_READ: u16 = 4;

#[inline]
fn read_exact(reader: &mut impl Read, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|error| {
        if error.kind() == io::ErrorKind::UnexpectedEof {
            SeqError::Truncated
        } else {
            SeqError::Io(error)
        }
    })
}

/// Streaming decoder for unaligned, single-read BAM.
///
/// Consumes the BAM header once at construction (the text header is
/// retained and exposed through [`header`](Self::header), the reference
/// table is skipped) and then iterates over records, expanding the
/// 4-bit-packed sequences and translating qualities to Phred+33. The raw
/// auxiliary tag block of each record is preserved verbatim.
///
/// Only records with `flag == 4` are supported; anything else means the
/// stream holds mapped or paired data and fails with
/// [`SeqError::Unsupported`].
pub struct BamParser<R: Read, T: SeqText = String> {
    reader: R,
    buf: RecordBuffer,
    header: Vec<u8>,
    read_in_size: usize,
    records_emitted: u64,
    finished: bool,
    failed: bool,
    _text: std::marker::PhantomData<T>,
}

impl<R: Read> BamParser<R, String> {
    pub fn new(reader: R) -> Result<Self> {
        BamParserBuilder::new().build(reader)
    }
}

impl<R: Read, T: SeqText> BamParser<R, T> {
    fn with_options(mut reader: R, read_in_size: usize) -> Result<Self> {
        let header = read_bam_header(&mut reader)?;
        Ok(BamParser {
            reader,
            buf: RecordBuffer::with_capacity(read_in_size),
            header,
            read_in_size,
            records_emitted: 0,
            finished: false,
            failed: false,
            _text: std::marker::PhantomData,
        })
    }

    /// The raw SAM text header carried in the BAM stream.
    #[inline]
    pub fn header(&self) -> &[u8] {
        &self.header
    }

    #[inline]
    pub fn records_emitted(&self) -> u64 {
        self.records_emitted
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
        if self.buf.available() < 4 {
            let satisfied = self
                .buf
                .ensure(&mut self.reader, 4, self.read_in_size)?;
            if !satisfied {
                return if self.buf.is_empty() {
                    Ok(None)
                } else {
                    Err(SeqError::Truncated)
                };
            }
        }
        let start = self.buf.start();
        let block_size_bytes: [u8; 4] = self.buf.data()[start..start + 4]
            .try_into()
            .expect("slice is 4 bytes");
        let block_size = u32::from_le_bytes(block_size_bytes) as usize;
        let framed = block_size + 4;
        if self.buf.available() < framed
            && !self
                .buf
                .ensure(&mut self.reader, framed, self.read_in_size)?
        {
            return Err(SeqError::Truncated);
        }
        let record = self.decode_record(self.buf.start() + 4, block_size)?;
        self.buf.consume(framed);
        self.records_emitted += 1;
        Ok(Some(record))
    }

    fn decode_record(&self, body_start: usize, block_size: usize) -> Result<SequenceRecord<T>> {
        let body = &self.buf.data()[body_start..body_start + block_size];
        if body.len() < FIXED_HEADER_SIZE {
            return Err(SeqError::Truncated);
        }
        let l_read_name = body[8] as usize;
        let n_cigar_op = u16::from_le_bytes([body[12], body[13]]) as usize;
        let flag = u16::from_le_bytes([body[14], body[15]]);
        let l_seq =
            u32::from_le_bytes([body[16], body[17], body[18], body[19]]) as usize;
        if flag != FLAG_UNMAPPED_SINGLE_READ {
            return Err(SeqError::Unsupported { flag });
        }

        let name_end = FIXED_HEADER_SIZE + l_read_name;
        let cigar_end = name_end + 4 * n_cigar_op;
        let sequence_end = cigar_end + l_seq.div_ceil(2);
        let qualities_end = sequence_end + l_seq;
        if l_read_name == 0 || qualities_end > body.len() {
            return Err(SeqError::Truncated);
        }

        // The read name includes a trailing NUL.
        let name = &body[FIXED_HEADER_SIZE..name_end - 1];
        if !simd::is_ascii(name) {
            let byte = name.iter().copied().find(|b| b & 0x80 != 0).unwrap_or(0);
            return Err(SeqError::NonAscii { byte });
        }
        let sequence = simd::decode_bam_sequence(&body[cigar_end..sequence_end], l_seq);
        let qualities = if l_seq > 0 && body[sequence_end] == 0xff {
            // Missing qualities are stored as 0xFF throughout.
            None
        } else {
            Some(simd::decode_bam_qualities(&body[sequence_end..qualities_end]))
        };

        Ok(SequenceRecord::from_validated(
            T::from_ascii(name.to_vec()),
            T::from_ascii(sequence),
            qualities.map(T::from_ascii),
        )
        .with_bam_tags(body[qualities_end..].to_vec()))
    }
}

impl<R: Read, T: SeqText> Iterator for BamParser<R, T> {
    type Item = Result<SequenceRecord<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(record)),
            Ok(None) => None,
            Err(error) => Some(Err(error)),
        }
    }
}

/// Consume the BAM header: magic, text header, reference table.
/// Returns the text header; leaves the reader at the first record.
fn read_bam_header(reader: &mut impl Read) -> Result<Vec<u8>> {
    let mut magic_and_size = [0u8; 8];
    read_exact(reader, &mut magic_and_size)?;
    if magic_and_size[..4] != BAM_MAGIC {
        let mut found = [0u8; 4];
        found.copy_from_slice(&magic_and_size[..4]);
        return Err(SeqError::BadMagic { found });
    }
    let l_text = u32::from_le_bytes(
        magic_and_size[4..8].try_into().expect("slice is 4 bytes"),
    ) as usize;
    let mut header = vec![0u8; l_text];
    read_exact(reader, &mut header)?;

    let mut scratch = [0u8; 4];
    read_exact(reader, &mut scratch)?;
    let n_ref = u32::from_le_bytes(scratch);
    let mut name_buf = Vec::new();
    for _ in 0..n_ref {
        read_exact(reader, &mut scratch)?;
        let l_name = u32::from_le_bytes(scratch) as usize;
        // Name plus the u32 reference length; discarded at this level.
        name_buf.resize(l_name + 4, 0);
        read_exact(reader, &mut name_buf)?;
    }
    debug!(
        "BAM header consumed: {} bytes of text, {} references",
        l_text, n_ref
    );
    Ok(header)
}

/// Configures a [`BamParser`].
pub struct BamParserBuilder<T: SeqText = String> {
    read_in_size: usize,
    _text: std::marker::PhantomData<T>,
}

impl<T: SeqText> Default for BamParserBuilder<T> {
    fn default() -> Self {
        BamParserBuilder {
            read_in_size: DEFAULT_READ_IN_SIZE,
            _text: std::marker::PhantomData,
        }
    }
}

impl<T: SeqText> BamParserBuilder<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimum number of bytes requested per refill. Must be at least 4 so
    /// a record's `block_size` field can always be framed.
    pub fn read_in_size(mut self, size: usize) -> Self {
        self.read_in_size = size;
        self
    }

    pub fn build<R: Read>(self, reader: R) -> Result<BamParser<R, T>> {
        if self.read_in_size < 4 {
            return Err(SeqError::Config("read_in_size must be at least 4".into()));
        }
        BamParser::with_options(reader, self.read_in_size)
    }
}
