//! Chunked reading of FASTQ streams without parsing the records.
//!
//! Input is split into chunks that end on record boundaries, so the chunks
//! can be handed to worker threads and parsed there. Chunks always hold an
//! even number of records, keeping interleaved paired-end reads together,
//! and the paired variant keeps two streams record-synchronized.

use std::io::Read;

use log::trace;
use memchr::{memchr, memrchr};

use crate::error::{Result, SeqError};
use crate::simd;

const DEFAULT_CHUNK_BUFFER_SIZE: usize = 4 * 1024 * 1024;

/// End offset of the last complete *two* FASTQ records in `buf[..end]`.
///
/// Two records (eight lines) are the unit so that interleaved paired-end
/// data is never split mid-pair. Returns 0 when fewer than two complete
/// records are present.
pub fn fastq_head(buf: &[u8], end: Option<usize>) -> usize {
    let end = end.unwrap_or(buf.len()).min(buf.len());
    let data = &buf[..end];
    let linebreaks = simd::count_chars(data, b'\n');
    let mut right = end;
    for _ in 0..linebreaks % 8 + 1 {
        right = match memrchr(b'\n', &data[..right]) {
            Some(position) => position,
            None => return 0,
        };
    }
    right + 1
}

/// The greatest `(len1, len2)` such that `buf1[..len1]` and `buf2[..len2]`
/// contain the same number of complete lines, that number being a multiple
/// of four. Scans both buffers in lockstep and never allocates.
pub fn paired_fastq_heads(
    buf1: &[u8],
    buf2: &[u8],
    end1: usize,
    end2: usize,
) -> (usize, usize) {
    let data1 = &buf1[..end1.min(buf1.len())];
    let data2 = &buf2[..end2.min(buf2.len())];
    let mut best = (0, 0);
    let mut pos1 = 0;
    let mut pos2 = 0;
    let mut lines = 0u64;
    loop {
        match (
            memchr(b'\n', &data1[pos1..]),
            memchr(b'\n', &data2[pos2..]),
        ) {
            (Some(next1), Some(next2)) => {
                pos1 += next1 + 1;
                pos2 += next2 + 1;
                lines += 1;
                if lines % 4 == 0 {
                    best = (pos1, pos2);
                }
            }
            _ => return best,
        }
    }
}

fn fill(reader: &mut impl Read, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let count = reader.read(&mut buf[filled..])?;
        if count == 0 {
            break;
        }
        filled += count;
    }
    Ok(filled)
}

/// Reads record-aligned chunks of a FASTQ stream into one re-used buffer.
///
/// Each chunk returned by [`next_chunk`](Self::next_chunk) borrows the
/// internal buffer and is only valid until the next call; the incomplete
/// tail is carried over into the following chunk. A record larger than the
/// buffer fails with [`SeqError::RecordTooLarge`].
pub struct ChunkReader<R: Read> {
    reader: R,
    buf: Vec<u8>,
    // Filled-but-unchunked prefix length at the start of `buf`.
    start: usize,
    carry: Option<(usize, usize)>,
    checked_format: bool,
    finished: bool,
}

impl<R: Read> ChunkReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_buffer_size(reader, DEFAULT_CHUNK_BUFFER_SIZE)
    }

    pub fn with_buffer_size(reader: R, buffer_size: usize) -> Self {
        ChunkReader {
            reader,
            buf: vec![0; buffer_size.max(1)],
            start: 0,
            carry: None,
            checked_format: false,
            finished: false,
        }
    }

    /// The next record-aligned chunk, or `None` at end of input.
    pub fn next_chunk(&mut self) -> Result<Option<&[u8]>> {
        if let Some((end, bufend)) = self.carry.take() {
            self.buf.copy_within(end..bufend, 0);
            self.start = bufend - end;
        }
        if self.finished {
            return Ok(None);
        }
        loop {
            if self.start == self.buf.len() {
                return Err(SeqError::RecordTooLarge {
                    buffer_size: self.buf.len(),
                });
            }
            let filled = fill(&mut self.reader, &mut self.buf[self.start..])?;
            let bufend = self.start + filled;
            if !self.checked_format && bufend > 0 {
                if self.buf[0] != b'@' {
                    return Err(SeqError::BadHeader {
                        found: self.buf[0] as char,
                        line: 0,
                    });
                }
                self.checked_format = true;
            }
            if bufend == self.start {
                // EOF; hand out whatever is left in one final chunk.
                self.finished = true;
                if self.start == 0 {
                    return Ok(None);
                }
                let tail = self.start;
                self.start = 0;
                return Ok(Some(&self.buf[..tail]));
            }
            let end = fastq_head(&self.buf, Some(bufend));
            if end > 0 {
                trace!("chunk of {} bytes ({} carried over)", end, bufend - end);
                self.carry = Some((end, bufend));
                return Ok(Some(&self.buf[..end]));
            }
            self.start = bufend;
        }
    }
}

/// Reads synchronized chunk pairs from two paired FASTQ streams.
///
/// Both chunks of a pair hold the same number of records, so paired reads
/// stay in sync when the pairs are processed independently. Chunks borrow
/// the internal buffers and are only valid until the next call.
pub struct PairedChunkReader<R1: Read, R2: Read> {
    reader1: R1,
    reader2: R2,
    buf1: Vec<u8>,
    buf2: Vec<u8>,
    start1: usize,
    start2: usize,
    carry: Option<(usize, usize, usize, usize)>,
    checked_format: bool,
    finished: bool,
}

impl<R1: Read, R2: Read> PairedChunkReader<R1, R2> {
    pub fn new(reader1: R1, reader2: R2) -> Result<Self> {
        Self::with_buffer_size(reader1, reader2, DEFAULT_CHUNK_BUFFER_SIZE)
    }

    pub fn with_buffer_size(reader1: R1, reader2: R2, buffer_size: usize) -> Result<Self> {
        if buffer_size < 6 {
            return Err(SeqError::Config("paired chunk buffer too small".into()));
        }
        Ok(PairedChunkReader {
            reader1,
            reader2,
            buf1: vec![0; buffer_size],
            buf2: vec![0; buffer_size],
            start1: 0,
            start2: 0,
            carry: None,
            checked_format: false,
            finished: false,
        })
    }

    /// The next synchronized chunk pair, or `None` at end of both inputs.
    pub fn next_chunks(&mut self) -> Result<Option<(&[u8], &[u8])>> {
        if let Some((end1, bufend1, end2, bufend2)) = self.carry.take() {
            self.buf1.copy_within(end1..bufend1, 0);
            self.start1 = bufend1 - end1;
            self.buf2.copy_within(end2..bufend2, 0);
            self.start2 = bufend2 - end2;
        }
        if self.finished {
            return Ok(None);
        }
        loop {
            if self.start1 == self.buf1.len() && self.start2 == self.buf2.len() {
                return Err(SeqError::RecordTooLarge {
                    buffer_size: self.buf1.len(),
                });
            }
            let bufend1 = self.start1 + fill(&mut self.reader1, &mut self.buf1[self.start1..])?;
            let bufend2 = self.start2 + fill(&mut self.reader2, &mut self.buf2[self.start2..])?;
            if !self.checked_format {
                match (bufend1 > 0, bufend2 > 0) {
                    (false, false) => {
                        self.finished = true;
                        return Ok(None);
                    }
                    (true, false) | (false, true) => {
                        let empty = if bufend1 == 0 { 1 } else { 2 };
                        return Err(SeqError::PairedDesync(format!(
                            "file with R{} reads is empty and the other is not",
                            empty
                        )));
                    }
                    (true, true) => {}
                }
                for (index, buf) in [(1, &self.buf1), (2, &self.buf2)] {
                    if buf[0] != b'@' {
                        return Err(SeqError::PairedDesync(format!(
                            "file with R{} reads does not look like FASTQ",
                            index
                        )));
                    }
                }
                self.checked_format = true;
            }
            if bufend1 == self.start1 && bufend2 == self.start2 {
                // Both streams exhausted; hand out the remainders.
                self.finished = true;
                if self.start1 == 0 && self.start2 == 0 {
                    return Ok(None);
                }
                let (tail1, tail2) = (self.start1, self.start2);
                self.start1 = 0;
                self.start2 = 0;
                return Ok(Some((&self.buf1[..tail1], &self.buf2[..tail2])));
            }
            let (end1, end2) = paired_fastq_heads(&self.buf1, &self.buf2, bufend1, bufend2);
            if end1 > 0 || end2 > 0 {
                self.carry = Some((end1, bufend1, end2, bufend2));
                return Ok(Some((&self.buf1[..end1], &self.buf2[..end2])));
            }
            if bufend1 == self.buf1.len() || bufend2 == self.buf2.len() {
                return Err(SeqError::RecordTooLarge {
                    buffer_size: self.buf1.len(),
                });
            }
            if bufend1 == self.start1 || bufend2 == self.start2 {
                let ended = if bufend1 == self.start1 { 1 } else { 2 };
                return Err(SeqError::PairedDesync(format!(
                    "premature end of paired-end input: file {} ended, but more data found in the other file",
                    ended
                )));
            }
            self.start1 = bufend1;
            self.start2 = bufend2;
        }
    }
}
