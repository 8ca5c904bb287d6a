use std::io::Read;
use std::ops::Range;

use log::trace;

use crate::error::{Result, SeqError};

/// The single growable byte region owned by a parser.
///
/// `start` marks the beginning of the next unparsed record, `end` the
/// total number of valid bytes; `0 <= start <= end <= capacity` holds at
/// all times.
pub struct RecordBuffer {
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

impl RecordBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        RecordBuffer {
            buf: vec![0; capacity.max(1)],
            start: 0,
            end: 0,
        }
    }

    /// All valid bytes, from offset zero up to the high watermark.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.buf[..self.end]
    }

    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// The unparsed bytes `[start, end)`.
    #[inline]
    pub fn residual(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    #[inline]
    pub fn available(&self) -> usize {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    #[inline]
    pub fn consume(&mut self, amount: usize) {
        self.start = (self.start + amount).min(self.end);
    }

    /// One refill step: double the buffer when it is full with no parsed
    /// prefix to reclaim, otherwise move the residual to offset zero, then
    /// issue a single read into the free tail.
    ///
    /// Returns the range of newly read bytes; an empty range means EOF.
    pub fn refill<R: Read>(&mut self, reader: &mut R) -> Result<Range<usize>> {
        if self.start == 0 {
            if self.end == self.buf.len() {
                let doubled = self.buf.len() * 2;
                trace!("record buffer full, growing to {} bytes", doubled);
                self.buf.resize(doubled, 0);
            }
        } else {
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }
        let requested = self.buf.len() - self.end;
        let returned = reader.read(&mut self.buf[self.end..])?;
        if returned > requested {
            return Err(SeqError::ReaderContract {
                requested,
                returned,
            });
        }
        let new_bytes = self.end..self.end + returned;
        self.end = new_bytes.end;
        Ok(new_bytes)
    }

    /// Read until at least `needed` bytes are available from `start`,
    /// growing the buffer so every refill can request at least
    /// `min_request` bytes. Returns false when EOF arrives first.
    pub fn ensure<R: Read>(
        &mut self,
        reader: &mut R,
        needed: usize,
        min_request: usize,
    ) -> Result<bool> {
        let target = needed.max(min_request);
        while self.buf.len() < target {
            self.buf.resize((self.buf.len() * 2).max(target), 0);
        }
        while self.available() < needed {
            let read = self.refill(reader)?;
            if read.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Append a single byte past the high watermark, growing by one byte
    /// only when the buffer is exactly full.
    pub fn push_byte(&mut self, byte: u8) {
        if self.end == self.buf.len() {
            self.buf.push(0);
        }
        self.buf[self.end] = byte;
        self.end += 1;
    }
}
