use std::io::Cursor;
use std::sync::Arc;
use std::thread;

use crossbeam_channel::{bounded, Receiver};
use log::debug;
use memchr::memchr_iter;
use rayon::prelude::*;

use crate::error::Result;
use crate::fastq::FastqParser;
use crate::record::SequenceRecord;

const MIN_CHUNK_SIZE: usize = 1024 * 1024;
const QUEUE_SIZE: usize = 1000;

/// Parses an in-memory FASTQ buffer on the rayon thread pool.
///
/// The buffer is split at record boundaries into roughly equal chunks,
/// one per thread, and every chunk is parsed independently.
pub struct ParallelParser {
    data: Arc<Vec<u8>>,
    num_threads: usize,
}

impl ParallelParser {
    pub fn new(data: Vec<u8>) -> Self {
        let num_threads = rayon::current_num_threads();
        ParallelParser {
            data: Arc::new(data),
            num_threads,
        }
    }

    pub fn with_threads(data: Vec<u8>, num_threads: usize) -> Self {
        ParallelParser {
            data: Arc::new(data),
            num_threads: num_threads.max(1),
        }
    }

    /// Parse everything, returning the records in file order.
    pub fn parse(&self) -> Result<Vec<SequenceRecord>> {
        let boundaries = find_record_boundaries(&self.data, self.num_threads, MIN_CHUNK_SIZE);
        debug!("parsing {} chunks in parallel", boundaries.len());

        let chunks: Vec<Vec<SequenceRecord>> = boundaries
            .par_iter()
            .map(|&(start, end)| {
                FastqParser::new(Cursor::new(&self.data[start..end])).collect()
            })
            .collect::<Result<_>>()?;

        Ok(chunks.into_iter().flatten().collect())
    }

    /// Parse on a background thread, streaming records through a bounded
    /// channel. Records of one chunk arrive in order; chunks may interleave.
    pub fn parse_streaming(&self) -> Receiver<Result<SequenceRecord>> {
        let (sender, receiver) = bounded(QUEUE_SIZE);
        let data = Arc::clone(&self.data);
        let num_threads = self.num_threads;

        thread::spawn(move || {
            let boundaries = find_record_boundaries(&data, num_threads, MIN_CHUNK_SIZE);
            boundaries.par_iter().for_each(|&(start, end)| {
                for record in FastqParser::new(Cursor::new(&data[start..end])) {
                    if sender.send(record).is_err() {
                        break;
                    }
                }
            });
        });

        receiver
    }
}

/// Split `data` into chunks that end after a multiple of four lines, each
/// at least the target size. Counting newlines is cheap enough to do
/// sequentially and, unlike scanning for `\n@`, cannot be fooled by
/// quality lines that start with `@`.
fn find_record_boundaries(
    data: &[u8],
    num_threads: usize,
    min_chunk_size: usize,
) -> Vec<(usize, usize)> {
    let mut boundaries = Vec::new();
    if data.is_empty() {
        return boundaries;
    }
    let target = (data.len() / num_threads.max(1)).max(min_chunk_size);

    let mut chunk_start = 0;
    let mut lines = 0u64;
    for newline in memchr_iter(b'\n', data) {
        lines += 1;
        if lines % 4 == 0 && newline + 1 - chunk_start >= target {
            boundaries.push((chunk_start, newline + 1));
            chunk_start = newline + 1;
        }
    }
    if chunk_start < data.len() {
        boundaries.push((chunk_start, data.len()));
    }
    boundaries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn boundaries_cover_input_on_record_edges() {
        let mut data = Vec::new();
        for i in 0..100 {
            data.extend_from_slice(format!("@read{}\nACGT\n+\nIIII\n", i).as_bytes());
        }
        let boundaries = find_record_boundaries(&data, 4, 64);
        assert!(boundaries.len() > 1);
        assert_eq!(boundaries.first().map(|b| b.0), Some(0));
        assert_eq!(boundaries.last().map(|b| b.1), Some(data.len()));
        for pair in boundaries.windows(2) {
            assert_eq!(pair[0].1, pair[1].0);
            // Every boundary is right after a quality line.
            assert_eq!(data[pair[0].1 - 1], b'\n');
            assert_eq!(data[pair[0].1], b'@');
        }
    }
}
