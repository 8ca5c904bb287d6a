use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use memmap2::Mmap;

use crate::bam::{BamParser, BamParserBuilder};
use crate::error::Result;
use crate::fastq::{FastqParser, FastqParserBuilder};
use crate::record::{SeqText, SequenceRecord};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

fn open_source(path: &Path) -> Result<Box<dyn Read + Send>> {
    let file = File::open(path)?;
    if path.extension().and_then(|s| s.to_str()) == Some("gz") {
        return Ok(Box::new(MultiGzDecoder::new(BufReader::new(file))));
    }
    if file.metadata()?.len() == 0 {
        // Zero-length files cannot be mapped.
        return Ok(Box::new(Cursor::new(Vec::new())));
    }
    // Whole-file mapping; the page cache backs the reads.
    let mmap = unsafe { Mmap::map(&file)? };
    Ok(Box::new(Cursor::new(mmap)))
}

/// Path- and reader-based entry point for FASTQ parsing.
///
/// Plain files are memory-mapped, `.gz` files are decompressed on the fly;
/// both feed the same streaming [`FastqParser`].
pub struct FastqReader<T: SeqText = String> {
    parser: FastqParser<Box<dyn Read + Send>, T>,
}

impl<T: SeqText> FastqReader<T> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let source = open_source(path.as_ref())?;
        Ok(FastqReader {
            parser: FastqParserBuilder::new().build(source)?,
        })
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        let source: Box<dyn Read + Send> = Box::new(reader);
        Ok(FastqReader {
            parser: FastqParserBuilder::new().build(source)?,
        })
    }

    #[inline]
    pub fn records_emitted(&self) -> u64 {
        self.parser.records_emitted()
    }

    /// See [`FastqParser::first_record_repeated_header`].
    #[inline]
    pub fn first_record_repeated_header(&self) -> Option<bool> {
        self.parser.first_record_repeated_header()
    }
}

impl<T: SeqText> Iterator for FastqReader<T> {
    type Item = Result<SequenceRecord<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next()
    }
}

/// Path- and reader-based entry point for unaligned BAM.
///
/// BAM files are BGZF-compressed in the wild, which is a sequence of gzip
/// members; [`MultiGzDecoder`] handles that transparently. Raw uncompressed
/// streams are detected by the absence of the gzip magic.
pub struct BamReader<T: SeqText = String> {
    parser: BamParser<Box<dyn Read + Send>, T>,
}

impl<T: SeqText> BamReader<T> {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        if file.metadata()?.len() == 0 {
            return Err(crate::error::SeqError::Truncated);
        }
        let mmap = unsafe { Mmap::map(&file)? };
        let source: Box<dyn Read + Send> = if mmap.len() >= 2 && mmap[..2] == GZIP_MAGIC {
            Box::new(MultiGzDecoder::new(Cursor::new(mmap)))
        } else {
            Box::new(Cursor::new(mmap))
        };
        Ok(BamReader {
            parser: BamParserBuilder::new().build(source)?,
        })
    }

    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Result<Self> {
        let source: Box<dyn Read + Send> = Box::new(reader);
        Ok(BamReader {
            parser: BamParserBuilder::new().build(source)?,
        })
    }

    /// The raw SAM text header of the stream.
    #[inline]
    pub fn header(&self) -> &[u8] {
        self.parser.header()
    }

    #[inline]
    pub fn records_emitted(&self) -> u64 {
        self.parser.records_emitted()
    }
}

impl<T: SeqText> Iterator for BamReader<T> {
    type Item = Result<SequenceRecord<T>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.parser.next()
    }
}
