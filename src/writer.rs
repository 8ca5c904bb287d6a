use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use flate2::write::GzEncoder;
use flate2::Compression;

use crate::error::Result;
use crate::record::{SeqText, SequenceRecord};

enum Sink<W: Write> {
    Plain(BufWriter<W>),
    Gzip(GzEncoder<BufWriter<W>>),
}

/// Serializes records back to FASTQ bytes.
///
/// Each record is assembled in one pre-sized allocation and written out.
/// With [`two_headers`](Self::two_headers) the record name is repeated on
/// the `+` line, matching inputs that carry the header twice; feed it from
/// the parser's first-record sentinel to reproduce the input style.
pub struct FastqWriter<W: Write> {
    sink: Sink<W>,
    two_headers: bool,
}

impl FastqWriter<File> {
    pub fn to_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path)?;

        if path.extension().and_then(|s| s.to_str()) == Some("gz") {
            Ok(FastqWriter {
                sink: Sink::Gzip(GzEncoder::new(BufWriter::new(file), Compression::default())),
                two_headers: false,
            })
        } else {
            Ok(FastqWriter {
                sink: Sink::Plain(BufWriter::new(file)),
                two_headers: false,
            })
        }
    }
}

impl<W: Write> FastqWriter<W> {
    pub fn new(writer: W) -> Self {
        FastqWriter {
            sink: Sink::Plain(BufWriter::new(writer)),
            two_headers: false,
        }
    }

    pub fn new_gzip(writer: W, compression: Compression) -> Self {
        FastqWriter {
            sink: Sink::Gzip(GzEncoder::new(BufWriter::new(writer), compression)),
            two_headers: false,
        }
    }

    /// Repeat the record name after the `+` separator.
    pub fn two_headers(mut self, two_headers: bool) -> Self {
        self.two_headers = two_headers;
        self
    }

    pub fn write_record<T: SeqText>(&mut self, record: &SequenceRecord<T>) -> Result<()> {
        let bytes = record.fastq_bytes(self.two_headers)?;
        let writer: &mut dyn Write = match &mut self.sink {
            Sink::Plain(w) => w,
            Sink::Gzip(w) => w,
        };
        writer.write_all(&bytes)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        match &mut self.sink {
            Sink::Plain(w) => w.flush()?,
            Sink::Gzip(w) => w.flush()?,
        }
        Ok(())
    }
}

impl<W: Write> Drop for FastqWriter<W> {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}
