use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SeqError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("non-ASCII byte 0x{byte:02x} in input")]
    NonAscii { byte: u8 },

    #[error("record header at line {line} does not start with '@' (found {found:?})")]
    BadHeader { found: char, line: u64 },

    #[error("separator at line {line} does not start with '+' (found {found:?})")]
    BadSeparator { found: char, line: u64 },

    #[error("repeated header at line {line} does not match the record header")]
    HeaderMismatch { line: u64 },

    #[error("sequence and quality lengths don't match (seq: {seq_len}, qual: {qual_len})")]
    LengthMismatch {
        seq_len: usize,
        qual_len: usize,
        line: Option<u64>,
    },

    #[error("premature end of input at approximately line {line}")]
    PrematureEof { line: u64 },

    #[error("reader returned {returned} bytes but at most {requested} were requested")]
    ReaderContract { requested: usize, returned: usize },

    #[error("not a BAM stream: expected magic b\"BAM\\x01\", found {found:?}")]
    BadMagic { found: [u8; 4] },

    #[error("truncated BAM stream")]
    Truncated,

    #[error("BAM record with flag {flag} is not an unmapped single read; convert mapped data with samtools fastq first")]
    Unsupported { flag: u16 },

    #[error("cannot produce FASTQ bytes from a record without qualities")]
    QualitiesRequired,

    #[error("record does not fit into a buffer of {buffer_size} bytes")]
    RecordTooLarge { buffer_size: usize },

    #[error("paired-end inputs out of sync: {0}")]
    PairedDesync(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SeqError>;
