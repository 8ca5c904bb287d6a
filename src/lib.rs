pub mod bam;
pub mod buffer;
pub mod chunks;
pub mod error;
pub mod fastq;
pub mod mate;
pub mod parallel;
pub mod reader;
pub mod record;
pub mod simd;
pub mod tags;
pub mod writer;

pub use bam::{BamParser, BamParserBuilder};
pub use chunks::{fastq_head, paired_fastq_heads, ChunkReader, PairedChunkReader};
pub use error::{Result, SeqError};
pub use fastq::{FastqParser, FastqParserBuilder};
pub use mate::{headers_are_mates, records_are_mates};
pub use parallel::ParallelParser;
pub use reader::{BamReader, FastqReader};
pub use record::{encode_fastq, BytesSequenceRecord, SeqText, SequenceRecord};
pub use writer::FastqWriter;
