use std::fmt;
use std::ops::Range;
use std::sync::OnceLock;

use crate::error::{Result, SeqError};
use crate::mate;
use crate::simd;
use crate::tags;

mod sealed {
    pub trait Sealed {}
    impl Sealed for Vec<u8> {}
    impl Sealed for String {}
}

/// Storage flavor of a record's text fields.
///
/// Records are generic over how their validated ASCII content is held:
/// [`String`] for consumers that want `str` ergonomics, [`Vec<u8>`] for
/// byte-oriented pipelines. Both flavors behave identically; the trait is
/// sealed because the record invariants depend on its implementations.
pub trait SeqText: sealed::Sealed + Clone + PartialEq + fmt::Debug {
    /// Wrap bytes that the caller has already verified to be 7-bit ASCII.
    fn from_ascii(bytes: Vec<u8>) -> Self;
    fn as_bytes(&self) -> &[u8];
}

impl SeqText for Vec<u8> {
    #[inline]
    fn from_ascii(bytes: Vec<u8>) -> Self {
        bytes
    }

    #[inline]
    fn as_bytes(&self) -> &[u8] {
        self
    }
}

impl SeqText for String {
    #[inline]
    fn from_ascii(bytes: Vec<u8>) -> Self {
        debug_assert!(simd::is_ascii(&bytes));
        // ASCII is valid UTF-8; every construction path validates first.
        unsafe { String::from_utf8_unchecked(bytes) }
    }

    #[inline]
    fn as_bytes(&self) -> &[u8] {
        str::as_bytes(self)
    }
}

// Complement of every IUPAC nucleotide code, upper and lower case;
// identity for everything else.
const COMPLEMENT: [u8; 256] = {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = i as u8;
        i += 1;
    }
    let pairs: [(u8, u8); 14] = [
        (b'A', b'T'),
        (b'T', b'A'),
        (b'C', b'G'),
        (b'G', b'C'),
        (b'U', b'A'),
        (b'R', b'Y'),
        (b'Y', b'R'),
        (b'K', b'M'),
        (b'M', b'K'),
        (b'B', b'V'),
        (b'V', b'B'),
        (b'D', b'H'),
        (b'H', b'D'),
        (b'N', b'N'),
    ];
    let mut j = 0;
    while j < pairs.len() {
        let (from, to) = pairs[j];
        table[from as usize] = to;
        table[(from + 32) as usize] = to + 32;
        j += 1;
    }
    table
};

/// Assemble one FASTQ record as bytes:
/// `'@' name '\n' sequence '\n' '+' [name] '\n' qualities '\n'`.
///
/// The output is sized up front and filled in a single pass.
pub fn encode_fastq(name: &[u8], sequence: &[u8], qualities: &[u8], two_headers: bool) -> Vec<u8> {
    let second_header = if two_headers { name.len() } else { 0 };
    let total = name.len() + sequence.len() + qualities.len() + second_header + 6;
    let mut out = Vec::with_capacity(total);
    out.push(b'@');
    out.extend_from_slice(name);
    out.push(b'\n');
    out.extend_from_slice(sequence);
    out.extend_from_slice(b"\n+");
    if two_headers {
        out.extend_from_slice(name);
    }
    out.push(b'\n');
    out.extend_from_slice(qualities);
    out.push(b'\n');
    debug_assert_eq!(out.len(), total);
    out
}

/// An immutable sequencing read: name, nucleotide sequence and optional
/// Phred+33 qualities.
///
/// Records decoded from FASTA have no qualities, as do BAM records whose
/// quality bytes are the all-`0xFF` "missing" sentinel. Records decoded
/// from BAM additionally carry their auxiliary tag block verbatim.
#[derive(Debug, Clone)]
pub struct SequenceRecord<T: SeqText = String> {
    name: T,
    sequence: T,
    qualities: Option<T>,
    bam_tags: Option<Box<[u8]>>,
    // Lazily computed (id_len, comment_start) into `name`.
    head: OnceLock<(usize, usize)>,
}

/// The byte-flavored record, otherwise identical to [`SequenceRecord`].
pub type BytesSequenceRecord = SequenceRecord<Vec<u8>>;

impl<T: SeqText> SequenceRecord<T> {
    /// Construct a record, validating that all fields are 7-bit ASCII and
    /// that qualities (when present) match the sequence length.
    pub fn new(name: T, sequence: T, qualities: Option<T>) -> Result<Self> {
        check_ascii(name.as_bytes())?;
        check_ascii(sequence.as_bytes())?;
        if let Some(qualities) = &qualities {
            check_ascii(qualities.as_bytes())?;
            if qualities.as_bytes().len() != sequence.as_bytes().len() {
                return Err(SeqError::LengthMismatch {
                    seq_len: sequence.as_bytes().len(),
                    qual_len: qualities.as_bytes().len(),
                    line: None,
                });
            }
        }
        Ok(Self::from_validated(name, sequence, qualities))
    }

    /// Fast-path constructor for parsers that have already validated the
    /// whole input buffer.
    pub(crate) fn from_validated(name: T, sequence: T, qualities: Option<T>) -> Self {
        SequenceRecord {
            name,
            sequence,
            qualities,
            bam_tags: None,
            head: OnceLock::new(),
        }
    }

    pub(crate) fn with_bam_tags(mut self, tags: Vec<u8>) -> Self {
        self.bam_tags = Some(tags.into_boxed_slice());
        self
    }

    #[inline]
    pub fn name(&self) -> &T {
        &self.name
    }

    #[inline]
    pub fn sequence(&self) -> &T {
        &self.sequence
    }

    #[inline]
    pub fn qualities(&self) -> Option<&T> {
        self.qualities.as_ref()
    }

    #[inline]
    pub fn name_bytes(&self) -> &[u8] {
        self.name.as_bytes()
    }

    #[inline]
    pub fn sequence_bytes(&self) -> &[u8] {
        self.sequence.as_bytes()
    }

    /// Qualities as raw ASCII bytes.
    #[inline]
    pub fn qualities_as_bytes(&self) -> Option<&[u8]> {
        self.qualities.as_ref().map(SeqText::as_bytes)
    }

    /// The raw BAM auxiliary tag block, if this record came from BAM.
    #[inline]
    pub fn bam_tags(&self) -> Option<&[u8]> {
        self.bam_tags.as_deref()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.sequence.as_bytes().len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sequence.as_bytes().is_empty()
    }

    /// Replace the name. Re-validates and resets the cached id/comment.
    pub fn set_name(&mut self, name: T) -> Result<()> {
        check_ascii(name.as_bytes())?;
        self.name = name;
        self.head = OnceLock::new();
        Ok(())
    }

    /// Replace the sequence. Must keep the quality length invariant.
    pub fn set_sequence(&mut self, sequence: T) -> Result<()> {
        check_ascii(sequence.as_bytes())?;
        if let Some(qualities) = &self.qualities {
            if qualities.as_bytes().len() != sequence.as_bytes().len() {
                return Err(SeqError::LengthMismatch {
                    seq_len: sequence.as_bytes().len(),
                    qual_len: qualities.as_bytes().len(),
                    line: None,
                });
            }
        }
        self.sequence = sequence;
        Ok(())
    }

    /// Replace or remove the qualities.
    pub fn set_qualities(&mut self, qualities: Option<T>) -> Result<()> {
        if let Some(qualities) = &qualities {
            check_ascii(qualities.as_bytes())?;
            if qualities.as_bytes().len() != self.sequence.as_bytes().len() {
                return Err(SeqError::LengthMismatch {
                    seq_len: self.sequence.as_bytes().len(),
                    qual_len: qualities.as_bytes().len(),
                    line: None,
                });
            }
        }
        self.qualities = qualities;
        Ok(())
    }

    #[inline]
    fn head_indices(&self) -> (usize, usize) {
        *self.head.get_or_init(|| {
            let name = self.name.as_bytes();
            let id_len = name
                .iter()
                .position(|&b| b == b' ' || b == b'\t')
                .unwrap_or(name.len());
            let mut comment_start = id_len;
            while comment_start < name.len()
                && (name[comment_start] == b' ' || name[comment_start] == b'\t')
            {
                comment_start += 1;
            }
            (id_len, comment_start)
        })
    }

    /// The name up to the first space or tab (the whole name if none).
    #[inline]
    pub fn id(&self) -> &[u8] {
        &self.name.as_bytes()[..self.head_indices().0]
    }

    /// The name after the first whitespace run, `None` when empty.
    #[inline]
    pub fn comment(&self) -> Option<&[u8]> {
        let (_, comment_start) = self.head_indices();
        let name = self.name.as_bytes();
        if comment_start >= name.len() {
            None
        } else {
            Some(&name[comment_start..])
        }
    }

    /// A new record covering `range` of the bases, with qualities cut the
    /// same way. Out-of-bounds ends are clamped. Per-base BAM tags are
    /// re-trimmed to the subrange.
    pub fn slice(&self, range: Range<usize>) -> Self {
        let n = self.len();
        let start = range.start.min(n);
        let stop = range.end.min(n).max(start);
        let sequence = T::from_ascii(self.sequence.as_bytes()[start..stop].to_vec());
        let qualities = self
            .qualities
            .as_ref()
            .map(|q| T::from_ascii(q.as_bytes()[start..stop].to_vec()));
        SequenceRecord {
            name: self.name.clone(),
            sequence,
            qualities,
            bam_tags: self
                .bam_tags
                .as_deref()
                .map(|block| tags::trim_tags_for_slice(block, start, stop, n).into()),
            head: OnceLock::new(),
        }
    }

    /// Like [`slice`](Self::slice) but keeping only every `step`-th base.
    /// For `step != 1` the per-base BAM tags cannot be adjusted and are
    /// dropped.
    ///
    /// # Panics
    ///
    /// Panics when `step` is zero.
    pub fn slice_step(&self, range: Range<usize>, step: usize) -> Self {
        assert!(step > 0, "slice step must be positive");
        if step == 1 {
            return self.slice(range);
        }
        let n = self.len();
        let start = range.start.min(n);
        let stop = range.end.min(n).max(start);
        let take = |bytes: &[u8]| -> Vec<u8> {
            bytes[start..stop].iter().step_by(step).copied().collect()
        };
        SequenceRecord {
            name: self.name.clone(),
            sequence: T::from_ascii(take(self.sequence.as_bytes())),
            qualities: self
                .qualities
                .as_ref()
                .map(|q| T::from_ascii(take(q.as_bytes()))),
            bam_tags: self
                .bam_tags
                .as_deref()
                .map(|block| tags::drop_per_base_tags(block).into()),
            head: OnceLock::new(),
        }
    }

    /// The reverse complement: sequence reversed and complemented through
    /// the IUPAC table, qualities reversed. The name is unchanged.
    /// Per-base BAM tags no longer apply and are dropped.
    pub fn reverse_complement(&self) -> Self {
        let sequence: Vec<u8> = self
            .sequence
            .as_bytes()
            .iter()
            .rev()
            .map(|&b| COMPLEMENT[b as usize])
            .collect();
        let qualities = self.qualities.as_ref().map(|q| {
            let mut reversed = q.as_bytes().to_vec();
            reversed.reverse();
            T::from_ascii(reversed)
        });
        SequenceRecord {
            name: self.name.clone(),
            sequence: T::from_ascii(sequence),
            qualities,
            bam_tags: self
                .bam_tags
                .as_deref()
                .map(|block| tags::drop_per_base_tags(block).into()),
            head: OnceLock::new(),
        }
    }

    /// The record serialized as FASTQ bytes; with `two_headers` the name is
    /// repeated after the `+` separator.
    pub fn fastq_bytes(&self, two_headers: bool) -> Result<Vec<u8>> {
        let qualities = self.qualities.as_ref().ok_or(SeqError::QualitiesRequired)?;
        Ok(encode_fastq(
            self.name.as_bytes(),
            self.sequence.as_bytes(),
            qualities.as_bytes(),
            two_headers,
        ))
    }

    /// Whether `other` is the mate of this record (same fragment id, with
    /// any trailing pair digit ignored).
    #[inline]
    pub fn is_mate(&self, other: &Self) -> bool {
        mate::headers_are_mates(self.name.as_bytes(), other.name.as_bytes())
    }
}

impl<T: SeqText> PartialEq for SequenceRecord<T> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.sequence == other.sequence
            && self.qualities == other.qualities
    }
}

impl<T: SeqText> Eq for SequenceRecord<T> {}

impl<T: SeqText> fmt::Display for SequenceRecord<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Fields are ASCII by construction, so lossy conversion is exact.
        write!(
            f,
            "@{}\n{}",
            String::from_utf8_lossy(self.name.as_bytes()),
            String::from_utf8_lossy(self.sequence.as_bytes())
        )?;
        if let Some(qualities) = &self.qualities {
            write!(f, "\n+\n{}", String::from_utf8_lossy(qualities.as_bytes()))?;
        }
        Ok(())
    }
}

#[inline]
fn check_ascii(bytes: &[u8]) -> Result<()> {
    if simd::is_ascii(bytes) {
        Ok(())
    } else {
        let byte = bytes.iter().copied().find(|b| b & 0x80 != 0).unwrap_or(0);
        Err(SeqError::NonAscii { byte })
    }
}
