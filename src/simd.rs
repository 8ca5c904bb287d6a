#[cfg(target_arch = "x86_64")]
use std::arch::x86_64::*;
use std::sync::OnceLock;

static HAS_AVX2: OnceLock<bool> = OnceLock::new();
static HAS_SSSE3: OnceLock<bool> = OnceLock::new();

#[inline]
fn has_avx2() -> bool {
    *HAS_AVX2.get_or_init(|| {
        #[cfg(target_arch = "x86_64")]
        {
            is_x86_feature_detected!("avx2")
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            false
        }
    })
}

#[inline]
fn has_ssse3() -> bool {
    *HAS_SSSE3.get_or_init(|| {
        #[cfg(target_arch = "x86_64")]
        {
            is_x86_feature_detected!("ssse3")
        }
        #[cfg(not(target_arch = "x86_64"))]
        {
            false
        }
    })
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn scan_for_byte_avx2(haystack: &[u8], needle: u8) -> Option<usize> {
    debug_assert!(haystack.len() >= 32);
    // Fold the match masks of two vectors into one u64 so a single branch
    // covers a 64-byte stride.
    let needle_vec = _mm256_set1_epi8(needle as i8);
    let ptr = haystack.as_ptr();
    let len = haystack.len();

    let mut at = 0;
    while at + 64 <= len {
        let low = _mm256_cmpeq_epi8(_mm256_loadu_si256(ptr.add(at) as *const __m256i), needle_vec);
        let high = _mm256_cmpeq_epi8(
            _mm256_loadu_si256(ptr.add(at + 32) as *const __m256i),
            needle_vec,
        );
        let folded = _mm256_movemask_epi8(low) as u32 as u64
            | (_mm256_movemask_epi8(high) as u32 as u64) << 32;
        if folded != 0 {
            return Some(at + folded.trailing_zeros() as usize);
        }
        at += 64;
    }
    while at + 32 <= len {
        let hits = _mm256_cmpeq_epi8(_mm256_loadu_si256(ptr.add(at) as *const __m256i), needle_vec);
        let mask = _mm256_movemask_epi8(hits) as u32;
        if mask != 0 {
            return Some(at + mask.trailing_zeros() as usize);
        }
        at += 32;
    }
    if at < len {
        // Overlapping final vector, as in the ASCII scan; hits inside the
        // already-scanned overlap are shifted out of the mask.
        let tail_start = len - 32;
        let hits = _mm256_cmpeq_epi8(
            _mm256_loadu_si256(ptr.add(tail_start) as *const __m256i),
            needle_vec,
        );
        let mask = (_mm256_movemask_epi8(hits) as u32) >> (at - tail_start);
        if mask != 0 {
            return Some(at + mask.trailing_zeros() as usize);
        }
    }
    None
}

#[inline]
pub fn find_char(data: &[u8], target: u8, start: usize) -> Option<usize> {
    let haystack = &data[start..];
    #[cfg(target_arch = "x86_64")]
    {
        if haystack.len() >= 32 && has_avx2() {
            return unsafe { scan_for_byte_avx2(haystack, target) }.map(|hit| start + hit);
        }
    }

    memchr::memchr(target, haystack).map(|hit| start + hit)
}

#[inline]
pub fn count_chars(data: &[u8], target: u8) -> usize {
    memchr::memchr_iter(target, data).count()
}

const ASCII_MASK_WORD: u64 = 0x8080_8080_8080_8080;

fn is_ascii_scalar(data: &[u8]) -> bool {
    let mut acc: u64 = 0;
    let chunks = data.chunks_exact(8);
    let remainder = chunks.remainder();
    for chunk in chunks {
        let word = u64::from_le_bytes(chunk.try_into().expect("chunk is 8 bytes"));
        acc |= word;
    }
    let mut tail: u8 = 0;
    for &byte in remainder {
        tail |= byte;
    }
    acc & ASCII_MASK_WORD == 0 && tail & 0x80 == 0
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
#[inline]
unsafe fn is_ascii_avx2(data: &[u8]) -> bool {
    debug_assert!(data.len() >= 32);
    let mut acc = _mm256_setzero_si256();
    let mut offset = 0;
    while offset + 32 <= data.len() {
        let vector = _mm256_loadu_si256(data.as_ptr().add(offset) as *const __m256i);
        acc = _mm256_or_si256(acc, vector);
        offset += 32;
    }
    if offset < data.len() {
        // Re-reading bytes is fine: the high-bit test is idempotent under OR.
        let tail = _mm256_loadu_si256(data.as_ptr().add(data.len() - 32) as *const __m256i);
        acc = _mm256_or_si256(acc, tail);
    }
    _mm256_movemask_epi8(acc) == 0
}

/// Returns true iff every byte in `data` has its high bit clear.
/// The empty slice counts as ASCII.
#[inline]
pub fn is_ascii(data: &[u8]) -> bool {
    #[cfg(target_arch = "x86_64")]
    {
        if data.len() >= 32 && has_avx2() {
            return unsafe { is_ascii_avx2(data) };
        }
    }

    is_ascii_scalar(data)
}

/// The BAM 4-bit nucleotide alphabet, indexed by nibble value.
pub const NUC_LOOKUP: [u8; 16] = *b"=ACMGRSVTWYHKDBN";

// Two decoded bases per packed byte, the htslib double-lookup trick.
const CODE2BASE: [[u8; 2]; 256] = {
    let mut table = [[0u8; 2]; 256];
    let mut i = 0;
    while i < 256 {
        table[i] = [NUC_LOOKUP[i >> 4], NUC_LOOKUP[i & 0xf]];
        i += 1;
    }
    table
};

fn decode_packed_scalar(out: &mut [u8], packed: &[u8]) {
    let n_bases = out.len();
    let pairs = n_bases / 2;
    for i in 0..pairs {
        let decoded = CODE2BASE[packed[i] as usize];
        out[2 * i] = decoded[0];
        out[2 * i + 1] = decoded[1];
    }
    if n_bases % 2 == 1 {
        // A single high nibble is left.
        out[n_bases - 1] = NUC_LOOKUP[(packed[pairs] >> 4) as usize];
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "ssse3")]
unsafe fn decode_packed_ssse3(out: &mut [u8], packed: &[u8]) {
    // 16 packed bytes expand to 32 bases per iteration. Shuffle the packed
    // bytes so every output lane holds its source byte, shift the high-nibble
    // lanes right by four, mask down to 4-bit indexes and use those to
    // shuffle the nucleotide alphabet into place.
    let lookup = _mm_loadu_si128(NUC_LOOKUP.as_ptr() as *const __m128i);
    let first_upper = _mm_setr_epi8(0, -1, 1, -1, 2, -1, 3, -1, 4, -1, 5, -1, 6, -1, 7, -1);
    let first_lower = _mm_setr_epi8(-1, 0, -1, 1, -1, 2, -1, 3, -1, 4, -1, 5, -1, 6, -1, 7);
    let second_upper = _mm_setr_epi8(8, -1, 9, -1, 10, -1, 11, -1, 12, -1, 13, -1, 14, -1, 15, -1);
    let second_lower = _mm_setr_epi8(-1, 8, -1, 9, -1, 10, -1, 11, -1, 12, -1, 13, -1, 14, -1, 15);
    let low_nibbles = _mm_set1_epi8(0xf);

    let n_bases = out.len();
    let mut out_idx = 0;
    let mut packed_idx = 0;
    while n_bases - out_idx >= 32 {
        let encoded = _mm_loadu_si128(packed.as_ptr().add(packed_idx) as *const __m128i);

        let upper = _mm_srli_epi64(_mm_shuffle_epi8(encoded, first_upper), 4);
        let lower = _mm_shuffle_epi8(encoded, first_lower);
        let indexes = _mm_and_si128(_mm_or_si128(upper, lower), low_nibbles);
        let bases = _mm_shuffle_epi8(lookup, indexes);
        _mm_storeu_si128(out.as_mut_ptr().add(out_idx) as *mut __m128i, bases);

        let upper = _mm_srli_epi64(_mm_shuffle_epi8(encoded, second_upper), 4);
        let lower = _mm_shuffle_epi8(encoded, second_lower);
        let indexes = _mm_and_si128(_mm_or_si128(upper, lower), low_nibbles);
        let bases = _mm_shuffle_epi8(lookup, indexes);
        _mm_storeu_si128(out.as_mut_ptr().add(out_idx + 16) as *mut __m128i, bases);

        packed_idx += 16;
        out_idx += 32;
    }
    decode_packed_scalar(&mut out[out_idx..], &packed[packed_idx..]);
}

/// Expand a 4-bit-packed BAM sequence (high nibble first) into `n_bases`
/// ASCII nucleotides from the `=ACMGRSVTWYHKDBN` alphabet.
///
/// `packed` must hold at least `n_bases.div_ceil(2)` bytes.
pub fn decode_bam_sequence(packed: &[u8], n_bases: usize) -> Vec<u8> {
    assert!(packed.len() >= n_bases.div_ceil(2));
    let mut out = vec![0u8; n_bases];

    #[cfg(target_arch = "x86_64")]
    {
        if n_bases >= 32 && has_ssse3() {
            unsafe { decode_packed_ssse3(&mut out, packed) };
            return out;
        }
    }

    decode_packed_scalar(&mut out, packed);
    out
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn add_phred_offset_avx2(out: &mut [u8], raw: &[u8]) {
    let offset = _mm256_set1_epi8(33);
    let chunks = raw.chunks_exact(32);
    let tail_start = raw.len() - chunks.remainder().len();

    for (chunk_idx, chunk) in chunks.enumerate() {
        let vector = _mm256_loadu_si256(chunk.as_ptr() as *const __m256i);
        let shifted = _mm256_add_epi8(vector, offset);
        _mm256_storeu_si256(out.as_mut_ptr().add(chunk_idx * 32) as *mut __m256i, shifted);
    }
    for i in tail_start..raw.len() {
        out[i] = raw[i].wrapping_add(33);
    }
}

/// Translate raw BAM quality values to Phred+33 ASCII.
pub fn decode_bam_qualities(raw: &[u8]) -> Vec<u8> {
    let mut out = vec![0u8; raw.len()];

    #[cfg(target_arch = "x86_64")]
    {
        if raw.len() >= 32 && has_avx2() {
            unsafe { add_phred_offset_avx2(&mut out, raw) };
            return out;
        }
    }

    for (dst, &src) in out.iter_mut().zip(raw) {
        *dst = src.wrapping_add(33);
    }
    out
}
