//! Substring enumerator.
//!
//! Walks every start offset of a buffer and probes a strided subset of
//! candidate lengths, counting exact byte-content matches in a table whose
//! keys borrow from the buffer. A length scan stops early at the first
//! candidate that is non-ASCII (when requested) or whose entropy falls
//! outside the informative band.

use ahash::AHashMap;

use crate::entropy::EntropyCache;

/// Windows at or above this entropy (bits/byte) look like noise.
pub const MAX_ENTROPY: f32 = 3.5;
/// Windows at or below this entropy look degenerate.
pub const MIN_ENTROPY: f32 = 2.5;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Per-buffer substring counts. Keys are views into the scanned buffer.
pub type LocalTable<'a> = AHashMap<&'a [u8], usize>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scanner {
    pub min_len: usize,
    pub max_len: usize,
    /// Only lengths divisible by `stride` are probed.
    pub stride: usize,
}

impl Scanner {
    pub fn new(min_len: usize, max_len: usize, stride: usize) -> Self {
        debug_assert!(min_len <= max_len && stride > 0);
        Self {
            min_len,
            max_len,
            stride,
        }
    }

    /// Candidate lengths probed at each start, ascending.
    pub fn lengths(&self) -> impl Iterator<Item = usize> + '_ {
        (self.min_len..=self.max_len).filter(move |len| len % self.stride == 0)
    }

    /// Number of start offsets enumerated in a buffer of `data_len` bytes.
    #[inline]
    pub fn starts(&self, data_len: usize) -> usize {
        data_len.saturating_sub(self.max_len)
    }

    // -----------------------------------------------------------------------
    // Scan
    // -----------------------------------------------------------------------

    /// Count recurring substrings of `data`.
    ///
    /// Starts run over `0..data.len() - max_len`, so every probed view fits
    /// in the buffer. Buffers no longer than `max_len` yield an empty table.
    pub fn scan<'a>(&self, data: &'a [u8], ascii_only: bool, entropy_filter: bool) -> LocalTable<'a> {
        let mut counts = LocalTable::new();
        let mut cache = EntropyCache::new();
        let lengths: Vec<usize> = self.lengths().collect();

        for start in 0..self.starts(data.len()) {
            for &len in &lengths {
                let view = &data[start..start + len];
                if ascii_only && !view.is_ascii() {
                    break;
                }
                if entropy_filter {
                    let entropy = cache.estimate(view, start);
                    if entropy >= MAX_ENTROPY || entropy <= MIN_ENTROPY {
                        break;
                    }
                }
                *counts.entry(view).or_insert(0) += 1;
            }
        }

        counts
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
