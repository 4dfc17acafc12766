//! Global reduced table.
//!
//! Owns copies of the substrings merged in from per-chunk local tables and
//! their accumulated counts. Eviction keeps the table bounded by dropping
//! the lower part of the count range in one linear pass.

use ahash::AHashMap;

use crate::scanner::{LocalTable, Scanner};

/// Fraction of RAM (1 / n) the reduced table may occupy before eviction.
pub const KEYS_MEM_DIV: u64 = 5;
/// Approximate bytes per owned entry beyond the key bytes: the `Vec`
/// header, the count and hash-table control bytes.
pub const OWNED_ENTRY_OVERHEAD: u64 = 40;

/// Number of ranked candidates worth keeping to produce `amount` results.
pub fn calc_reserve(amount: usize, scanner: &Scanner) -> usize {
    let range = scanner.max_len - scanner.min_len + 1;
    amount
        .saturating_mul(scanner.max_len)
        .saturating_mul(range)
        / scanner.stride
}

/// Entry count the table may reach before RAM pressure warrants eviction.
/// Zero when `ram_size` is unknown.
pub fn memory_ceiling(ram_size: u64, scanner: &Scanner) -> usize {
    let avg_key = (scanner.min_len + scanner.max_len) as u64 / 2;
    (ram_size / KEYS_MEM_DIV / (avg_key + OWNED_ENTRY_OVERHEAD)) as usize
}

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Outcome of one eviction pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Eviction {
    /// Entries with a count at or below this were removed.
    pub lower_bound: usize,
    pub removed: usize,
    pub remaining: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ReducedTable {
    entries: AHashMap<Vec<u8>, usize>,
}

impl ReducedTable {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &[u8]) -> Option<usize> {
        self.entries.get(key).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&[u8], usize)> + '_ {
        self.entries.iter().map(|(k, &c)| (k.as_slice(), c))
    }

    /// Add every local entry whose count exceeds `drop`, copying its bytes
    /// out of the chunk buffer.
    pub fn merge(&mut self, local: &LocalTable<'_>, drop: usize) {
        for (&key, &count) in local {
            if count <= drop {
                continue;
            }
            match self.entries.get_mut(key) {
                Some(total) => *total += count,
                None => {
                    self.entries.insert(key.to_vec(), count);
                }
            }
        }
    }

    /// Fold a finished table into this one, summing counts.
    pub fn absorb(&mut self, other: ReducedTable) {
        if self.entries.is_empty() {
            self.entries = other.entries;
            return;
        }
        for (key, count) in other.entries {
            *self.entries.entry(key).or_insert(0) += count;
        }
    }

    /// Drop low-count entries when the table has outgrown both `2 * reserve`
    /// and the RAM-derived `ceiling`.
    ///
    /// The cutoff interpolates linearly between the smallest and largest
    /// count so that roughly `reserve` entries would survive a uniform
    /// spread. Entries equal to the cutoff are removed too.
    pub fn evict(&mut self, reserve: usize, ceiling: usize) -> Option<Eviction> {
        let size = self.entries.len();
        if size < reserve.saturating_mul(2) || size < ceiling {
            return None;
        }

        let mut counts = self.entries.values().copied();
        let first = counts.next()?;
        let (min, max) = counts.fold((first, first), |(lo, hi), c| (lo.min(c), hi.max(c)));

        let span = (max - min) as f64 / size as f64;
        let lower_bound = (span * (size - reserve) as f64) as usize + min;
        self.entries.retain(|_, c| *c > lower_bound);

        let remaining = self.entries.len();
        Some(Eviction {
            lower_bound,
            removed: size - remaining,
            remaining,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
