//! Partition planner.
//!
//! Splits a file into byte ranges for the worker pool. Every range except
//! the first is extended `max_len` bytes backward, so the start offsets a
//! range enumerates (its core) pick up exactly where the previous range's
//! core ended and every substring starting in a core lies fully inside
//! that range.

use std::ops::Range;

use crate::scanner::Scanner;

/// Fraction of RAM (1 / n) the concurrent local tables may occupy.
pub const WORK_MEM_DIV: u64 = 2;
/// Approximate bytes per local-table entry: a borrowed key, its count and
/// hash-table control bytes at typical load.
pub const ENTRY_OVERHEAD: u64 = 32;
/// Smallest chunk the RAM heuristic will plan for.
pub const MIN_CHUNK_SIZE: u64 = 1 << 20;

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// One worker's share of the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub index: u64,
    /// First byte read.
    pub offset: u64,
    /// Bytes read, including the backward overlap.
    pub len: u64,
}

impl ChunkRange {
    #[inline]
    pub fn end(&self) -> u64 {
        self.offset + self.len
    }

    /// Absolute start offsets this range enumerates.
    pub fn core(&self, max_len: usize) -> Range<u64> {
        let end = self.end().saturating_sub(max_len as u64).max(self.offset);
        self.offset..end
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Estimations {
    pub file_size: u64,
    pub chunk_count: u64,
    /// Nominal (pre-overlap) chunk size.
    pub chunk_size: u64,
    /// Bytes left over by the division, absorbed by the last chunk.
    pub remainder: u64,
    pub pool_size: usize,
    /// Drop threshold to apply when merging; 0 keeps everything.
    pub drop: usize,
}

impl Estimations {
    /// Lay out the read ranges, in file order.
    pub fn chunks(&self, max_len: usize) -> Vec<ChunkRange> {
        let overlap = max_len as u64;
        let last = self.chunk_count.saturating_sub(1);
        (0..self.chunk_count)
            .map(|i| {
                let nominal = i * self.chunk_size;
                let offset = if i == 0 { 0 } else { nominal.saturating_sub(overlap) };
                let end = if i == last {
                    self.file_size
                } else {
                    nominal + self.chunk_size
                };
                ChunkRange {
                    index: i,
                    offset,
                    len: end - offset,
                }
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Planning
// ---------------------------------------------------------------------------

/// Working-set bytes per input byte of a chunk: the buffer itself plus one
/// table entry for every probed length.
pub fn per_byte_cost(scanner: &Scanner) -> u64 {
    let probes = scanner.lengths().count().max(1) as u64;
    1 + probes * ENTRY_OVERHEAD
}

fn auto_scale(file_size: u64, pool: u64, ram_size: u64, scanner: &Scanner) -> u64 {
    let budget = ram_size / WORK_MEM_DIV;
    let per_worker = (budget / pool / per_byte_cost(scanner)).max(MIN_CHUNK_SIZE);
    let chunk_count = file_size.div_ceil(per_worker);
    chunk_count.div_ceil(pool).max(1)
}

/// Decide how to chunk a `file_size`-byte file for `pool_size` workers.
///
/// `scale` multiplies the pool size into a chunk count; 0 derives it from
/// `ram_size`, or falls back to `pool_size` when RAM is unknown (0).
pub fn tune_on_size(
    file_size: u64,
    pool_size: usize,
    scale: usize,
    ram_size: u64,
    scanner: &Scanner,
    drop: usize,
) -> Estimations {
    let pool = pool_size.max(1) as u64;
    let max_len = scanner.max_len as u64;

    if file_size / pool <= max_len {
        log::debug!("{file_size} bytes is too small to split across {pool} workers");
        return Estimations {
            file_size,
            chunk_count: 1,
            chunk_size: file_size,
            remainder: 0,
            pool_size: 1,
            drop,
        };
    }

    let scale = match (scale, ram_size) {
        (0, 0) => pool,
        (0, ram) => auto_scale(file_size, pool, ram, scanner),
        (s, _) => s as u64,
    };

    let mut chunk_count = pool * scale;
    let mut chunk_size = file_size / chunk_count;
    let mut drop = drop;
    if chunk_size < max_len {
        chunk_size = max_len;
        chunk_count = file_size / max_len;
        drop = 0;
        log::debug!("chunks clamped to {max_len} bytes, drop threshold disabled");
    }

    let est = Estimations {
        file_size,
        chunk_count,
        chunk_size,
        remainder: file_size - chunk_count * chunk_size,
        pool_size: pool as usize,
        drop,
    };
    log::debug!("plan: {est:?} (scale {scale})");
    est
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
