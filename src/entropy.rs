//! Sliding-window Shannon entropy.
//!
//! `EntropyCache` keeps per-byte frequencies and entropy contributions for
//! the last window it saw. When the next query is the same-length window
//! shifted forward by one byte, only the outgoing and incoming bytes are
//! updated. A query further ahead re-seeds the table from scratch.

use crate::fastlog2::fast_log2;

/// Incremental updates allowed before an exact recomputation is forced.
pub const RESYNC_PERIOD: usize = 1000;

// ---------------------------------------------------------------------------
// Exact entropy
// ---------------------------------------------------------------------------

/// `p * log2(p)` for a byte seen `freq` times in a window of `len` bytes.
#[inline]
fn weight(freq: usize, len: usize) -> f32 {
    let p = freq as f32 / len as f32;
    p * fast_log2(p)
}

/// Shannon entropy of `window` in bits per byte. Windows shorter than two
/// bytes have entropy 0.
pub fn shannon_entropy(window: &[u8]) -> f32 {
    if window.len() < 2 {
        return 0.0;
    }
    let mut freqs = [0usize; 256];
    for &b in window {
        freqs[b as usize] += 1;
    }
    freqs
        .iter()
        .filter(|&&f| f != 0)
        .map(|&f| -weight(f, window.len()))
        .sum()
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
struct Slot {
    freq: usize,
    /// This byte's `p * log2(p)` term (non-positive).
    weight: f32,
}

#[derive(Debug, Clone)]
struct Window {
    start: usize,
    len: usize,
}

#[derive(Debug, Clone)]
pub struct EntropyCache {
    slots: [Slot; 256],
    entropy: f32,
    window: Option<Window>,
    steps: usize,
    /// First byte of the cached window; leaves on the next slide.
    outgoing: u8,
}

impl EntropyCache {
    pub fn new() -> Self {
        Self {
            slots: [Slot::default(); 256],
            entropy: 0.0,
            window: None,
            steps: 0,
            outgoing: 0,
        }
    }

    /// Entropy of `window`, which starts at offset `start` of the scanned
    /// buffer. Slides forward by one byte at a fixed length are O(1).
    ///
    /// Queries that do not move past the cached start (longer probes at the
    /// same offset) are computed exactly and leave the cache alone, so the
    /// cache keeps following the first length probed at each offset.
    pub fn estimate(&mut self, window: &[u8], start: usize) -> f32 {
        let (slides, behind) = match &self.window {
            Some(w) => (start == w.start + 1 && window.len() == w.len, start <= w.start),
            None => (false, false),
        };
        if behind {
            return shannon_entropy(window);
        }
        if slides && self.steps < RESYNC_PERIOD {
            self.slide(window);
        } else {
            self.reseed(window, start);
        }
        self.entropy
    }

    fn slide(&mut self, window: &[u8]) {
        let len = window.len();

        let out = &mut self.slots[self.outgoing as usize];
        if out.freq > 0 {
            self.entropy += out.weight;
            out.freq -= 1;
            if out.freq > 0 {
                out.weight = weight(out.freq, len);
                self.entropy -= out.weight;
            } else {
                out.weight = 0.0;
            }
        }

        let incoming = window[len - 1];
        let inc = &mut self.slots[incoming as usize];
        if inc.freq > 0 {
            self.entropy += inc.weight;
        }
        inc.freq += 1;
        inc.weight = weight(inc.freq, len);
        self.entropy -= inc.weight;

        self.outgoing = window[0];
        self.steps += 1;
        if let Some(w) = self.window.as_mut() {
            w.start += 1;
        }
    }

    fn reseed(&mut self, window: &[u8], start: usize) {
        self.slots = [Slot::default(); 256];
        self.entropy = 0.0;
        self.steps = 0;
        self.outgoing = window.first().copied().unwrap_or(0);
        self.window = Some(Window {
            start,
            len: window.len(),
        });

        for &b in window {
            self.slots[b as usize].freq += 1;
        }
        if window.len() < 2 {
            return;
        }
        for slot in self.slots.iter_mut().filter(|s| s.freq != 0) {
            slot.weight = weight(slot.freq, window.len());
            self.entropy -= slot.weight;
        }
    }
}

impl Default for EntropyCache {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
