//! Near-duplicate detection.
//!
//! `ratio` is the Ratcliff/Obershelp similarity: find the longest common
//! block, recurse on the pieces to its left and right, and score
//! `2 * matched / (len(a) + len(b))`. Ties between equally long blocks go
//! to the one starting earliest in `a`, then earliest in `b`.

/// Similarity at or above which two results count as the same finding.
pub const MATCH_RATIO: f64 = 0.8;

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]` as
/// `(start in a, start in b, len)`.
fn longest_match(
    a: &[u8],
    b: &[u8],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
    prev: &mut Vec<usize>,
    cur: &mut Vec<usize>,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_len) = (alo, blo, 0);
    prev.clear();
    prev.resize(bhi - blo + 1, 0);

    for i in alo..ahi {
        cur.clear();
        cur.resize(bhi - blo + 1, 0);
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let k = prev[j - blo] + 1;
            cur[j - blo + 1] = k;
            if k > best_len {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_len = k;
            }
        }
        std::mem::swap(prev, cur);
    }

    (best_i, best_j, best_len)
}

/// Total length of all matching blocks between `a` and `b`.
fn matched_len(a: &[u8], b: &[u8]) -> usize {
    let mut prev = Vec::new();
    let mut cur = Vec::new();
    let mut queue = vec![((0, a.len()), (0, b.len()))];
    let mut matched = 0;

    while let Some(((alo, ahi), (blo, bhi))) = queue.pop() {
        let (i, j, k) = longest_match(a, b, (alo, ahi), (blo, bhi), &mut prev, &mut cur);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push(((alo, i), (blo, j)));
        }
        if i + k < ahi && j + k < bhi {
            queue.push(((i + k, ahi), (j + k, bhi)));
        }
    }

    matched
}

/// Similarity of two byte strings in `[0, 1]`. Two empty strings are
/// identical.
pub fn ratio(a: &[u8], b: &[u8]) -> f64 {
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_len(a, b) as f64 / total as f64
}

// ---------------------------------------------------------------------------
// Matcher
// ---------------------------------------------------------------------------

/// The set of strings accepted so far.
#[derive(Debug, Clone)]
pub struct Matcher {
    threshold: f64,
    accepted: Vec<Vec<u8>>,
}

impl Matcher {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            accepted: Vec::with_capacity(100),
        }
    }

    /// True if `candidate` is at least `threshold`-similar to anything
    /// accepted. Most recent acceptances are checked first.
    pub fn is_close(&self, candidate: &[u8]) -> bool {
        self.accepted
            .iter()
            .rev()
            .any(|seen| ratio(seen, candidate) >= self.threshold)
    }

    pub fn append(&mut self, accepted: Vec<u8>) {
        self.accepted.push(accepted);
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::new(MATCH_RATIO)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
