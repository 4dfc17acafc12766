//! Top-K selection.
//!
//! Candidates are ordered most-frequent-first, equal counts by descending
//! byte content. `TopK` walks that order lazily and skips anything too
//! similar to a result it has already produced.

use std::cmp::Ordering;
use std::iter::FusedIterator;

use crate::accumulator::ReducedTable;
use crate::matcher::{Matcher, MATCH_RATIO};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub content: Vec<u8>,
    pub count: usize,
}

fn rank_order(a: &(&[u8], usize), b: &(&[u8], usize)) -> Ordering {
    b.1.cmp(&a.1).then_with(|| b.0.cmp(a.0))
}

/// Copy the `reserve` best entries of `table` out in rank order.
pub fn select(table: &ReducedTable, reserve: usize) -> Vec<ResultEntry> {
    let mut ranked: Vec<(&[u8], usize)> = table.iter().collect();
    let n = reserve.min(ranked.len());
    if n == 0 {
        return Vec::new();
    }
    if n < ranked.len() {
        ranked.select_nth_unstable_by(n - 1, rank_order);
        ranked.truncate(n);
    }
    ranked.sort_unstable_by(rank_order);
    ranked
        .into_iter()
        .map(|(content, count)| ResultEntry {
            content: content.to_vec(),
            count,
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Filtered iterator
// ---------------------------------------------------------------------------

/// Up to `k` ranked results, none of which is a near-duplicate of an
/// earlier one. Single pass; stop consuming whenever convenient.
#[derive(Debug)]
pub struct TopK {
    candidates: std::vec::IntoIter<ResultEntry>,
    matcher: Matcher,
    remaining: usize,
}

impl TopK {
    pub fn new(candidates: Vec<ResultEntry>, k: usize) -> Self {
        Self::with_threshold(candidates, k, MATCH_RATIO)
    }

    pub fn with_threshold(candidates: Vec<ResultEntry>, k: usize, threshold: f64) -> Self {
        Self {
            candidates: candidates.into_iter(),
            matcher: Matcher::new(threshold),
            remaining: k,
        }
    }
}

impl Iterator for TopK {
    type Item = ResultEntry;

    fn next(&mut self) -> Option<ResultEntry> {
        if self.remaining == 0 {
            return None;
        }
        for entry in self.candidates.by_ref() {
            if self.matcher.is_close(&entry.content) {
                continue;
            }
            self.matcher.append(entry.content.clone());
            self.remaining -= 1;
            return Some(entry);
        }
        self.remaining = 0;
        None
    }
}

impl FusedIterator for TopK {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::LocalTable;

    fn entry(content: &str, count: usize) -> ResultEntry {
        ResultEntry {
            content: content.as_bytes().to_vec(),
            count,
        }
    }

    fn table(pairs: &[(&'static str, usize)]) -> ReducedTable {
        let local: LocalTable<'static> = pairs.iter().map(|&(k, c)| (k.as_bytes(), c)).collect();
        let mut t = ReducedTable::new();
        t.merge(&local, 0);
        t
    }

    #[test]
    fn select_orders_by_count_then_content() {
        let t = table(&[("bbbb", 5), ("aaaa", 5), ("cccc", 9), ("dddd", 1)]);
        let ranked = select(&t, 10);
        let keys: Vec<&str> = ranked
            .iter()
            .map(|e| std::str::from_utf8(&e.content).unwrap())
            .collect();
        assert_eq!(keys, ["cccc", "bbbb", "aaaa", "dddd"]);
    }

    #[test]
    fn select_respects_reserve() {
        let t = table(&[("k1", 1), ("k2", 2), ("k3", 3), ("k4", 4), ("k5", 5)]);
        let ranked = select(&t, 2);
        assert_eq!(ranked, vec![entry("k5", 5), entry("k4", 4)]);
        assert!(select(&t, 0).is_empty());
        assert!(select(&ReducedTable::new(), 10).is_empty());
    }

    #[test]
    fn dissimilar_list_passes_unchanged() {
        let list = vec![
            entry("0123456789", 50),
            entry("abcdefghij", 40),
            entry("KLMNOPQRST", 30),
            entry("uvwxyz!@#$", 20),
        ];
        let out: Vec<ResultEntry> = TopK::new(list.clone(), list.len()).collect();
        assert_eq!(out, list);
    }

    #[test]
    fn near_duplicates_are_skipped() {
        let list = vec![
            entry("abcdefghij", 9),
            entry("abcdefghiZ", 8),
            entry("0123456789", 7),
        ];
        let out: Vec<ResultEntry> = TopK::new(list, 5).collect();
        assert_eq!(out, vec![entry("abcdefghij", 9), entry("0123456789", 7)]);
    }

    #[test]
    fn rejected_candidates_are_not_comparators() {
        // "cdefghiZQR" is close to the rejected "abcdefghiZ" (0.8) but not
        // to the accepted "abcdefghij" (0.7).
        let list = vec![
            entry("abcdefghij", 9),
            entry("abcdefghiZ", 8),
            entry("cdefghiZQR", 7),
        ];
        let out: Vec<ResultEntry> = TopK::new(list, 5).collect();
        assert_eq!(out.len(), 2);
        assert_eq!(out[1], entry("cdefghiZQR", 7));
    }

    #[test]
    fn stops_at_k_and_can_stop_early() {
        let list: Vec<ResultEntry> = ["0000000000", "1111111111", "2222222222", "3333333333"]
            .iter()
            .zip((1..=4).rev())
            .map(|(s, c)| entry(s, c))
            .collect();
        assert_eq!(TopK::new(list.clone(), 2).count(), 2);

        let mut it = TopK::new(list, 10);
        assert_eq!(it.next(), Some(entry("0000000000", 4)));
    }

    #[test]
    fn exhausted_iterator_stays_empty() {
        let mut it = TopK::new(vec![entry("only-one-here", 3)], 5);
        assert!(it.next().is_some());
        assert!(it.next().is_none());
        assert!(it.next().is_none());
    }
}
