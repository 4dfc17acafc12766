//! Mining drivers.
//!
//! `Miner` owns the run parameters and the reduced table. `process` scans a
//! single buffer; `process_file` scans a whole file on the calling thread;
//! `process_concurrent` plans overlapping chunks and scans them on a rayon
//! pool, merging each local table into the shared one as it finishes.

use std::fs::{self, File};
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::time::Instant;

use rayon::prelude::*;

use crate::accumulator::{calc_reserve, memory_ceiling, ReducedTable};
use crate::config::Params;
use crate::error::{Error, Result};
use crate::planner::{tune_on_size, ChunkRange};
use crate::ranking::{select, TopK};
use crate::scanner::{LocalTable, Scanner};
use crate::system;

/// Merges between eviction checks.
pub const EVICT_EVERY: usize = 8;

/// Shared state behind the merge lock.
struct Accumulator {
    table: ReducedTable,
    merges: usize,
}

#[derive(Debug)]
pub struct Miner {
    params: Params,
    scanner: Scanner,
    ram_size: u64,
    pool_size: usize,
    table: ReducedTable,
}

impl Miner {
    /// `ram_size` is total physical memory in bytes, 0 if unknown.
    pub fn new(params: Params, ram_size: u64) -> Self {
        Self {
            params,
            scanner: params.scanner(),
            ram_size,
            pool_size: system::pool_size(),
            table: ReducedTable::new(),
        }
    }

    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size.max(1);
        self
    }

    pub fn table(&self) -> &ReducedTable {
        &self.table
    }

    /// Count substrings of one buffer. Nothing is merged.
    pub fn process<'a>(&self, data: &'a [u8], ascii_only: bool, entropy_filter: bool) -> LocalTable<'a> {
        self.scanner.scan(data, ascii_only, entropy_filter)
    }

    /// Read `path` whole and scan it on this thread. Every count is kept.
    pub fn process_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let data = fs::read(path).map_err(|e| Error::io(path, e))?;
        let local = self.process(&data, self.params.ascii_only, self.params.entropy_filter);
        log::debug!("{} bytes, {} distinct substrings", data.len(), local.len());
        self.table.merge(&local, 0);
        Ok(())
    }

    /// Scan `path` in parallel chunks and fold the results into the table.
    ///
    /// The first failing chunk stops the run and the table is left as it was
    /// before the call: a run contributes all of its chunks or none.
    pub fn process_concurrent(
        &mut self,
        path: impl AsRef<Path>,
        ascii_only: bool,
        entropy_filter: bool,
        scale: usize,
    ) -> Result<()> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| Error::io(path, e))?;
        let file_size = file.metadata().map_err(|e| Error::io(path, e))?.len();
        self.process_source(file, path, file_size, ascii_only, entropy_filter, scale)
    }

    fn process_source<R: Read + Seek + Send>(
        &mut self,
        source: R,
        path: &Path,
        file_size: u64,
        ascii_only: bool,
        entropy_filter: bool,
        scale: usize,
    ) -> Result<()> {
        let scanner = self.scanner;
        let est = tune_on_size(
            file_size,
            self.pool_size,
            scale,
            self.ram_size,
            &scanner,
            self.params.drop,
        );
        let chunks = est.chunks(scanner.max_len);
        let reserve = calc_reserve(self.params.top, &scanner);
        let ceiling = memory_ceiling(self.ram_size, &scanner);
        log::info!(
            "{file_size} bytes in {} chunks of ~{} bytes on {} workers",
            est.chunk_count,
            est.chunk_size,
            est.pool_size
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(est.pool_size)
            .build()?;

        let source = Mutex::new(source);
        let shared = Mutex::new(Accumulator {
            table: ReducedTable::new(),
            merges: 0,
        });

        pool.install(|| {
            chunks.par_iter().try_for_each(|chunk| {
                let start = Instant::now();
                let data = read_range(&source, path, chunk)?;
                let local = scanner.scan(&data, ascii_only, entropy_filter);

                let mut acc = shared.lock().unwrap_or_else(PoisonError::into_inner);
                acc.table.merge(&local, est.drop);
                acc.merges += 1;
                if acc.merges % EVICT_EVERY == 0 {
                    if let Some(ev) = acc.table.evict(reserve, ceiling) {
                        log::debug!(
                            "evicted {} entries at or below {}, {} remain",
                            ev.removed,
                            ev.lower_bound,
                            ev.remaining
                        );
                    }
                }
                log::trace!(
                    "chunk {} ({} bytes) merged in {:.3?}, table holds {}",
                    chunk.index,
                    chunk.len,
                    start.elapsed(),
                    acc.table.len()
                );
                Ok::<(), Error>(())
            })
        })?;

        let run = shared
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
            .table;
        self.table.absorb(run);
        Ok(())
    }

    /// Up to `k` best results, near-duplicates suppressed.
    pub fn top(&self, k: usize) -> TopK {
        let reserve = calc_reserve(k, &self.scanner);
        TopK::new(select(&self.table, reserve), k)
    }
}

/// Read one chunk through the shared source handle.
fn read_range<R: Read + Seek>(source: &Mutex<R>, path: &Path, chunk: &ChunkRange) -> Result<Vec<u8>> {
    let len = usize::try_from(chunk.len).map_err(|_| {
        let msg = format!("chunk {} of {} bytes does not fit in memory", chunk.index, chunk.len);
        Error::io(path, io::Error::new(io::ErrorKind::InvalidInput, msg))
    })?;
    let mut data = vec![0u8; len];
    let mut reader = source.lock().unwrap_or_else(PoisonError::into_inner);
    reader
        .seek(SeekFrom::Start(chunk.offset))
        .map_err(|e| Error::io(path, e))?;
    reader.read_exact(&mut data).map_err(|e| Error::io(path, e))?;
    Ok(data)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use tempfile::NamedTempFile;

    use crate::matcher::{ratio, MATCH_RATIO};

    const PATTERN: &[u8] = b"zabcdefghhgfedcbaace";

    fn params() -> Params {
        Params {
            top: 5,
            min_len: 10,
            max_len: 20,
            stride: 1,
            ..Params::default()
        }
    }

    /// `PATTERN` followed by 20 random bytes, `reps` times.
    fn corpus(reps: usize, seed: u64) -> Vec<u8> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut data = Vec::with_capacity(reps * 40);
        for _ in 0..reps {
            data.extend_from_slice(PATTERN);
            data.extend((0..20).map(|_| rng.gen::<u8>()));
        }
        data
    }

    fn temp_file(data: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(data).unwrap();
        file.flush().unwrap();
        file
    }

    fn assert_tables_equal(expected: &LocalTable<'_>, table: &ReducedTable) {
        assert_eq!(table.len(), expected.len());
        for (key, &count) in expected {
            assert_eq!(table.get(key), Some(count), "key {key:?}");
        }
    }

    #[test]
    fn pattern_ranks_first() {
        let data = corpus(2000, 11);
        let file = temp_file(&data);
        let mut miner = Miner::new(params(), 0).with_pool_size(4);
        miner.process_concurrent(file.path(), false, true, 1).unwrap();

        let results: Vec<_> = miner.top(5).collect();
        assert_eq!(results.len(), 5);
        assert_eq!(results[0].content, PATTERN);
        assert_eq!(results[0].count, 2000);

        for (i, a) in results.iter().enumerate() {
            for b in &results[i + 1..] {
                assert!(ratio(&a.content, &b.content) < MATCH_RATIO);
            }
        }
        for pair in results.windows(2) {
            assert!(pair[0].count >= pair[1].count);
        }
    }

    #[test]
    fn chunk_boundaries_do_not_lose_counts() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut data: Vec<u8> = (0..4096).map(|_| b"abcdefgh"[rng.gen_range(0..8)]).collect();
        let marker = b"BOUNDARY-MARKER-0123";
        // 4 workers at scale 1 split on multiples of 1024.
        for at in [1014, 2040, 3070, 500] {
            data[at..at + marker.len()].copy_from_slice(marker);
        }
        let file = temp_file(&data);

        let p = Params { drop: 0, ..params() };
        let mut miner = Miner::new(p, 0).with_pool_size(4);
        miner.process_concurrent(file.path(), false, false, 1).unwrap();

        let whole = miner.process(&data, false, false);
        assert_eq!(whole.get(&marker[..]).copied(), Some(4));
        assert_eq!(miner.table().get(marker), Some(4));
        assert_tables_equal(&whole, miner.table());
    }

    #[test]
    fn sequential_file_matches_buffer_scan() {
        let data = corpus(300, 3);
        let file = temp_file(&data);
        let mut miner = Miner::new(params(), 0);
        miner.process_file(file.path()).unwrap();

        let whole = miner.process(&data, false, true);
        assert_tables_equal(&whole, miner.table());
        assert_eq!(miner.top(1).next().map(|e| e.content), Some(PATTERN.to_vec()));
    }

    #[test]
    fn eviction_keeps_the_frequent_pattern() {
        let data = corpus(2000, 5);
        let file = temp_file(&data);
        let p = Params { top: 1, drop: 0, ..params() };

        let mut unevicted = Miner::new(p, 0).with_pool_size(4);
        unevicted.process_concurrent(file.path(), false, true, 1).unwrap();

        // 16 chunks: two eviction passes.
        let mut evicted = Miner::new(p, 0).with_pool_size(4);
        evicted.process_concurrent(file.path(), false, true, 4).unwrap();

        assert!(evicted.table().len() < unevicted.table().len());
        let best = evicted.top(1).next().unwrap();
        assert_eq!(best.content, PATTERN);
        assert_eq!(best.count, 2000);
    }

    #[test]
    fn short_input_yields_nothing() {
        let data = b"tiny input";
        let miner = Miner::new(params(), 0);
        assert!(miner.process(data, false, true).is_empty());

        let file = temp_file(data);
        let mut miner = Miner::new(params(), 0).with_pool_size(4);
        miner.process_concurrent(file.path(), false, true, 0).unwrap();
        assert!(miner.table().is_empty());
        assert_eq!(miner.top(5).count(), 0);
    }

    /// Serves `data` but fails every read that starts at or past `fail_from`.
    struct FailingReader {
        inner: Cursor<Vec<u8>>,
        fail_from: u64,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.inner.position() >= self.fail_from {
                return Err(io::Error::new(io::ErrorKind::Other, "device went away"));
            }
            self.inner.read(buf)
        }
    }

    impl Seek for FailingReader {
        fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
            self.inner.seek(pos)
        }
    }

    fn assert_same_table(expected: &ReducedTable, table: &ReducedTable) {
        assert_eq!(table.len(), expected.len());
        for (key, count) in expected.iter() {
            assert_eq!(table.get(key), Some(count), "key {key:?}");
        }
    }

    #[test]
    fn failed_chunk_leaves_table_untouched() {
        let data = corpus(400, 9);
        let earlier = temp_file(&data[..4000]);
        let mut miner = Miner::new(Params { drop: 0, ..params() }, 0).with_pool_size(1);
        miner.process_file(earlier.path()).unwrap();
        let before = miner.table().clone();
        assert!(!before.is_empty());

        // One worker, four chunks in file order: chunk 0 reads from offset 0
        // and merges, chunk 1 starts past offset 0 and fails.
        let source = FailingReader {
            inner: Cursor::new(data.clone()),
            fail_from: 1,
        };
        let err = miner
            .process_source(source, Path::new("flaky.bin"), data.len() as u64, false, true, 4)
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert_same_table(&before, miner.table());
    }

    #[test]
    fn source_shorter_than_planned_fails_whole_run() {
        let data = corpus(400, 13);
        let mut miner = Miner::new(params(), 0).with_pool_size(2);
        let source = Cursor::new(data[..data.len() - 100].to_vec());
        let err = miner
            .process_source(source, Path::new("shrunk.bin"), data.len() as u64, false, true, 2)
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(miner.table().is_empty());
        assert_eq!(miner.top(5).count(), 0);
    }

    #[test]
    fn repeated_runs_accumulate() {
        let data = corpus(300, 21);
        let file = temp_file(&data);
        let mut miner = Miner::new(params(), 0).with_pool_size(2);
        miner.process_concurrent(file.path(), false, true, 1).unwrap();
        assert_eq!(miner.table().get(PATTERN), Some(300));
        miner.process_concurrent(file.path(), false, true, 1).unwrap();
        assert_eq!(miner.table().get(PATTERN), Some(600));
    }

    #[cfg(target_pointer_width = "32")]
    #[test]
    fn oversized_chunk_is_io_error() {
        let source = Mutex::new(Cursor::new(Vec::<u8>::new()));
        let chunk = ChunkRange {
            index: 0,
            offset: 0,
            len: u64::MAX,
        };
        assert!(matches!(
            read_range(&source, Path::new("huge.bin"), &chunk),
            Err(Error::Io { .. })
        ));
    }

    #[test]
    fn missing_file_is_io_error() {
        let mut miner = Miner::new(params(), 0);
        let err = miner
            .process_concurrent("/definitely/not/here.bin", false, true, 0)
            .unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
        assert!(matches!(
            miner.process_file("/definitely/not/here.bin"),
            Err(Error::Io { .. })
        ));
    }
}
