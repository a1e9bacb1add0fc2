//! Range-coalescing block cache.
//!
//! Splits the backing driver into fixed-size blocks, caches them under an
//! LRU budget, and coalesces misses two ways: a contiguous run of blocks
//! that are all missing from the cache is satisfied by one physical read
//! spanning the whole run, and a burst of requests landing on a block
//! whose fetch is already in flight shares that fetch rather than
//! re-issuing it.

use std::collections::HashMap;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::error::{H5Error, Result};
use crate::io::ByteRangeReader;

type BlockKey = u64;
type SharedBlockResult = std::result::Result<Arc<[u8]>, Arc<H5Error>>;

enum Slot {
    Ready(SharedBlockResult),
    Pending,
}

struct InFlight {
    slot: Mutex<Slot>,
    done: Condvar,
}

struct Inner {
    lru: LruCache<BlockKey, Arc<[u8]>>,
    pinned: HashMap<BlockKey, usize>,
    in_flight: HashMap<BlockKey, Arc<InFlight>>,
}

/// A cache of fixed-size blocks layered over a [`ByteRangeReader`].
///
/// Lock order, per the crate's concurrency contract: metadata memo, then
/// this cache's index, then the driver. Callers must not hold a cache guard
/// across a call into the driver; `get_blocks` releases its lock before
/// issuing each physical read and re-acquires only to publish the results.
pub struct BlockCache<D: ByteRangeReader> {
    driver: D,
    block_size: usize,
    inner: Mutex<Inner>,
}

impl<D: ByteRangeReader> BlockCache<D> {
    pub fn new(driver: D, block_size: usize, cache_budget: usize) -> Self {
        let capacity = (cache_budget / block_size.max(1)).max(1);
        Self {
            driver,
            block_size,
            inner: Mutex::new(Inner {
                lru: LruCache::new(std::num::NonZeroUsize::new(capacity).unwrap()),
                pinned: HashMap::new(),
                in_flight: HashMap::new(),
            }),
        }
    }

    pub fn size(&self) -> u64 {
        self.driver.size()
    }

    fn block_index(&self, offset: u64) -> BlockKey {
        offset / self.block_size as u64
    }

    fn block_range(&self, index: BlockKey) -> (u64, usize) {
        let start = index * self.block_size as u64;
        let remaining = self.driver.size().saturating_sub(start);
        (start, (self.block_size as u64).min(remaining) as usize)
    }

    /// Fetches every block in `indices` (ascending, as produced by `read`),
    /// fetching and caching the missing ones first. A maximal run of
    /// consecutive indices that all miss the cache (and aren't already
    /// in flight) is satisfied by one physical read spanning the whole run,
    /// rather than one read per block. Concurrent callers missing on the
    /// same block share its fetch.
    fn get_blocks(&self, indices: &[BlockKey]) -> Result<Vec<Arc<[u8]>>> {
        let mut out: Vec<Option<Arc<[u8]>>> = vec![None; indices.len()];
        let mut waiters: Vec<(usize, Arc<InFlight>)> = Vec::new();
        let mut fetch_runs: Vec<(usize, usize, Vec<Arc<InFlight>>)> = Vec::new();

        {
            let mut inner = self.inner.lock();
            let mut i = 0;
            while i < indices.len() {
                let idx = indices[i];
                if let Some(block) = inner.lru.get(&idx) {
                    out[i] = Some(block.clone());
                    i += 1;
                    continue;
                }
                if let Some(existing) = inner.in_flight.get(&idx) {
                    waiters.push((i, existing.clone()));
                    i += 1;
                    continue;
                }
                let mut j = i + 1;
                while j < indices.len()
                    && indices[j] == indices[j - 1] + 1
                    && !inner.lru.contains(&indices[j])
                    && !inner.in_flight.contains_key(&indices[j])
                {
                    j += 1;
                }
                let mut handles = Vec::with_capacity(j - i);
                for &k in &indices[i..j] {
                    let handle = Arc::new(InFlight {
                        slot: Mutex::new(Slot::Pending),
                        done: Condvar::new(),
                    });
                    inner.in_flight.insert(k, handle.clone());
                    handles.push(handle);
                }
                fetch_runs.push((i, j, handles));
                i = j;
            }
        }

        // Every run's placeholders must be resolved one way or another, so a
        // run is always processed even after an earlier one fails: leaving a
        // later run `Pending` forever would hang any other caller waiting on
        // it. The first error seen is what `get_blocks` ultimately returns.
        let mut first_err: Option<Arc<H5Error>> = None;
        for (run_start, run_end, handles) in fetch_runs {
            let first_index = indices[run_start];
            let last_index = indices[run_end - 1];
            let (start, _) = self.block_range(first_index);
            let (last_start, last_len) = self.block_range(last_index);
            let total_len = (last_start + last_len as u64 - start) as usize;
            trace!(
                first_block = first_index,
                last_block = last_index,
                start,
                len = total_len,
                "cache miss, issuing coalesced read"
            );
            let fetch_result = self.driver.read_range(start, total_len);

            match fetch_result {
                Ok(bytes) => {
                    let mut inner = self.inner.lock();
                    let mut resolved = Vec::with_capacity(run_end - run_start);
                    for pos in run_start..run_end {
                        let idx = indices[pos];
                        let (block_start, block_len) = self.block_range(idx);
                        let rel_start = (block_start - start) as usize;
                        let rel_end = (rel_start + block_len).min(bytes.len());
                        let block: Arc<[u8]> = Arc::from(&bytes[rel_start..rel_end]);
                        out[pos] = Some(block.clone());
                        inner.in_flight.remove(&idx);
                        inner.lru.put(idx, block.clone());
                        resolved.push(block);
                    }
                    drop(inner);
                    for (handle, block) in handles.iter().zip(resolved) {
                        let mut slot = handle.slot.lock();
                        *slot = Slot::Ready(Ok(block));
                        handle.done.notify_all();
                    }
                }
                Err(e) => {
                    let shared = Arc::new(e);
                    {
                        let mut inner = self.inner.lock();
                        for pos in run_start..run_end {
                            inner.in_flight.remove(&indices[pos]);
                        }
                    }
                    for handle in &handles {
                        let mut slot = handle.slot.lock();
                        *slot = Slot::Ready(Err(shared.clone()));
                        handle.done.notify_all();
                    }
                    if first_err.is_none() {
                        first_err = Some(shared);
                    }
                }
            }
        }
        if let Some(shared) = first_err {
            return Err(shared_error_to_owned(shared));
        }

        for (pos, handle) in waiters {
            let mut slot = handle.slot.lock();
            loop {
                match &*slot {
                    Slot::Pending => handle.done.wait(&mut slot),
                    Slot::Ready(result) => {
                        out[pos] = Some(result.clone().map_err(shared_error_to_owned)?);
                        break;
                    }
                }
            }
        }

        Ok(out.into_iter().map(|b| b.expect("every index resolved above")).collect())
    }

    /// Reads `len` bytes at `offset`, assembling them from one or more
    /// cached blocks. A contiguous run of missing blocks is fetched in a
    /// single physical read.
    pub fn read(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let end = offset + len as u64;
        let first_index = self.block_index(offset);
        let last_index = self.block_index(end - 1);
        let indices: Vec<BlockKey> = (first_index..=last_index).collect();
        let blocks = self.get_blocks(&indices)?;

        let mut out = Vec::with_capacity(len);
        let mut pos = offset;
        for block in blocks {
            let (block_start, _) = self.block_range(self.block_index(pos));
            let within = (pos - block_start) as usize;
            let take = (block.len() - within).min((end - pos) as usize);
            out.extend_from_slice(&block[within..within + take]);
            pos += take as u64;
            if take == 0 {
                break;
            }
        }
        Ok(out)
    }

    /// Pins every block overlapping `[offset, offset+len)` so the eviction
    /// sweep skips them while a long-lived read is in flight elsewhere.
    pub fn pin_range(&self, offset: u64, len: usize) -> PinGuard<'_, D> {
        if len == 0 {
            return PinGuard {
                cache: self,
                blocks: Vec::new(),
            };
        }
        let first = self.block_index(offset);
        let last = self.block_index(offset + len as u64 - 1);
        let blocks: Vec<BlockKey> = (first..=last).collect();
        let mut inner = self.inner.lock();
        for &b in &blocks {
            *inner.pinned.entry(b).or_insert(0) += 1;
        }
        PinGuard { cache: self, blocks }
    }
}

/// Every waiter on a coalesced read shares one [`H5Error`] via `Arc`; since
/// `H5Error` itself isn't `Clone` (it wraps `std::io::Error`), each waiter
/// gets its own owned error that preserves the original's message.
fn shared_error_to_owned(e: Arc<H5Error>) -> H5Error {
    H5Error::Io(std::io::Error::other(e.to_string()))
}

/// Keeps a set of cache blocks pinned until dropped.
pub struct PinGuard<'a, D: ByteRangeReader> {
    cache: &'a BlockCache<D>,
    blocks: Vec<BlockKey>,
}

impl<D: ByteRangeReader> Drop for PinGuard<'_, D> {
    fn drop(&mut self) {
        if self.blocks.is_empty() {
            return;
        }
        let mut inner = self.cache.inner.lock();
        for b in &self.blocks {
            if let Some(count) = inner.pinned.get_mut(b) {
                *count -= 1;
                if *count == 0 {
                    inner.pinned.remove(b);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc as StdArc;

    struct CountingDriver {
        data: Vec<u8>,
        reads: StdArc<AtomicUsize>,
    }

    impl ByteRangeReader for CountingDriver {
        fn read_range(&self, offset: u64, len: usize) -> Result<Vec<u8>> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            let start = offset as usize;
            let end = (start + len).min(self.data.len());
            Ok(self.data[start..end].to_vec())
        }

        fn size(&self) -> u64 {
            self.data.len() as u64
        }
    }

    #[test]
    fn reassembles_across_block_boundary() {
        let data: Vec<u8> = (0..=255u8).collect();
        let driver = CountingDriver {
            data,
            reads: StdArc::new(AtomicUsize::new(0)),
        };
        let cache = BlockCache::new(driver, 64, 1024);
        let got = cache.read(60, 16).unwrap();
        let expected: Vec<u8> = (60..76u16).map(|v| v as u8).collect();
        assert_eq!(got, expected);
    }

    #[test]
    fn contiguous_missing_run_is_one_physical_read() {
        let data: Vec<u8> = (0..=255u8).collect();
        let reads = StdArc::new(AtomicUsize::new(0));
        let driver = CountingDriver {
            data,
            reads: reads.clone(),
        };
        let cache = BlockCache::new(driver, 64, 1024);
        // Spans blocks 0, 1, and 2, all of which start out missing.
        let got = cache.read(10, 180).unwrap();
        let expected: Vec<u8> = (10..190u16).map(|v| v as u8).collect();
        assert_eq!(got, expected);
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn repeated_reads_hit_cache() {
        let data: Vec<u8> = (0..=255u8).collect();
        let reads = StdArc::new(AtomicUsize::new(0));
        let driver = CountingDriver {
            data,
            reads: reads.clone(),
        };
        let cache = BlockCache::new(driver, 64, 1024);
        cache.read(0, 10).unwrap();
        cache.read(0, 10).unwrap();
        cache.read(5, 10).unwrap();
        assert_eq!(reads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn pin_guard_releases_on_drop() {
        let data: Vec<u8> = (0..=255u8).collect();
        let driver = CountingDriver {
            data,
            reads: StdArc::new(AtomicUsize::new(0)),
        };
        let cache = BlockCache::new(driver, 64, 1024);
        {
            let _guard = cache.pin_range(0, 32);
            assert!(cache.inner.lock().pinned.contains_key(&0));
        }
        assert!(!cache.inner.lock().pinned.contains_key(&0));
    }
}
