//! Content-addressed string interning with in-place chunk compaction.
//!
//! See `spec.md` §3 (Pool chunk, `string_t` header) and §4.A.

mod chunk;
mod handle;

pub use handle::MhString;

use chunk::{align8, Chunk, CHUNK_DATA_SIZE};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use xxhash_rust::xxh64::xxh64;

/// Point-in-time counters describing a pool's memory usage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Number of distinct long strings currently interned.
    pub num_strings: u32,
    /// Number of 4 MiB chunks the pool has allocated.
    pub num_chunks: u32,
    /// Cumulative bytes reclaimed by compaction.
    pub reclaimed_bytes: u64,
    /// Bytes currently in use across all chunks (post-compaction figure).
    pub used_bytes: u64,
}

/// Observer notified whenever [`PoolStats`] changes, mirroring the
/// original `StatsObserver` callback used to feed a metrics sink.
pub trait StatsObserver: Send + Sync {
    /// Called after every stats-affecting operation. `force` is set for
    /// explicit stat requests rather than incidental updates.
    fn on_updated_stats(&self, stats: &PoolStats, force: bool);
}

struct NoopObserver;
impl StatsObserver for NoopObserver {
    fn on_updated_stats(&self, _stats: &PoolStats, _force: bool) {}
}

pub(crate) struct PoolCore {
    inner: Mutex<PoolInner>,
    observer: Box<dyn StatsObserver>,
}

struct PoolInner {
    // Content hash -> candidates sharing that hash, each a strong handle
    // held on behalf of the intern set itself.
    interned: FxHashMap<u64, Vec<MhString>>,
    chunks: Vec<Arc<Chunk>>,
    stats: PoolStats,
}

/// A content-addressed pool of long strings. Cheap to clone (an `Arc`
/// underneath); the pool must outlive every [`MhString`] it produced.
#[derive(Clone)]
pub struct StringPool {
    core: Arc<PoolCore>,
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

impl StringPool {
    /// Creates an empty pool with no stats observer.
    pub fn new() -> Self {
        Self::with_observer(Box::new(NoopObserver))
    }

    /// Creates an empty pool reporting stats changes to `observer`.
    pub fn with_observer(observer: Box<dyn StatsObserver>) -> Self {
        Self {
            core: Arc::new(PoolCore {
                inner: Mutex::new(PoolInner {
                    interned: FxHashMap::default(),
                    chunks: Vec::new(),
                    stats: PoolStats::default(),
                }),
                observer,
            }),
        }
    }

    /// Interns `bytes`, returning a handle equal under `==` to any prior
    /// `add` of the same bytes in this pool. Small strings never touch
    /// the pool's chunks.
    pub fn add(&self, bytes: &[u8]) -> MhString {
        if let Some(small) = MhString::try_inline(bytes) {
            return small;
        }
        self.core.add_long(bytes)
    }

    /// Convenience wrapper over [`StringPool::add`] for UTF-8 input.
    pub fn add_str(&self, s: &str) -> MhString {
        self.add(s.as_bytes())
    }

    /// Returns a snapshot of the pool's current stats.
    pub fn stats(&self) -> PoolStats {
        self.core.inner.lock().stats
    }

    /// Compacts every chunk that can reclaim space, evicting interned
    /// strings whose only remaining reference was the intern set
    /// itself. Allocation failure elsewhere in the pool is fatal; this
    /// call never allocates new chunks.
    pub fn compact(&self) {
        self.core.compact_all();
    }
}

impl PoolCore {
    fn add_long(self: &Arc<Self>, bytes: &[u8]) -> MhString {
        let hash = xxh64(bytes, 0);
        let mut inner = self.inner.lock();
        if let Some(bucket) = inner.interned.get(&hash) {
            if let Some(existing) = bucket.iter().find(|h| h.content_eq(bytes)) {
                return existing.clone();
            }
        }
        let handle = self.store_string(&mut inner, bytes, hash);
        let owned_by_set = handle.clone();
        inner.interned.entry(hash).or_default().push(owned_by_set);
        inner.stats.num_strings += 1;
        self.observer.on_updated_stats(&inner.stats, false);
        handle
    }

    fn store_string(self: &Arc<Self>, inner: &mut PoolInner, bytes: &[u8], hash: u64) -> MhString {
        let aligned = align8(bytes.len());
        debug_assert!(aligned <= CHUNK_DATA_SIZE, "string too large for a chunk");

        let needs_new_chunk = match inner.chunks.last() {
            Some(last) => last.body.read().bump + aligned > CHUNK_DATA_SIZE,
            None => true,
        };
        if needs_new_chunk {
            let id = inner.chunks.len() as u32;
            inner.chunks.push(Chunk::new(id, Arc::downgrade(self)));
            inner.stats.num_chunks += 1;
        }
        let chunk = Arc::clone(inner.chunks.last().expect("chunk just inserted"));

        let offset = {
            let mut body = chunk.body.write();
            let offset = body.bump;
            body.data[offset..offset + bytes.len()].copy_from_slice(bytes);
            body.bump += aligned;
            offset
        };

        let handle = chunk::alloc_header(&chunk, offset, bytes, hash);
        chunk.body.write().strings.push(handle.as_header_ptr());
        inner.stats.used_bytes = inner.stats.used_bytes.saturating_add(aligned as u64);
        handle
    }

    /// Called from [`chunk::StringHeader::on_handle_dropped`] when a
    /// chunk has crossed the auto-compaction fragmentation threshold.
    pub(crate) fn request_compaction(self: &Arc<Self>, target: &Arc<Chunk>) {
        let mut inner = self.inner.lock();
        self.compact_chunk(&mut inner, target);
    }

    fn compact_all(self: &Arc<Self>) {
        let mut inner = self.inner.lock();
        let chunks: Vec<Arc<Chunk>> = inner.chunks.clone();
        for chunk in &chunks {
            self.compact_chunk(&mut inner, chunk);
        }
    }

    fn compact_chunk(self: &Arc<Self>, inner: &mut PoolInner, target: &Arc<Chunk>) {
        let mut body = target.body.write();
        let old_strings = std::mem::take(&mut body.strings);
        let mut survivors = Vec::with_capacity(old_strings.len());
        let mut write_offset = 0usize;
        let mut reclaimed = 0u64;

        for ptr in old_strings {
            // SAFETY: entries in `body.strings` are always valid
            // `StringHeader` pointers until evicted below; we hold the
            // chunk's write lock so no compaction races.
            let header = unsafe { &*ptr };
            if header.refcount.load(Ordering::Acquire) == 1 {
                let hash = header.hash;
                let size = header.size as usize;
                // `swap_remove` drops the intern set's own clone, taking
                // the header's refcount to 0 and freeing it in place —
                // nothing below this point may dereference `header` again.
                if let Some(bucket) = inner.interned.get_mut(&hash) {
                    if let Some(pos) = bucket.iter().position(|h| h.as_header_ptr() == ptr) {
                        bucket.swap_remove(pos);
                        if bucket.is_empty() {
                            inner.interned.remove(&hash);
                        }
                        inner.stats.num_strings -= 1;
                    }
                }
                reclaimed += align8(size) as u64;
                continue;
            }

            let size = header.size as usize;
            let src = header.offset.load(Ordering::Acquire);
            if src != write_offset {
                body.data.copy_within(src..src + size, write_offset);
                header.offset.store(write_offset, Ordering::Release);
            }
            write_offset += align8(size);
            survivors.push(ptr);
        }

        body.strings = survivors;
        body.bump = write_offset;
        target.fragmented_size.store(0, Ordering::Relaxed);
        drop(body);

        inner.stats.used_bytes = inner.stats.used_bytes.saturating_sub(reclaimed);
        inner.stats.reclaimed_bytes = inner.stats.reclaimed_bytes.saturating_add(reclaimed);
        self.observer.on_updated_stats(&inner.stats, true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOREM: &str = "Lorem ipsum dolor sit amet, consectetur adipiscing elit, sed do eiusmod tempor incididunt ut labore et dolore magna aliqua. Ut enim ad minim veniam, quis nostrud exercitation ullamco laboris nisi ut aliquip ex ea commodo consequat. Duis aute irure dolor in reprehenderit in voluptate velit esse cillum dolore eu fugiat nulla pariatur excepteur.";

    #[test]
    fn s1_small_string_pool() {
        let pool = StringPool::new();
        let s = pool.add_str("world");
        assert!(s.is_small());
        assert_eq!(pool.stats().num_strings, 0);
    }

    #[test]
    fn s2_large_string_dedup() {
        assert!(LOREM.len() > 10, "string must not be inlineable");
        let pool = StringPool::new();
        for _ in 0..10_000 {
            let _ = pool.add_str(LOREM);
        }
        let stats = pool.stats();
        assert_eq!(stats.num_strings, 1);
        assert_eq!(stats.num_chunks, 1);
    }

    #[test]
    fn s3_cache_cleanup_roundtrip() {
        let pool = StringPool::new();
        let long_strings: Vec<String> = (0..150)
            .map(|i| format!("{i:05}-{}", "x".repeat(9994)))
            .collect();

        {
            let handles: Vec<_> = long_strings.iter().map(|s| pool.add_str(s)).collect();
            assert_eq!(handles.len(), 150);
            let stats = pool.stats();
            assert_eq!(stats.num_chunks, 2);
        }

        pool.compact();
        let stats = pool.stats();
        assert_eq!(stats.num_strings, 0);
        assert_eq!(stats.num_chunks, 2);

        for s in &long_strings {
            let _ = pool.add_str(s);
        }
        let stats = pool.stats();
        assert_eq!(stats.num_strings, 150);
        assert_eq!(stats.num_chunks, 2);
    }

    #[test]
    fn property1_interning_equality() {
        let pool = StringPool::new();
        let a = pool.add_str(LOREM);
        let b = pool.add_str(LOREM);
        assert_eq!(a, b);
        let c = pool.add_str("a different string entirely, long enough to pool");
        assert_ne!(a, c);
    }

    #[test]
    fn property2_small_string_roundtrip() {
        let h = MhString::try_inline(b"hello").unwrap();
        let bits = h.bits();
        let restored = MhString::from_bits(bits);
        assert_eq!(restored.as_bytes_owned(), h.as_bytes_owned());
    }

    #[test]
    fn property2_coded_inline_roundtrip() {
        let h = MhString::try_inline(b"abc_def-01").unwrap();
        assert!(h.is_small());
        let bits = h.bits();
        let restored = MhString::from_bits(bits);
        assert_eq!(restored.as_bytes_owned(), b"abc_def-01");
    }

    #[test]
    fn property3_pool_compaction_zeroes_strings() {
        let pool = StringPool::new();
        {
            let _h = pool.add_str(LOREM);
        }
        let before_chunks = pool.stats().num_chunks;
        pool.compact();
        let stats = pool.stats();
        assert_eq!(stats.num_strings, 0);
        assert_eq!(stats.num_chunks, before_chunks);
    }
}
