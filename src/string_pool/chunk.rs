//! Pool chunks: 4 MiB arenas that back every non-inline [`MhString`].

use super::handle::MhString;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use super::PoolCore;

/// Size of a chunk's backing arena, matching `CHUNK_DATA_SIZE` in the
/// original implementation.
pub const CHUNK_DATA_SIZE: usize = 4 * 1024 * 1024;

pub(crate) fn align8(size: usize) -> usize {
    (size + 7) & !7
}

/// A 4 MiB bump-allocated arena plus the bookkeeping needed to compact it.
pub(crate) struct Chunk {
    pub id: u32,
    pub pool: Weak<PoolCore>,
    pub fragmented_size: AtomicU32,
    pub body: RwLock<ChunkBody>,
}

pub(crate) struct ChunkBody {
    pub data: Box<[u8; CHUNK_DATA_SIZE]>,
    pub bump: usize,
    /// Headers allocated from this chunk, in allocation order. Entries
    /// may outlive their header's last external reference; they are
    /// pruned during compaction.
    pub strings: Vec<*mut StringHeader>,
}

// SAFETY: `ChunkBody` is only reached through `Chunk::body`'s `RwLock`.
unsafe impl Send for ChunkBody {}
unsafe impl Sync for ChunkBody {}

impl Chunk {
    pub fn new(id: u32, pool: Weak<PoolCore>) -> Arc<Self> {
        Arc::new(Self {
            id,
            pool,
            fragmented_size: AtomicU32::new(0),
            body: RwLock::new(ChunkBody {
                data: vec![0u8; CHUNK_DATA_SIZE].into_boxed_slice().try_into().unwrap(),
                bump: 0,
                strings: Vec::new(),
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        CHUNK_DATA_SIZE
    }
}

/// Heap-allocated header for one pooled string. Always allocated at an
/// 8-byte-aligned address so [`MhString`]'s low two tag bits stay free
/// for pointer-tagged handles.
#[repr(align(8))]
pub(crate) struct StringHeader {
    pub refcount: AtomicU64,
    pub chunk: Arc<Chunk>,
    pub offset: AtomicUsize,
    pub hash: u64,
    pub size: u32,
}

impl StringHeader {
    /// Invoked once per dropped [`MhString`] handle pointing at this header.
    ///
    /// Mirrors `string_pool::String::~String` in the original
    /// implementation: the intern set itself holds one reference, so a
    /// transition to refcount 1 means the string is now idle (only the
    /// pool remembers it) and becomes eligible for compaction; a
    /// transition to 0 means even the pool's own bookkeeping entry was
    /// just dropped (always from inside [`PoolCore::compact_chunk`]),
    /// so the header can be freed immediately.
    pub(crate) fn on_handle_dropped(&self) {
        let old = self.refcount.fetch_sub(1, Ordering::AcqRel);
        if old == 1 {
            let ptr = self as *const StringHeader as *mut StringHeader;
            // SAFETY: reaching refcount 0 only happens while
            // `PoolCore::compact_chunk` is dropping its own bookkeeping
            // clone for an entry it has already decided is unreachable
            // by anyone else; no other pointer to this header survives.
            unsafe {
                drop(Box::from_raw(ptr));
            }
            return;
        }
        if old == 2 {
            let aligned = align8(self.size as usize) as u32;
            let frag = self
                .chunk
                .fragmented_size
                .fetch_add(aligned, Ordering::Relaxed)
                + aligned;
            if (frag as usize) > self.chunk.capacity() / 2 {
                if let Some(pool) = self.chunk.pool.upgrade() {
                    pool.request_compaction(&self.chunk);
                }
            }
        }
    }

    pub(crate) fn content_eq(&self, other: &StringHeader) -> bool {
        if self.hash != other.hash || self.size != other.size {
            return false;
        }
        if Arc::ptr_eq(&self.chunk, &other.chunk) {
            let guard = self.chunk.body.read();
            let a = self.offset.load(Ordering::Acquire);
            let b = other.offset.load(Ordering::Acquire);
            let len = self.size as usize;
            return guard.data[a..a + len] == guard.data[b..b + len];
        }
        let guard_a = self.chunk.body.read();
        let guard_b = other.chunk.body.read();
        let a = self.offset.load(Ordering::Acquire);
        let b = other.offset.load(Ordering::Acquire);
        let len = self.size as usize;
        guard_a.data[a..a + len] == guard_b.data[b..b + len]
    }
}

/// Allocates a fresh header and copies `bytes` into `chunk` at `offset`,
/// returning the owning handle with refcount 1 (callers are expected to
/// immediately clone it into the intern set, bringing it to 2).
pub(crate) fn alloc_header(chunk: &Arc<Chunk>, offset: usize, bytes: &[u8], hash: u64) -> MhString {
    let header = Box::new(StringHeader {
        refcount: AtomicU64::new(1),
        chunk: Arc::clone(chunk),
        offset: AtomicUsize::new(offset),
        hash,
        size: bytes.len() as u32,
    });
    let ptr = Box::into_raw(header);
    MhString::from_pointer(ptr)
}
