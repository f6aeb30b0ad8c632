//! The 8-byte tagged string handle.
//!
//! Three representations share one `u64`, discriminated by the low two
//! bits (bit 0 is kept clear on every pointer because `StringHeader` is
//! always allocated at an 8-byte-aligned address):
//!
//! - `..xxxxx0`: a pointer into a heap-allocated [`StringHeader`].
//! - `..xxxxx1` with bit 1 clear (`01`): up to 7 arbitrary bytes inlined
//!   directly, 8 bits each, with a 3-bit length field.
//! - `..xxxxx1` with bit 1 set (`11`): up to 10 bytes from the alphabet
//!   `[a-zA-Z0-9_-]`, packed 6 bits each, with a 2-bit length-minus-8
//!   field.

use super::chunk::StringHeader;
use std::hash::{Hash, Hasher};
use std::sync::atomic::Ordering;

const TAG_MASK: u64 = 0b11;
const TAG_POINTER_EVEN: u64 = 0b00;
const TAG_RAW_INLINE: u64 = 0b01;
const TAG_CODED_INLINE: u64 = 0b11;

const RAW_INLINE_MAX_LEN: usize = 7;
const CODED_INLINE_MAX_LEN: usize = 10;

const CODED_ALPHABET: &[u8; 64] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789_-";

fn coded_value_of(byte: u8) -> Option<u64> {
    CODED_ALPHABET
        .iter()
        .position(|&c| c == byte)
        .map(|p| p as u64)
}

/// A compact, content-addressed string handle. Copying is O(1); for
/// pooled strings it bumps a reference count, for inline strings it is
/// a plain bit copy.
pub struct MhString {
    bits: u64,
}

impl MhString {
    /// The handle with no content, distinguishable from every non-empty string.
    pub const fn empty() -> Self {
        Self { bits: TAG_RAW_INLINE }
    }

    pub(crate) fn from_pointer(ptr: *mut StringHeader) -> Self {
        debug_assert_eq!(ptr as u64 & TAG_MASK, TAG_POINTER_EVEN, "StringHeader must be 8-byte aligned");
        Self { bits: ptr as u64 }
    }

    /// Tries to build an inline handle (raw or coded) for `bytes`.
    /// Returns `None` when the bytes need pool storage.
    pub fn try_inline(bytes: &[u8]) -> Option<Self> {
        if bytes.is_empty() {
            return Some(Self::empty());
        }
        if bytes.len() <= RAW_INLINE_MAX_LEN {
            let mut bits: u64 = TAG_RAW_INLINE | ((bytes.len() as u64) << 2);
            for (i, &b) in bytes.iter().enumerate() {
                bits |= (b as u64) << (8 + 8 * i);
            }
            return Some(Self { bits });
        }
        if bytes.len() <= CODED_INLINE_MAX_LEN {
            let mut coded = Vec::with_capacity(bytes.len());
            for &b in bytes {
                match coded_value_of(b) {
                    Some(v) => coded.push(v),
                    None => return None,
                }
            }
            let mut bits: u64 = TAG_CODED_INLINE | (((bytes.len() - 8) as u64) << 2);
            for (i, v) in coded.into_iter().enumerate() {
                bits |= v << (4 + 6 * i);
            }
            return Some(Self { bits });
        }
        None
    }

    /// True if this handle never touched the pool.
    pub fn is_small(&self) -> bool {
        self.bits & 1 == 1
    }

    fn is_pointer(&self) -> bool {
        self.bits & 1 == 0
    }

    fn header(&self) -> Option<&StringHeader> {
        if self.is_pointer() && self.bits != 0 {
            // SAFETY: a non-null pointer-tagged handle always originates
            // from `StringPool::store_string`, which leaks a `Box` and
            // hands out only `MhString`s wrapping that address; the
            // header stays alive for as long as any handle's refcount
            // keeps it so.
            Some(unsafe { &*(self.bits as *const StringHeader) })
        } else {
            None
        }
    }

    /// O(1) length in bytes.
    pub fn len(&self) -> usize {
        if let Some(h) = self.header() {
            return h.size as usize;
        }
        if self.bits == 0 {
            return 0;
        }
        if self.bits & TAG_MASK == TAG_CODED_INLINE {
            (((self.bits >> 2) & 0b11) as usize) + 8
        } else {
            ((self.bits >> 2) & 0b111) as usize
        }
    }

    /// True for the empty string.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// O(1) hash, matching the content-equality relation in [`PartialEq`].
    pub fn content_hash(&self) -> u64 {
        if let Some(h) = self.header() {
            return h.hash;
        }
        self.bits
    }

    /// Materializes the string content. Pooled strings take the owning
    /// chunk's read lock for the duration of the copy.
    pub fn as_bytes_owned(&self) -> Vec<u8> {
        if let Some(h) = self.header() {
            let guard = h.chunk.body.read();
            let offset = h.offset.load(Ordering::Acquire);
            return guard.data[offset..offset + h.size as usize].to_vec();
        }
        if self.bits == 0 {
            return Vec::new();
        }
        let len = self.len();
        let mut out = Vec::with_capacity(len);
        if self.bits & TAG_MASK == TAG_CODED_INLINE {
            let mut v = self.bits >> 4;
            for _ in 0..len {
                out.push(CODED_ALPHABET[(v & 0x3f) as usize]);
                v >>= 6;
            }
        } else {
            let mut v = self.bits >> 8;
            for _ in 0..len {
                out.push((v & 0xff) as u8);
                v >>= 8;
            }
        }
        out
    }

    /// Compares this handle's content against raw bytes without
    /// constructing another handle, used by the pool's intern lookup.
    pub(crate) fn content_eq(&self, bytes: &[u8]) -> bool {
        if self.len() != bytes.len() {
            return false;
        }
        if let Some(h) = self.header() {
            let guard = h.chunk.body.read();
            let offset = h.offset.load(Ordering::Acquire);
            return &guard.data[offset..offset + h.size as usize] == bytes;
        }
        self.as_bytes_owned() == bytes
    }

    pub(crate) fn bits(&self) -> u64 {
        self.bits
    }

    /// Raw pointer to the backing header, or null for inline/empty handles.
    pub(crate) fn as_header_ptr(&self) -> *mut StringHeader {
        if self.is_pointer() && self.bits != 0 {
            self.bits as *mut StringHeader
        } else {
            std::ptr::null_mut()
        }
    }

    /// Reconstructs a handle from its raw bit pattern (used by property
    /// tests exercising the inline round-trip).
    pub fn from_bits(bits: u64) -> Self {
        Self { bits }
    }
}

impl Clone for MhString {
    fn clone(&self) -> Self {
        if let Some(h) = self.header() {
            h.refcount.fetch_add(1, Ordering::Relaxed);
        }
        Self { bits: self.bits }
    }
}

impl Drop for MhString {
    fn drop(&mut self) {
        if let Some(h) = self.header() {
            h.on_handle_dropped();
        }
    }
}

impl PartialEq for MhString {
    fn eq(&self, other: &Self) -> bool {
        if self.bits == other.bits {
            return true;
        }
        match (self.header(), other.header()) {
            (Some(a), Some(b)) => a.content_eq(b),
            _ => false,
        }
    }
}

impl Eq for MhString {}

impl Hash for MhString {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.content_hash());
    }
}

impl std::fmt::Debug for MhString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MhString({:?})", String::from_utf8_lossy(&self.as_bytes_owned()))
    }
}

unsafe impl Send for MhString {}
unsafe impl Sync for MhString {}
