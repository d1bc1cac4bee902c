//! Content-derived unique identifiers.
//!
//! Unique ids are the deduplication keys for the static-data table: two
//! values with equal content hash to the same id and share one pooled
//! entry on the wire.

use seahash::SeaHasher;
use std::fmt;
use std::hash::Hasher;

/// 64-bit content-derived identifier.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct UniqueId(pub u64);

impl UniqueId {
    /// The null id, used for default-constructed values.
    pub const NONE: Self = Self(0);

    #[inline]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }

    /// Hash a flat byte buffer into an id.
    pub fn from_bytes(data: &[u8]) -> Self {
        Self(seahash::hash(data))
    }
}

impl fmt::Debug for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UniqueId({:#018x})", self.0)
    }
}

impl fmt::Display for UniqueId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Incremental content hasher producing a [`UniqueId`].
///
/// Thin wrapper over [`SeaHasher`] so callers fold in strings, integers
/// and nested ids without worrying about delimiting.
pub struct ContentHasher {
    inner: SeaHasher,
}

impl ContentHasher {
    pub fn new() -> Self {
        Self {
            inner: SeaHasher::new(),
        }
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        // Length prefix keeps concatenated fields from colliding.
        self.inner.write_u64(data.len() as u64);
        self.inner.write(data);
    }

    pub fn write_str(&mut self, s: &str) {
        self.write_bytes(s.as_bytes());
    }

    pub fn write_u8(&mut self, v: u8) {
        self.inner.write_u8(v);
    }

    pub fn write_u32(&mut self, v: u32) {
        self.inner.write_u32(v);
    }

    pub fn write_u64(&mut self, v: u64) {
        self.inner.write_u64(v);
    }

    pub fn write_id(&mut self, id: UniqueId) {
        self.inner.write_u64(id.value());
    }

    pub fn finish(self) -> UniqueId {
        UniqueId(self.inner.finish())
    }
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new()
    }
}
