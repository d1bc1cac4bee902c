//! Static-data deduplication table.
//!
//! The write side interns values by content-derived unique id and
//! assigns stable first-seen indices; each pooled value is serialized
//! exactly once into the stream's static-data section and referenced
//! by index everywhere else. The read side is the lazy mirror living
//! in the reader (directory + cache), sharing [`StaticDataValue`].

use std::collections::HashMap;

use super::format::StaticDataKind;
use crate::data::{FbomArray, FbomData, FbomObject};
use crate::ty::FbomType;
use crate::util::UniqueId;

/// An owned value pooled in the static-data section.
#[derive(Clone, Debug)]
pub enum StaticDataValue {
    Type(FbomType),
    Object(FbomObject),
    Data(FbomData),
    Array(FbomArray),
}

impl StaticDataValue {
    pub fn kind(&self) -> StaticDataKind {
        match self {
            Self::Type(_) => StaticDataKind::Type,
            Self::Object(_) => StaticDataKind::Object,
            Self::Data(_) => StaticDataKind::Data,
            Self::Array(_) => StaticDataKind::Array,
        }
    }

    pub fn unique_id(&self) -> UniqueId {
        match self {
            Self::Type(t) => t.unique_id(),
            Self::Object(o) => o.unique_id(),
            Self::Data(d) => d.unique_id(),
            Self::Array(a) => a.unique_id(),
        }
    }
}

/// Write-side deduplication table.
pub struct StaticDataPool {
    indices: HashMap<(StaticDataKind, UniqueId), u32>,
    entries: Vec<StaticDataValue>,
}

impl StaticDataPool {
    pub fn new() -> Self {
        Self {
            indices: HashMap::new(),
            entries: Vec::new(),
        }
    }

    /// Intern a value: returns the existing index when its unique id
    /// was seen before, else appends a new entry in first-seen order.
    pub fn intern(&mut self, value: StaticDataValue) -> u32 {
        let key = (value.kind(), value.unique_id());
        if let Some(&index) = self.indices.get(&key) {
            return index;
        }
        let index = self.entries.len() as u32;
        self.indices.insert(key, index);
        self.entries.push(value);
        index
    }

    /// Index of an already-interned value, if any.
    pub fn lookup(&self, kind: StaticDataKind, id: UniqueId) -> Option<u32> {
        self.indices.get(&(kind, id)).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[StaticDataValue] {
        &self.entries
    }
}

impl Default for StaticDataPool {
    fn default() -> Self {
        Self::new()
    }
}

/// Occurrence counts gathered by the writer's pre-pass. Types are
/// always pooled; objects, data and arrays only when referenced more
/// than once.
pub struct UsageCounts {
    counts: HashMap<(StaticDataKind, UniqueId), u32>,
}

impl UsageCounts {
    pub fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    pub fn record(&mut self, kind: StaticDataKind, id: UniqueId) {
        *self.counts.entry((kind, id)).or_insert(0) += 1;
    }

    pub fn count(&self, kind: StaticDataKind, id: UniqueId) -> u32 {
        self.counts.get(&(kind, id)).copied().unwrap_or(0)
    }

    /// Whether a value of this kind earns a pooled entry.
    pub fn should_pool(&self, kind: StaticDataKind, id: UniqueId) -> bool {
        match kind {
            StaticDataKind::Type => true,
            _ => self.count(kind, id) > 1,
        }
    }
}

impl Default for UsageCounts {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty;

    #[test]
    fn test_intern_dedups() {
        let mut pool = StaticDataPool::new();
        let a = pool.intern(StaticDataValue::Type(ty::f32_type()));
        let b = pool.intern(StaticDataValue::Type(ty::u32_type()));
        let c = pool.intern(StaticDataValue::Type(ty::f32_type()));
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(c, a);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_kind_separates_keyspace() {
        let mut pool = StaticDataPool::new();
        let ty_idx = pool.intern(StaticDataValue::Type(ty::f32_type()));
        let id = ty::f32_type().unique_id();
        assert_eq!(pool.lookup(StaticDataKind::Type, id), Some(ty_idx));
        assert_eq!(pool.lookup(StaticDataKind::Object, id), None);
    }

    #[test]
    fn test_usage_counts() {
        let mut counts = UsageCounts::new();
        let id = UniqueId::new(1);
        counts.record(StaticDataKind::Object, id);
        assert!(!counts.should_pool(StaticDataKind::Object, id));
        counts.record(StaticDataKind::Object, id);
        assert!(counts.should_pool(StaticDataKind::Object, id));

        // Types pool on first sight.
        assert!(counts.should_pool(StaticDataKind::Type, UniqueId::new(2)));
    }
}
