//! Runtime type descriptors ([`FbomType`]) and the base type catalogue.
//!
//! Every value on the wire carries a descriptor: a short name, a byte
//! size (or the unbounded sentinel), an opaque native type key, a flag
//! set, and an optional single-parent `extends` link forming a lineage
//! chain up to the root `object` type.

mod catalogue;

pub use catalogue::*;

use crate::util::{ContentHasher, UniqueId};
use std::fmt;

/// Sentinel size for variable-length types.
pub const SIZE_UNBOUNDED: u64 = u64::MAX;

/// Type flag: value payload is a nested object or array, not flat bytes.
pub const FLAG_CONTAINER: u8 = 1 << 0;

/// Type flag: descriptor comes from the base catalogue.
pub const FLAG_DEFAULT: u8 = 1 << 1;

/// Type flag: descriptor stands in for a type that was not resolvable
/// when the stream was produced.
pub const FLAG_PLACEHOLDER: u8 = 1 << 2;

/// Opaque identifier correlating a descriptor to a native Rust type.
///
/// Stable across processes and platforms: derived from the registered
/// type name, never from `std::any::TypeId`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TypeKey(pub u64);

impl TypeKey {
    /// Key for generic container types with no native counterpart.
    pub const VOID: Self = Self(0);

    /// Derive a key from a native type name.
    pub fn from_name(name: &str) -> Self {
        Self(seahash::hash(name.as_bytes()))
    }

    #[inline]
    pub const fn is_void(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_void() {
            write!(f, "TypeKey(void)")
        } else {
            write!(f, "TypeKey({:#018x})", self.0)
        }
    }
}

/// Runtime-inspectable type tag.
///
/// Value type; copied and moved freely. The only heap indirection is
/// the owned `extends` link, which is deep-copied with the value.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FbomType {
    /// Short type name, e.g. "f32", "object", a class name.
    pub name: String,
    /// Byte size, or [`SIZE_UNBOUNDED`].
    pub size: u64,
    /// Native type key; [`TypeKey::VOID`] for generic container types.
    pub native: TypeKey,
    /// Flag bitset (`FLAG_*`).
    pub flags: u8,
    /// Optional parent descriptor. Never cycles: chains are built from
    /// catalogue constants and `extend`, not mutated in place.
    pub extends: Option<Box<FbomType>>,
}

impl FbomType {
    /// Construct a descriptor with no parent.
    pub fn new(name: impl Into<String>, size: u64, native: TypeKey) -> Self {
        Self {
            name: name.into(),
            size,
            native,
            flags: 0,
            extends: None,
        }
    }

    /// Construct a descriptor with explicit flags.
    pub fn with_flags(name: impl Into<String>, size: u64, native: TypeKey, flags: u8) -> Self {
        Self {
            name: name.into(),
            size,
            native,
            flags,
            extends: None,
        }
    }

    /// Build a child descriptor extending `self`.
    ///
    /// The child keeps its name and flags but becomes unbounded in size
    /// and void in native key; the concrete identity lives on the leaf
    /// that extends it. Used to build object-type hierarchies
    /// ("Node" extends "object").
    pub fn extend(&self, child: FbomType) -> FbomType {
        FbomType {
            name: child.name,
            size: SIZE_UNBOUNDED,
            native: TypeKey::VOID,
            flags: child.flags,
            extends: Some(Box::new(self.clone())),
        }
    }

    /// Attach a native key to this descriptor.
    pub fn with_native(mut self, native: TypeKey) -> Self {
        self.native = native;
        self
    }

    #[inline]
    pub fn is_unbounded(&self) -> bool {
        self.size == SIZE_UNBOUNDED
    }

    #[inline]
    pub fn is_container(&self) -> bool {
        self.flags & FLAG_CONTAINER != 0
    }

    #[inline]
    pub fn is_placeholder(&self) -> bool {
        self.flags & FLAG_PLACEHOLDER != 0
    }

    /// True if any of `flags` is set, optionally searching the lineage.
    pub fn has_any_flags_set(&self, flags: u8, include_parents: bool) -> bool {
        if self.flags & flags != 0 {
            return true;
        }
        if include_parents {
            if let Some(parent) = &self.extends {
                return parent.has_any_flags_set(flags, true);
            }
        }
        false
    }

    /// Exact type equality check.
    ///
    /// Compares names, native keys (when both are non-void, unless
    /// `allow_void_key`), and sizes (unless `allow_unbounded`), then
    /// recurses into the `extends` chains: both parents must match, or
    /// both be absent.
    pub fn is(&self, other: &FbomType, allow_unbounded: bool, allow_void_key: bool) -> bool {
        if self.name != other.name {
            return false;
        }
        if !allow_void_key && !self.native.is_void() && !other.native.is_void() {
            if self.native != other.native {
                return false;
            }
        }
        if !allow_unbounded && self.size != other.size {
            return false;
        }
        match (&self.extends, &other.extends) {
            (None, None) => true,
            (Some(a), Some(b)) => a.is(b, allow_unbounded, allow_void_key),
            _ => false,
        }
    }

    /// Exact match with strict size and key comparison.
    #[inline]
    pub fn is_exactly(&self, other: &FbomType) -> bool {
        self.is(other, false, false)
    }

    /// True if `self` is, or transitively extends, `other`.
    pub fn is_or_extends(&self, other: &FbomType, allow_unbounded: bool, allow_void_key: bool) -> bool {
        if self.is(other, allow_unbounded, allow_void_key) {
            return true;
        }
        let mut cursor = self.extends.as_deref();
        while let Some(ancestor) = cursor {
            if ancestor.is(other, allow_unbounded, allow_void_key) {
                return true;
            }
            cursor = ancestor.extends.as_deref();
        }
        false
    }

    /// `is_or_extends` with the relaxed comparisons used for object
    /// lineage checks, where sizes are unbounded and leaf keys differ.
    #[inline]
    pub fn extends_object(&self) -> bool {
        self.is_or_extends(&catalogue::object(), true, true)
    }

    /// Fold this descriptor (lineage included) into a content hash.
    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        hasher.write_str(&self.name);
        hasher.write_u64(self.size);
        hasher.write_u64(self.native.value());
        hasher.write_u8(self.flags);
        match &self.extends {
            Some(parent) => {
                hasher.write_u8(1);
                parent.hash_into(hasher);
            }
            None => hasher.write_u8(0),
        }
    }

    /// Content hash of the descriptor, used as its static-data key.
    pub fn unique_id(&self) -> UniqueId {
        let mut hasher = ContentHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Debug for FbomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl fmt::Display for FbomType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_unbounded() {
            write!(f, "{} (unbounded)", self.name)?;
        } else {
            write!(f, "{} ({})", self.name, self.size)?;
        }
        if let Some(parent) = &self.extends {
            write!(f, " [{}]", parent)?;
        }
        Ok(())
    }
}
