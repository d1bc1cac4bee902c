//! Object nodes: named bags of properties plus ordered children.

use super::{unset_data, FbomData};
use crate::marshal::DeserializeContext;
use crate::ty::{self, FbomType};
use crate::util::{ContentHasher, Error, Result, UniqueId};
use smallvec::SmallVec;
use std::any::Any;
use std::fmt;

/// Identifier of an external object library.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct LibraryId(pub u64);

impl LibraryId {
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Link metadata for an object persisted in a separate library file.
///
/// `library` is `None` while the object is flagged external but not yet
/// assigned a location; the writer then emits the object inline with
/// the placeholder attribute so a later pass can patch the reference.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExternalObjectInfo {
    pub library: Option<LibraryId>,
    pub index: u32,
}

impl ExternalObjectInfo {
    /// An external flag with no resolved location yet.
    pub fn unlinked() -> Self {
        Self {
            library: None,
            index: 0,
        }
    }

    /// A resolved link into a library.
    pub fn linked(library: LibraryId, index: u32) -> Self {
        Self {
            library: Some(library),
            index,
        }
    }

    #[inline]
    pub fn is_linked(&self) -> bool {
        self.library.is_some()
    }
}

/// A node in the serialized object graph.
///
/// Owns its string-keyed properties (map semantics, insertion order
/// preserved for the wire) and its ordered children.
#[derive(Clone, PartialEq)]
pub struct FbomObject {
    ty: FbomType,
    properties: SmallVec<[(String, FbomData); 8]>,
    children: Vec<FbomObject>,
    /// Explicit id override; content-derived when `None`.
    id: Option<UniqueId>,
    external: Option<ExternalObjectInfo>,
}

impl FbomObject {
    /// Create an object of a named type extending the root object type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self::with_type(ty::object_type(type_name))
    }

    /// Create an object with an explicit descriptor. The descriptor
    /// must be, or extend, the root object type.
    pub fn with_type(ty: FbomType) -> Self {
        debug_assert!(ty.extends_object(), "object type must extend `object`: {ty}");
        Self {
            ty,
            properties: SmallVec::new(),
            children: Vec::new(),
            id: None,
            external: None,
        }
    }

    #[inline]
    pub fn ty(&self) -> &FbomType {
        &self.ty
    }

    /// Set a property; overwrites an existing key, else appends.
    pub fn set_property(&mut self, key: impl Into<String>, data: FbomData) {
        let key = key.into();
        for (k, v) in &mut self.properties {
            if *k == key {
                *v = data;
                return;
            }
        }
        self.properties.push((key, data));
    }

    /// Set a property from a descriptor and raw bytes, validating the
    /// byte count against bounded sizes.
    pub fn set_property_bytes(
        &mut self,
        key: impl Into<String>,
        ty: FbomType,
        bytes: Vec<u8>,
    ) -> Result<()> {
        let data = FbomData::from_bytes(ty, bytes)?;
        self.set_property(key, data);
        Ok(())
    }

    /// Get a property value; returns the shared unset sentinel on a
    /// miss so chained typed reads fail softly.
    pub fn get_property(&self, key: &str) -> &FbomData {
        self.properties
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v)
            .unwrap_or_else(|| unset_data())
    }

    pub fn has_property(&self, key: &str) -> bool {
        self.properties.iter().any(|(k, _)| k == key)
    }

    pub fn property_count(&self) -> usize {
        self.properties.len()
    }

    /// Properties in insertion order (the order they hit the wire).
    pub fn properties(&self) -> impl Iterator<Item = (&str, &FbomData)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Append a child node; the parent owns it thereafter.
    pub fn add_child(&mut self, child: FbomObject) {
        self.children.push(child);
    }

    pub fn children(&self) -> &[FbomObject] {
        &self.children
    }

    pub fn child_count(&self) -> usize {
        self.children.len()
    }

    /// First child of a given type name, if any.
    pub fn child_by_type(&self, type_name: &str) -> Option<&FbomObject> {
        self.children.iter().find(|c| c.ty.name == type_name)
    }

    /// Override the content-derived unique id.
    pub fn set_unique_id(&mut self, id: UniqueId) {
        self.id = Some(id);
    }

    /// Unique id: explicit override, else a content hash of type,
    /// properties, children and external link. Properties are hashed in
    /// sorted-key order so structurally identical objects with
    /// different insertion order dedup to the same static-data slot.
    pub fn unique_id(&self) -> UniqueId {
        if let Some(id) = self.id {
            return id;
        }
        let mut hasher = ContentHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }

    pub(crate) fn hash_into(&self, hasher: &mut ContentHasher) {
        self.ty.hash_into(hasher);

        let mut keys: SmallVec<[&str; 8]> =
            self.properties.iter().map(|(k, _)| k.as_str()).collect();
        keys.sort_unstable();
        hasher.write_u64(keys.len() as u64);
        for key in keys {
            hasher.write_str(key);
            self.get_property(key).hash_into(hasher);
        }

        hasher.write_u64(self.children.len() as u64);
        for child in &self.children {
            hasher.write_id(child.unique_id());
        }

        // An external stub must never share an id with a plain object
        // of the same shape, or the dedup pool conflates the two.
        match &self.external {
            Some(info) => {
                hasher.write_u8(1);
                match info.library {
                    Some(library) => {
                        hasher.write_u8(1);
                        hasher.write_u64(library.value());
                    }
                    None => hasher.write_u8(0),
                }
                hasher.write_u32(info.index);
            }
            None => hasher.write_u8(0),
        }
    }

    /// Summed payload footprint of all properties and children.
    pub fn total_size(&self) -> u64 {
        let properties: u64 = self.properties.iter().map(|(_, v)| v.total_size()).sum();
        let children: u64 = self.children.iter().map(FbomObject::total_size).sum();
        properties + children
    }

    pub fn external_info(&self) -> Option<&ExternalObjectInfo> {
        self.external.as_ref()
    }

    /// Mark this object as externally persisted.
    pub fn set_external(&mut self, info: ExternalObjectInfo) {
        self.external = Some(info);
    }

    pub fn is_external(&self) -> bool {
        self.external.is_some()
    }

    /// Reconstruct the native value for this node by dispatching
    /// through the marshal registry on the node's native type key.
    pub fn deserialize(&self, ctx: &DeserializeContext<'_>) -> Result<Box<dyn Any>> {
        let marshal = ctx
            .registry()
            .get(self.ty.native)
            .ok_or_else(|| Error::NoMarshalRegistered(self.ty.name.clone()))?;
        marshal.deserialize(ctx, self)
    }
}

impl fmt::Debug for FbomObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FbomObject")
            .field("ty", &self.ty)
            .field("properties", &self.properties.len())
            .field("children", &self.children.len())
            .field("external", &self.external)
            .finish()
    }
}

/// A named collection of top-level objects persisted as one library
/// block, referenced from other streams by `{library id, index}`.
#[derive(Clone, PartialEq, Debug)]
pub struct FbomObjectLibrary {
    pub id: LibraryId,
    pub objects: Vec<FbomObject>,
}

impl FbomObjectLibrary {
    pub fn new(id: LibraryId) -> Self {
        Self {
            id,
            objects: Vec::new(),
        }
    }

    /// Append an object, returning its index within the library.
    pub fn add_object(&mut self, object: FbomObject) -> u32 {
        self.objects.push(object);
        (self.objects.len() - 1) as u32
    }

    pub fn get(&self, index: u32) -> Option<&FbomObject> {
        self.objects.get(index as usize)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
