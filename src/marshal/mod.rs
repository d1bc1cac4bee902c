//! Pluggable per-type marshaling.
//!
//! A [`Marshal`] turns a native value into an [`FbomObject`] tree and
//! back. The process-wide [`MarshalRegistry`] maps stable native type
//! keys to marshals; registration happens at startup, lookups are
//! read-locked and run concurrently.

mod reflect;

pub use reflect::{register_bitwise, ClassBuilder, ClassMarshal, FbomValue};

use crate::data::{FbomObject, FbomObjectLibrary, LibraryId};
use crate::ty::TypeKey;
use crate::util::{Error, Result};
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

/// Serialize/deserialize capability for one native type.
pub trait Marshal: Send + Sync {
    /// Stable native type name; hashed into the wire-level [`TypeKey`].
    fn type_name(&self) -> &str;

    /// Build an object tree from a native value.
    fn serialize(&self, value: &dyn Any) -> Result<FbomObject>;

    /// Reconstruct a native value from a parsed object tree.
    fn deserialize(&self, ctx: &DeserializeContext<'_>, object: &FbomObject)
        -> Result<Box<dyn Any>>;
}

/// Context handed to marshals during deserialization: registry access
/// for nested dispatch plus the object libraries loaded in this pass.
pub struct DeserializeContext<'a> {
    registry: &'a MarshalRegistry,
    libraries: &'a HashMap<LibraryId, FbomObjectLibrary>,
}

impl<'a> DeserializeContext<'a> {
    pub fn new(
        registry: &'a MarshalRegistry,
        libraries: &'a HashMap<LibraryId, FbomObjectLibrary>,
    ) -> Self {
        Self {
            registry,
            libraries,
        }
    }

    #[inline]
    pub fn registry(&self) -> &MarshalRegistry {
        self.registry
    }

    /// Resolve an external `{library, index}` reference against the
    /// libraries loaded in this pass.
    pub fn request_external_object(
        &self,
        library: LibraryId,
        index: u32,
    ) -> Result<&FbomObject> {
        self.libraries
            .get(&library)
            .and_then(|lib| lib.get(index))
            .ok_or(Error::ExternalObjectUnavailable {
                library: library.value(),
                index,
            })
    }
}

/// Process-wide marshal table.
///
/// Keyed two ways: by wire-level [`TypeKey`] (reader side) and by Rust
/// [`TypeId`] (writer side), so both directions resolve without
/// consulting the other.
pub struct MarshalRegistry {
    by_key: RwLock<HashMap<TypeKey, Arc<dyn Marshal>>>,
    by_native: RwLock<HashMap<TypeId, TypeKey>>,
}

impl MarshalRegistry {
    pub fn new() -> Self {
        Self {
            by_key: RwLock::new(HashMap::new()),
            by_native: RwLock::new(HashMap::new()),
        }
    }

    /// The process-wide registry. Initialized on first use, never torn
    /// down.
    pub fn global() -> &'static MarshalRegistry {
        static GLOBAL: OnceLock<MarshalRegistry> = OnceLock::new();
        GLOBAL.get_or_init(MarshalRegistry::new)
    }

    /// Register a marshal for native type `T`. Returns the wire key it
    /// was registered under. A second registration for the same type
    /// replaces the first.
    pub fn register<T: Any>(&self, marshal: Arc<dyn Marshal>) -> TypeKey {
        let key = TypeKey::from_name(marshal.type_name());
        self.by_key.write().insert(key, marshal);
        self.by_native.write().insert(TypeId::of::<T>(), key);
        key
    }

    /// Look up a marshal by wire key.
    pub fn get(&self, key: TypeKey) -> Option<Arc<dyn Marshal>> {
        self.by_key.read().get(&key).cloned()
    }

    /// Wire key registered for native type `T`, if any.
    pub fn key_for<T: Any>(&self) -> Option<TypeKey> {
        self.by_native.read().get(&TypeId::of::<T>()).copied()
    }

    /// Marshal registered for native type `T`, if any.
    pub fn get_for<T: Any>(&self) -> Option<Arc<dyn Marshal>> {
        let key = self.key_for::<T>()?;
        self.get(key)
    }

    /// Serialize a native value through its registered marshal.
    pub fn serialize<T: Any>(&self, value: &T) -> Result<FbomObject> {
        let marshal = self
            .get_for::<T>()
            .ok_or_else(|| Error::NoMarshalRegistered(std::any::type_name::<T>().to_string()))?;
        marshal.serialize(value)
    }
}

impl Default for MarshalRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::FbomData;

    struct Color {
        r: f32,
        g: f32,
        b: f32,
    }

    struct ColorMarshal;

    impl Marshal for ColorMarshal {
        fn type_name(&self) -> &str {
            "test::Color"
        }

        fn serialize(&self, value: &dyn Any) -> Result<FbomObject> {
            let color = value
                .downcast_ref::<Color>()
                .ok_or_else(|| Error::Downcast("test::Color".to_string()))?;
            let mut obj = FbomObject::with_type(crate::ty::object_type_keyed(
                "Color",
                TypeKey::from_name(self.type_name()),
            ));
            obj.set_property("r", FbomData::from_f32(color.r));
            obj.set_property("g", FbomData::from_f32(color.g));
            obj.set_property("b", FbomData::from_f32(color.b));
            Ok(obj)
        }

        fn deserialize(
            &self,
            _ctx: &DeserializeContext<'_>,
            object: &FbomObject,
        ) -> Result<Box<dyn Any>> {
            Ok(Box::new(Color {
                r: object.get_property("r").read_f32()?,
                g: object.get_property("g").read_f32()?,
                b: object.get_property("b").read_f32()?,
            }))
        }
    }

    #[test]
    fn test_register_and_roundtrip() {
        let registry = MarshalRegistry::new();
        let key = registry.register::<Color>(Arc::new(ColorMarshal));

        let obj = registry
            .serialize(&Color {
                r: 0.1,
                g: 0.2,
                b: 0.3,
            })
            .unwrap();
        assert_eq!(obj.ty().native, key);

        let libraries = HashMap::new();
        let ctx = DeserializeContext::new(&registry, &libraries);
        let value = obj.deserialize(&ctx).unwrap();
        let color = value.downcast::<Color>().unwrap();
        assert_eq!(color.g, 0.2);
    }

    #[test]
    fn test_missing_marshal() {
        let registry = MarshalRegistry::new();
        let err = registry.serialize(&Color { r: 0.0, g: 0.0, b: 0.0 }).unwrap_err();
        assert!(matches!(err, Error::NoMarshalRegistered(_)));

        assert!(registry.get(TypeKey::from_name("nonexistent")).is_none());
    }

    #[test]
    fn test_external_object_miss() {
        let registry = MarshalRegistry::new();
        let libraries = HashMap::new();
        let ctx = DeserializeContext::new(&registry, &libraries);
        let err = ctx
            .request_external_object(LibraryId(42), 0)
            .unwrap_err();
        assert!(matches!(err, Error::ExternalObjectUnavailable { .. }));
    }
}
