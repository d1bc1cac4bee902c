//! # FBOM
//!
//! Rust implementation of the FBOM binary object-model format: a
//! self-describing, versioned, type-tagged container for serialized
//! object graphs.
//!
//! Every value on the wire carries a runtime type descriptor, repeated
//! values dedup through a static-data section, and native types plug in
//! through a process-wide marshal registry. Objects can also live in
//! separate library streams and be referenced by `{library, index}`.
//!
//! ## Modules
//!
//! - [`util`] - Errors, POD traits, content hashing
//! - [`ty`] - Runtime type descriptors and the base catalogue
//! - [`data`] - Value containers, arrays, object nodes, libraries
//! - [`marshal`] - Native-type marshaling and the global registry
//! - [`wire`] - Binary stream writer/reader
//!
//! ## Example
//!
//! ```ignore
//! use fbom::prelude::*;
//!
//! let mut scene = FbomObject::new("Scene");
//! scene.set_property("name", FbomData::from_string("main"));
//!
//! let bytes = fbom::object_to_bytes(&scene)?;
//! let decoded = fbom::object_from_bytes(&bytes)?;
//! assert_eq!(decoded.get_property("name").read_string()?, "main");
//! ```

pub mod data;
pub mod marshal;
pub mod ty;
pub mod util;
pub mod wire;

pub use data::{ExternalObjectInfo, FbomArray, FbomData, FbomObject, FbomObjectLibrary, LibraryId};
pub use marshal::{Marshal, MarshalRegistry};
pub use ty::{FbomType, TypeKey};
pub use util::{Error, Result, UniqueId};
pub use wire::{FbomReader, FbomWriter};

use std::any::Any;
use std::path::Path;

/// Serialize an object tree into an FBOM byte stream.
pub fn object_to_bytes(object: &FbomObject) -> Result<Vec<u8>> {
    let mut writer = FbomWriter::new();
    writer.append(object.clone());
    writer.emit()
}

/// Parse an FBOM byte stream back into its root object tree.
pub fn object_from_bytes(bytes: &[u8]) -> Result<FbomObject> {
    FbomReader::new(bytes)?.read_root()
}

/// Serialize a native value through its registered marshal.
pub fn to_bytes<T: Any>(value: &T) -> Result<Vec<u8>> {
    let object = MarshalRegistry::global().serialize(value)?;
    object_to_bytes(&object)
}

/// Deserialize a native value through its registered marshal.
pub fn from_bytes<T: Any>(bytes: &[u8]) -> Result<T> {
    FbomReader::new(bytes)?.deserialize(MarshalRegistry::global())
}

/// Write an object tree to a file.
pub fn write_file(path: impl AsRef<Path>, object: &FbomObject) -> Result<()> {
    let mut writer = FbomWriter::new();
    writer.append(object.clone());
    writer.write_to_file(path)
}

/// Read the root object tree from a file, memory-mapping it when the
/// `mmap` feature is enabled.
pub fn read_file(path: impl AsRef<Path>) -> Result<FbomObject> {
    let source = wire::FbomSource::open(path)?;
    FbomReader::new(source.bytes())?.read_root()
}

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::data::{
        ExternalObjectInfo, FbomArray, FbomData, FbomObject, FbomObjectLibrary, LibraryId,
    };
    pub use crate::marshal::{ClassBuilder, Marshal, MarshalRegistry};
    pub use crate::ty::{self, FbomType, TypeKey};
    pub use crate::util::{Error, Result, UniqueId};
    pub use crate::wire::{FbomReader, FbomWriter};
}
