//! FBOM stream reader.
//!
//! Mirrors the writer token stream: header validation, static-data
//! directory, library blocks, root object. Static entries decode
//! lazily on first reference and are cached for repeat references.

use std::collections::HashMap;

use tracing::debug;

use super::format::*;
use super::source::{swap_payload, ByteCursor};
use crate::data::{
    ExternalObjectInfo, FbomArray, FbomData, FbomObject, FbomObjectLibrary, LibraryId, Payload,
};
use crate::marshal::{DeserializeContext, MarshalRegistry};
use crate::ty::{FbomType, TypeKey};
use crate::util::{Error, Result, UniqueId};

/// Stream reader over a borrowed byte buffer (an mmap or an owned
/// `Vec<u8>` held by the caller).
pub struct FbomReader<'a> {
    buf: &'a [u8],
    swap: bool,
    version: u16,
    dir: Vec<StaticDirEntry>,
    /// Byte range of the static-data blob within `buf`.
    blob_start: usize,
    /// Start of the token stream after the static-data section.
    body_start: usize,
    cache: Vec<Option<StaticDataCacheEntry>>,
    libraries: HashMap<LibraryId, FbomObjectLibrary>,
}

#[derive(Clone)]
enum StaticDataCacheEntry {
    Decoding,
    Type(FbomType),
    Object(FbomObject),
    Data(FbomData),
    Array(FbomArray),
}

impl<'a> FbomReader<'a> {
    /// Parse the header and static-data directory. Element decoding is
    /// deferred until referenced.
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::UnexpectedEof(buf.len() as u64));
        }
        if &buf[0..4] != FBOM_MAGIC {
            return Err(Error::InvalidMagic);
        }
        let swap = match buf[ENDIAN_OFFSET] {
            ENDIAN_LITTLE => false,
            ENDIAN_BIG => true,
            marker => return Err(Error::InvalidEndianness(marker)),
        };
        let mut cur = ByteCursor::new(&buf[VERSION_OFFSET..VERSION_OFFSET + 2], swap);
        let version = cur.read_u16()?;
        if version == 0 || version > CURRENT_VERSION {
            return Err(Error::UnsupportedVersion(version));
        }

        let mut cur = ByteCursor::new(buf, swap);
        cur.take(HEADER_SIZE)?;

        expect_command(&mut cur, CMD_STATIC_DATA_START)?;
        let count = cur.read_u32()? as usize;
        let mut dir = Vec::with_capacity(count);
        for _ in 0..count {
            let kind = cur.read_u8()?;
            let kind = StaticDataKind::from_u8(kind)
                .ok_or_else(|| Error::invalid(format!("unknown static data kind {kind}")))?;
            let offset = cur.read_u32()?;
            let size = cur.read_u32()?;
            dir.push(StaticDirEntry { kind, offset, size });
        }
        let blob_size = cur.read_u32()? as usize;
        let blob_start = cur.pos() as usize;
        cur.take(blob_size)?;
        expect_command(&mut cur, CMD_STATIC_DATA_END)?;
        let body_start = cur.pos() as usize;

        debug!(version, swap, entries = count, "stream header parsed");

        Ok(Self {
            buf,
            swap,
            version,
            dir,
            blob_start,
            body_start,
            cache: vec![None; count],
            libraries: HashMap::new(),
        })
    }

    pub fn version(&self) -> u16 {
        self.version
    }

    /// True when the producer's byte order differs from this host's
    /// view of the stream.
    pub fn swapped(&self) -> bool {
        self.swap
    }

    pub fn static_data_count(&self) -> usize {
        self.dir.len()
    }

    /// Libraries encountered so far (populated by [`Self::read_root`]).
    pub fn libraries(&self) -> &HashMap<LibraryId, FbomObjectLibrary> {
        &self.libraries
    }

    /// Consume the token stream after the static-data section: library
    /// blocks are loaded as encountered, and the single root object is
    /// returned. Library blocks must precede the root that references
    /// them, which is the order the writer emits.
    pub fn read_root(&mut self) -> Result<FbomObject> {
        let buf = self.buf;
        let mut cur = ByteCursor::new(&buf[self.body_start..], self.swap);
        let mut root: Option<FbomObject> = None;

        while !cur.is_at_end() {
            match cur.peek_u8()? {
                CMD_OBJECT_LIBRARY_START => {
                    let library = self.read_object_library(&mut cur)?;
                    debug!(id = %library.id, objects = library.len(), "object library loaded");
                    self.libraries.insert(library.id, library);
                }
                CMD_OBJECT_START => {
                    if root.is_some() {
                        return Err(Error::invalid("multiple root objects in stream"));
                    }
                    root = Some(self.read_object(&mut cur)?);
                }
                byte => {
                    return Err(Error::InvalidCommand {
                        byte,
                        pos: self.body_start as u64 + cur.pos(),
                    })
                }
            }
        }

        root.ok_or_else(|| Error::invalid("stream contains no root object"))
    }

    /// Deserialize the root object into its registered native type.
    pub fn deserialize<T: 'static>(&mut self, registry: &MarshalRegistry) -> Result<T> {
        let root = self.read_root()?;
        let ctx = DeserializeContext::new(registry, &self.libraries);
        let boxed = root.deserialize(&ctx)?;
        boxed
            .downcast::<T>()
            .map(|v| *v)
            .map_err(|_| Error::Downcast(std::any::type_name::<T>().to_string()))
    }

    fn read_object_library(&mut self, cur: &mut ByteCursor<'a>) -> Result<FbomObjectLibrary> {
        expect_command(cur, CMD_OBJECT_LIBRARY_START)?;
        let id = LibraryId(cur.read_u64()?);
        let count = cur.read_u32()?;
        let mut library = FbomObjectLibrary::new(id);
        for _ in 0..count {
            let object = self.read_object(cur)?;
            library.add_object(object);
        }
        expect_command(cur, CMD_OBJECT_LIBRARY_END)?;
        Ok(library)
    }

    fn read_object(&mut self, cur: &mut ByteCursor<'a>) -> Result<FbomObject> {
        expect_command(cur, CMD_OBJECT_START)?;
        let attr = cur.read_u8()?;
        if attr & !ATTR_ALL != 0 {
            return Err(Error::invalid(format!(
                "unknown object attribute bits {attr:#04x}"
            )));
        }

        let object = if attr & ATTR_EXT_REF != 0 {
            let library = LibraryId(cur.read_u64()?);
            let index = cur.read_u32()?;
            let mut object = self.request_external_object(library, index)?;
            object.set_external(ExternalObjectInfo::linked(library, index));
            object
        } else if attr & ATTR_STATIC_REF != 0 {
            let index = cur.read_u32()?;
            self.static_object(index as usize)?
        } else {
            let mut object = self.read_object_body(cur)?;
            if attr & ATTR_EXT_REF_PLACEHOLDER != 0 {
                object.set_external(ExternalObjectInfo::unlinked());
            }
            object
        };

        expect_command(cur, CMD_OBJECT_END)?;
        Ok(object)
    }

    fn read_object_body(&mut self, cur: &mut ByteCursor<'a>) -> Result<FbomObject> {
        let ty = self.read_type(cur)?;
        if !ty.extends_object() {
            return Err(Error::type_mismatch("object lineage", &ty));
        }
        let id = cur.read_u64()?;
        let mut object = FbomObject::with_type(ty);

        let property_count = cur.read_u32()?;
        for _ in 0..property_count {
            let name = read_property_name(cur)?;
            let data = self.read_data(cur)?;
            object.set_property(name, data);
        }

        let child_count = cur.read_u32()?;
        for _ in 0..child_count {
            let child = self.read_object(cur)?;
            object.add_child(child);
        }

        // Re-stamp the writer's id only when it differs from the
        // content-derived one; plain content ids stay implicit.
        if object.unique_id() != UniqueId::new(id) {
            object.set_unique_id(UniqueId::new(id));
        }
        Ok(object)
    }

    fn read_type(&mut self, cur: &mut ByteCursor<'a>) -> Result<FbomType> {
        let attr = cur.read_u8()?;
        if attr & ATTR_STATIC_REF != 0 {
            let index = cur.read_u32()?;
            return self.static_type(index as usize);
        }
        read_type_body(cur)
    }

    fn read_data(&mut self, cur: &mut ByteCursor<'a>) -> Result<FbomData> {
        let attr = cur.read_u8()?;
        if attr & ATTR_STATIC_REF != 0 {
            let index = cur.read_u32()?;
            return self.static_data(index as usize);
        }

        let ty = self.read_type(cur)?;
        let payload = match cur.read_u8()? {
            PAYLOAD_BYTES => {
                let len = cur.read_u32()? as usize;
                let mut bytes = cur.take(len)?.to_vec();
                if cur.swapped() {
                    if let Some(elem_size) = swap_elem_size(&ty) {
                        swap_payload(&mut bytes, elem_size);
                    }
                }
                Payload::Bytes(bytes)
            }
            PAYLOAD_OBJECT => Payload::Object(Box::new(self.read_object(cur)?)),
            PAYLOAD_ARRAY => Payload::Array(Box::new(self.read_array(cur)?)),
            kind => return Err(Error::invalid(format!("unknown payload kind {kind}"))),
        };
        Ok(FbomData::from_parts(ty, payload))
    }

    fn read_array(&mut self, cur: &mut ByteCursor<'a>) -> Result<FbomArray> {
        let attr = cur.read_u8()?;
        if attr & ATTR_STATIC_REF != 0 {
            let index = cur.read_u32()?;
            return self.static_array(index as usize);
        }

        let count = cur.read_u32()?;
        let elem_ty = self.read_type(cur)?;
        let mut array = FbomArray::new(elem_ty);
        for _ in 0..count {
            array.push(self.read_data(cur)?)?;
        }
        Ok(array)
    }

    fn request_external_object(&mut self, library: LibraryId, index: u32) -> Result<FbomObject> {
        self.libraries
            .get(&library)
            .and_then(|lib| lib.get(index))
            .cloned()
            .ok_or(Error::ExternalObjectUnavailable {
                library: library.value(),
                index,
            })
    }

    // === Static data resolution ===

    pub fn static_type(&mut self, index: usize) -> Result<FbomType> {
        match self.static_element(index, StaticDataKind::Type)? {
            StaticDataCacheEntry::Type(ty) => Ok(ty),
            _ => unreachable!("kind checked by static_element"),
        }
    }

    pub fn static_object(&mut self, index: usize) -> Result<FbomObject> {
        match self.static_element(index, StaticDataKind::Object)? {
            StaticDataCacheEntry::Object(object) => Ok(object),
            _ => unreachable!("kind checked by static_element"),
        }
    }

    pub fn static_data(&mut self, index: usize) -> Result<FbomData> {
        match self.static_element(index, StaticDataKind::Data)? {
            StaticDataCacheEntry::Data(data) => Ok(data),
            _ => unreachable!("kind checked by static_element"),
        }
    }

    pub fn static_array(&mut self, index: usize) -> Result<FbomArray> {
        match self.static_element(index, StaticDataKind::Array)? {
            StaticDataCacheEntry::Array(array) => Ok(array),
            _ => unreachable!("kind checked by static_element"),
        }
    }

    /// Resolve one static-data entry, decoding and caching it on first
    /// reference. The requested kind must match the directory entry.
    fn static_element(
        &mut self,
        index: usize,
        expected: StaticDataKind,
    ) -> Result<StaticDataCacheEntry> {
        let entry = *self
            .dir
            .get(index)
            .ok_or(Error::StaticDataOutOfRange {
                index,
                count: self.dir.len(),
            })?;
        if entry.kind != expected {
            return Err(Error::StaticDataKindMismatch {
                index,
                expected: expected.name(),
                actual: entry.kind.name(),
            });
        }

        match &self.cache[index] {
            Some(StaticDataCacheEntry::Decoding) => {
                return Err(Error::invalid(format!(
                    "recursive static data reference at index {index}"
                )));
            }
            Some(cached) => return Ok(cached.clone()),
            None => {}
        }
        self.cache[index] = Some(StaticDataCacheEntry::Decoding);
        match self.decode_static_entry(index, entry) {
            Ok(decoded) => {
                self.cache[index] = Some(decoded.clone());
                Ok(decoded)
            }
            Err(err) => {
                // Drop the sentinel so a later query reports the real
                // decode error, not a bogus recursion.
                self.cache[index] = None;
                Err(err)
            }
        }
    }

    fn decode_static_entry(
        &mut self,
        index: usize,
        entry: StaticDirEntry,
    ) -> Result<StaticDataCacheEntry> {
        let start = self.blob_start + entry.offset as usize;
        let end = start
            .checked_add(entry.size as usize)
            .filter(|&end| end <= self.buf.len())
            .ok_or(Error::UnexpectedEof(self.buf.len() as u64))?;
        let buf = self.buf;
        let mut cur = ByteCursor::new(&buf[start..end], self.swap);

        let decoded = match entry.kind {
            StaticDataKind::Type => StaticDataCacheEntry::Type(self.read_type(&mut cur)?),
            StaticDataKind::Object => StaticDataCacheEntry::Object(self.read_object(&mut cur)?),
            StaticDataKind::Data => StaticDataCacheEntry::Data(self.read_data(&mut cur)?),
            StaticDataKind::Array => StaticDataCacheEntry::Array(self.read_array(&mut cur)?),
            StaticDataKind::None => {
                return Err(Error::invalid(format!(
                    "empty static data entry at index {index}"
                )))
            }
        };
        if !cur.is_at_end() {
            return Err(Error::invalid(format!(
                "static data entry {index} has {} trailing bytes",
                cur.remaining()
            )));
        }
        Ok(decoded)
    }
}

fn expect_command(cur: &mut ByteCursor<'_>, expected: u8) -> Result<()> {
    let pos = cur.pos();
    let byte = cur.read_u8()?;
    if byte != expected {
        return Err(Error::InvalidCommand { byte, pos });
    }
    Ok(())
}

fn read_property_name(cur: &mut ByteCursor<'_>) -> Result<String> {
    let name = cur.read_string()?;
    if name.is_empty() {
        return Err(Error::invalid("empty property name"));
    }
    Ok(name)
}

fn read_type_body(cur: &mut ByteCursor<'_>) -> Result<FbomType> {
    let name = cur.read_string()?;
    let flags = cur.read_u8()?;
    let size = cur.read_u64()?;
    let native = TypeKey(cur.read_u64()?);
    let mut ty = FbomType::with_flags(name, size, native, flags);
    if cur.read_u8()? != 0 {
        ty.extends = Some(Box::new(read_type_body(cur)?));
    }
    Ok(ty)
}

/// Element width for byte-order correction of flat payloads. Strings,
/// opaque byte buffers and user structs carry no per-field layout on
/// the wire, so they are left untouched; cross-endian user structs are
/// the marshal's problem.
fn swap_elem_size(ty: &FbomType) -> Option<usize> {
    match ty.name.as_str() {
        "u16" | "i16" => Some(2),
        "u32" | "i32" | "f32" => Some(4),
        "u64" | "i64" | "f64" => Some(8),
        // glam vector/matrix payloads are homogeneous 4-byte lanes.
        "vec2f" | "vec3f" | "vec4f" | "vec2i" | "vec3i" | "vec2u" | "vec3u" | "mat3f"
        | "mat4f" | "quatf" => Some(4),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ty;
    use crate::wire::writer::FbomWriter;

    fn emit_root(root: FbomObject) -> Vec<u8> {
        let mut writer = FbomWriter::new();
        writer.append(root);
        writer.emit().unwrap()
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut bytes = emit_root(FbomObject::new("Node"));
        bytes[0] = b'X';
        assert!(matches!(FbomReader::new(&bytes), Err(Error::InvalidMagic)));
    }

    #[test]
    fn test_rejects_bad_endian_marker() {
        let mut bytes = emit_root(FbomObject::new("Node"));
        bytes[ENDIAN_OFFSET] = 0x7F;
        assert!(matches!(
            FbomReader::new(&bytes),
            Err(Error::InvalidEndianness(0x7F))
        ));
    }

    #[test]
    fn test_rejects_future_version() {
        let mut bytes = emit_root(FbomObject::new("Node"));
        bytes[VERSION_OFFSET] = 0xFF;
        bytes[VERSION_OFFSET + 1] = 0xFF;
        assert!(matches!(
            FbomReader::new(&bytes),
            Err(Error::UnsupportedVersion(0xFFFF))
        ));
    }

    #[test]
    fn test_rejects_truncated_stream() {
        let bytes = emit_root(FbomObject::new("Node"));
        let truncated = &bytes[..bytes.len() - 3];
        let result = FbomReader::new(truncated).and_then(|mut r| r.read_root());
        assert!(result.is_err());
    }

    #[test]
    fn test_roundtrip_properties_and_children() {
        let mut root = FbomObject::new("Scene");
        root.set_property("name", FbomData::from_string("main"));
        root.set_property("scale", FbomData::from_f32(2.5));
        let mut child = FbomObject::new("Node");
        child.set_property("index", FbomData::from_u32(7));
        root.add_child(child);

        let bytes = emit_root(root);
        let mut reader = FbomReader::new(&bytes).unwrap();
        let decoded = reader.read_root().unwrap();

        assert_eq!(decoded.ty().name, "Scene");
        assert_eq!(decoded.get_property("name").read_string().unwrap(), "main");
        assert_eq!(decoded.get_property("scale").read_f32().unwrap(), 2.5);
        let child = decoded.child_by_type("Node").unwrap();
        assert_eq!(child.get_property("index").read_u32().unwrap(), 7);
    }

    #[test]
    fn test_roundtrip_shared_subobject() {
        let mut shared = FbomObject::new("Material");
        shared.set_property("roughness", FbomData::from_f32(0.25));

        let mut root = FbomObject::new("Scene");
        root.add_child(shared.clone());
        root.add_child(shared.clone());

        let bytes = emit_root(root);
        let mut reader = FbomReader::new(&bytes).unwrap();
        let decoded = reader.read_root().unwrap();

        assert_eq!(decoded.child_count(), 2);
        assert_eq!(decoded.children()[0], decoded.children()[1]);
        assert_eq!(
            decoded.children()[0]
                .get_property("roughness")
                .read_f32()
                .unwrap(),
            0.25
        );
    }

    #[test]
    fn test_roundtrip_array_property() {
        let array = FbomArray::from_elements(
            ty::u32_type(),
            vec![
                FbomData::from_u32(1),
                FbomData::from_u32(2),
                FbomData::from_u32(3),
            ],
        )
        .unwrap();

        let mut root = FbomObject::new("Node");
        root.set_property("ids", FbomData::from_array(array));

        let bytes = emit_root(root);
        let mut reader = FbomReader::new(&bytes).unwrap();
        let decoded = reader.read_root().unwrap();

        let array = decoded.get_property("ids").as_array().unwrap();
        assert_eq!(array.len(), 3);
        assert_eq!(array.get(1).unwrap().read_u32().unwrap(), 2);
    }

    #[test]
    fn test_roundtrip_explicit_unique_id() {
        let mut root = FbomObject::new("Node");
        root.set_unique_id(UniqueId::new(0xBEEF));

        let bytes = emit_root(root);
        let mut reader = FbomReader::new(&bytes).unwrap();
        let decoded = reader.read_root().unwrap();
        assert_eq!(decoded.unique_id(), UniqueId::new(0xBEEF));
    }

    #[test]
    fn test_library_resolution() {
        let mut lib = FbomObjectLibrary::new(LibraryId(42));
        let mut texture = FbomObject::new("Texture");
        texture.set_property("width", FbomData::from_u32(256));
        let index = lib.add_object(texture);

        let mut reference = FbomObject::new("Texture");
        reference.set_external(ExternalObjectInfo::linked(LibraryId(42), index));
        let mut root = FbomObject::new("Scene");
        root.add_child(reference);

        let mut writer = FbomWriter::new();
        writer.append_library(lib);
        writer.append(root);
        let bytes = writer.emit().unwrap();

        let mut reader = FbomReader::new(&bytes).unwrap();
        let decoded = reader.read_root().unwrap();
        let resolved = &decoded.children()[0];
        assert!(resolved.external_info().unwrap().is_linked());
        assert_eq!(resolved.get_property("width").read_u32().unwrap(), 256);
    }

    #[test]
    fn test_external_reference_distinct_from_plain_object() {
        let mut lib = FbomObjectLibrary::new(LibraryId(42));
        let mut texture = FbomObject::new("Texture");
        texture.set_property("width", FbomData::from_u32(256));
        let index = lib.add_object(texture);

        let mut reference = FbomObject::new("Texture");
        reference.set_external(ExternalObjectInfo::linked(LibraryId(42), index));
        let plain = FbomObject::new("Texture");
        let mut root = FbomObject::new("Scene");
        root.add_child(reference);
        root.add_child(plain);

        let mut writer = FbomWriter::new();
        writer.append_library(lib);
        writer.append(root);
        let bytes = writer.emit().unwrap();

        let mut reader = FbomReader::new(&bytes).unwrap();
        let decoded = reader.read_root().unwrap();

        let resolved = &decoded.children()[0];
        assert!(resolved.external_info().unwrap().is_linked());
        assert_eq!(resolved.get_property("width").read_u32().unwrap(), 256);

        // The plain sibling must not pick up the library object.
        let plain = &decoded.children()[1];
        assert!(!plain.is_external());
        assert!(!plain.has_property("width"));
    }

    #[test]
    fn test_missing_library_errors() {
        let mut reference = FbomObject::new("Texture");
        reference.set_external(ExternalObjectInfo::linked(LibraryId(99), 0));
        let mut root = FbomObject::new("Scene");
        root.add_child(reference);

        let bytes = emit_root(root);
        let mut reader = FbomReader::new(&bytes).unwrap();
        assert!(matches!(
            reader.read_root(),
            Err(Error::ExternalObjectUnavailable { library: 99, index: 0 })
        ));
    }

    #[test]
    fn test_unlinked_external_roundtrips_inline() {
        let mut pending = FbomObject::new("Texture");
        pending.set_property("width", FbomData::from_u32(64));
        pending.set_external(ExternalObjectInfo::unlinked());
        let mut root = FbomObject::new("Scene");
        root.add_child(pending);

        let bytes = emit_root(root);
        let mut reader = FbomReader::new(&bytes).unwrap();
        let decoded = reader.read_root().unwrap();
        let child = &decoded.children()[0];
        assert!(child.is_external());
        assert!(!child.external_info().unwrap().is_linked());
        assert_eq!(child.get_property("width").read_u32().unwrap(), 64);
    }

    #[test]
    fn test_static_index_out_of_range() {
        let bytes = emit_root(FbomObject::new("Node"));
        let mut reader = FbomReader::new(&bytes).unwrap();
        let count = reader.static_data_count();
        assert!(matches!(
            reader.static_object(count),
            Err(Error::StaticDataOutOfRange { .. })
        ));
    }

    #[test]
    fn test_static_kind_mismatch() {
        let bytes = emit_root(FbomObject::new("Node"));
        let mut reader = FbomReader::new(&bytes).unwrap();
        // Entry 0 is a type (types are always pooled first).
        assert!(reader.static_type(0).is_ok());
        assert!(matches!(
            reader.static_object(0),
            Err(Error::StaticDataKindMismatch { .. })
        ));
    }

    #[test]
    fn test_static_decode_error_repeats_on_retry() {
        let mut bytes = emit_root(FbomObject::new("Node"));
        let count = u32::from_le_bytes(bytes[17..21].try_into().unwrap()) as usize;
        assert!(count > 0);
        // Blob follows the directory: count, 9-byte entries, blob size.
        let blob_start = 25 + 9 * count;
        // Entry 0 starts with its attribute byte; wreck the type name
        // length that follows so decoding runs off the entry.
        bytes[blob_start + 1..blob_start + 5].fill(0xFF);

        let mut reader = FbomReader::new(&bytes).unwrap();
        assert!(matches!(
            reader.static_type(0),
            Err(Error::UnexpectedEof(_))
        ));
        // The second query must report the decode failure again, not a
        // phantom recursive reference.
        assert!(matches!(
            reader.static_type(0),
            Err(Error::UnexpectedEof(_))
        ));
    }
}
