//! FBOM stream writer.
//!
//! Serializes a root object graph (plus any object libraries) into a
//! byte stream: header, static-data section, library blocks, then the
//! root object as a token stream. Values referenced more than once are
//! pooled in the static-data section and referenced by index.

use std::path::Path;

use tracing::debug;

use super::format::*;
use super::sink::ByteSink;
use super::static_data::{StaticDataPool, StaticDataValue, UsageCounts};
use crate::data::{FbomArray, FbomData, FbomObject, FbomObjectLibrary, Payload};
use crate::ty::FbomType;
use crate::util::{Error, Result};

/// Stream writer. One instance per output stream; not thread-safe.
pub struct FbomWriter {
    root: Option<FbomObject>,
    libraries: Vec<FbomObjectLibrary>,
}

impl FbomWriter {
    pub fn new() -> Self {
        Self {
            root: None,
            libraries: Vec::new(),
        }
    }

    /// Set the root object of the stream. A second call replaces the
    /// first.
    pub fn append(&mut self, object: FbomObject) {
        self.root = Some(object);
    }

    /// Add an object library block, written before the root so its
    /// objects are resolvable when the root references them.
    pub fn append_library(&mut self, library: FbomObjectLibrary) {
        self.libraries.push(library);
    }

    /// Serialize everything appended so far into a byte stream.
    pub fn emit(&self) -> Result<Vec<u8>> {
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::invalid("no root object appended"))?;

        // Pre-pass 1: count occurrences to decide what gets pooled.
        let mut counts = UsageCounts::new();
        for library in &self.libraries {
            for object in &library.objects {
                count_object(&mut counts, object);
            }
        }
        count_object(&mut counts, root);

        // Pre-pass 2: build the pool in first-seen (DFS) order.
        let mut pool = StaticDataPool::new();
        for library in &self.libraries {
            for object in &library.objects {
                pool_object(&mut pool, &counts, object);
            }
        }
        pool_object(&mut pool, &counts, root);

        debug!(entries = pool.len(), "static data pooled");

        let encoder = Encoder { pool: &pool };

        let mut sink = ByteSink::with_capacity(4096);

        // Header.
        sink.write_bytes(FBOM_MAGIC)?;
        sink.write_u8(ENDIAN_LITTLE)?;
        sink.write_u8(0)?;
        sink.write_u16(CURRENT_VERSION)?;
        sink.write_bytes(&[0u8; HEADER_SIZE - 8])?;

        // Static-data section: directory, then one blob holding each
        // entry's body exactly once.
        sink.write_u8(CMD_STATIC_DATA_START)?;
        sink.write_u32(pool.len() as u32)?;

        let mut bodies: Vec<Vec<u8>> = Vec::with_capacity(pool.len());
        for (index, entry) in pool.entries().iter().enumerate() {
            let mut body = ByteSink::new();
            encoder.write_static_entry(&mut body, entry, index as u32)?;
            bodies.push(body.into_bytes());
        }

        let mut offset = 0u32;
        for (entry, body) in pool.entries().iter().zip(&bodies) {
            sink.write_u8(entry.kind() as u8)?;
            sink.write_u32(offset)?;
            sink.write_u32(body.len() as u32)?;
            offset += body.len() as u32;
        }
        sink.write_u32(offset)?;
        for body in &bodies {
            sink.write_bytes(body)?;
        }
        sink.write_u8(CMD_STATIC_DATA_END)?;

        // Library blocks precede the root that references them.
        for library in &self.libraries {
            sink.write_u8(CMD_OBJECT_LIBRARY_START)?;
            sink.write_u64(library.id.value())?;
            sink.write_u32(library.objects.len() as u32)?;
            for object in &library.objects {
                encoder.write_object(&mut sink, object)?;
            }
            sink.write_u8(CMD_OBJECT_LIBRARY_END)?;
        }

        encoder.write_object(&mut sink, root)?;

        debug!(bytes = sink.pos(), "stream emitted");
        Ok(sink.into_bytes())
    }

    /// Emit and write the stream to a file.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let bytes = self.emit()?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

impl Default for FbomWriter {
    fn default() -> Self {
        Self::new()
    }
}

// === Pre-pass walks ===

fn count_object(counts: &mut UsageCounts, object: &FbomObject) {
    counts.record(StaticDataKind::Object, object.unique_id());
    for (_, data) in object.properties() {
        count_data(counts, data);
    }
    for child in object.children() {
        count_object(counts, child);
    }
}

fn count_data(counts: &mut UsageCounts, data: &FbomData) {
    counts.record(StaticDataKind::Data, data.unique_id());
    match data.payload() {
        Payload::Bytes(_) => {}
        Payload::Object(object) => count_object(counts, object),
        Payload::Array(array) => count_array(counts, array),
    }
}

fn count_array(counts: &mut UsageCounts, array: &FbomArray) {
    counts.record(StaticDataKind::Array, array.unique_id());
    for elem in array.iter() {
        count_data(counts, elem);
    }
}

fn pool_type(pool: &mut StaticDataPool, ty: &FbomType) {
    pool.intern(StaticDataValue::Type(ty.clone()));
}

fn pool_object(pool: &mut StaticDataPool, counts: &UsageCounts, object: &FbomObject) {
    pool_type(pool, object.ty());
    if counts.should_pool(StaticDataKind::Object, object.unique_id()) {
        pool.intern(StaticDataValue::Object(object.clone()));
    }
    for (_, data) in object.properties() {
        pool_data(pool, counts, data);
    }
    for child in object.children() {
        pool_object(pool, counts, child);
    }
}

fn pool_data(pool: &mut StaticDataPool, counts: &UsageCounts, data: &FbomData) {
    pool_type(pool, data.ty());
    if counts.should_pool(StaticDataKind::Data, data.unique_id()) {
        pool.intern(StaticDataValue::Data(data.clone()));
    }
    match data.payload() {
        Payload::Bytes(_) => {}
        Payload::Object(object) => pool_object(pool, counts, object),
        Payload::Array(array) => pool_array(pool, counts, array),
    }
}

fn pool_array(pool: &mut StaticDataPool, counts: &UsageCounts, array: &FbomArray) {
    pool_type(pool, array.elem_ty());
    if counts.should_pool(StaticDataKind::Array, array.unique_id()) {
        pool.intern(StaticDataValue::Array(array.clone()));
    }
    for elem in array.iter() {
        pool_data(pool, counts, elem);
    }
}

// === Element encoding ===

struct Encoder<'a> {
    pool: &'a StaticDataPool,
}

impl Encoder<'_> {
    /// Encode one pooled entry body. The entry's own value is always
    /// inlined (never self-referential); nested pooled values encode
    /// as static references.
    fn write_static_entry(
        &self,
        sink: &mut ByteSink,
        entry: &StaticDataValue,
        own_index: u32,
    ) -> Result<()> {
        match entry {
            StaticDataValue::Type(ty) => {
                sink.write_u8(0)?;
                self.write_type_body(sink, ty)
            }
            StaticDataValue::Object(object) => {
                self.write_object_skipping(sink, object, Some(own_index))
            }
            StaticDataValue::Data(data) => self.write_data_skipping(sink, data, Some(own_index)),
            StaticDataValue::Array(array) => {
                self.write_array_skipping(sink, array, Some(own_index))
            }
        }
    }

    fn write_type(&self, sink: &mut ByteSink, ty: &FbomType) -> Result<()> {
        if let Some(index) = self.pool.lookup(StaticDataKind::Type, ty.unique_id()) {
            sink.write_u8(ATTR_STATIC_REF)?;
            return sink.write_u32(index);
        }
        sink.write_u8(0)?;
        self.write_type_body(sink, ty)
    }

    fn write_type_body(&self, sink: &mut ByteSink, ty: &FbomType) -> Result<()> {
        sink.write_string(&ty.name)?;
        sink.write_u8(ty.flags)?;
        sink.write_u64(ty.size)?;
        sink.write_u64(ty.native.value())?;
        match &ty.extends {
            Some(parent) => {
                sink.write_u8(1)?;
                // Lineages are short; parents inline with the leaf.
                self.write_type_body(sink, parent)
            }
            None => sink.write_u8(0),
        }
    }

    fn write_data(&self, sink: &mut ByteSink, data: &FbomData) -> Result<()> {
        self.write_data_skipping(sink, data, None)
    }

    fn write_data_skipping(
        &self,
        sink: &mut ByteSink,
        data: &FbomData,
        own_index: Option<u32>,
    ) -> Result<()> {
        if let Some(index) = self.pool.lookup(StaticDataKind::Data, data.unique_id()) {
            if own_index != Some(index) {
                sink.write_u8(ATTR_STATIC_REF)?;
                return sink.write_u32(index);
            }
        }
        sink.write_u8(0)?;
        self.write_type(sink, data.ty())?;
        match data.payload() {
            Payload::Bytes(bytes) => {
                sink.write_u8(PAYLOAD_BYTES)?;
                sink.write_u32(bytes.len() as u32)?;
                sink.write_bytes(bytes)
            }
            Payload::Object(object) => {
                sink.write_u8(PAYLOAD_OBJECT)?;
                self.write_object(sink, object)
            }
            Payload::Array(array) => {
                sink.write_u8(PAYLOAD_ARRAY)?;
                self.write_array(sink, array)
            }
        }
    }

    fn write_array(&self, sink: &mut ByteSink, array: &FbomArray) -> Result<()> {
        self.write_array_skipping(sink, array, None)
    }

    fn write_array_skipping(
        &self,
        sink: &mut ByteSink,
        array: &FbomArray,
        own_index: Option<u32>,
    ) -> Result<()> {
        if let Some(index) = self.pool.lookup(StaticDataKind::Array, array.unique_id()) {
            if own_index != Some(index) {
                sink.write_u8(ATTR_STATIC_REF)?;
                return sink.write_u32(index);
            }
        }
        sink.write_u8(0)?;
        sink.write_u32(array.len() as u32)?;
        self.write_type(sink, array.elem_ty())?;
        for elem in array.iter() {
            self.write_data(sink, elem)?;
        }
        Ok(())
    }

    fn write_object(&self, sink: &mut ByteSink, object: &FbomObject) -> Result<()> {
        self.write_object_skipping(sink, object, None)
    }

    /// The dedup check runs before recursing into the body: a pooled
    /// object emits only its index.
    fn write_object_skipping(
        &self,
        sink: &mut ByteSink,
        object: &FbomObject,
        own_index: Option<u32>,
    ) -> Result<()> {
        sink.write_u8(CMD_OBJECT_START)?;

        // Resolved external links win over pooling.
        if let Some(info) = object.external_info() {
            if let Some(library) = info.library {
                sink.write_u8(ATTR_EXT_REF)?;
                sink.write_u64(library.value())?;
                sink.write_u32(info.index)?;
                return sink.write_u8(CMD_OBJECT_END);
            }
        }

        if let Some(index) = self.pool.lookup(StaticDataKind::Object, object.unique_id()) {
            if own_index != Some(index) {
                sink.write_u8(ATTR_STATIC_REF)?;
                sink.write_u32(index)?;
                return sink.write_u8(CMD_OBJECT_END);
            }
        }

        let attr = if object.external_info().is_some() {
            // Flagged external but unlinked: inline body, patched later.
            ATTR_EXT_REF_PLACEHOLDER
        } else {
            0
        };
        sink.write_u8(attr)?;

        self.write_type(sink, object.ty())?;
        sink.write_u64(object.unique_id().value())?;

        sink.write_u32(object.property_count() as u32)?;
        for (name, data) in object.properties() {
            sink.write_string(name)?;
            self.write_data(sink, data)?;
        }

        sink.write_u32(object.child_count() as u32)?;
        for child in object.children() {
            self.write_object(sink, child)?;
        }

        sink.write_u8(CMD_OBJECT_END)
    }
}
