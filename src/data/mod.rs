//! Tagged value containers.
//!
//! [`FbomData`] pairs a type descriptor with its payload: flat bytes
//! for PODs, or a boxed object/array for container types. The typed
//! readers enforce exact type (and size) matches so a stream can never
//! be reinterpreted silently.

mod array;
mod object;

pub use array::FbomArray;
pub use object::{ExternalObjectInfo, FbomObject, FbomObjectLibrary, LibraryId};

use crate::ty::{self, FbomType};
use crate::util::{Bool, ContentHasher, Error, FbomPod, Result, UniqueId};
use std::fmt;
use std::sync::OnceLock;

/// Payload of a value container.
#[derive(Clone, PartialEq)]
pub enum Payload {
    /// Flat byte copy of a POD value; length equals the type's size
    /// when the type is bounded.
    Bytes(Vec<u8>),
    /// Nested object for object-typed values.
    Object(Box<FbomObject>),
    /// Nested array for sequence-typed values.
    Array(Box<FbomArray>),
}

/// A type-tagged value.
#[derive(Clone, PartialEq)]
pub struct FbomData {
    ty: FbomType,
    payload: Payload,
}

impl Default for FbomData {
    fn default() -> Self {
        Self::unset()
    }
}

/// Shared sentinel returned by [`FbomObject::get_property`] on a miss,
/// so chained property reads fail through the unset-type path instead
/// of panicking.
pub(crate) fn unset_data() -> &'static FbomData {
    static UNSET: OnceLock<FbomData> = OnceLock::new();
    UNSET.get_or_init(FbomData::unset)
}

impl FbomData {
    /// The unset value: zero bytes tagged with the unset type.
    pub fn unset() -> Self {
        Self {
            ty: ty::unset(),
            payload: Payload::Bytes(Vec::new()),
        }
    }

    /// Build a value from a descriptor and raw bytes.
    ///
    /// Fails when the descriptor is bounded and the byte count differs
    /// from its declared size.
    pub fn from_bytes(ty: FbomType, bytes: Vec<u8>) -> Result<Self> {
        if !ty.is_unbounded() && ty.size != bytes.len() as u64 {
            return Err(Error::SizeMismatch {
                expected: ty.size,
                actual: bytes.len() as u64,
            });
        }
        Ok(Self {
            ty,
            payload: Payload::Bytes(bytes),
        })
    }

    pub(crate) fn from_parts(ty: FbomType, payload: Payload) -> Self {
        Self { ty, payload }
    }

    fn from_pod<T: FbomPod>(value: &T) -> Self {
        Self {
            ty: ty::pod_type::<T>(),
            payload: Payload::Bytes(bytemuck::bytes_of(value).to_vec()),
        }
    }

    pub fn from_u8(v: u8) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_i8(v: i8) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_u16(v: u16) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_i16(v: i16) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_u32(v: u32) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_i32(v: i32) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_u64(v: u64) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_i64(v: i64) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_f32(v: f32) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_f64(v: f64) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_bool(v: bool) -> Self {
        Self::from_pod(&Bool::new(v))
    }

    pub fn from_vec2f(v: glam::Vec2) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_vec3f(v: glam::Vec3) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_vec4f(v: glam::Vec4) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_vec2i(v: glam::IVec2) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_vec3i(v: glam::IVec3) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_vec2u(v: glam::UVec2) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_vec3u(v: glam::UVec3) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_mat3f(v: glam::Mat3) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_mat4f(v: glam::Mat4) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_quatf(v: glam::Quat) -> Self {
        Self::from_pod(&v)
    }

    pub fn from_string(s: &str) -> Self {
        Self {
            ty: ty::string_type(s.len() as u64),
            payload: Payload::Bytes(s.as_bytes().to_vec()),
        }
    }

    pub fn from_byte_buffer(bytes: Vec<u8>) -> Self {
        Self {
            ty: ty::byte_buffer_type(bytes.len() as u64),
            payload: Payload::Bytes(bytes),
        }
    }

    /// Flat byte copy of an arbitrary POD struct. `bytemuck::Pod`
    /// rejects non-standard-layout types at compile time.
    pub fn from_struct<T: bytemuck::Pod>(name: &str, value: &T) -> Self {
        Self {
            ty: ty::struct_type::<T>(name),
            payload: Payload::Bytes(bytemuck::bytes_of(value).to_vec()),
        }
    }

    pub fn from_object(object: FbomObject) -> Self {
        Self {
            ty: object.ty().clone(),
            payload: Payload::Object(Box::new(object)),
        }
    }

    pub fn from_array(array: FbomArray) -> Self {
        Self {
            ty: array.sequence_type(),
            payload: Payload::Array(Box::new(array)),
        }
    }

    #[inline]
    pub fn ty(&self) -> &FbomType {
        &self.ty
    }

    /// Total payload size in bytes. Containers sum the stored payloads
    /// they hold, so an unbounded type never leaks its sentinel size.
    pub fn total_size(&self) -> u64 {
        match &self.payload {
            Payload::Bytes(b) => b.len() as u64,
            Payload::Object(o) => o.total_size(),
            Payload::Array(a) => a.total_size(),
        }
    }

    pub fn is_unset(&self) -> bool {
        self.ty.is(&ty::unset(), false, true)
    }

    /// Raw bytes for flat payloads; `None` for containers.
    pub fn bytes(&self) -> Option<&[u8]> {
        match &self.payload {
            Payload::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub(crate) fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Replace the flat byte payload, validating bounded sizes.
    pub fn set_bytes(&mut self, bytes: Vec<u8>) -> Result<()> {
        if !self.ty.is_unbounded() && self.ty.size != bytes.len() as u64 {
            return Err(Error::SizeMismatch {
                expected: self.ty.size,
                actual: bytes.len() as u64,
            });
        }
        self.payload = Payload::Bytes(bytes);
        Ok(())
    }

    fn read_pod<T: FbomPod>(&self) -> Result<T> {
        let expected = ty::pod_type::<T>();
        if !self.ty.is_exactly(&expected) {
            return Err(Error::type_mismatch(&expected, &self.ty));
        }
        let bytes = self
            .bytes()
            .ok_or_else(|| Error::type_mismatch(&expected, &self.ty))?;
        // Unaligned read: payload vectors carry no alignment guarantee.
        bytemuck::try_pod_read_unaligned::<T>(bytes).map_err(|_| Error::SizeMismatch {
            expected: T::SIZE as u64,
            actual: bytes.len() as u64,
        })
    }

    pub fn read_u8(&self) -> Result<u8> {
        self.read_pod()
    }

    pub fn read_i8(&self) -> Result<i8> {
        self.read_pod()
    }

    pub fn read_u16(&self) -> Result<u16> {
        self.read_pod()
    }

    pub fn read_i16(&self) -> Result<i16> {
        self.read_pod()
    }

    pub fn read_u32(&self) -> Result<u32> {
        self.read_pod()
    }

    pub fn read_i32(&self) -> Result<i32> {
        self.read_pod()
    }

    pub fn read_u64(&self) -> Result<u64> {
        self.read_pod()
    }

    pub fn read_i64(&self) -> Result<i64> {
        self.read_pod()
    }

    pub fn read_f32(&self) -> Result<f32> {
        self.read_pod()
    }

    pub fn read_f64(&self) -> Result<f64> {
        self.read_pod()
    }

    pub fn read_bool(&self) -> Result<bool> {
        self.read_pod::<Bool>().map(Bool::get)
    }

    pub fn read_vec2f(&self) -> Result<glam::Vec2> {
        self.read_pod()
    }

    pub fn read_vec3f(&self) -> Result<glam::Vec3> {
        self.read_pod()
    }

    pub fn read_vec4f(&self) -> Result<glam::Vec4> {
        self.read_pod()
    }

    pub fn read_vec2i(&self) -> Result<glam::IVec2> {
        self.read_pod()
    }

    pub fn read_vec3i(&self) -> Result<glam::IVec3> {
        self.read_pod()
    }

    pub fn read_vec2u(&self) -> Result<glam::UVec2> {
        self.read_pod()
    }

    pub fn read_vec3u(&self) -> Result<glam::UVec3> {
        self.read_pod()
    }

    pub fn read_mat3f(&self) -> Result<glam::Mat3> {
        self.read_pod()
    }

    pub fn read_mat4f(&self) -> Result<glam::Mat4> {
        self.read_pod()
    }

    pub fn read_quatf(&self) -> Result<glam::Quat> {
        self.read_pod()
    }

    pub fn read_string(&self) -> Result<String> {
        let expected = ty::string_type(self.ty.size);
        if !self.ty.is_exactly(&expected) {
            return Err(Error::type_mismatch("string", &self.ty));
        }
        let bytes = self
            .bytes()
            .ok_or_else(|| Error::type_mismatch("string", &self.ty))?;
        Ok(String::from_utf8(bytes.to_vec())?)
    }

    pub fn read_byte_buffer(&self) -> Result<Vec<u8>> {
        let expected = ty::byte_buffer_type(self.ty.size);
        if !self.ty.is_exactly(&expected) {
            return Err(Error::type_mismatch("bytes", &self.ty));
        }
        Ok(self
            .bytes()
            .ok_or_else(|| Error::type_mismatch("bytes", &self.ty))?
            .to_vec())
    }

    pub fn read_struct<T: bytemuck::Pod>(&self, name: &str) -> Result<T> {
        let expected = ty::struct_type::<T>(name);
        if !self.ty.is_exactly(&expected) {
            return Err(Error::type_mismatch(&expected, &self.ty));
        }
        let bytes = self
            .bytes()
            .ok_or_else(|| Error::type_mismatch(&expected, &self.ty))?;
        bytemuck::try_pod_read_unaligned::<T>(bytes).map_err(|_| Error::SizeMismatch {
            expected: std::mem::size_of::<T>() as u64,
            actual: bytes.len() as u64,
        })
    }

    pub fn as_object(&self) -> Result<&FbomObject> {
        match &self.payload {
            Payload::Object(o) => Ok(o),
            _ => Err(Error::type_mismatch("object", &self.ty)),
        }
    }

    pub fn as_array(&self) -> Result<&FbomArray> {
        match &self.payload {
            Payload::Array(a) => Ok(a),
            _ => Err(Error::type_mismatch("seq", &self.ty)),
        }
    }

    /// Fold the value (type and payload) into a content hash.
    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        self.ty.hash_into(hasher);
        match &self.payload {
            Payload::Bytes(b) => {
                hasher.write_u8(0);
                hasher.write_bytes(b);
            }
            Payload::Object(o) => {
                hasher.write_u8(1);
                hasher.write_id(o.unique_id());
            }
            Payload::Array(a) => {
                hasher.write_u8(2);
                a.hash_into(hasher);
            }
        }
    }

    /// Content hash of the value, used as its static-data key.
    pub fn unique_id(&self) -> UniqueId {
        let mut hasher = ContentHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Debug for FbomData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.payload {
            Payload::Bytes(b) => write!(f, "FbomData({}, {} bytes)", self.ty, b.len()),
            Payload::Object(o) => write!(f, "FbomData({}, object {})", self.ty, o.unique_id()),
            Payload::Array(a) => write!(f, "FbomData({}, {} elements)", self.ty, a.len()),
        }
    }
}

impl fmt::Display for FbomData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
