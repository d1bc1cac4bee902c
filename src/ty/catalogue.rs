//! Base type catalogue: well-known descriptors stamped by the typed
//! value factories and referenced throughout the wire layer.

use super::{FbomType, TypeKey, FLAG_CONTAINER, FLAG_DEFAULT, FLAG_PLACEHOLDER, SIZE_UNBOUNDED};
use crate::util::FbomPod;

fn base(name: &'static str, size: u64) -> FbomType {
    FbomType::with_flags(name, size, TypeKey::from_name(name), FLAG_DEFAULT)
}

/// Descriptor for a catalogue POD type `T`.
pub fn pod_type<T: FbomPod>() -> FbomType {
    base(T::WIRE_NAME, T::SIZE as u64)
}

/// The unset type carried by default-constructed values. Zero-sized;
/// every typed read against it fails.
pub fn unset() -> FbomType {
    FbomType::with_flags("UNSET", 0, TypeKey::VOID, FLAG_DEFAULT)
}

/// Placeholder for a type that could not be resolved when the stream
/// was produced.
pub fn placeholder() -> FbomType {
    FbomType::with_flags(
        "PLACEHOLDER",
        0,
        TypeKey::VOID,
        FLAG_DEFAULT | FLAG_PLACEHOLDER,
    )
}

pub fn u8_type() -> FbomType {
    base("u8", 1)
}

pub fn i8_type() -> FbomType {
    base("i8", 1)
}

pub fn u16_type() -> FbomType {
    base("u16", 2)
}

pub fn i16_type() -> FbomType {
    base("i16", 2)
}

pub fn u32_type() -> FbomType {
    base("u32", 4)
}

pub fn i32_type() -> FbomType {
    base("i32", 4)
}

pub fn u64_type() -> FbomType {
    base("u64", 8)
}

pub fn i64_type() -> FbomType {
    base("i64", 8)
}

pub fn f32_type() -> FbomType {
    base("f32", 4)
}

pub fn f64_type() -> FbomType {
    base("f64", 8)
}

pub fn bool_type() -> FbomType {
    base("bool", 1)
}

pub fn vec2f_type() -> FbomType {
    base("vec2f", 8)
}

pub fn vec3f_type() -> FbomType {
    base("vec3f", 12)
}

pub fn vec4f_type() -> FbomType {
    base("vec4f", 16)
}

pub fn vec2i_type() -> FbomType {
    base("vec2i", 8)
}

pub fn vec3i_type() -> FbomType {
    base("vec3i", 12)
}

pub fn vec2u_type() -> FbomType {
    base("vec2u", 8)
}

pub fn vec3u_type() -> FbomType {
    base("vec3u", 12)
}

pub fn mat3f_type() -> FbomType {
    base("mat3f", 36)
}

pub fn mat4f_type() -> FbomType {
    base("mat4f", 64)
}

pub fn quatf_type() -> FbomType {
    base("quatf", 16)
}

/// UTF-8 string of a known byte length.
pub fn string_type(len: u64) -> FbomType {
    FbomType::with_flags("string", len, TypeKey::from_name("string"), FLAG_DEFAULT)
}

/// Opaque byte buffer of a known length.
pub fn byte_buffer_type(len: u64) -> FbomType {
    FbomType::with_flags("bytes", len, TypeKey::from_name("bytes"), FLAG_DEFAULT)
}

/// Flat struct type for a POD `T`. The `bytemuck::Pod` bound rejects
/// non-standard-layout types at compile time.
pub fn struct_type<T: bytemuck::Pod>(name: &str) -> FbomType {
    FbomType::with_flags(
        name,
        std::mem::size_of::<T>() as u64,
        TypeKey::from_name(name),
        FLAG_DEFAULT,
    )
}

/// Sequence ("seq") type wrapping `count` elements of `elem`.
pub fn sequence_type(elem: &FbomType, count: u64) -> FbomType {
    let size = if elem.is_unbounded() {
        SIZE_UNBOUNDED
    } else {
        elem.size.saturating_mul(count)
    };
    let mut ty = FbomType::with_flags("seq", size, TypeKey::VOID, FLAG_DEFAULT | FLAG_CONTAINER);
    ty.extends = Some(Box::new(elem.clone()));
    ty
}

/// The root object type that all object-typed descriptors extend.
pub fn object() -> FbomType {
    FbomType::with_flags(
        "object",
        SIZE_UNBOUNDED,
        TypeKey::VOID,
        FLAG_DEFAULT | FLAG_CONTAINER,
    )
}

/// A named object type extending the root `object` type.
pub fn object_type(name: impl Into<String>) -> FbomType {
    let mut ty = FbomType::with_flags(name, SIZE_UNBOUNDED, TypeKey::VOID, FLAG_CONTAINER);
    ty.extends = Some(Box::new(object()));
    ty
}

/// A named object type carrying a native key for marshal dispatch.
pub fn object_type_keyed(name: impl Into<String>, native: TypeKey) -> FbomType {
    object_type(name).with_native(native)
}
