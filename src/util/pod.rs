//! Plain-old-data plumbing for FBOM value storage.
//!
//! Every fixed-size value that crosses the wire does so as a flat byte
//! copy of a standard-layout, trivially-copyable type. The `bytemuck`
//! bounds make that a compile-time requirement rather than a runtime
//! check.

use bytemuck::{Pod, Zeroable};
use std::fmt;

/// Trait for native types that can be stored verbatim in an FBOM value.
///
/// `WIRE_NAME` is the short type name stamped into the matching
/// [`FbomType`](crate::ty::FbomType) descriptor.
pub trait FbomPod: Pod + Zeroable + Copy {
    /// Wire-level type name for this POD type.
    const WIRE_NAME: &'static str;

    /// Size of this type in bytes.
    const SIZE: usize = std::mem::size_of::<Self>();
}

impl FbomPod for u8 {
    const WIRE_NAME: &'static str = "u8";
}

impl FbomPod for i8 {
    const WIRE_NAME: &'static str = "i8";
}

impl FbomPod for u16 {
    const WIRE_NAME: &'static str = "u16";
}

impl FbomPod for i16 {
    const WIRE_NAME: &'static str = "i16";
}

impl FbomPod for u32 {
    const WIRE_NAME: &'static str = "u32";
}

impl FbomPod for i32 {
    const WIRE_NAME: &'static str = "i32";
}

impl FbomPod for u64 {
    const WIRE_NAME: &'static str = "u64";
}

impl FbomPod for i64 {
    const WIRE_NAME: &'static str = "i64";
}

impl FbomPod for f32 {
    const WIRE_NAME: &'static str = "f32";
}

impl FbomPod for f64 {
    const WIRE_NAME: &'static str = "f64";
}

impl FbomPod for glam::Vec2 {
    const WIRE_NAME: &'static str = "vec2f";
}

impl FbomPod for glam::Vec3 {
    const WIRE_NAME: &'static str = "vec3f";
}

impl FbomPod for glam::Vec4 {
    const WIRE_NAME: &'static str = "vec4f";
}

impl FbomPod for glam::IVec2 {
    const WIRE_NAME: &'static str = "vec2i";
}

impl FbomPod for glam::IVec3 {
    const WIRE_NAME: &'static str = "vec3i";
}

impl FbomPod for glam::UVec2 {
    const WIRE_NAME: &'static str = "vec2u";
}

impl FbomPod for glam::UVec3 {
    const WIRE_NAME: &'static str = "vec3u";
}

impl FbomPod for glam::Mat3 {
    const WIRE_NAME: &'static str = "mat3f";
}

impl FbomPod for glam::Mat4 {
    const WIRE_NAME: &'static str = "mat4f";
}

impl FbomPod for glam::Quat {
    const WIRE_NAME: &'static str = "quatf";
}

/// Boolean type with guaranteed 1-byte storage on the wire.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Bool(u8);

impl Bool {
    pub const TRUE: Self = Self(1);
    pub const FALSE: Self = Self(0);

    #[inline]
    pub const fn new(v: bool) -> Self {
        Self(v as u8)
    }

    #[inline]
    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for Bool {
    #[inline]
    fn from(v: bool) -> Self {
        Self::new(v)
    }
}

impl From<Bool> for bool {
    #[inline]
    fn from(v: Bool) -> Self {
        v.get()
    }
}

impl fmt::Debug for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl fmt::Display for Bool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.get())
    }
}

impl FbomPod for Bool {
    const WIRE_NAME: &'static str = "bool";
}
