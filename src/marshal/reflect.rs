//! Reflection-driven generic marshaling.
//!
//! The bridge between a class's serializable-member list and the binary
//! format. Each member is a pair of capability closures built once at
//! registration through [`ClassBuilder`]; [`ClassMarshal`] is the one
//! marshal implementation that serializes any registered class by
//! iterating its members. Plain POD structs can instead register the
//! bitwise fast path (raw memory copy, `bytemuck::Pod`-guarded).

use super::{DeserializeContext, Marshal, MarshalRegistry};
use crate::data::{FbomData, FbomObject};
use crate::ty::{self, TypeKey};
use crate::util::{Error, Result};
use std::any::Any;
use std::marker::PhantomData;
use std::sync::Arc;

/// Conversion between a native member value and a tagged container.
///
/// Implemented for the base type catalogue; struct-typed members go
/// through [`ClassBuilder::member_with`] with explicit closures.
pub trait FbomValue: Sized + 'static {
    fn to_data(&self) -> FbomData;
    fn from_data(data: &FbomData) -> Result<Self>;
}

macro_rules! impl_fbom_value {
    ($t:ty, $from:ident, $read:ident) => {
        impl FbomValue for $t {
            fn to_data(&self) -> FbomData {
                FbomData::$from(*self)
            }

            fn from_data(data: &FbomData) -> Result<Self> {
                data.$read()
            }
        }
    };
}

impl_fbom_value!(u8, from_u8, read_u8);
impl_fbom_value!(i8, from_i8, read_i8);
impl_fbom_value!(u16, from_u16, read_u16);
impl_fbom_value!(i16, from_i16, read_i16);
impl_fbom_value!(u32, from_u32, read_u32);
impl_fbom_value!(i32, from_i32, read_i32);
impl_fbom_value!(u64, from_u64, read_u64);
impl_fbom_value!(i64, from_i64, read_i64);
impl_fbom_value!(f32, from_f32, read_f32);
impl_fbom_value!(f64, from_f64, read_f64);
impl_fbom_value!(bool, from_bool, read_bool);
impl_fbom_value!(glam::Vec2, from_vec2f, read_vec2f);
impl_fbom_value!(glam::Vec3, from_vec3f, read_vec3f);
impl_fbom_value!(glam::Vec4, from_vec4f, read_vec4f);
impl_fbom_value!(glam::IVec2, from_vec2i, read_vec2i);
impl_fbom_value!(glam::IVec3, from_vec3i, read_vec3i);
impl_fbom_value!(glam::UVec2, from_vec2u, read_vec2u);
impl_fbom_value!(glam::UVec3, from_vec3u, read_vec3u);
impl_fbom_value!(glam::Mat3, from_mat3f, read_mat3f);
impl_fbom_value!(glam::Mat4, from_mat4f, read_mat4f);
impl_fbom_value!(glam::Quat, from_quatf, read_quatf);

impl FbomValue for String {
    fn to_data(&self) -> FbomData {
        FbomData::from_string(self)
    }

    fn from_data(data: &FbomData) -> Result<Self> {
        data.read_string()
    }
}

type SerializeMemberFn = Box<dyn Fn(&dyn Any) -> Result<FbomData> + Send + Sync>;
type DeserializeMemberFn =
    Box<dyn Fn(&DeserializeContext<'_>, &mut dyn Any, &FbomData) -> Result<()> + Send + Sync>;

/// One serializable member: a name plus get/set capability closures.
struct ClassMember {
    name: String,
    serialize: SerializeMemberFn,
    deserialize: DeserializeMemberFn,
}

/// Generic marshal for a class registered through [`ClassBuilder`].
pub struct ClassMarshal {
    name: String,
    make_default: Box<dyn Fn() -> Box<dyn Any> + Send + Sync>,
    members: Vec<ClassMember>,
}

impl Marshal for ClassMarshal {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, value: &dyn Any) -> Result<FbomObject> {
        let mut object = FbomObject::with_type(ty::object_type_keyed(
            self.name.clone(),
            TypeKey::from_name(&self.name),
        ));
        for member in &self.members {
            let data = (member.serialize)(value)?;
            object.set_property(member.name.clone(), data);
        }
        Ok(object)
    }

    fn deserialize(
        &self,
        ctx: &DeserializeContext<'_>,
        object: &FbomObject,
    ) -> Result<Box<dyn Any>> {
        let mut value = (self.make_default)();
        for member in &self.members {
            // Absent properties keep the default member value.
            if object.has_property(&member.name) {
                (member.deserialize)(ctx, value.as_mut(), object.get_property(&member.name))?;
            }
        }
        Ok(value)
    }
}

/// Builder assembling a class's serializable-member list.
pub struct ClassBuilder<T> {
    name: String,
    members: Vec<ClassMember>,
    _marker: PhantomData<fn(T)>,
}

impl<T: Any + Default> ClassBuilder<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Add a member of a catalogue-typed value.
    pub fn member<V: FbomValue>(
        self,
        name: impl Into<String>,
        get: impl Fn(&T) -> V + Send + Sync + 'static,
        set: impl Fn(&mut T, V) + Send + Sync + 'static,
    ) -> Self {
        self.member_with(
            name,
            move |target: &T| Ok(get(target).to_data()),
            move |_ctx, target: &mut T, data| {
                set(target, V::from_data(data)?);
                Ok(())
            },
        )
    }

    /// Add a member with explicit serialize/deserialize closures, for
    /// struct-typed or nested-object members.
    pub fn member_with(
        mut self,
        name: impl Into<String>,
        ser: impl Fn(&T) -> Result<FbomData> + Send + Sync + 'static,
        de: impl Fn(&DeserializeContext<'_>, &mut T, &FbomData) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        let type_name = self.name.clone();
        let type_name2 = self.name.clone();
        self.members.push(ClassMember {
            name: name.into(),
            serialize: Box::new(move |value: &dyn Any| {
                let target = value
                    .downcast_ref::<T>()
                    .ok_or_else(|| Error::Downcast(type_name.clone()))?;
                ser(target)
            }),
            deserialize: Box::new(move |ctx, value: &mut dyn Any, data| {
                let target = value
                    .downcast_mut::<T>()
                    .ok_or_else(|| Error::Downcast(type_name2.clone()))?;
                de(ctx, target, data)
            }),
        });
        self
    }

    /// Finish the member list into a marshal without registering it.
    pub fn build(self) -> ClassMarshal {
        ClassMarshal {
            name: self.name,
            make_default: Box::new(|| Box::new(T::default())),
            members: self.members,
        }
    }

    /// Register in a specific registry; returns the wire key.
    pub fn register_in(self, registry: &MarshalRegistry) -> TypeKey {
        registry.register::<T>(Arc::new(self.build()))
    }

    /// Register in the process-wide registry; returns the wire key.
    pub fn register(self) -> TypeKey {
        self.register_in(MarshalRegistry::global())
    }
}

struct BitwiseMarshal<T> {
    name: String,
    _marker: PhantomData<fn(T)>,
}

impl<T: bytemuck::Pod + Send + Sync + 'static> Marshal for BitwiseMarshal<T> {
    fn type_name(&self) -> &str {
        &self.name
    }

    fn serialize(&self, value: &dyn Any) -> Result<FbomObject> {
        let target = value
            .downcast_ref::<T>()
            .ok_or_else(|| Error::Downcast(self.name.clone()))?;
        let mut object = FbomObject::with_type(ty::object_type_keyed(
            self.name.clone(),
            TypeKey::from_name(&self.name),
        ));
        object.set_property("data", FbomData::from_struct(&self.name, target));
        Ok(object)
    }

    fn deserialize(
        &self,
        _ctx: &DeserializeContext<'_>,
        object: &FbomObject,
    ) -> Result<Box<dyn Any>> {
        let value: T = object.get_property("data").read_struct(&self.name)?;
        Ok(Box::new(value))
    }
}

/// Register the bitwise fast path for a plain POD struct: the whole
/// value is stored as one raw byte copy instead of member-by-member.
pub fn register_bitwise<T: bytemuck::Pod + Send + Sync + 'static>(
    registry: &MarshalRegistry,
    name: impl Into<String>,
) -> TypeKey {
    registry.register::<T>(Arc::new(BitwiseMarshal::<T> {
        name: name.into(),
        _marker: PhantomData,
    }))
}
