//! Ordered sequences of value containers.

use super::FbomData;
use crate::ty::{self, FbomType};
use crate::util::{ContentHasher, Error, Result, UniqueId};
use std::fmt;

/// An ordered sequence of values, all of one declared element type.
#[derive(Clone, PartialEq)]
pub struct FbomArray {
    elem_ty: FbomType,
    elems: Vec<FbomData>,
}

impl FbomArray {
    /// Create an empty array with a declared element type.
    pub fn new(elem_ty: FbomType) -> Self {
        Self {
            elem_ty,
            elems: Vec::new(),
        }
    }

    /// Create an array from existing elements, validating each against
    /// the declared element type.
    pub fn from_elements(elem_ty: FbomType, elems: Vec<FbomData>) -> Result<Self> {
        let mut array = Self::new(elem_ty);
        for elem in elems {
            array.push(elem)?;
        }
        Ok(array)
    }

    /// Append an element. Fails unless the element's type matches the
    /// declared element type (sizes relaxed for unbounded elements).
    pub fn push(&mut self, elem: FbomData) -> Result<()> {
        if !elem.ty().is(&self.elem_ty, true, false) {
            return Err(Error::type_mismatch(&self.elem_ty, elem.ty()));
        }
        self.elems.push(elem);
        Ok(())
    }

    #[inline]
    pub fn elem_ty(&self) -> &FbomType {
        &self.elem_ty
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&FbomData> {
        self.elems.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FbomData> {
        self.elems.iter()
    }

    /// Summed payload footprint of all elements.
    pub fn total_size(&self) -> u64 {
        self.elems.iter().map(FbomData::total_size).sum()
    }

    /// The "seq" descriptor for this array (element type x count).
    pub fn sequence_type(&self) -> FbomType {
        ty::sequence_type(&self.elem_ty, self.elems.len() as u64)
    }

    pub fn hash_into(&self, hasher: &mut ContentHasher) {
        self.elem_ty.hash_into(hasher);
        hasher.write_u64(self.elems.len() as u64);
        for elem in &self.elems {
            elem.hash_into(hasher);
        }
    }

    /// Content hash of the array, used as its static-data key.
    pub fn unique_id(&self) -> UniqueId {
        let mut hasher = ContentHasher::new();
        self.hash_into(&mut hasher);
        hasher.finish()
    }
}

impl fmt::Debug for FbomArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FbomArray({} x {})", self.elem_ty, self.elems.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_get() {
        let mut array = FbomArray::new(ty::f32_type());
        array.push(FbomData::from_f32(1.0)).unwrap();
        array.push(FbomData::from_f32(2.0)).unwrap();
        assert_eq!(array.len(), 2);
        assert_eq!(array.get(1).unwrap().read_f32().unwrap(), 2.0);
        assert!(array.get(2).is_none());
    }

    #[test]
    fn test_push_rejects_wrong_element_type() {
        let mut array = FbomArray::new(ty::f32_type());
        let err = array.push(FbomData::from_i32(1)).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { .. }));
        assert!(array.is_empty());
    }

    #[test]
    fn test_sequence_type_counts_elements() {
        let array = FbomArray::from_elements(
            ty::u32_type(),
            vec![FbomData::from_u32(1), FbomData::from_u32(2), FbomData::from_u32(3)],
        )
        .unwrap();
        let seq = array.sequence_type();
        assert_eq!(seq.size, 12);
        assert_eq!(seq.name, "seq");
    }

    #[test]
    fn test_unique_id_order_sensitive() {
        let a = FbomArray::from_elements(
            ty::u32_type(),
            vec![FbomData::from_u32(1), FbomData::from_u32(2)],
        )
        .unwrap();
        let b = FbomArray::from_elements(
            ty::u32_type(),
            vec![FbomData::from_u32(2), FbomData::from_u32(1)],
        )
        .unwrap();
        assert_ne!(a.unique_id(), b.unique_id());
    }
}
