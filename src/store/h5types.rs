//! HDF5 type descriptors for the fixed-layout container records.
//!
//! The memory-side descriptors must match the `#[repr(C)]` structs
//! byte-for-byte (offsets included) so hyperslab transfers operate on typed
//! elements rather than raw bytes. Field names are the container's link
//! labels, independent of the Rust field names.

use crate::dd::IndexInt;
use crate::mesh::entities::{Cell, Face, FaceLr, FloatScalar, Node, PatchRec};
use crate::store::links::{
    FIELD_BC_TYPE, FIELD_BITS, FIELD_ENTITY, FIELD_FACE_COUNT, FIELD_LEFT, FIELD_PROC_ID,
    FIELD_RIGHT, FIELD_START_FACE,
};
use hdf5::types::{CompoundField, CompoundType, TypeDescriptor};
use hdf5::H5Type;
use std::mem::{offset_of, size_of};

/// Index types that can appear inside container records.
pub trait StoreIndex: IndexInt + H5Type {}
impl<I: IndexInt + H5Type> StoreIndex for I {}

/// Float types that can appear inside container records.
pub trait StoreFloat: FloatScalar + H5Type {}
impl<F: FloatScalar + H5Type> StoreFloat for F {}

// A node is stored as one fixed three-array per element, not a compound.
unsafe impl<F: FloatScalar + H5Type> H5Type for Node<F> {
    fn type_descriptor() -> TypeDescriptor {
        <[F; 3] as H5Type>::type_descriptor()
    }
}

unsafe impl<I: IndexInt + H5Type> H5Type for Face<I> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Compound(CompoundType {
            fields: vec![
                CompoundField::typed::<I>(FIELD_BITS, offset_of!(Face<I>, bits), 0),
                CompoundField::typed::<[I; 4]>(FIELD_ENTITY, offset_of!(Face<I>, nodes), 1),
            ],
            size: size_of::<Face<I>>(),
        })
    }
}

unsafe impl<I: IndexInt + H5Type> H5Type for FaceLr<I> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Compound(CompoundType {
            fields: vec![
                CompoundField::typed::<I>(FIELD_LEFT, offset_of!(FaceLr<I>, left), 0),
                CompoundField::typed::<I>(FIELD_RIGHT, offset_of!(FaceLr<I>, right), 1),
            ],
            size: size_of::<FaceLr<I>>(),
        })
    }
}

unsafe impl<I: IndexInt + H5Type> H5Type for Cell<I> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Compound(CompoundType {
            fields: vec![
                CompoundField::typed::<I>(FIELD_BITS, offset_of!(Cell<I>, bits), 0),
                CompoundField::typed::<[I; 6]>(FIELD_ENTITY, offset_of!(Cell<I>, faces), 1),
            ],
            size: size_of::<Cell<I>>(),
        })
    }
}

unsafe impl<I: IndexInt + H5Type> H5Type for PatchRec<I> {
    fn type_descriptor() -> TypeDescriptor {
        TypeDescriptor::Compound(CompoundType {
            fields: vec![
                CompoundField::typed::<I>(FIELD_BC_TYPE, offset_of!(PatchRec<I>, bc_type), 0),
                CompoundField::typed::<I>(FIELD_START_FACE, offset_of!(PatchRec<I>, start_face), 1),
                CompoundField::typed::<I>(FIELD_FACE_COUNT, offset_of!(PatchRec<I>, face_count), 2),
                CompoundField::typed::<I>(FIELD_PROC_ID, offset_of!(PatchRec<I>, attached_rank), 3),
            ],
            size: size_of::<PatchRec<I>>(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn face_descriptor_spans_the_record() {
        match Face::<u32>::type_descriptor() {
            TypeDescriptor::Compound(c) => {
                assert_eq!(c.size, 20);
                assert_eq!(c.fields.len(), 2);
                assert_eq!(c.fields[0].name, FIELD_BITS);
                assert_eq!(c.fields[1].offset, 4);
            }
            other => panic!("expected compound, got {other:?}"),
        }
    }

    #[test]
    fn node_descriptor_is_a_three_array() {
        match Node::<f64>::type_descriptor() {
            TypeDescriptor::FixedArray(inner, 3) => {
                assert_eq!(*inner, f64::type_descriptor());
            }
            other => panic!("expected fixed array, got {other:?}"),
        }
    }
}
