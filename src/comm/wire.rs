//! Byte-level casting helpers for fixed-layout message payloads.
//!
//! Every element moved through a plan is a `#[repr(C)]`, `bytemuck::Pod`
//! record; the store and the in-memory layout agree bit-for-bit, padding
//! included, so transfers are plain byte copies of typed slices.

use bytemuck::Pod;

pub fn cast_slice<T: Pod>(v: &[T]) -> &[u8] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_mut<T: Pod>(v: &mut [T]) -> &mut [u8] {
    bytemuck::cast_slice_mut(v)
}

pub fn cast_slice_from<T: Pod>(v: &[u8]) -> &[T] {
    bytemuck::cast_slice(v)
}

pub fn cast_slice_from_mut<T: Pod>(v: &mut [u8]) -> &mut [T] {
    bytemuck::cast_slice_mut(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_u64() {
        let v = vec![1u64, u64::MAX, 42];
        let bytes: Vec<u8> = cast_slice(&v).to_vec();
        assert_eq!(cast_slice_from::<u64>(&bytes), &v[..]);
    }
}
