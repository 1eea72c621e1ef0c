//! Distributed directories: round-robin global-index maps, unstructured
//! communication plans, and the typed distributed array built on them.

pub mod directory;
pub mod plan;
pub mod round_robin;

use bytemuck::Pod;

/// Fixed-width unsigned index type used for global and local entity ids.
///
/// The container records its index width in the `IntegerT` attribute; tools
/// branch once on 32- vs 64-bit and everything downstream stays generic.
pub trait IndexInt: Pod + Copy + Ord + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// Width in bytes, as stored in the `IntegerT` attribute.
    const WIDTH: usize;

    fn from_usize(v: usize) -> Self;
    fn to_usize(self) -> usize;
    fn zero() -> Self;
}

impl IndexInt for u32 {
    const WIDTH: usize = 4;

    #[inline]
    fn from_usize(v: usize) -> Self {
        v as u32
    }

    #[inline]
    fn to_usize(self) -> usize {
        self as usize
    }

    #[inline]
    fn zero() -> Self {
        0
    }
}

impl IndexInt for u64 {
    const WIDTH: usize = 8;

    #[inline]
    fn from_usize(v: usize) -> Self {
        v as u64
    }

    #[inline]
    fn to_usize(self) -> usize {
        self as usize
    }

    #[inline]
    fn zero() -> Self {
        0
    }
}
