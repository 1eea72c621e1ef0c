//! Morton (Z-order) key encoding and key/id sort.

use crate::mesh::entities::{FloatScalar, Node};
use rayon::prelude::*;

/// Grid resolution of the key encoding: 2^10 or 2^20 cells per axis.
/// 10-bit keys fit in 32 bits, 20-bit keys in 64.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum KeyBits {
    B10,
    B20,
}

/// Spread the low 10 bits of `x` so consecutive bits land 3 apart.
#[inline]
fn spread10(mut x: u32) -> u32 {
    x = (x | (x << 16)) & 0x030000FF;
    x = (x | (x << 8)) & 0x0300F00F;
    x = (x | (x << 4)) & 0x030C30C3;
    x = (x | (x << 2)) & 0x09249249;
    x
}

/// Interleave three 10-bit coordinates into a 30-bit Morton code.
#[inline]
pub fn morton10(x: u32, y: u32, z: u32) -> u32 {
    spread10(x) | (spread10(y) << 1) | (spread10(z) << 2)
}

/// Interleave three 20-bit coordinates as two 10-bit codes,
/// `(hi << 30) | lo`.
#[inline]
pub fn morton20(x: u32, y: u32, z: u32) -> u64 {
    let lo = morton10(x & 1023, y & 1023, z & 1023);
    let hi = morton10(x >> 10, y >> 10, z >> 10);
    ((hi as u64) << 30) | lo as u64
}

/// A sortable (key, id) tuple; ties break on the id so ordering is total.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct IdKey<K> {
    pub key: K,
    pub id: usize,
}

impl<K: Ord> PartialOrd for IdKey<K> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<K: Ord> Ord for IdKey<K> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.key.cmp(&other.key).then(self.id.cmp(&other.id))
    }
}

#[inline]
fn grid_coord(c: f64, min: f64, max: f64, levels: u32) -> u32 {
    let extent = max - min;
    if extent > 0.0 {
        ((c - min) / extent * (levels - 1) as f64) as u32
    } else {
        0
    }
}

/// Compute the inverse permutation `iperm[old] = new` ordering the given
/// points along the curve.
pub fn sfc_iperm<F: FloatScalar>(
    points: &[Node<F>],
    min: &Node<F>,
    max: &Node<F>,
    bits: KeyBits,
) -> Vec<usize> {
    match bits {
        KeyBits::B10 => {
            let mut keys = encode_keys(points, min, max, 1 << 10, |x, y, z| morton10(x, y, z));
            keys.par_sort_unstable();
            iperm_of(&keys)
        }
        KeyBits::B20 => {
            let mut keys = encode_keys(points, min, max, 1 << 20, morton20);
            keys.par_sort_unstable();
            iperm_of(&keys)
        }
    }
}

fn encode_keys<F: FloatScalar, K: Ord + Copy + Send>(
    points: &[Node<F>],
    min: &Node<F>,
    max: &Node<F>,
    levels: u32,
    encode: impl Fn(u32, u32, u32) -> K + Sync,
) -> Vec<IdKey<K>> {
    let lo: Vec<f64> = min.xyz.iter().map(|v| v.to_f64()).collect();
    let hi: Vec<f64> = max.xyz.iter().map(|v| v.to_f64()).collect();
    points
        .par_iter()
        .enumerate()
        .map(|(i, p)| {
            let g: Vec<u32> = (0..3)
                .map(|j| grid_coord(p.xyz[j].to_f64(), lo[j], hi[j], levels))
                .collect();
            IdKey {
                key: encode(g[0], g[1], g[2]),
                id: i,
            }
        })
        .collect()
}

fn iperm_of<K>(keys: &[IdKey<K>]) -> Vec<usize> {
    let mut iperm = vec![0usize; keys.len()];
    for (new, k) in keys.iter().enumerate() {
        iperm[k.id] = new;
    }
    iperm
}
