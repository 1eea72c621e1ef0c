//! Adapter onto the on-disk hum container.
//!
//! The container is a hierarchical HDF5 store with fixed-layout records;
//! the adapter exposes typed slice and list transfers, scalar and
//! bounding-box attributes, patch enumeration, and chunked cursors with
//! optional write-back. Link labels live in [`links`] as a single immutable
//! table; the compound type descriptors in [`h5types`] keep file and memory
//! layouts matched byte-for-byte.

pub mod cursor;
pub mod h5types;
pub mod hum;
pub mod links;
