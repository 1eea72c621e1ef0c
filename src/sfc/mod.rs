//! Space-filling-curve locality reordering.
//!
//! Morton keys are computed from normalised coordinates, sorted, and the
//! resulting permutation is applied in place to the entity arrays before
//! every referring connectivity array is renumbered through the inverse
//! permutation and written back to the store.

pub mod morton;
pub mod permute;
pub mod reorder;

pub use morton::{morton10, morton20, IdKey, KeyBits};
pub use permute::permute_in_place;
pub use reorder::{reorder_cells, reorder_nodes};
