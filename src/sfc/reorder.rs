//! Store-rewriting reorder passes.
//!
//! The node pass orders nodes along the curve, permutes the coordinate
//! array in place, and stream-renumbers the face-node connectivity through
//! the inverse permutation. The cell pass orders cells by their centroid
//! (the average of touching face centroids) and stream-renumbers the face
//! left/right arrays; cells themselves have no stored array. Boundary
//! right-cell sentinels are never renumbered.

use crate::dd::IndexInt;
use crate::error::DimmError;
use crate::mesh::entities::{Face, Node};
use crate::sfc::morton::{sfc_iperm, KeyBits};
use crate::sfc::permute::permute_in_place;
use crate::store::cursor::{face_cursor, FaceLrCursor};
use crate::store::h5types::StoreIndex;
use crate::store::hum::HumStore;

/// Reorder the node array along the curve and renumber face-node ids.
///
/// Returns the inverse permutation (`iperm[old] = new`) that was applied.
pub fn reorder_nodes<I: StoreIndex>(
    store: &HumStore,
    bits: KeyBits,
    chunk: usize,
) -> Result<Vec<usize>, DimmError> {
    let (min, max) = store.read_aabb::<f64>()?;
    let mut nodes = vec![Node::new(0.0f64, 0.0, 0.0); store.n_node()];
    store.read_nodes(&mut nodes, 0)?;

    let iperm = sfc_iperm(&nodes, &min, &max, bits);
    let mut perm = vec![0usize; iperm.len()];
    for (old, &new) in iperm.iter().enumerate() {
        perm[new] = old;
    }
    permute_in_place(&mut nodes, &mut perm);
    store.write_nodes(&nodes, 0)?;
    drop(nodes);

    let mut fc = face_cursor::<I>(store, chunk)?;
    fc.enable_write();
    while !fc.eof() {
        let f = fc.current_mut();
        for j in 0..f.valence() {
            f.nodes[j] = I::from_usize(iperm[f.nodes[j].to_usize()]);
        }
        fc.advance()?;
    }
    fc.flush()?;
    Ok(iperm)
}

/// Reorder the cell numbering along the curve and renumber the face
/// left/right arrays.
///
/// Cell centroids are accumulated by streaming every face (internal and
/// per patch) into its touching cells, then divided by the per-cell face
/// count. Returns the inverse permutation that was applied.
pub fn reorder_cells<I: StoreIndex>(
    store: &HumStore,
    bits: KeyBits,
    chunk: usize,
) -> Result<Vec<usize>, DimmError> {
    let (min, max) = store.read_aabb::<f64>()?;
    let mut nodes = vec![Node::new(0.0f64, 0.0, 0.0); store.n_node()];
    store.read_nodes(&mut nodes, 0)?;

    let n_cell = store.n_cell();
    let mut centroid = vec![Node::new(0.0f64, 0.0, 0.0); n_cell];
    let mut face_count = vec![0u32; n_cell];
    {
        let mut fc = face_cursor::<I>(store, chunk)?;
        let mut lr = FaceLrCursor::<I>::new(store, chunk)?;
        while !lr.eof() {
            let c = face_centroid(fc.current(), &nodes);
            let pair = *lr.current();
            let (left, right) = (pair.left.to_usize(), pair.right.to_usize());
            centroid[left].accumulate(&c);
            centroid[right].accumulate(&c);
            face_count[left] += 1;
            face_count[right] += 1;
            lr.advance()?;
            fc.advance()?;
        }
        while !lr.eof_patch() {
            while !lr.eof_patch_face() {
                let c = face_centroid(fc.current(), &nodes);
                let left = lr.patch_cell().to_usize();
                centroid[left].accumulate(&c);
                face_count[left] += 1;
                lr.advance_patch_face()?;
                fc.advance()?;
            }
            lr.advance_patch()?;
        }
    }
    drop(nodes);
    for (c, &n) in centroid.iter_mut().zip(&face_count) {
        if n > 0 {
            c.scale(1.0 / n as f64);
        }
    }
    drop(face_count);

    let iperm = sfc_iperm(&centroid, &min, &max, bits);
    drop(centroid);

    let mut lr = FaceLrCursor::<I>::new(store, chunk)?;
    lr.enable_write();
    while !lr.eof() {
        let cur = lr.current_mut();
        cur.left = I::from_usize(iperm[cur.left.to_usize()]);
        cur.right = I::from_usize(iperm[cur.right.to_usize()]);
        lr.advance()?;
    }
    while !lr.eof_patch() {
        while !lr.eof_patch_face() {
            let cell = lr.patch_cell_mut();
            *cell = I::from_usize(iperm[(*cell).to_usize()]);
            lr.advance_patch_face()?;
        }
        lr.advance_patch()?;
    }
    lr.flush()?;
    Ok(iperm)
}

fn face_centroid<I: IndexInt>(f: &Face<I>, nodes: &[Node<f64>]) -> Node<f64> {
    let mut c = Node::new(0.0f64, 0.0, 0.0);
    for &n in f.node_ids() {
        c.accumulate(&nodes[n.to_usize()]);
    }
    debug_assert!(f.valence() > 0, "face without nodes");
    c.scale(1.0 / f.valence() as f64);
    c
}
