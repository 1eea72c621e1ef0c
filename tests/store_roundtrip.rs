//! Container adapter round-trips on a scratch file.

use dimm::mesh::entities::{Face, FaceLr, Node, PatchInfo};
use dimm::store::cursor::face_cursor;
use dimm::store::hum::{HumStore, StoreMode};
use dimm::store::links::{FACE_ENTITY, FACE_GROUP};
use tempfile::TempDir;

fn scratch() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("mesh.hum").to_string_lossy().into_owned();
    (dir, path)
}

fn face(bits: u32, nodes: [u32; 4]) -> Face<u32> {
    Face { bits, nodes }
}

fn build_store(path: &str) -> Vec<Node<f64>> {
    let mut store = HumStore::create(path).unwrap();
    let nodes: Vec<Node<f64>> = (0..5)
        .map(|i| Node::new(i as f64, i as f64 * 0.5, -(i as f64)))
        .collect();
    store.create_nodes::<f64>(5).unwrap();
    store.write_nodes(&nodes, 0).unwrap();
    store.write_mesh_attrs::<u32>(2, 1, 14).unwrap();
    store.create_faces::<u32>(4).unwrap();
    let faces = [
        face(3, [0, 1, 2, 0]),
        face(4, [0, 1, 2, 3]),
        face(3, [2, 3, 4, 0]),
        face(3, [1, 2, 4, 0]),
    ];
    store.write_faces(&faces, 0).unwrap();
    let lrs = [
        FaceLr { left: 0u32, right: 1 },
        FaceLr { left: 0, right: 0 },
        FaceLr { left: 1, right: 0 },
        FaceLr { left: 1, right: 0 },
    ];
    store.write_face_lr(&lrs, 0).unwrap();
    // Patch table written out of layout order on purpose.
    store
        .write_patch::<u32>(PatchInfo {
            name: "patch_3".into(),
            bc_type: 1,
            start_face: 3,
            face_count: 1,
            attached_rank: 0,
        })
        .unwrap();
    store
        .write_patch::<u32>(PatchInfo {
            name: "patch_2".into(),
            bc_type: 1,
            start_face: 1,
            face_count: 2,
            attached_rank: 0,
        })
        .unwrap();
    store
        .write_aabb(Node::new(0.0f64, 0.0, -4.0), Node::new(4.0f64, 2.0, 0.0))
        .unwrap();
    store.close();
    nodes
}

#[test]
fn sizes_attrs_and_patches_survive_reopen() {
    let (_dir, path) = scratch();
    build_store(&path);
    let store = HumStore::open(&path, StoreMode::ReadOnly).unwrap();
    assert_eq!(store.n_node(), 5);
    assert_eq!(store.n_face(), 4);
    assert_eq!(store.n_cell(), 2);
    assert_eq!(store.n_internal_face(), 1);
    assert_eq!(store.n_face_adjncy(), 14);
    assert_eq!(store.int_width(), 4);
    assert!(store.check_index_width::<u32>().is_ok());
    assert!(store.check_index_width::<u64>().is_err());

    // Patches come back ordered by their face offsets.
    assert_eq!(store.n_patch(), 2);
    assert_eq!(store.patches()[0].name, "patch_2");
    assert_eq!(store.patches()[0].start_face, 1);
    assert_eq!(store.patches()[1].name, "patch_3");
    assert_eq!(store.max_patch_face(), 2);

    let (min, max) = store.read_aabb::<f64>().unwrap();
    assert_eq!(min.xyz, [0.0, 0.0, -4.0]);
    assert_eq!(max.xyz, [4.0, 2.0, 0.0]);
}

#[test]
fn slice_and_list_reads_preserve_order() {
    let (_dir, path) = scratch();
    let nodes = build_store(&path);
    let store = HumStore::open(&path, StoreMode::ReadOnly).unwrap();

    let mut two = [Node::new(0.0f64, 0.0, 0.0); 2];
    store.read_nodes(&mut two, 2).unwrap();
    assert_eq!(two[0], nodes[2]);
    assert_eq!(two[1], nodes[3]);

    // Arbitrary-order list read; runs are coalesced internally.
    let mut picked = [Node::new(0.0f64, 0.0, 0.0); 4];
    store
        .read_by_list("Nodes/XYZ", &[4, 0, 1, 2], &mut picked)
        .unwrap();
    assert_eq!(picked[0], nodes[4]);
    assert_eq!(picked[1], nodes[0]);
    assert_eq!(picked[3], nodes[2]);

    let mut lr = [FaceLr { left: 0u32, right: 0 }; 1];
    store.read_face_lr(&mut lr, 0).unwrap();
    assert_eq!(lr[0], FaceLr { left: 0, right: 1 });
}

#[test]
fn write_requires_read_write_mode() {
    let (_dir, path) = scratch();
    build_store(&path);
    let store = HumStore::open(&path, StoreMode::ReadOnly).unwrap();
    let err = store.write_nodes(&[Node::new(1.0f64, 1.0, 1.0)], 0);
    assert!(err.is_err());
}

#[test]
fn cursor_write_back_rolls_chunks() {
    let (_dir, path) = scratch();
    build_store(&path);
    {
        let store = HumStore::open(&path, StoreMode::ReadWrite).unwrap();
        // Chunk of 1 forces a flush at every step.
        let mut fc = face_cursor::<u32>(&store, 1).unwrap();
        fc.enable_write();
        while !fc.eof() {
            let f = fc.current_mut();
            for j in 0..f.valence() {
                f.nodes[j] += 10;
            }
            fc.advance().unwrap();
        }
        fc.flush().unwrap();
        store.close();
    }
    let store = HumStore::open(&path, StoreMode::ReadOnly).unwrap();
    let mut faces = [Face { bits: 0u32, nodes: [0; 4] }; 4];
    store
        .read_slice(&format!("{FACE_GROUP}/{FACE_ENTITY}"), &mut faces, 0, 1)
        .unwrap();
    assert_eq!(faces[0].nodes, [10, 11, 12, 0], "unused slot untouched");
    assert_eq!(faces[1].nodes, [10, 11, 12, 13]);
}
