//! Cobalt import, container contents, and distributed mesh construction
//! end to end on a two-tetrahedron mesh.

use dimm::comm::{Communicator, NoComm, RayonComm};
use dimm::import::cobalt;
use dimm::mesh::distributed::CellMesh;
use dimm::mesh::entities::{Face, FaceLr};
use dimm::store::hum::{HumStore, StoreMode};
use std::io::Write;
use tempfile::TempDir;

/// Two tets sharing face (2,3,4); tet 1 boundary on patch -1, tet 2 on -2.
const COBALT: &str = "\
3 1 2
5 7 2 4 4
0.0 0.0 0.0
1.0 0.0 0.0
0.0 1.0 0.0
0.0 0.0 1.0
1.0 1.0 1.0
3 1 2 3 1 -1
3 2 3 4 1 2
3 2 3 5 2 -2
3 1 2 4 1 -1
3 2 4 5 2 -2
3 1 3 4 1 -1
3 3 4 5 2 -2
";

fn imported() -> (TempDir, String) {
    let dir = tempfile::tempdir().expect("tempdir");
    let cobalt_path = dir.path().join("mesh.cob");
    std::fs::File::create(&cobalt_path)
        .and_then(|mut f| f.write_all(COBALT.as_bytes()))
        .expect("write cobalt input");
    let hum_path = dir.path().join("mesh.hum").to_string_lossy().into_owned();
    cobalt::convert::<f64, u32>(cobalt_path.to_str().unwrap(), &hum_path, 1 << 20).unwrap();
    (dir, hum_path)
}

#[test]
fn container_layout_matches_the_source() {
    let (_dir, path) = imported();
    let store = HumStore::open(&path, StoreMode::ReadOnly).unwrap();
    assert_eq!(store.n_node(), 5);
    assert_eq!(store.n_face(), 7);
    assert_eq!(store.n_cell(), 2);
    assert_eq!(store.n_internal_face(), 1);
    assert_eq!(store.n_face_adjncy(), 21);
    assert_eq!(store.int_width(), 4);

    // Patch labels come from the negated boundary ids, offset past the
    // internal range.
    assert_eq!(store.n_patch(), 2);
    let p2 = &store.patches()[0];
    assert_eq!((p2.name.as_str(), p2.start_face, p2.face_count), ("patch_2", 1, 3));
    let p3 = &store.patches()[1];
    assert_eq!((p3.name.as_str(), p3.start_face, p3.face_count), ("patch_3", 4, 3));

    // Internal face first; triangle ids reversed and 0-based.
    let mut faces = vec![Face { bits: 0u32, nodes: [0; 4] }; 7];
    store.read_faces(&mut faces, 0).unwrap();
    assert_eq!(faces[0].valence(), 3);
    assert_eq!(faces[0].nodes, [3, 2, 1, 0]);

    let mut lrs = vec![FaceLr { left: 0u32, right: 0 }; 7];
    store.read_face_lr(&mut lrs, 0).unwrap();
    assert_eq!(lrs[0], FaceLr { left: 0, right: 1 });
    for (i, lr) in lrs.iter().enumerate().skip(1) {
        assert_eq!(lr.right, 0, "boundary face {i} keeps the sentinel");
    }
    // Patch ranges carry the attached cells in file order.
    assert!(lrs[1..4].iter().all(|lr| lr.left == 0));
    assert!(lrs[4..7].iter().all(|lr| lr.left == 1));

    let (min, max) = store.read_aabb::<f64>().unwrap();
    assert!(min.xyz.iter().all(|&v| v < 0.0 && v > -1.0e-6));
    assert!(max.xyz.iter().all(|&v| v > 1.0 && v < 1.0 + 1.0e-6));
}

#[test]
fn single_rank_cell_mesh_builds_adjacency() {
    let (_dir, path) = imported();
    let comm = NoComm;
    let mesh = CellMesh::<f64, u32>::open(&path, &comm).unwrap();

    let cf = mesh.cell_face();
    assert_eq!(cf.len(), 2);
    assert_eq!(cf[0].face_ids(), &[0, 1, 2, 3]);
    assert_eq!(cf[1].face_ids(), &[0, 4, 5, 6]);
    // The shared face is seen from the left by cell 0 and from the right
    // by cell 1.
    assert_eq!(cf[0].sign(0), 1);
    assert_eq!(cf[1].sign(0), -1);

    // Neighbour slots pair with the face slots; boundary slots carry the
    // sentinel.
    let cc = mesh.cell_cell();
    assert_eq!(cc[0].face_ids()[0], 1, "cell 0 sees cell 1 over face 0");
    assert_eq!(cc[1].face_ids()[0], 0, "cell 1 sees cell 0 over face 0");
    assert!(cc[0].face_ids()[1..].iter().all(|&n| n == 0));
    assert!(cc[1].face_ids()[1..].iter().all(|&n| n == 0));
}

#[test]
fn two_rank_cell_mesh_exchanges_the_shared_face() {
    let (_dir, path) = imported();
    let handles: Vec<_> = (0..2usize)
        .map(|r| {
            let path = path.clone();
            std::thread::spawn(move || {
                let comm = RayonComm::new(r, 2);
                let mesh = CellMesh::<f64, u32>::open(&path, &comm).unwrap();
                let me = comm.rank();
                let local: Vec<Vec<u32>> = mesh
                    .cell_face()
                    .as_slice()
                    .iter()
                    .map(|c| c.face_ids().to_vec())
                    .collect();
                let plan = mesh.mesh().face_plan().clone();
                (me, local, plan)
            })
        })
        .collect();
    let mut out: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    out.sort_by_key(|(r, _, _)| *r);

    // Rank 0 owns cell 0 and holds faces 0..4; rank 1 owns cell 1 and
    // holds faces 4..7. Only the shared internal face crosses.
    let (_, cells0, plan0) = &out[0];
    assert_eq!(cells0.len(), 1);
    assert_eq!(cells0[0], vec![0, 1, 2, 3]);
    assert_eq!(plan0.send_offsets(), &[0, 0, 1]);
    assert_eq!(plan0.send_list(), &[0]);

    let (_, cells1, plan1) = &out[1];
    assert_eq!(cells1.len(), 1);
    assert_eq!(cells1[0], vec![4, 5, 6, 0], "halo face appended last");
    assert_eq!(plan1.recv_offsets(), &[0, 1, 1]);
    assert_eq!(plan1.recv_list(), &[0]);
}
