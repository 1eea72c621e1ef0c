//! The distributed in-memory mesh.
//!
//! [`DistributedMesh`] opens a hum container, spreads the node, face, and
//! face left/right arrays over round-robin directories, and builds the
//! inverted face exchange plan from the raw connectivity. [`CellMesh`]
//! extends it with cell-face and cell-cell adjacency, read straight from
//! the container's cache group when present and otherwise built by
//! gathering the halo faces of every owned cell.

use crate::comm::{CommTag, Communicator, PlanCommTags};
use crate::dd::directory::DistributedDirectory;
use crate::dd::plan::CommPlan;
use crate::dd::round_robin::RoundRobinMap;
use crate::dd::IndexInt;
use crate::error::DimmError;
use crate::mesh::entities::{Cell, Face, FaceLr, Node};
use crate::mesh::schedules::face_plan_from_lr;
use crate::store::h5types::{StoreFloat, StoreIndex};
use crate::store::hum::{CellCache, HumStore, StoreMode};
use crate::timing::GroupTimer;

/// Base tag for the mesh construction protocols.
pub const MESH_BASE_TAG: CommTag = CommTag::new(0x0100);
/// Base tag for the cell adjacency construction.
pub const CELL_BASE_TAG: CommTag = CommTag::new(0x0110);

/// Node, face, and connectivity slices of one rank, plus the inverted face
/// exchange plan.
pub struct DistributedMesh<F: StoreFloat, I: StoreIndex> {
    node_dd: DistributedDirectory<Node<F>>,
    face_dd: DistributedDirectory<Face<I>>,
    face_lr_dd: DistributedDirectory<FaceLr<I>>,
    cell_map: RoundRobinMap,
    face_plan: CommPlan<I>,
    n_internal_faces: usize,
}

impl<F: StoreFloat, I: StoreIndex> DistributedMesh<F, I> {
    /// Open `path` read-only, build the mesh, and release the store.
    pub fn open<C: Communicator>(path: &str, comm: &C) -> Result<Self, DimmError> {
        let store = HumStore::open(path, StoreMode::ReadOnly)?;
        let mesh = Self::from_store(&store, comm)?;
        store.close();
        Ok(mesh)
    }

    /// Build the mesh from an already opened store.
    pub fn from_store<C: Communicator>(store: &HumStore, comm: &C) -> Result<Self, DimmError> {
        store.check_index_width::<I>()?;
        let tags = PlanCommTags::from_base(MESH_BASE_TAG);
        let mut node_dd = DistributedDirectory::<Node<F>>::new(store.n_node(), comm);
        let mut face_dd = DistributedDirectory::<Face<I>>::new(store.n_face(), comm);
        let mut face_lr_dd = DistributedDirectory::<FaceLr<I>>::new(store.n_face(), comm);
        let cell_map = RoundRobinMap::new(store.n_cell(), comm);
        let n_internal_faces = store.n_internal_face();

        let timer = GroupTimer::new(comm);
        let node_start = node_dd.start();
        store.read_nodes(node_dd.as_mut_slice(), node_start)?;
        let face_start = face_lr_dd.start();
        store.read_face_lr(face_lr_dd.as_mut_slice(), face_start)?;
        store.read_faces(face_dd.as_mut_slice(), face_start)?;

        let mut face_plan = CommPlan::with_ranks(comm.size());
        face_plan_from_lr(
            &face_lr_dd,
            &cell_map,
            n_internal_faces,
            &mut face_plan,
            comm,
            tags,
        )?;
        let elapsed = timer.stop(tags.sizes.as_u16())? * 1.0e-3;

        if comm.rank() == 0 {
            let mut bytes_read = ((std::mem::size_of::<Face<I>>()
                + std::mem::size_of::<FaceLr<I>>())
                * store.n_face()) as f64;
            bytes_read += (std::mem::size_of::<Node<F>>() * store.n_node()) as f64;
            bytes_read /= 1024.0 * 1024.0;
            eprintln!("Totally {bytes_read} MB read in {elapsed} s");
            eprintln!("Read bandwidth = {} MB/s", bytes_read / elapsed.max(1.0e-9));
        }

        Ok(Self {
            node_dd,
            face_dd,
            face_lr_dd,
            cell_map,
            face_plan,
            n_internal_faces,
        })
    }

    /// Node coordinate slice owned by this rank.
    pub fn nodes(&self) -> &DistributedDirectory<Node<F>> {
        &self.node_dd
    }

    /// Face record slice owned by this rank.
    pub fn faces(&self) -> &DistributedDirectory<Face<I>> {
        &self.face_dd
    }

    /// Face left/right slice owned by this rank.
    pub fn face_lr(&self) -> &DistributedDirectory<FaceLr<I>> {
        &self.face_lr_dd
    }

    /// Ownership map of the cell range.
    pub fn cell_map(&self) -> &RoundRobinMap {
        &self.cell_map
    }

    /// The inverted face exchange plan: the send side names local faces to
    /// ship (global ids), the receive side names the faces arriving for
    /// this rank's cells.
    pub fn face_plan(&self) -> &CommPlan<I> {
        &self.face_plan
    }

    pub fn n_internal_faces(&self) -> usize {
        self.n_internal_faces
    }

    /// Gather the left/right pairs of every face touching an owned cell
    /// but living on a remote rank. Returns them in receive order; the
    /// matching global face ids are the plan's receive list.
    pub fn gather_halo_lr<C: Communicator>(
        &self,
        comm: &C,
    ) -> Result<Vec<FaceLr<I>>, DimmError> {
        let tags = PlanCommTags::from_base(CELL_BASE_TAG);
        let mut plan = self.face_plan.clone();
        // The schedule carries global face ids; the gather wants
        // owner-local indices.
        let face_start = self.face_lr_dd.start();
        for id in plan.send_list_mut() {
            *id = I::from_usize(id.to_usize() - face_start);
        }
        let total = plan.recv_offsets()[comm.size()];
        let mut out = vec![
            FaceLr {
                left: I::zero(),
                right: I::zero(),
            };
            total
        ];
        self.face_lr_dd.read(&plan, &mut out, comm, tags)?;
        Ok(out)
    }
}

/// A distributed mesh plus per-cell face and neighbour adjacency.
pub struct CellMesh<F: StoreFloat, I: StoreIndex> {
    mesh: DistributedMesh<F, I>,
    cell_face_dd: DistributedDirectory<Cell<I>>,
    cell_cell_dd: DistributedDirectory<Cell<I>>,
}

impl<F: StoreFloat, I: StoreIndex> CellMesh<F, I> {
    /// Open `path` read-only, build mesh and cell adjacency, release the
    /// store.
    pub fn open<C: Communicator>(path: &str, comm: &C) -> Result<Self, DimmError> {
        let store = HumStore::open(path, StoreMode::ReadOnly)?;
        let mesh = DistributedMesh::from_store(&store, comm)?;
        let cell_mesh = Self::from_parts(&store, mesh, comm)?;
        store.close();
        Ok(cell_mesh)
    }

    fn from_parts<C: Communicator>(
        store: &HumStore,
        mesh: DistributedMesh<F, I>,
        comm: &C,
    ) -> Result<Self, DimmError> {
        let mut cell_face_dd = DistributedDirectory::<Cell<I>>::new(store.n_cell(), comm);
        let mut cell_cell_dd = DistributedDirectory::<Cell<I>>::new(store.n_cell(), comm);

        let timer = GroupTimer::new(comm);
        if store.has_cell_cache() {
            let start = cell_face_dd.start();
            store.read_cell_cache(CellCache::Face, cell_face_dd.as_mut_slice(), start)?;
            store.read_cell_cache(CellCache::Cell, cell_cell_dd.as_mut_slice(), start)?;
        } else {
            Self::build_adjacency(&mesh, &mut cell_face_dd, &mut cell_cell_dd, comm)?;
        }
        let elapsed = timer.stop(CELL_BASE_TAG.offset(3).as_u16())? * 1.0e-3;

        if comm.rank() == 0 {
            let bytes_read =
                (2 * std::mem::size_of::<Cell<I>>() * store.n_cell()) as f64 / (1024.0 * 1024.0);
            eprintln!("Totally {bytes_read} MB read in {elapsed} s");
            eprintln!(
                "Cell read bandwidth = {} MB/s",
                bytes_read / elapsed.max(1.0e-9)
            );
        }

        Ok(Self {
            mesh,
            cell_face_dd,
            cell_cell_dd,
        })
    }

    /// Build cell-face and cell-cell adjacency from the local face slice
    /// plus the gathered halo.
    ///
    /// Slot `k` of a cell's neighbour record pairs with slot `k` of its
    /// face record; across a boundary face the neighbour entry is the
    /// right-cell sentinel.
    fn build_adjacency<C: Communicator>(
        mesh: &DistributedMesh<F, I>,
        cell_face: &mut DistributedDirectory<Cell<I>>,
        cell_cell: &mut DistributedDirectory<Cell<I>>,
        comm: &C,
    ) -> Result<(), DimmError> {
        let cell_map = mesh.cell_map();
        let cell_start = cell_map.start();
        let n_internal = mesh.n_internal_faces();

        let touch = |gid: usize,
                     lr: &FaceLr<I>,
                     cell_face: &mut DistributedDirectory<Cell<I>>,
                     cell_cell: &mut DistributedDirectory<Cell<I>>| {
            let left = lr.left.to_usize();
            if cell_map.in_dist(left) {
                let local = left - cell_start;
                cell_face[local].push_left(I::from_usize(gid));
                cell_cell[local].push_left(lr.right);
            }
            if gid < n_internal {
                let right = lr.right.to_usize();
                if cell_map.in_dist(right) {
                    let local = right - cell_start;
                    cell_face[local].push_right(I::from_usize(gid));
                    cell_cell[local].push_right(lr.left);
                }
            }
        };

        let face_start = mesh.face_lr().start();
        for (i, lr) in mesh.face_lr().as_slice().iter().enumerate() {
            touch(face_start + i, lr, cell_face, cell_cell);
        }

        // A face shipped to both of its owners arrives twice; process each
        // halo face once.
        let halo = mesh.gather_halo_lr(comm)?;
        let ids = mesh.face_plan().recv_list();
        let mut seen = std::collections::HashSet::new();
        for (k, lr) in halo.iter().enumerate() {
            let gid = ids[k].to_usize();
            if seen.insert(gid) {
                touch(gid, lr, cell_face, cell_cell);
            }
        }
        Ok(())
    }

    pub fn mesh(&self) -> &DistributedMesh<F, I> {
        &self.mesh
    }

    /// Per-cell face ids with orientation signs.
    pub fn cell_face(&self) -> &DistributedDirectory<Cell<I>> {
        &self.cell_face_dd
    }

    /// Per-cell neighbour ids, slot-parallel with [`Self::cell_face`].
    pub fn cell_cell(&self) -> &DistributedDirectory<Cell<I>> {
        &self.cell_cell_dd
    }
}
