//! `HumStore`: the typed adapter onto a hum container file.
//!
//! A store opens read-only or read-write, caches the entity counts, the
//! index width tag, and the patch table, and then moves fixed-layout
//! records through typed hyperslab and element-list selections. In a
//! parallel job every rank opens the file independently and reads its own
//! disjoint slice, which is the container's independent transfer mode;
//! writes happen only from the serial tools.

use crate::dd::IndexInt;
use crate::error::DimmError;
use crate::mesh::entities::{Cell, Face, FaceLr, Node, PatchInfo, PatchRec};
use crate::store::h5types::{StoreFloat, StoreIndex};
use crate::store::links::{
    ATTR_AABB_MAX, ATTR_AABB_MIN, ATTR_FACE_ADJNCY, ATTR_INT_WIDTH, ATTR_NUM_CELLS,
    ATTR_NUM_INTERNAL, CACHE_CELL_CELL, CACHE_CELL_FACE, CACHE_GROUP, FACE_ENTITY, FACE_GROUP,
    FACE_LR, NODE_GROUP, NODE_XYZ, PATCH_GROUP, PATCH_INFO,
};
use hdf5::H5Type;
use ndarray::s;

/// Access mode a store is opened with.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StoreMode {
    ReadOnly,
    ReadWrite,
}

/// Which prebuilt cell-connectivity dataset to address.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CellCache {
    /// `Cache/cellFace`
    Face,
    /// `Cache/cellCell`
    Cell,
}

impl CellCache {
    fn path(self) -> String {
        match self {
            CellCache::Face => format!("{CACHE_GROUP}/{CACHE_CELL_FACE}"),
            CellCache::Cell => format!("{CACHE_GROUP}/{CACHE_CELL_CELL}"),
        }
    }
}

/// Typed block store over one hum container file.
pub struct HumStore {
    file: hdf5::File,
    mode: StoreMode,
    n_node: usize,
    n_face: usize,
    n_cell: usize,
    n_internal_face: usize,
    n_face_adjncy: usize,
    int_width: usize,
    patches: Vec<PatchInfo>,
    max_patch_face: usize,
}

impl HumStore {
    /// Open an existing container and read its size metadata.
    pub fn open(path: &str, mode: StoreMode) -> Result<Self, DimmError> {
        let file = match mode {
            StoreMode::ReadOnly => hdf5::File::open(path),
            StoreMode::ReadWrite => hdf5::File::open_rw(path),
        }
        .map_err(|e| DimmError::StoreAccess(format!("open {path}: {e}")))?;
        let mut store = Self {
            file,
            mode,
            n_node: 0,
            n_face: 0,
            n_cell: 0,
            n_internal_face: 0,
            n_face_adjncy: 0,
            int_width: 0,
            patches: Vec::new(),
            max_patch_face: 0,
        };
        store.read_size()?;
        Ok(store)
    }

    /// Create a fresh container; sizes are recorded as datasets and
    /// attributes get written.
    pub fn create(path: &str) -> Result<Self, DimmError> {
        let file = hdf5::File::create(path)
            .map_err(|e| DimmError::StoreAccess(format!("create {path}: {e}")))?;
        Ok(Self {
            file,
            mode: StoreMode::ReadWrite,
            n_node: 0,
            n_face: 0,
            n_cell: 0,
            n_internal_face: 0,
            n_face_adjncy: 0,
            int_width: 0,
            patches: Vec::new(),
            max_patch_face: 0,
        })
    }

    /// Release the container. All outstanding transfers have completed by
    /// the time this returns; dropping the store has the same effect.
    pub fn close(self) {}

    fn read_size(&mut self) -> Result<(), DimmError> {
        self.n_node = self.dataset(&format!("{NODE_GROUP}/{NODE_XYZ}"))?.shape()[0];
        self.n_face = self.dataset(&format!("{FACE_GROUP}/{FACE_ENTITY}"))?.shape()[0];
        self.int_width = self
            .file
            .attr(ATTR_INT_WIDTH)
            .and_then(|a| a.dtype())
            .map(|d| d.size())
            .map_err(|e| DimmError::StoreAccess(format!("attribute {ATTR_INT_WIDTH}: {e}")))?;
        self.n_cell = self.read_index_attr(ATTR_NUM_CELLS)?;
        self.n_face_adjncy = self.read_index_attr(ATTR_FACE_ADJNCY)?;
        self.n_internal_face = self.read_index_attr(ATTR_NUM_INTERNAL)?;
        self.read_patches()?;
        Ok(())
    }

    fn read_patches(&mut self) -> Result<(), DimmError> {
        self.patches.clear();
        self.max_patch_face = 0;
        if !self.link_exists(PATCH_GROUP) {
            return Ok(());
        }
        let group = self
            .file
            .group(PATCH_GROUP)
            .map_err(|e| DimmError::StoreAccess(format!("group {PATCH_GROUP}: {e}")))?;
        let mut names = group
            .member_names()
            .map_err(|e| DimmError::StoreAccess(format!("patch names: {e}")))?;
        names.sort();
        for name in names {
            let path = format!("{PATCH_GROUP}/{name}/{PATCH_INFO}");
            let info = if self.int_width == u32::WIDTH {
                let rec = self.read_one::<PatchRec<u32>>(&path)?;
                PatchInfo::from_rec(name, rec)
            } else {
                let rec = self.read_one::<PatchRec<u64>>(&path)?;
                PatchInfo::from_rec(name, rec)
            };
            self.max_patch_face = self.max_patch_face.max(info.face_count as usize);
            self.patches.push(info);
        }
        // Patches partition the boundary range by contiguous offsets;
        // streams walk them in layout order.
        self.patches.sort_by_key(|p| p.start_face);
        Ok(())
    }

    fn read_one<T: H5Type + Copy>(&self, path: &str) -> Result<T, DimmError> {
        let arr = self
            .dataset(path)?
            .read_1d::<T>()
            .map_err(|e| DimmError::StoreAccess(format!("read {path}: {e}")))?;
        arr.first()
            .copied()
            .ok_or_else(|| DimmError::StoreAccess(format!("{path} is empty")))
    }

    fn read_index_attr(&self, name: &str) -> Result<usize, DimmError> {
        let attr = self
            .file
            .attr(name)
            .map_err(|e| DimmError::StoreAccess(format!("attribute {name}: {e}")))?;
        let value = if self.int_width == u32::WIDTH {
            attr.read_scalar::<u32>().map(|v| v as usize)
        } else {
            attr.read_scalar::<u64>().map(|v| v as usize)
        };
        value.map_err(|e| DimmError::StoreAccess(format!("attribute {name}: {e}")))
    }

    fn dataset(&self, path: &str) -> Result<hdf5::Dataset, DimmError> {
        self.file
            .dataset(path)
            .map_err(|e| DimmError::StoreAccess(format!("dataset {path}: {e}")))
    }

    fn require_write(&self) -> Result<(), DimmError> {
        if self.mode != StoreMode::ReadWrite {
            return Err(DimmError::StoreAccess("store opened read-only".into()));
        }
        Ok(())
    }

    fn ensure_group(&self, name: &str) -> Result<(), DimmError> {
        if !self.link_exists(name) {
            self.file
                .create_group(name)
                .map_err(|e| DimmError::StoreAccess(format!("group {name}: {e}")))?;
        }
        Ok(())
    }

    /// True iff `path` resolves inside the container.
    pub fn link_exists(&self, path: &str) -> bool {
        self.file.link_exists(path)
    }

    /// Verify the caller's index type against the stored width tag.
    pub fn check_index_width<I: IndexInt>(&self) -> Result<(), DimmError> {
        if self.int_width != I::WIDTH {
            return Err(DimmError::IndexWidthMismatch {
                stored: self.int_width,
                requested: I::WIDTH,
            });
        }
        Ok(())
    }

    pub fn n_node(&self) -> usize {
        self.n_node
    }

    pub fn n_face(&self) -> usize {
        self.n_face
    }

    pub fn n_cell(&self) -> usize {
        self.n_cell
    }

    pub fn n_internal_face(&self) -> usize {
        self.n_internal_face
    }

    pub fn n_face_adjncy(&self) -> usize {
        self.n_face_adjncy
    }

    /// Width in bytes of the stored index type.
    pub fn int_width(&self) -> usize {
        self.int_width
    }

    pub fn n_patch(&self) -> usize {
        self.patches.len()
    }

    /// Patch descriptors ordered by patch name.
    pub fn patches(&self) -> &[PatchInfo] {
        &self.patches
    }

    /// Largest per-patch face count, for sizing stream buffers.
    pub fn max_patch_face(&self) -> usize {
        self.max_patch_face
    }

    // --- generic attribute and slice / list transfer ---

    /// Read a scalar root attribute.
    pub fn read_attr<T: H5Type>(&self, name: &str) -> Result<T, DimmError> {
        self.file
            .attr(name)
            .and_then(|a| a.read_scalar::<T>())
            .map_err(|e| DimmError::StoreAccess(format!("attribute {name}: {e}")))
    }

    /// Create and write a scalar root attribute.
    pub fn write_attr<T: H5Type>(&self, name: &str, value: &T) -> Result<(), DimmError> {
        self.require_write()?;
        self.file
            .new_attr::<T>()
            .create(name)
            .and_then(|a| a.write_scalar(value))
            .map_err(|e| DimmError::StoreAccess(format!("attribute {name}: {e}")))
    }

    /// Read `out.len()` elements starting at `offset` with the given
    /// element stride (1 = contiguous).
    pub fn read_slice<T: H5Type + Copy>(
        &self,
        path: &str,
        out: &mut [T],
        offset: usize,
        stride: usize,
    ) -> Result<(), DimmError> {
        if out.is_empty() {
            return Ok(());
        }
        let ds = self.dataset(path)?;
        let arr = if stride == 1 {
            ds.read_slice_1d::<T, _>(s![offset..offset + out.len()])
        } else {
            ds.read_slice_1d::<T, _>(s![offset..offset + stride * out.len(); stride as isize])
        }
        .map_err(|e| DimmError::StoreAccess(format!("read {path}: {e}")))?;
        let src = arr
            .as_slice()
            .ok_or_else(|| DimmError::StoreAccess(format!("read {path}: non-contiguous")))?;
        out.copy_from_slice(src);
        Ok(())
    }

    /// Read elements by id list, preserving list order. Ascending runs are
    /// coalesced into one hyperslab each.
    pub fn read_by_list<T: H5Type + Copy>(
        &self,
        path: &str,
        ids: &[usize],
        out: &mut [T],
    ) -> Result<(), DimmError> {
        if ids.len() != out.len() {
            return Err(DimmError::StoreAccess(format!(
                "list read {path}: {} ids for {} slots",
                ids.len(),
                out.len()
            )));
        }
        let ds = self.dataset(path)?;
        let mut i = 0;
        while i < ids.len() {
            let mut j = i + 1;
            while j < ids.len() && ids[j] == ids[j - 1] + 1 {
                j += 1;
            }
            let arr = ds
                .read_slice_1d::<T, _>(s![ids[i]..ids[i] + (j - i)])
                .map_err(|e| DimmError::StoreAccess(format!("read {path}: {e}")))?;
            let src = arr
                .as_slice()
                .ok_or_else(|| DimmError::StoreAccess(format!("read {path}: non-contiguous")))?;
            out[i..j].copy_from_slice(src);
            i = j;
        }
        Ok(())
    }

    /// Write `data.len()` contiguous elements starting at `offset`.
    pub fn write_slice<T: H5Type + Copy>(
        &self,
        path: &str,
        data: &[T],
        offset: usize,
    ) -> Result<(), DimmError> {
        if data.is_empty() {
            return Ok(());
        }
        self.require_write()?;
        let ds = self.dataset(path)?;
        ds.write_slice(data, s![offset..offset + data.len()])
            .map_err(|e| DimmError::StoreAccess(format!("write {path}: {e}")))
    }

    // --- entity datasets ---

    /// Allocate the node coordinate dataset.
    pub fn create_nodes<F: StoreFloat>(&mut self, n_node: usize) -> Result<(), DimmError> {
        self.require_write()?;
        self.ensure_group(NODE_GROUP)?;
        self.file
            .new_dataset::<Node<F>>()
            .shape(n_node)
            .create(format!("{NODE_GROUP}/{NODE_XYZ}").as_str())
            .map_err(|e| DimmError::StoreAccess(format!("create nodes: {e}")))?;
        self.n_node = n_node;
        Ok(())
    }

    /// Allocate the face record and face left/right datasets.
    pub fn create_faces<I: StoreIndex>(&mut self, n_face: usize) -> Result<(), DimmError> {
        self.require_write()?;
        self.ensure_group(FACE_GROUP)?;
        self.file
            .new_dataset::<Face<I>>()
            .shape(n_face)
            .create(format!("{FACE_GROUP}/{FACE_ENTITY}").as_str())
            .map_err(|e| DimmError::StoreAccess(format!("create faces: {e}")))?;
        self.file
            .new_dataset::<FaceLr<I>>()
            .shape(n_face)
            .create(format!("{FACE_GROUP}/{FACE_LR}").as_str())
            .map_err(|e| DimmError::StoreAccess(format!("create face lr: {e}")))?;
        self.n_face = n_face;
        Ok(())
    }

    pub fn read_nodes<F: StoreFloat>(
        &self,
        out: &mut [Node<F>],
        offset: usize,
    ) -> Result<(), DimmError> {
        self.read_slice(&format!("{NODE_GROUP}/{NODE_XYZ}"), out, offset, 1)
    }

    pub fn write_nodes<F: StoreFloat>(
        &self,
        data: &[Node<F>],
        offset: usize,
    ) -> Result<(), DimmError> {
        self.write_slice(&format!("{NODE_GROUP}/{NODE_XYZ}"), data, offset)
    }

    pub fn read_faces<I: StoreIndex>(
        &self,
        out: &mut [Face<I>],
        offset: usize,
    ) -> Result<(), DimmError> {
        self.check_index_width::<I>()?;
        self.read_slice(&format!("{FACE_GROUP}/{FACE_ENTITY}"), out, offset, 1)
    }

    pub fn write_faces<I: StoreIndex>(
        &self,
        data: &[Face<I>],
        offset: usize,
    ) -> Result<(), DimmError> {
        self.write_slice(&format!("{FACE_GROUP}/{FACE_ENTITY}"), data, offset)
    }

    pub fn read_face_lr<I: StoreIndex>(
        &self,
        out: &mut [FaceLr<I>],
        offset: usize,
    ) -> Result<(), DimmError> {
        self.check_index_width::<I>()?;
        self.read_slice(&format!("{FACE_GROUP}/{FACE_LR}"), out, offset, 1)
    }

    pub fn write_face_lr<I: StoreIndex>(
        &self,
        data: &[FaceLr<I>],
        offset: usize,
    ) -> Result<(), DimmError> {
        self.write_slice(&format!("{FACE_GROUP}/{FACE_LR}"), data, offset)
    }

    // --- cell connectivity cache ---

    /// True iff the container carries prebuilt cell connectivity.
    pub fn has_cell_cache(&self) -> bool {
        self.link_exists(&CellCache::Face.path())
    }

    pub fn read_cell_cache<I: StoreIndex>(
        &self,
        which: CellCache,
        out: &mut [Cell<I>],
        offset: usize,
    ) -> Result<(), DimmError> {
        self.check_index_width::<I>()?;
        self.read_slice(&which.path(), out, offset, 1)
    }

    /// Allocate one cache dataset over all cells.
    pub fn create_cell_cache<I: StoreIndex>(&mut self, which: CellCache) -> Result<(), DimmError> {
        self.require_write()?;
        self.ensure_group(CACHE_GROUP)?;
        self.file
            .new_dataset::<Cell<I>>()
            .shape(self.n_cell)
            .create(which.path().as_str())
            .map_err(|e| DimmError::StoreAccess(format!("create cache: {e}")))?;
        Ok(())
    }

    pub fn write_cell_cache<I: StoreIndex>(
        &self,
        which: CellCache,
        data: &[Cell<I>],
        offset: usize,
    ) -> Result<(), DimmError> {
        self.write_slice(&which.path(), data, offset)
    }

    // --- attributes and patches ---

    /// Record the scalar size attributes and the index width tag.
    pub fn write_mesh_attrs<I: StoreIndex>(
        &mut self,
        n_cell: usize,
        n_internal_face: usize,
        n_face_adjncy: usize,
    ) -> Result<(), DimmError> {
        self.require_write()?;
        self.write_index_attr::<I>(ATTR_NUM_CELLS, n_cell)?;
        self.write_index_attr::<I>(ATTR_NUM_INTERNAL, n_internal_face)?;
        self.write_index_attr::<I>(ATTR_FACE_ADJNCY, n_face_adjncy)?;
        self.write_index_attr::<I>(ATTR_INT_WIDTH, I::WIDTH)?;
        self.n_cell = n_cell;
        self.n_internal_face = n_internal_face;
        self.n_face_adjncy = n_face_adjncy;
        self.int_width = I::WIDTH;
        Ok(())
    }

    fn write_index_attr<I: StoreIndex>(&self, name: &str, v: usize) -> Result<(), DimmError> {
        self.write_attr(name, &I::from_usize(v))
    }

    /// Record one boundary patch descriptor.
    pub fn write_patch<I: StoreIndex>(&mut self, info: PatchInfo) -> Result<(), DimmError> {
        self.require_write()?;
        self.ensure_group(PATCH_GROUP)?;
        let group = format!("{PATCH_GROUP}/{}", info.name);
        self.ensure_group(&group)?;
        let path = format!("{group}/{PATCH_INFO}");
        let rec = [info.to_rec::<I>()];
        self.file
            .new_dataset::<PatchRec<I>>()
            .shape(1)
            .create(path.as_str())
            .and_then(|ds| ds.write_slice(&rec[..], s![0..1]))
            .map_err(|e| DimmError::StoreAccess(format!("patch {path}: {e}")))?;
        self.max_patch_face = self.max_patch_face.max(info.face_count as usize);
        self.patches.push(info);
        self.patches.sort_by_key(|p| p.start_face);
        Ok(())
    }

    /// Record the axis-aligned bounding box corners.
    pub fn write_aabb<F: StoreFloat>(
        &self,
        min: Node<F>,
        max: Node<F>,
    ) -> Result<(), DimmError> {
        self.write_attr(ATTR_AABB_MIN, &min)?;
        self.write_attr(ATTR_AABB_MAX, &max)
    }

    /// Read the axis-aligned bounding box corners.
    pub fn read_aabb<F: StoreFloat>(&self) -> Result<(Node<F>, Node<F>), DimmError> {
        Ok((self.read_attr(ATTR_AABB_MIN)?, self.read_attr(ATTR_AABB_MAX)?))
    }
}
