//! Chunked cursors over container datasets, with optional write-back.
//!
//! A cursor walks a dataset range through a bounded buffer: `current` and
//! `advance` expose one record at a time, `eof` reports exhaustion, and a
//! write-enabled cursor flushes every mutated chunk back before rolling to
//! the next. The face left/right cursor additionally walks the per-patch
//! boundary ranges after the internal range, mirroring the container's
//! internal-faces-first layout.

use crate::error::DimmError;
use crate::mesh::entities::{Face, FaceLr, PatchInfo};
use crate::store::h5types::StoreIndex;
use crate::store::hum::HumStore;
use crate::store::links::{FACE_ENTITY, FACE_GROUP, FACE_LR};
use bytemuck::Zeroable;
use hdf5::H5Type;
use std::ops::Range;

/// Streaming cursor over a contiguous dataset range.
pub struct ChunkCursor<'s, T: H5Type + Copy + Zeroable> {
    store: &'s HumStore,
    path: String,
    end: usize,
    chunk: usize,
    buf: Vec<T>,
    buf_start: usize,
    pos: usize,
    write_buf: bool,
    dirty: bool,
}

impl<'s, T: H5Type + Copy + Zeroable> ChunkCursor<'s, T> {
    /// Open a cursor over `range` of `path`, buffering `chunk` records.
    pub fn new(
        store: &'s HumStore,
        path: String,
        range: Range<usize>,
        chunk: usize,
    ) -> Result<Self, DimmError> {
        let chunk = chunk.max(1).min(range.end.saturating_sub(range.start).max(1));
        let mut cursor = Self {
            store,
            path,
            end: range.end,
            chunk,
            buf: Vec::new(),
            buf_start: range.start,
            pos: range.start,
            write_buf: false,
            dirty: false,
        };
        cursor.fill(range.start)?;
        Ok(cursor)
    }

    fn fill(&mut self, start: usize) -> Result<(), DimmError> {
        let count = self.chunk.min(self.end.saturating_sub(start));
        self.buf.resize(count, T::zeroed());
        self.buf_start = start;
        if count > 0 {
            self.store.read_slice(&self.path, &mut self.buf, start, 1)?;
        }
        Ok(())
    }

    /// True iff the range is exhausted.
    pub fn eof(&self) -> bool {
        self.pos >= self.end
    }

    /// Record under the cursor.
    pub fn current(&self) -> &T {
        debug_assert!(!self.eof());
        &self.buf[self.pos - self.buf_start]
    }

    /// Mutable record under the cursor; marks the chunk for write-back.
    pub fn current_mut(&mut self) -> &mut T {
        debug_assert!(!self.eof());
        self.dirty = true;
        &mut self.buf[self.pos - self.buf_start]
    }

    /// Records consumed so far.
    pub fn elapsed(&self) -> usize {
        self.pos
    }

    /// Step to the next record, rolling (and flushing) the buffer at chunk
    /// boundaries.
    pub fn advance(&mut self) -> Result<(), DimmError> {
        self.pos += 1;
        if self.pos >= self.buf_start + self.buf.len() && self.pos < self.end {
            self.flush()?;
            self.fill(self.pos)?;
        }
        Ok(())
    }

    /// Enable write-back of mutated chunks (the store must be read-write).
    pub fn enable_write(&mut self) {
        self.write_buf = true;
    }

    /// Write the current chunk back if it was mutated.
    pub fn flush(&mut self) -> Result<(), DimmError> {
        if self.write_buf && self.dirty && !self.buf.is_empty() {
            self.store.write_slice(&self.path, &self.buf, self.buf_start)?;
        }
        self.dirty = false;
        Ok(())
    }
}

/// Cursor over the full face record dataset.
pub fn face_cursor<I: StoreIndex>(
    store: &HumStore,
    chunk: usize,
) -> Result<ChunkCursor<'_, Face<I>>, DimmError> {
    store.check_index_width::<I>()?;
    ChunkCursor::new(
        store,
        format!("{FACE_GROUP}/{FACE_ENTITY}"),
        0..store.n_face(),
        chunk,
    )
}

/// Cursor over the face left/right dataset: the internal range first, then
/// every boundary patch range in patch order.
pub struct FaceLrCursor<'s, I: StoreIndex> {
    store: &'s HumStore,
    chunk: usize,
    write_buf: bool,
    inner: ChunkCursor<'s, FaceLr<I>>,
    patch_idx: usize,
    patch: Option<ChunkCursor<'s, FaceLr<I>>>,
}

impl<'s, I: StoreIndex> FaceLrCursor<'s, I> {
    pub fn new(store: &'s HumStore, chunk: usize) -> Result<Self, DimmError> {
        store.check_index_width::<I>()?;
        let inner = ChunkCursor::new(
            store,
            format!("{FACE_GROUP}/{FACE_LR}"),
            0..store.n_internal_face(),
            chunk,
        )?;
        let mut cursor = Self {
            store,
            chunk,
            write_buf: false,
            inner,
            patch_idx: 0,
            patch: None,
        };
        cursor.open_patch()?;
        Ok(cursor)
    }

    fn open_patch(&mut self) -> Result<(), DimmError> {
        self.patch = match self.store.patches().get(self.patch_idx) {
            Some(info) => {
                let start = info.start_face as usize;
                let mut c = ChunkCursor::new(
                    self.store,
                    format!("{FACE_GROUP}/{FACE_LR}"),
                    start..start + info.face_count as usize,
                    self.chunk,
                )?;
                if self.write_buf {
                    c.enable_write();
                }
                Some(c)
            }
            None => None,
        };
        Ok(())
    }

    /// Enable write-back on both the internal and patch streams.
    pub fn enable_write(&mut self) {
        self.write_buf = true;
        self.inner.enable_write();
        if let Some(p) = &mut self.patch {
            p.enable_write();
        }
    }

    // Internal-face stream.

    pub fn eof(&self) -> bool {
        self.inner.eof()
    }

    pub fn current(&self) -> &FaceLr<I> {
        self.inner.current()
    }

    pub fn current_mut(&mut self) -> &mut FaceLr<I> {
        self.inner.current_mut()
    }

    pub fn advance(&mut self) -> Result<(), DimmError> {
        self.inner.advance()
    }

    // Boundary-patch stream.

    pub fn eof_patch(&self) -> bool {
        self.patch.is_none()
    }

    pub fn eof_patch_face(&self) -> bool {
        self.patch.as_ref().map_or(true, |p| p.eof())
    }

    /// Descriptor of the patch under the cursor.
    pub fn patch_info(&self) -> Option<&PatchInfo> {
        self.store.patches().get(self.patch_idx)
    }

    /// Attached (left) cell of the boundary face under the cursor.
    pub fn patch_cell(&self) -> I {
        self.patch.as_ref().expect("patch stream exhausted").current().left
    }

    /// Mutable left cell of the boundary face under the cursor; the right
    /// sentinel is never touched.
    pub fn patch_cell_mut(&mut self) -> &mut I {
        &mut self
            .patch
            .as_mut()
            .expect("patch stream exhausted")
            .current_mut()
            .left
    }

    pub fn advance_patch_face(&mut self) -> Result<(), DimmError> {
        if let Some(p) = &mut self.patch {
            p.advance()?;
        }
        Ok(())
    }

    /// Flush the finished patch and move to the next one.
    pub fn advance_patch(&mut self) -> Result<(), DimmError> {
        if let Some(p) = &mut self.patch {
            p.flush()?;
        }
        self.patch_idx += 1;
        self.open_patch()
    }

    /// Flush whichever stream is mid-chunk.
    pub fn flush(&mut self) -> Result<(), DimmError> {
        self.inner.flush()?;
        if let Some(p) = &mut self.patch {
            p.flush()?;
        }
        Ok(())
    }
}
