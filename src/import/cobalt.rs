//! ASCII cobalt mesh to hum container conversion.
//!
//! Three streaming passes over the text file, bounded by a caller-chosen
//! buffer size: (1) header and node coordinates, accumulating the bounding
//! box; (2) a face scan that counts internal faces, per-patch faces, and
//! the adjacency total, then writes the size attributes and the patch
//! table; (3) a face re-read that writes internal faces (and their
//! left/right cells) first, followed by every patch's faces at its
//! contiguous offset.
//!
//! Cobalt ids are 1-based and boundary right cells are negative patch
//! labels; everything is converted to 0-based with `right = 0` for
//! boundary faces. Triangle node ids are stored reversed.

use crate::dd::IndexInt;
use crate::error::DimmError;
use crate::mesh::entities::{Face, FaceLr, Node, PatchInfo};
use crate::store::h5types::{StoreFloat, StoreIndex};
use crate::store::hum::HumStore;
use bytemuck::Zeroable;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};

/// Line-oriented whitespace tokenizer that tracks consumed bytes, so a
/// later pass can seek back to the face section.
struct Scanner<R: BufRead> {
    reader: R,
    line: String,
    cursor: usize,
    consumed: u64,
}

impl<R: BufRead> Scanner<R> {
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: String::new(),
            cursor: 0,
            consumed: 0,
        }
    }

    fn next_token(&mut self) -> Result<&str, DimmError> {
        loop {
            let (start, end) = {
                let rest = &self.line[self.cursor..];
                let trimmed = rest.trim_start();
                if trimmed.is_empty() {
                    (0, 0)
                } else {
                    let s = self.cursor + (rest.len() - trimmed.len());
                    let e = s + trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
                    (s, e)
                }
            };
            if end > start {
                self.cursor = end;
                return Ok(&self.line[start..end]);
            }
            self.line.clear();
            self.cursor = 0;
            let n = self
                .reader
                .read_line(&mut self.line)
                .map_err(DimmError::Io)?;
            if n == 0 {
                return Err(DimmError::ImportParse("unexpected end of file".into()));
            }
            self.consumed += n as u64;
        }
    }

    fn next_usize(&mut self) -> Result<usize, DimmError> {
        let tok = self.next_token()?;
        tok.parse()
            .map_err(|_| DimmError::ImportParse(format!("expected integer, got `{tok}`")))
    }

    fn next_i64(&mut self) -> Result<i64, DimmError> {
        let tok = self.next_token()?;
        tok.parse()
            .map_err(|_| DimmError::ImportParse(format!("expected integer, got `{tok}`")))
    }

    fn next_f64(&mut self) -> Result<f64, DimmError> {
        let tok = self.next_token()?;
        tok.parse()
            .map_err(|_| DimmError::ImportParse(format!("expected float, got `{tok}`")))
    }

    /// Bytes consumed up to the end of the current line.
    fn consumed(&self) -> u64 {
        self.consumed
    }
}

/// One face line: record, 0-based left, raw 0-based right (negative for
/// boundary).
fn read_one_face<I: IndexInt, R: BufRead>(
    scan: &mut Scanner<R>,
) -> Result<(Face<I>, i64, i64), DimmError> {
    let valence = scan.next_usize()?;
    if valence != 3 && valence != 4 {
        return Err(DimmError::ImportParse(format!(
            "face valence {valence} not supported"
        )));
    }
    let mut face = Face::<I>::zeroed();
    face.set_valence(valence);
    let read_node = |scan: &mut Scanner<R>| -> Result<I, DimmError> {
        let raw = scan.next_usize()?;
        raw.checked_sub(1)
            .map(I::from_usize)
            .ok_or_else(|| DimmError::ImportParse("node ids are 1-based".into()))
    };
    if valence == 3 {
        for i in (0..valence).rev() {
            face.nodes[i] = read_node(scan)?;
        }
    } else {
        for i in 0..valence {
            face.nodes[i] = read_node(scan)?;
        }
    }
    let left = scan.next_i64()? - 1;
    let right = scan.next_i64()? - 1;
    Ok((face, left, right))
}

/// Convert `cobalt_path` into a fresh hum container at `hum_path`,
/// streaming through at most `max_bytes` of buffer.
pub fn convert<F: StoreFloat, I: StoreIndex>(
    cobalt_path: &str,
    hum_path: &str,
    max_bytes: usize,
) -> Result<(), DimmError> {
    let mut store = HumStore::create(hum_path)?;
    let file = File::open(cobalt_path).map_err(DimmError::Io)?;
    let mut scan = Scanner::new(BufReader::new(file));

    // --- Pass 1: header and nodes ---
    let _ndim = scan.next_usize()?;
    let _nmesh = scan.next_usize()?;
    let _npatch = scan.next_usize()?;
    let n_node = scan.next_usize()?;
    let n_face = scan.next_usize()?;
    let n_cell = scan.next_usize()?;
    let _ncorn = scan.next_usize()?;
    let _nfacespercell = scan.next_usize()?;
    eprintln!("Pass 1 - Vertex Data");
    eprintln!("Total Nodes = {n_node}");
    eprintln!("Total Faces = {n_face}");
    eprintln!("Total Cells = {n_cell}");

    store.create_nodes::<F>(n_node)?;
    let node_chunk = (max_bytes / std::mem::size_of::<Node<F>>()).max(1);
    let mut min = Node::new(f64::MAX, f64::MAX, f64::MAX);
    let mut max = Node::new(f64::MIN, f64::MIN, f64::MIN);
    let mut buf: Vec<Node<F>> = Vec::with_capacity(node_chunk.min(n_node));
    let mut written = 0usize;
    while written < n_node {
        buf.clear();
        let count = node_chunk.min(n_node - written);
        for _ in 0..count {
            let mut xyz = [0.0f64; 3];
            for v in &mut xyz {
                *v = scan.next_f64()?;
            }
            for k in 0..3 {
                min.xyz[k] = min.xyz[k].min(xyz[k]);
                max.xyz[k] = max.xyz[k].max(xyz[k]);
            }
            buf.push(Node::new(
                F::from_f64(xyz[0]),
                F::from_f64(xyz[1]),
                F::from_f64(xyz[2]),
            ));
        }
        store.write_nodes(&buf, written)?;
        written += count;
    }
    let tol = f64::EPSILON.sqrt();
    for k in 0..3 {
        min.xyz[k] -= tol;
        max.xyz[k] += tol;
    }
    store.write_aabb(
        Node::new(
            F::from_f64(min.xyz[0]),
            F::from_f64(min.xyz[1]),
            F::from_f64(min.xyz[2]),
        ),
        Node::new(
            F::from_f64(max.xyz[0]),
            F::from_f64(max.xyz[1]),
            F::from_f64(max.xyz[2]),
        ),
    )?;

    // --- Pass 2: face sizes and patch table ---
    eprintln!("Pass 2 - Face Data Sizes");
    let face_begin = scan.consumed();
    let mut n_internal = 0usize;
    let mut n_adjncy = 0usize;
    let mut patch_counts: BTreeMap<u64, usize> = BTreeMap::new();
    for _ in 0..n_face {
        let (face, _, right) = read_one_face::<I, _>(&mut scan)?;
        if right >= 0 {
            n_internal += 1;
        } else {
            *patch_counts.entry(right.unsigned_abs()).or_insert(0) += 1;
        }
        n_adjncy += face.valence();
    }
    store.write_mesh_attrs::<I>(n_cell, n_internal, n_adjncy)?;
    store.create_faces::<I>(n_face)?;
    let mut patch_offsets: BTreeMap<u64, usize> = BTreeMap::new();
    let mut offset = n_internal;
    for (&label, &count) in &patch_counts {
        store.write_patch::<I>(PatchInfo {
            name: format!("patch_{label}"),
            bc_type: 1,
            start_face: offset as u64,
            face_count: count as u64,
            attached_rank: 0,
        })?;
        patch_offsets.insert(label, offset);
        offset += count;
    }
    eprintln!("Total internal faces = {n_internal}");
    eprintln!("Face adjncy size     = {n_adjncy}");

    // --- Pass 3: face data ---
    eprintln!("Pass 3 - Face Data");
    let mut file = File::open(cobalt_path).map_err(DimmError::Io)?;
    file.seek(SeekFrom::Start(face_begin)).map_err(DimmError::Io)?;
    let mut scan = Scanner::new(BufReader::new(file));

    let rec_bytes = std::mem::size_of::<Face<I>>() + std::mem::size_of::<FaceLr<I>>();
    let face_chunk = (max_bytes / rec_bytes).max(1);
    let mut face_buf: Vec<Face<I>> = Vec::with_capacity(face_chunk.min(n_face));
    let mut lr_buf: Vec<FaceLr<I>> = Vec::with_capacity(face_chunk.min(n_face));
    let mut patch_face: BTreeMap<u64, Vec<Face<I>>> = BTreeMap::new();
    let mut patch_lr: BTreeMap<u64, Vec<FaceLr<I>>> = BTreeMap::new();
    let mut count_face = 0usize;
    let mut read = 0usize;
    while read < n_face {
        face_buf.clear();
        lr_buf.clear();
        let count = face_chunk.min(n_face - read);
        for _ in 0..count {
            let (face, left, right) = read_one_face::<I, _>(&mut scan)?;
            if right >= 0 {
                face_buf.push(face);
                lr_buf.push(FaceLr {
                    left: I::from_usize(left as usize),
                    right: I::from_usize(right as usize),
                });
            } else {
                let label = right.unsigned_abs();
                patch_face.entry(label).or_default().push(face);
                patch_lr.entry(label).or_default().push(FaceLr {
                    left: I::from_usize(left as usize),
                    right: I::zero(),
                });
            }
        }
        store.write_faces(&face_buf, count_face)?;
        store.write_face_lr(&lr_buf, count_face)?;
        count_face += face_buf.len();
        // Drain the patch buckets at their running offsets.
        for (&label, faces) in &mut patch_face {
            if faces.is_empty() {
                continue;
            }
            let off = patch_offsets.get_mut(&label).ok_or_else(|| {
                DimmError::ImportParse(format!("patch {label} appeared only in pass 3"))
            })?;
            store.write_faces(faces, *off)?;
            if let Some(lrs) = patch_lr.get(&label) {
                store.write_face_lr(lrs, *off)?;
            }
            *off += faces.len();
            faces.clear();
        }
        for lrs in patch_lr.values_mut() {
            lrs.clear();
        }
        read += count;
    }
    store.close();
    Ok(())
}
