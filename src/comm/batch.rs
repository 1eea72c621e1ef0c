//! Persistent message batteries: per-peer send/receive slots over one
//! shared, typed byte buffer.
//!
//! A batch owns `2·P` request slots (one send and one receive per peer) and
//! the buffer the payloads live in. Posting installs a slot without starting
//! anything; [`PersistentBatch::start`] activates every non-null slot,
//! [`PersistentBatch::wait`] observes completion and leaves the slots
//! reusable, and [`PersistentBatch::free_reqs`] releases them. Dropping a
//! batch waits and then frees, so a slot left posted-but-not-started is
//! always released.
//!
//! The send and receive views alias the same memory; a schedule must never
//! send and receive through the same byte range within one batch.

use crate::comm::wire::{cast_slice, cast_slice_from_mut, cast_slice_mut};
use crate::comm::{Communicator, Wait};
use crate::error::DimmError;
use bytemuck::Pod;
use std::ops::Range;

#[derive(Clone, Debug)]
struct Post {
    peer: usize,
    tag: u16,
    range: Range<usize>,
}

/// Lifecycle manager for persistent sends/receives and their shared buffer.
pub struct PersistentBatch<'c, C: Communicator> {
    comm: &'c C,
    send_posts: Vec<Option<Post>>,
    recv_posts: Vec<Option<Post>>,
    // u64 backing keeps the byte views aligned for every Pod record type.
    words: Vec<u64>,
    pending_sends: Vec<C::SendHandle>,
    pending_recvs: Vec<(usize, C::RecvHandle)>,
}

impl<'c, C: Communicator> PersistentBatch<'c, C> {
    /// Allocate a batch with one send and one receive slot per peer.
    pub fn new(comm: &'c C) -> Self {
        let nprocs = comm.size();
        Self {
            comm,
            send_posts: (0..nprocs).map(|_| None).collect(),
            recv_posts: (0..nprocs).map(|_| None).collect(),
            words: Vec::new(),
            pending_sends: Vec::new(),
            pending_recvs: Vec::new(),
        }
    }

    /// Ensure the buffer holds at least `count` elements of `T`.
    ///
    /// Shrinking to zero clears the buffer; any other smaller request keeps
    /// the existing allocation.
    pub fn resize<T: Pod>(&mut self, count: usize) {
        let bytes = count * std::mem::size_of::<T>();
        let words = bytes.div_ceil(std::mem::size_of::<u64>());
        if words > self.words.len() {
            self.words.resize(words, 0);
        }
        if count == 0 && !self.words.is_empty() {
            self.words.clear();
        }
    }

    /// Number of whole `T` elements the buffer currently holds.
    pub fn buf_len<T: Pod>(&self) -> usize {
        (self.words.len() * std::mem::size_of::<u64>()) / std::mem::size_of::<T>()
    }

    /// Typed send-side view of the shared buffer.
    pub fn send_buf<T: Pod>(&mut self) -> &mut [T] {
        Self::typed_view(&mut self.words)
    }

    /// Typed receive-side view of the shared buffer (same memory as
    /// [`Self::send_buf`]).
    pub fn recv_buf<T: Pod>(&mut self) -> &mut [T] {
        Self::typed_view(&mut self.words)
    }

    fn typed_view<T: Pod>(words: &mut [u64]) -> &mut [T] {
        let bytes = cast_slice_mut(words);
        let fit = (bytes.len() / std::mem::size_of::<T>()) * std::mem::size_of::<T>();
        cast_slice_from_mut(&mut bytes[..fit])
    }

    /// Install a persistent send of `range` (bytes into the shared buffer)
    /// to `peer`. Posting over an occupied slot replaces it.
    pub fn post_send(&mut self, peer: usize, tag: u16, range: Range<usize>) {
        self.send_posts[peer] = Some(Post { peer, tag, range });
    }

    /// Install a persistent receive into `range` (bytes into the shared
    /// buffer) from `peer`. Posting over an occupied slot replaces it.
    pub fn post_recv(&mut self, peer: usize, tag: u16, range: Range<usize>) {
        self.recv_posts[peer] = Some(Post { peer, tag, range });
    }

    /// Start every non-null request. Receives are activated before sends.
    pub fn start(&mut self) {
        let comm = self.comm;
        let mut recvs = Vec::new();
        for (slot, post) in self.recv_posts.iter().enumerate() {
            if let Some(p) = post {
                let mut template = vec![0u8; p.range.len()];
                recvs.push((slot, comm.irecv(p.peer, p.tag, &mut template)));
            }
        }
        let bytes = cast_slice(&self.words);
        let mut sends = Vec::new();
        for p in self.send_posts.iter().flatten() {
            sends.push(comm.isend(p.peer, p.tag, &bytes[p.range.clone()]));
        }
        self.pending_recvs = recvs;
        self.pending_sends = sends;
    }

    /// Wait on every started request. Received payloads land in their posted
    /// byte ranges; the slots stay installed for the next `start`.
    pub fn wait(&mut self) -> Result<(), DimmError> {
        for (slot, h) in std::mem::take(&mut self.pending_recvs) {
            let (peer, range) = match &self.recv_posts[slot] {
                Some(p) => (p.peer, p.range.clone()),
                None => continue,
            };
            let got = h.wait().ok_or_else(|| DimmError::CommError {
                neighbor: peer,
                reason: "persistent receive returned no data".into(),
            })?;
            if got.len() != range.len() {
                return Err(DimmError::BufferSizeMismatch {
                    neighbor: peer,
                    expected: range.len(),
                    got: got.len(),
                });
            }
            cast_slice_mut(&mut self.words)[range].copy_from_slice(&got);
        }
        for s in std::mem::take(&mut self.pending_sends) {
            let _ = s.wait();
        }
        Ok(())
    }

    /// Release every slot, started or not.
    pub fn free_reqs(&mut self) {
        self.send_posts.iter_mut().for_each(|p| *p = None);
        self.recv_posts.iter_mut().for_each(|p| *p = None);
        self.pending_sends.clear();
        self.pending_recvs.clear();
    }
}

impl<C: Communicator> Drop for PersistentBatch<'_, C> {
    fn drop(&mut self) {
        let _ = self.wait();
        self.free_reqs();
    }
}
