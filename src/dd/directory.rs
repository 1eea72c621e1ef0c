//! Generic typed distributed array over a round-robin map.
//!
//! A directory owns the contiguous local slice of a globally indexed array
//! and knows, through its [`RoundRobinMap`], which rank owns any global id.
//! On top of that it provides the unstructured all-to-all protocol: turning
//! a wish-list of global ids into a plan, inverting a plan's receive side
//! into the matching send side across all ranks, and plan-driven gather and
//! migrate transfers.
//!
//! The directory *has a* map and forwards ownership queries through
//! delegation; payload elements are `Pod` records moved by byte copy.

use crate::comm::batch::PersistentBatch;
use crate::comm::wire::{cast_slice, cast_slice_from, cast_slice_mut};
use crate::comm::{Communicator, PlanCommTags, Wait};
use crate::dd::plan::CommPlan;
use crate::dd::round_robin::RoundRobinMap;
use crate::dd::IndexInt;
use crate::error::DimmError;
use bytemuck::{Pod, Zeroable};
use std::ops::{Index, IndexMut};

/// Typed distributed array with schedule inversion and gather/migrate.
#[derive(Clone, Debug)]
pub struct DistributedDirectory<T: Pod> {
    data: Vec<T>,
    map: RoundRobinMap,
}

impl<T: Pod> DistributedDirectory<T> {
    /// Distribute `global_size` zero-initialised elements over `comm`.
    pub fn new<C: Communicator>(global_size: usize, comm: &C) -> Self {
        Self::from_map(RoundRobinMap::new(global_size, comm))
    }

    /// Wrap an existing map, allocating the local slice it prescribes.
    pub fn from_map(map: RoundRobinMap) -> Self {
        let data = vec![T::zeroed(); map.len()];
        Self { data, map }
    }

    /// The round-robin map this directory delegates ownership queries to.
    #[inline]
    pub fn map(&self) -> &RoundRobinMap {
        &self.map
    }

    /// Rank owning global index `id`.
    #[inline]
    pub fn pid(&self, id: usize) -> usize {
        self.map.pid(id)
    }

    /// First global index owned by this rank.
    #[inline]
    pub fn start(&self) -> usize {
        self.map.start()
    }

    /// Number of locally owned elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True iff this rank owns nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Local slice of owned elements.
    #[inline]
    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    /// Mutable local slice of owned elements.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Transform a flat list of wanted global ids into the plan's receive
    /// side: counts per owner rank, prefix-summed offsets, and the list in
    /// owner-local form. Duplicates are preserved and the enumeration order
    /// inside each peer slice follows the input list.
    pub fn list_to_plan<I: IndexInt>(
        &self,
        list: &[I],
        plan: &mut CommPlan<I>,
    ) -> Result<(), DimmError> {
        let p = self.map.nprocs();
        plan.resize(p);
        plan.clear_list();
        for &id in list {
            let gid = id.to_usize();
            if gid >= self.map.global_len() {
                return Err(DimmError::IndexOutOfBounds {
                    index: gid,
                    len: self.map.global_len(),
                });
            }
            plan.recv_offsets_mut()[self.map.pid(gid) + 1] += 1;
        }
        {
            let offs = plan.recv_offsets_mut();
            for i in 0..p {
                offs[i + 1] += offs[i];
            }
        }
        let counts: Vec<usize> = (0..p).map(|i| plan.recv_count(i)).collect();
        for (i, &c) in counts.iter().enumerate() {
            plan.recv_procs_mut()[i] = if c > 0 { i as i32 } else { -1 };
        }
        let total = plan.recv_offsets()[p];
        plan.recv_list_mut().resize(total, I::zero());
        let mut cursor: Vec<usize> = plan.recv_offsets()[..p].to_vec();
        for &id in list {
            let gid = id.to_usize();
            let owner = self.map.pid(gid);
            plan.recv_list_mut()[cursor[owner]] = I::from_usize(gid - self.map.start_of(owner));
            cursor[owner] += 1;
        }
        Ok(())
    }

    /// Produce the send side dual of a populated receive side.
    ///
    /// Three phases: (1) all-gather the `P x P` who-receives-how-much count
    /// matrix; (2) read column `me` to size the local sends and prefix-sum
    /// the offsets; (3) ship each receive-list slice to its owner and take
    /// delivery of what every peer demands of us. On return the send list
    /// holds owner-local indices into this rank's slice.
    pub fn build_send_plan<I: IndexInt, C: Communicator>(
        &self,
        plan: &mut CommPlan<I>,
        comm: &C,
        tags: PlanCommTags,
    ) -> Result<(), DimmError> {
        let p = comm.size();
        let me = comm.rank();
        if plan.nprocs() != p {
            return Err(DimmError::RankCountMismatch {
                plan: plan.nprocs(),
                comm: p,
            });
        }
        let recv_total = plan.recv_offsets()[p];
        if plan.recv_list().len() != recv_total {
            return Err(DimmError::PlanSizeMismatch {
                side: "recv",
                expected: recv_total,
                got: plan.recv_list().len(),
            });
        }

        // Phase 1: announce receive sizes.
        let recv_size: Vec<i32> = (0..p).map(|i| plan.recv_count(i) as i32).collect();
        let mut global = vec![0i32; p * p];
        comm.all_gather_counts(tags.sizes.as_u16(), &recv_size, &mut global)?;

        // Phase 2: column `me` sizes the local sends.
        {
            let offs = plan.send_offsets_mut();
            offs[0] = 0;
            for i in 0..p {
                offs[i + 1] = global[me + i * p] as usize;
            }
            for i in 0..p {
                offs[i + 1] += offs[i];
            }
        }
        let send_total = plan.send_offsets()[p];
        plan.send_list_mut().resize(send_total, I::zero());
        let counts: Vec<usize> = (0..p).map(|i| plan.send_count(i)).collect();
        for (i, &c) in counts.iter().enumerate() {
            plan.send_procs_mut()[i] = if c > 0 { i as i32 } else { -1 };
        }

        // Phase 3: exchange identities. One message per (src, dst) pair, so
        // a single phase tag is collision-free. The self pair bypasses the
        // transport.
        let elem = std::mem::size_of::<I>();
        {
            let r_lo = plan.recv_offsets()[me];
            let r_hi = plan.recv_offsets()[me + 1];
            let own: Vec<I> = plan.recv_list()[r_lo..r_hi].to_vec();
            let s_lo = plan.send_offsets()[me];
            plan.send_list_mut()[s_lo..s_lo + own.len()].copy_from_slice(&own);
        }
        let mut recv_handles = Vec::new();
        for i in 0..p {
            if i == me {
                continue;
            }
            let cnt = plan.send_count(i);
            if cnt > 0 {
                let mut template = vec![0u8; cnt * elem];
                recv_handles.push((i, comm.irecv(i, tags.lists.as_u16(), &mut template)));
            }
        }
        let mut send_handles = Vec::new();
        for i in 0..p {
            if i == me {
                continue;
            }
            let lo = plan.recv_offsets()[i];
            let hi = plan.recv_offsets()[i + 1];
            if hi > lo {
                send_handles.push(comm.isend(
                    i,
                    tags.lists.as_u16(),
                    cast_slice(&plan.recv_list()[lo..hi]),
                ));
            }
        }
        for (i, h) in recv_handles {
            let got = h.wait().ok_or_else(|| DimmError::CommError {
                neighbor: i,
                reason: "identity exchange returned no data".into(),
            })?;
            let lo = plan.send_offsets()[i];
            let hi = plan.send_offsets()[i + 1];
            let expected = (hi - lo) * elem;
            if got.len() != expected {
                return Err(DimmError::BufferSizeMismatch {
                    neighbor: i,
                    expected,
                    got: got.len(),
                });
            }
            plan.send_list_mut()[lo..hi].copy_from_slice(cast_slice_from::<I>(&got));
        }
        for h in send_handles {
            let _ = h.wait();
        }
        Ok(())
    }

    /// Produce the receive side dual of a populated send side.
    pub fn build_recv_plan<I: IndexInt, C: Communicator>(
        &self,
        plan: &mut CommPlan<I>,
        comm: &C,
        tags: PlanCommTags,
    ) -> Result<(), DimmError> {
        plan.swap();
        let result = self.build_send_plan(plan, comm, tags);
        plan.swap();
        result
    }

    /// Gather: ship the elements each peer demands and take delivery of the
    /// elements this rank asked for, in receive-offset order.
    ///
    /// The self slice is copied directly; an empty plan returns without
    /// touching `out`.
    pub fn read<I: IndexInt, C: Communicator>(
        &self,
        plan: &CommPlan<I>,
        out: &mut [T],
        comm: &C,
        tags: PlanCommTags,
    ) -> Result<(), DimmError> {
        if plan.both_empty() {
            return Ok(());
        }
        let p = comm.size();
        let me = comm.rank();
        if plan.nprocs() != p {
            return Err(DimmError::RankCountMismatch {
                plan: plan.nprocs(),
                comm: p,
            });
        }
        let send_total = plan.send_offsets()[p];
        if plan.send_list().len() != send_total {
            return Err(DimmError::PlanSizeMismatch {
                side: "send",
                expected: send_total,
                got: plan.send_list().len(),
            });
        }
        let recv_total = plan.recv_offsets()[p];
        if out.len() < recv_total {
            return Err(DimmError::IndexOutOfBounds {
                index: recv_total,
                len: out.len(),
            });
        }

        let elem = std::mem::size_of::<T>();
        let mut batch = PersistentBatch::new(comm);
        batch.resize::<T>(send_total);
        {
            let buf = batch.send_buf::<T>();
            for (j, &idx) in plan.send_list().iter().enumerate() {
                let k = idx.to_usize();
                buf[j] = *self.data.get(k).ok_or(DimmError::IndexOutOfBounds {
                    index: k,
                    len: self.data.len(),
                })?;
            }
        }

        let mut recv_handles = Vec::new();
        for i in 0..p {
            if i == me {
                continue;
            }
            let cnt = plan.recv_count(i);
            if cnt > 0 {
                let mut template = vec![0u8; cnt * elem];
                recv_handles.push((i, comm.irecv(i, tags.data.as_u16(), &mut template)));
            }
        }
        for i in 0..p {
            if i == me {
                continue;
            }
            let lo = plan.send_offsets()[i] * elem;
            let hi = plan.send_offsets()[i + 1] * elem;
            if hi > lo {
                batch.post_send(i, tags.data.as_u16(), lo..hi);
            }
        }

        // Self slice bypasses the transport.
        let s_lo = plan.send_offsets()[me];
        let s_hi = plan.send_offsets()[me + 1];
        let r_lo = plan.recv_offsets()[me];
        debug_assert_eq!(s_hi - s_lo, plan.recv_count(me), "self slice must be dual");
        for (k, j) in (s_lo..s_hi).enumerate() {
            out[r_lo + k] = self.data[plan.send_list()[j].to_usize()];
        }

        batch.start();
        for (i, h) in recv_handles {
            let got = h.wait().ok_or_else(|| DimmError::CommError {
                neighbor: i,
                reason: "gather returned no data".into(),
            })?;
            let lo = plan.recv_offsets()[i];
            let hi = plan.recv_offsets()[i + 1];
            if got.len() != (hi - lo) * elem {
                return Err(DimmError::BufferSizeMismatch {
                    neighbor: i,
                    expected: (hi - lo) * elem,
                    got: got.len(),
                });
            }
            cast_slice_mut(&mut out[lo..hi]).copy_from_slice(&got);
        }
        batch.wait()?;
        batch.free_reqs();
        Ok(())
    }

    /// Gather by wish-list: build the plan, invert it, run the gather.
    ///
    /// `out` receives the requested elements grouped by owner rank, in
    /// list order within each owner group.
    pub fn read_by_list<I: IndexInt, C: Communicator>(
        &self,
        list: &[I],
        out: &mut [T],
        comm: &C,
        tags: PlanCommTags,
    ) -> Result<(), DimmError> {
        let mut plan = CommPlan::with_ranks(comm.size());
        self.list_to_plan(list, &mut plan)?;
        self.build_send_plan(&mut plan, comm, tags)?;
        self.read(&plan, out, comm, tags)
    }

    /// Like [`Self::read`], but received elements replace local entries:
    /// element `k` from peer `i` lands at
    /// `data[recv_list[recv_offsets[i] + k]]`. Every outgoing payload is
    /// packed before the first local entry is overwritten.
    pub fn migrate<I: IndexInt, C: Communicator>(
        &mut self,
        plan: &CommPlan<I>,
        comm: &C,
        tags: PlanCommTags,
    ) -> Result<(), DimmError> {
        if plan.both_empty() {
            return Ok(());
        }
        let p = comm.size();
        let me = comm.rank();
        if plan.nprocs() != p {
            return Err(DimmError::RankCountMismatch {
                plan: plan.nprocs(),
                comm: p,
            });
        }
        let send_total = plan.send_offsets()[p];
        if plan.send_list().len() != send_total {
            return Err(DimmError::PlanSizeMismatch {
                side: "send",
                expected: send_total,
                got: plan.send_list().len(),
            });
        }
        let recv_total = plan.recv_offsets()[p];
        if plan.recv_list().len() != recv_total {
            return Err(DimmError::PlanSizeMismatch {
                side: "recv",
                expected: recv_total,
                got: plan.recv_list().len(),
            });
        }

        let elem = std::mem::size_of::<T>();
        let mut batch = PersistentBatch::new(comm);
        batch.resize::<T>(send_total);
        {
            let buf = batch.send_buf::<T>();
            for (j, &idx) in plan.send_list().iter().enumerate() {
                let k = idx.to_usize();
                buf[j] = *self.data.get(k).ok_or(DimmError::IndexOutOfBounds {
                    index: k,
                    len: self.data.len(),
                })?;
            }
        }

        let mut recv_handles = Vec::new();
        for i in 0..p {
            if i == me {
                continue;
            }
            let cnt = plan.recv_count(i);
            if cnt > 0 {
                let mut template = vec![0u8; cnt * elem];
                recv_handles.push((i, comm.irecv(i, tags.data.as_u16(), &mut template)));
            }
        }
        for i in 0..p {
            if i == me {
                continue;
            }
            let lo = plan.send_offsets()[i] * elem;
            let hi = plan.send_offsets()[i + 1] * elem;
            if hi > lo {
                batch.post_send(i, tags.data.as_u16(), lo..hi);
            }
        }
        batch.start();

        // Self slice scatters out of the packed buffer, never live data.
        let s_lo = plan.send_offsets()[me];
        let s_hi = plan.send_offsets()[me + 1];
        let r_lo = plan.recv_offsets()[me];
        debug_assert_eq!(s_hi - s_lo, plan.recv_count(me), "self slice must be dual");
        for (k, j) in (s_lo..s_hi).enumerate() {
            let dst = plan.recv_list()[r_lo + k].to_usize();
            let v = batch.send_buf::<T>()[j];
            *self.data.get_mut(dst).ok_or(DimmError::IndexOutOfBounds {
                index: dst,
                len: self.map.len(),
            })? = v;
        }

        for (i, h) in recv_handles {
            let got = h.wait().ok_or_else(|| DimmError::CommError {
                neighbor: i,
                reason: "migrate returned no data".into(),
            })?;
            let lo = plan.recv_offsets()[i];
            let hi = plan.recv_offsets()[i + 1];
            if got.len() != (hi - lo) * elem {
                return Err(DimmError::BufferSizeMismatch {
                    neighbor: i,
                    expected: (hi - lo) * elem,
                    got: got.len(),
                });
            }
            let incoming = cast_slice_from::<T>(&got);
            for (k, &v) in incoming.iter().enumerate() {
                let dst = plan.recv_list()[lo + k].to_usize();
                *self.data.get_mut(dst).ok_or(DimmError::IndexOutOfBounds {
                    index: dst,
                    len: self.map.len(),
                })? = v;
            }
        }
        batch.wait()?;
        batch.free_reqs();
        Ok(())
    }
}

impl<T: Pod> Index<usize> for DistributedDirectory<T> {
    type Output = T;

    #[inline]
    fn index(&self, local: usize) -> &T {
        &self.data[local]
    }
}

impl<T: Pod> IndexMut<usize> for DistributedDirectory<T> {
    #[inline]
    fn index_mut(&mut self, local: usize) -> &mut T {
        &mut self.data[local]
    }
}
