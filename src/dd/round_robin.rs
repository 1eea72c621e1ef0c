//! Round-robin distribution of a global index range across ranks.
//!
//! For `N` entities over `P` ranks, every rank owns either `q = N / P` or
//! `q + 1` consecutive global indices; the `N % P` residue goes to the
//! lowest-numbered ranks. All ownership queries are O(1) arithmetic on the
//! precomputed threshold `residue * (q + 1)`. Intervals are half-open.

use crate::comm::Communicator;

/// Bijection between a global index in `[0, N)` and `(rank, local index)`.
#[derive(Clone, Debug)]
pub struct RoundRobinMap {
    global_size: usize,
    per_proc: usize,
    residue: usize,
    threshold: usize,
    rank: usize,
    nprocs: usize,
    start: usize,
    end: usize,
}

impl RoundRobinMap {
    /// Build the map for this rank of `comm`.
    pub fn new<C: Communicator>(global_size: usize, comm: &C) -> Self {
        Self::with_rank(global_size, comm.rank(), comm.size())
    }

    /// Build the map for an explicit `(rank, nprocs)` pair.
    pub fn with_rank(global_size: usize, rank: usize, nprocs: usize) -> Self {
        assert!(nprocs >= 1, "round-robin map needs at least one rank");
        assert!(rank < nprocs, "rank {rank} out of range for {nprocs} ranks");
        let per_proc = global_size / nprocs;
        let residue = global_size % nprocs;
        let threshold = residue * (per_proc + 1);
        let start = if rank < residue {
            rank * (per_proc + 1)
        } else {
            threshold + (rank - residue) * per_proc
        };
        let mut end = start + per_proc;
        if rank < residue {
            end += 1;
        }
        Self {
            global_size,
            per_proc,
            residue,
            threshold,
            rank,
            nprocs,
            start,
            end,
        }
    }

    /// Rank owning global index `id`.
    #[inline]
    pub fn pid(&self, id: usize) -> usize {
        debug_assert!(id < self.global_size, "id {id} out of global range");
        if id < self.threshold {
            id / (self.per_proc + 1)
        } else {
            (id - self.threshold) / self.per_proc + self.residue
        }
    }

    /// True iff `id` falls in this rank's slice.
    #[inline]
    pub fn in_dist(&self, id: usize) -> bool {
        id >= self.start && id < self.end
    }

    /// First global index owned by this rank.
    #[inline]
    pub fn start(&self) -> usize {
        self.start
    }

    /// One past the last global index owned by this rank.
    #[inline]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Number of entities owned by this rank.
    #[inline]
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// True iff this rank owns nothing.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// First global index owned by `proc`.
    #[inline]
    pub fn start_of(&self, proc: usize) -> usize {
        if proc < self.residue {
            proc * (self.per_proc + 1)
        } else {
            self.threshold + (proc - self.residue) * self.per_proc
        }
    }

    /// One past the last global index owned by `proc`.
    #[inline]
    pub fn end_of(&self, proc: usize) -> usize {
        if proc < self.residue {
            (proc + 1) * (self.per_proc + 1)
        } else {
            self.threshold + (proc - self.residue + 1) * self.per_proc
        }
    }

    /// Number of entities owned by `proc`.
    #[inline]
    pub fn size_of(&self, proc: usize) -> usize {
        if proc < self.residue {
            self.per_proc + 1
        } else {
            self.per_proc
        }
    }

    /// First global index of the slice containing `id`.
    #[inline]
    pub fn start_gid(&self, id: usize) -> usize {
        if id < self.threshold {
            (id / (self.per_proc + 1)) * (self.per_proc + 1)
        } else {
            ((id - self.threshold) / self.per_proc) * self.per_proc + self.threshold
        }
    }

    /// One past the last global index of the slice containing `id`.
    #[inline]
    pub fn end_gid(&self, id: usize) -> usize {
        if id < self.threshold {
            (id / (self.per_proc + 1) + 1) * (self.per_proc + 1)
        } else {
            ((id - self.threshold) / self.per_proc + 1) * self.per_proc + self.threshold
        }
    }

    /// Total number of entities across all ranks.
    #[inline]
    pub fn global_len(&self) -> usize {
        self.global_size
    }

    /// This rank's index in the group.
    #[inline]
    pub fn rank(&self) -> usize {
        self.rank
    }

    /// Number of ranks in the group.
    #[inline]
    pub fn nprocs(&self) -> usize {
        self.nprocs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ten_over_four() {
        let maps: Vec<_> = (0..4).map(|r| RoundRobinMap::with_rank(10, r, 4)).collect();
        assert_eq!(
            maps.iter().map(|m| m.len()).collect::<Vec<_>>(),
            vec![3, 3, 2, 2]
        );
        assert_eq!(
            maps.iter().map(|m| m.start()).collect::<Vec<_>>(),
            vec![0, 3, 6, 8]
        );
        let m = &maps[0];
        assert_eq!(m.pid(0), 0);
        assert_eq!(m.pid(7), 2);
        assert_eq!(m.pid(8), 3);
    }

    #[test]
    fn covers_every_id_exactly_once() {
        for n in [0usize, 1, 5, 7, 64, 65, 100] {
            for p in [1usize, 2, 3, 7, 64] {
                let m = RoundRobinMap::with_rank(n, 0, p);
                let total: usize = (0..p).map(|r| m.size_of(r)).sum();
                assert_eq!(total, n, "N={n} P={p}");
                for r in 0..p {
                    assert_eq!(m.end_of(r) - m.start_of(r), m.size_of(r));
                    for k in 0..m.size_of(r) {
                        assert_eq!(m.pid(m.start_of(r) + k), r, "N={n} P={p} r={r} k={k}");
                    }
                }
            }
        }
    }

    #[test]
    fn empty_global_range() {
        let m = RoundRobinMap::with_rank(0, 0, 4);
        assert_eq!(m.len(), 0);
        assert!(m.is_empty());
        assert_eq!(m.global_len(), 0);
        for r in 0..4 {
            assert_eq!(m.size_of(r), 0);
        }
    }

    #[test]
    fn fewer_entities_than_ranks() {
        let maps: Vec<_> = (0..4).map(|r| RoundRobinMap::with_rank(2, r, 4)).collect();
        assert_eq!(
            maps.iter().map(|m| m.len()).collect::<Vec<_>>(),
            vec![1, 1, 0, 0]
        );
        assert_eq!(maps[0].pid(1), 1);
    }

    #[test]
    fn gid_bounds_match_owner_slice() {
        let m = RoundRobinMap::with_rank(11, 0, 3);
        for id in 0..11 {
            let owner = m.pid(id);
            assert_eq!(m.start_gid(id), m.start_of(owner));
            assert_eq!(m.end_gid(id), m.end_of(owner));
        }
    }

    #[test]
    fn membership_is_half_open() {
        let m = RoundRobinMap::with_rank(10, 1, 4);
        assert!(!m.in_dist(2));
        assert!(m.in_dist(3));
        assert!(m.in_dist(5));
        assert!(!m.in_dist(6));
    }
}
