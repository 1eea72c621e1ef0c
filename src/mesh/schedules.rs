//! Face-to-cell exchange schedules built from raw connectivity.
//!
//! Given the local slice of face left/right cells, build the plan whose
//! send side enumerates the local faces that must be shipped to the rank
//! owning each touching cell, then invert it so every rank's receive side
//! names exactly the faces touching cells it owns.

use crate::comm::{Communicator, PlanCommTags};
use crate::dd::directory::DistributedDirectory;
use crate::dd::plan::CommPlan;
use crate::dd::round_robin::RoundRobinMap;
use crate::dd::IndexInt;
use crate::error::DimmError;
use crate::mesh::entities::FaceLr;

/// Build the face send plan from the local faceLR slice and invert it.
///
/// Pass 1 counts, per destination rank, the local faces whose left cell
/// (and, for internal faces, right cell) lives on a remote rank. Pass 2
/// fills the send list with global face ids in enumeration order, left
/// entry before right. A face whose two owners are the same remote rank is
/// inserted twice; every owning rank needs its own copy and deduplication
/// is not required downstream. Boundary faces contribute the left side
/// only.
pub fn face_plan_from_lr<I: IndexInt, C: Communicator>(
    face_lr: &DistributedDirectory<FaceLr<I>>,
    cell_map: &RoundRobinMap,
    n_internal_faces: usize,
    plan: &mut CommPlan<I>,
    comm: &C,
    tags: PlanCommTags,
) -> Result<(), DimmError> {
    let me = comm.rank();
    let p = comm.size();
    let face_start = face_lr.start();
    plan.resize(p);
    plan.clear_list();

    // Pass 1: sizes.
    for (i, lr) in face_lr.as_slice().iter().enumerate() {
        let left = cell_map.pid(lr.left.to_usize());
        if left != me {
            plan.send_offsets_mut()[left + 1] += 1;
        }
        if face_start + i < n_internal_faces {
            let right = cell_map.pid(lr.right.to_usize());
            if right != me {
                plan.send_offsets_mut()[right + 1] += 1;
            }
        }
    }
    {
        let offs = plan.send_offsets_mut();
        for i in 0..p {
            offs[i + 1] += offs[i];
        }
    }
    let total = plan.send_offsets()[p];
    plan.send_list_mut().resize(total, I::zero());

    // Pass 2: fill, tracking a rolling cursor per destination.
    let mut cursor: Vec<usize> = plan.send_offsets()[..p].to_vec();
    for (i, lr) in face_lr.as_slice().iter().enumerate() {
        let gid = I::from_usize(face_start + i);
        let left = cell_map.pid(lr.left.to_usize());
        if left != me {
            plan.send_list_mut()[cursor[left]] = gid;
            cursor[left] += 1;
        }
        if face_start + i < n_internal_faces {
            let right = cell_map.pid(lr.right.to_usize());
            if right != me {
                plan.send_list_mut()[cursor[right]] = gid;
                cursor[right] += 1;
            }
        }
    }
    for i in 0..p {
        debug_assert_eq!(cursor[i], plan.send_offsets()[i + 1], "cursor overran peer {i}");
    }
    let counts: Vec<usize> = (0..p).map(|i| plan.send_count(i)).collect();
    for (i, &c) in counts.iter().enumerate() {
        plan.send_procs_mut()[i] = if c > 0 { i as i32 } else { -1 };
    }

    // Invert: every rank learns which faces it will receive.
    face_lr.build_recv_plan(plan, comm, tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::{CommTag, NoComm};

    #[test]
    fn single_rank_keeps_everything_local() {
        let comm = NoComm;
        let mut face_lr = DistributedDirectory::<FaceLr<u32>>::new(3, &comm);
        face_lr.as_mut_slice().copy_from_slice(&[
            FaceLr { left: 0, right: 1 },
            FaceLr { left: 1, right: 2 },
            FaceLr { left: 2, right: 0 },
        ]);
        let cell_map = RoundRobinMap::with_rank(3, 0, 1);
        let mut plan = CommPlan::with_ranks(1);
        face_plan_from_lr(
            &face_lr,
            &cell_map,
            3,
            &mut plan,
            &comm,
            PlanCommTags::from_base(CommTag::new(0x2300)),
        )
        .unwrap();
        // Every owner is this rank; nothing crosses the wire.
        assert!(plan.both_empty());
    }
}
