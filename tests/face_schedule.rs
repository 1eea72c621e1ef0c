//! Face-to-cell exchange schedules built from connectivity.

use dimm::comm::{CommTag, Communicator, PlanCommTags, RayonComm};
use dimm::dd::directory::DistributedDirectory;
use dimm::dd::plan::CommPlan;
use dimm::dd::round_robin::RoundRobinMap;
use dimm::mesh::entities::FaceLr;
use dimm::mesh::schedules::face_plan_from_lr;

fn run_ranks<T, F>(p: usize, f: F) -> Vec<T>
where
    T: Send + 'static,
    F: Fn(RayonComm) -> T + Send + Sync + Clone + 'static,
{
    let handles: Vec<_> = (0..p)
        .map(|r| {
            let f = f.clone();
            std::thread::spawn(move || f(RayonComm::new(r, p)))
        })
        .collect();
    handles.into_iter().map(|h| h.join().unwrap()).collect()
}

fn lr(left: u32, right: u32) -> FaceLr<u32> {
    FaceLr { left, right }
}

/// Four cells over two ranks (0,1 on rank 0; 2,3 on rank 1); one internal
/// face (left=1, right=2) owned by rank 0. The face must appear in exactly
/// one peer slice and arrive at rank 1 exactly once.
#[test]
fn internal_face_crosses_once() {
    let tags = PlanCommTags::from_base(CommTag::new(0x3200));
    let out = run_ranks(2, move |comm| {
        let mut face_lr = DistributedDirectory::<FaceLr<u32>>::new(1, &comm);
        if comm.rank() == 0 {
            face_lr.as_mut_slice()[0] = lr(1, 2);
        }
        let cell_map = RoundRobinMap::new(4, &comm);
        let mut plan = CommPlan::with_ranks(2);
        face_plan_from_lr(&face_lr, &cell_map, 1, &mut plan, &comm, tags).unwrap();
        plan
    });

    // Rank 0: the left owner is local, the right owner is rank 1.
    assert_eq!(out[0].send_offsets(), &[0, 0, 1]);
    assert_eq!(out[0].send_list(), &[0], "global face id 0");
    assert_eq!(out[0].recv_offsets(), &[0, 0, 0]);
    // Rank 1 receives that face id exactly once.
    assert_eq!(out[1].recv_offsets(), &[0, 1, 1]);
    assert_eq!(out[1].recv_list(), &[0]);
    assert!(out[1].send_list().is_empty());
}

/// Both owners on the same remote rank: the face is inserted twice, by
/// stated policy, and both copies arrive.
#[test]
fn both_owners_remote_duplicates() {
    let tags = PlanCommTags::from_base(CommTag::new(0x3210));
    let out = run_ranks(2, move |comm| {
        let mut face_lr = DistributedDirectory::<FaceLr<u32>>::new(1, &comm);
        if comm.rank() == 0 {
            face_lr.as_mut_slice()[0] = lr(2, 3);
        }
        let cell_map = RoundRobinMap::new(4, &comm);
        let mut plan = CommPlan::with_ranks(2);
        face_plan_from_lr(&face_lr, &cell_map, 1, &mut plan, &comm, tags).unwrap();
        plan
    });
    assert_eq!(out[0].send_list(), &[0, 0]);
    assert_eq!(out[1].recv_list(), &[0, 0]);
}

/// All faces on the boundary: right cells are sentinels and only left
/// owners are consulted.
#[test]
fn all_boundary_ships_left_side_only() {
    let tags = PlanCommTags::from_base(CommTag::new(0x3220));
    let out = run_ranks(2, move |comm| {
        let mut face_lr = DistributedDirectory::<FaceLr<u32>>::new(4, &comm);
        let start = face_lr.start();
        for (i, slot) in face_lr.as_mut_slice().iter_mut().enumerate() {
            // Every left cell lives on the other rank; every right is the
            // sentinel.
            *slot = lr(((start + i + 2) % 4) as u32, 0);
        }
        let cell_map = RoundRobinMap::new(4, &comm);
        let mut plan = CommPlan::with_ranks(2);
        // nInternalFaces = 0: no right side anywhere.
        face_plan_from_lr(&face_lr, &cell_map, 0, &mut plan, &comm, tags).unwrap();
        plan
    });
    // Both of each rank's faces point at remote left cells; both cross,
    // and only once each (no right side exists).
    for (r, plan) in out.iter().enumerate() {
        let total = plan.send_offsets()[2];
        assert_eq!(total, 2, "rank {r} ships both boundary faces");
        assert_eq!(plan.recv_offsets()[2], 2, "rank {r} receives both");
    }
}

/// Every face with a remote owner appears exactly once per remote owner.
#[test]
fn remote_faces_counted_exactly_once() {
    let tags = PlanCommTags::from_base(CommTag::new(0x3230));
    let p = 3usize;
    let n_face = 9usize;
    let n_cell = 9usize;
    let out = run_ranks(p, move |comm| {
        let mut face_lr = DistributedDirectory::<FaceLr<u32>>::new(n_face, &comm);
        let start = face_lr.start();
        for (i, slot) in face_lr.as_mut_slice().iter_mut().enumerate() {
            let g = (start + i) as u32;
            *slot = lr(g % n_cell as u32, (g * 4 + 1) % n_cell as u32);
        }
        let cell_map = RoundRobinMap::new(n_cell, &comm);
        let mut plan = CommPlan::with_ranks(p);
        face_plan_from_lr(&face_lr, &cell_map, n_face, &mut plan, &comm, tags).unwrap();
        (comm.rank(), face_lr.as_slice().to_vec(), face_lr.start(), plan)
    });

    // Rebuild the expectation globally: face g must reach the owner of
    // its left and right cells (when remote to the face holder).
    let cell_map = RoundRobinMap::with_rank(n_cell, 0, p);
    let face_map = RoundRobinMap::with_rank(n_face, 0, p);
    for (holder, lrs, start, plan) in &out {
        for (i, pair) in lrs.iter().enumerate() {
            let g = (start + i) as u32;
            for owner in [
                cell_map.pid(pair.left as usize),
                cell_map.pid(pair.right as usize),
            ] {
                if owner == *holder {
                    continue;
                }
                let lo = plan.send_offsets()[owner];
                let hi = plan.send_offsets()[owner + 1];
                let copies = plan.send_list()[lo..hi].iter().filter(|&&x| x == g).count();
                assert!(copies >= 1, "face {g} missing for owner {owner}");
            }
        }
        // And the receive side names only faces this rank's cells touch.
        for (peer, ids) in (0..p).map(|peer| {
            (
                peer,
                &plan.recv_list()[plan.recv_offsets()[peer]..plan.recv_offsets()[peer + 1]],
            )
        }) {
            for &g in ids {
                assert_eq!(face_map.pid(g as usize), peer, "received from its holder");
            }
        }
    }
}
