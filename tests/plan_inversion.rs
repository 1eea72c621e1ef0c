//! Multi-rank schedule inversion over the mailbox communicator, one thread
//! per rank.

use dimm::comm::{CommTag, Communicator, PlanCommTags, RayonComm};
use dimm::dd::directory::DistributedDirectory;
use dimm::dd::plan::CommPlan;

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

#[test]
fn three_rank_inversion() {
    let tags = PlanCommTags::from_base(CommTag::new(0x3000));
    // Global range 0..9 over 3 ranks: rank r owns [3r, 3r+3).
    let out = run_ranks(3, move |comm| {
        let dd = DistributedDirectory::<u64>::new(9, &comm);
        let mut plan = CommPlan::<u32>::with_ranks(3);
        if comm.rank() == 0 {
            // Ask rank 1 for three elements and rank 2 for one.
            dd.list_to_plan(&[3u32, 4, 5, 6], &mut plan).unwrap();
        }
        dd.build_send_plan(&mut plan, &comm, tags).unwrap();
        plan
    });

    // Rank 0 sends nothing and expects 3 + 1 elements.
    assert_eq!(out[0].send_offsets(), &[0, 0, 0, 0]);
    assert_eq!(out[0].recv_offsets(), &[0, 0, 3, 4]);
    assert_eq!(out[0].recv_list(), &[0, 1, 2, 0]);
    // Rank 1 must ship three owner-local elements to rank 0.
    assert_eq!(out[1].send_offsets(), &[0, 3, 3, 3]);
    assert_eq!(out[1].send_list(), &[0, 1, 2]);
    // Rank 2 ships one.
    assert_eq!(out[2].send_offsets(), &[0, 1, 1, 1]);
    assert_eq!(out[2].send_list(), &[0]);
}

#[test]
fn inversion_is_involutive() {
    let tags = PlanCommTags::from_base(CommTag::new(0x3010));
    let ok = run_ranks(3, move |comm| {
        let dd = DistributedDirectory::<u64>::new(12, &comm);
        // Every rank wants the element after its own slice (wrapping).
        let me = comm.rank();
        let want = [(dd.map().end() % 12) as u32, (me as u32 * 4 + 1) % 12];
        let mut plan = CommPlan::<u32>::with_ranks(3);
        dd.list_to_plan(&want, &mut plan).unwrap();
        dd.build_send_plan(&mut plan, &comm, tags).unwrap();

        // buildSendPlan . buildRecvPlan . swap must restore the plan
        // bit-for-bit (on its swapped image).
        let mut probe = plan.clone();
        probe.swap();
        let expect = probe.clone();
        dd.build_recv_plan(&mut probe, &comm, tags).unwrap();
        dd.build_send_plan(&mut probe, &comm, tags).unwrap();
        probe == expect
    });
    assert!(ok.iter().all(|&b| b), "per-rank involution: {ok:?}");
}

#[test]
fn all_to_all_full_is_symmetric() {
    let tags = PlanCommTags::from_base(CommTag::new(0x3020));
    let p = 4usize;
    let out = run_ranks(p, move |comm| {
        let dd = DistributedDirectory::<u64>::new(4 * p, &comm);
        // Two elements from every peer (and self).
        let mut want = Vec::new();
        for peer in 0..p {
            want.push((dd.map().start_of(peer)) as u32);
            want.push((dd.map().start_of(peer) + 1) as u32);
        }
        let mut plan = CommPlan::<u32>::with_ranks(p);
        dd.list_to_plan(&want, &mut plan).unwrap();
        dd.build_send_plan(&mut plan, &comm, tags).unwrap();
        plan
    });
    for (r, plan) in out.iter().enumerate() {
        for peer in 0..p {
            assert_eq!(plan.recv_count(peer), 2, "rank {r} recv from {peer}");
            assert_eq!(plan.send_count(peer), 2, "rank {r} send to {peer}");
            // Dual invariant: my send count to j equals j's recv count
            // from me.
            assert_eq!(plan.send_count(peer), out[peer].recv_count(r));
        }
    }
}

#[test]
fn single_nonempty_peer_slot() {
    let tags = PlanCommTags::from_base(CommTag::new(0x3030));
    let out = run_ranks(3, move |comm| {
        let dd = DistributedDirectory::<u64>::new(9, &comm);
        let mut plan = CommPlan::<u32>::with_ranks(3);
        if comm.rank() == 2 {
            dd.list_to_plan(&[0u32], &mut plan).unwrap();
        }
        dd.build_send_plan(&mut plan, &comm, tags).unwrap();
        plan
    });
    assert_eq!(out[0].send_offsets(), &[0, 0, 0, 1]);
    assert_eq!(out[0].send_list(), &[0]);
    assert!(out[1].both_empty());
    assert_eq!(out[2].recv_offsets(), &[0, 1, 1, 1]);
}
