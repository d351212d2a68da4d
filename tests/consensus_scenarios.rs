//! End-to-end scenarios spanning the DAG/PHANTOM orderer, exercising
//! multi-component behavior that a single module's unit tests can't cover
//! on their own.

use timelock_consensus::block::BlockHeader;
use timelock_consensus::dag::{PhantomDag, ReorgPlan};

fn header(parents: Vec<[u8; 32]>, height: u64, nonce: u64) -> BlockHeader {
    BlockHeader {
        version: 1,
        timestamp_ms: height as i64,
        height,
        parent_hashes: parents,
        vdf_output: [height as u8; 32],
        vdf_iterations: if height == 0 { 0 } else { 1 },
        heartbeat_root: [0u8; 32],
        tx_root: [0u8; 32],
        state_root: [0u8; 32],
        producer_id: [0u8; 32],
        nonce,
    }
}

/// Five blocks A,B,C,D,E: B and C both extend A, D extends both B and C, E
/// extends A only. With k=1, E's anticone contains both B and C (both
/// blue), so E is red; B, C, and D stay blue; the main chain includes
/// exactly one of B/C.
#[test]
fn phantom_blue_red_five_block_diamond() {
    let dag = PhantomDag::new(1);

    let a = header(vec![], 0, 0);
    let a_hash = a.hash();
    assert_eq!(dag.add_block(a, 0).unwrap(), timelock_consensus::dag::InsertOutcome::Accepted { hash: a_hash, blue: true });

    let b = header(vec![a_hash], 1, 1);
    let b_hash = b.hash();
    dag.add_block(b, 1).unwrap();

    let c = header(vec![a_hash], 1, 2);
    let c_hash = c.hash();
    dag.add_block(c, 2).unwrap();

    let e = header(vec![a_hash], 1, 3);
    let e_hash = e.hash();
    dag.add_block(e, 3).unwrap();

    let d = header(vec![b_hash, c_hash], 2, 4);
    let d_hash = d.hash();
    dag.add_block(d, 4).unwrap();

    assert!(dag.get(&b_hash).unwrap().is_blue);
    assert!(dag.get(&c_hash).unwrap().is_blue);
    assert!(dag.get(&d_hash).unwrap().is_blue);
    assert!(!dag.get(&e_hash).unwrap().is_blue, "E's anticone has 2 blue blocks (B,C), exceeding k=1");

    let main_chain = dag.main_chain();
    let on_chain = main_chain.contains(&b_hash) as u8 + main_chain.contains(&c_hash) as u8;
    assert_eq!(on_chain, 1, "main chain should include exactly one of B/C");
    assert!(main_chain.contains(&d_hash));

    // B and C have identical vdf_weight and blue_score (both extend A with
    // vdf_iterations=1), so the tie must break on lexicographically-smallest
    // hash, not on HashSet iteration order. Assert the winner matches that
    // rule and that repeated calls agree, per the "same DAG -> identical
    // main chain" determinism requirement.
    let expected_winner = if b_hash < c_hash { b_hash } else { c_hash };
    assert!(main_chain.contains(&expected_winner), "tie-break must pick the lexicographically-smallest hash");
    assert_eq!(dag.main_chain(), main_chain, "main_chain must be deterministic across repeated calls");
}

/// After a block crosses into IRREVERSIBLE, a competing sibling of an
/// ancestor it depends on can never become the new tip: `compute_reorg`
/// must refuse rather than silently disconnecting it.
#[test]
fn reorg_refused_when_disconnecting_irreversible_block() {
    let dag = PhantomDag::new(8);

    let genesis = header(vec![], 0, 0);
    let genesis_hash = genesis.hash();
    dag.add_block(genesis, 0).unwrap();

    let b1 = header(vec![genesis_hash], 1, 1);
    let b1_hash = b1.hash();
    dag.add_block(b1, 1).unwrap();
    dag.mark_irreversible(b1_hash);

    let sibling = header(vec![genesis_hash], 1, 2);
    let sibling_hash = sibling.hash();
    dag.add_block(sibling, 2).unwrap();

    match dag.compute_reorg(&b1_hash, &sibling_hash) {
        ReorgPlan::RefusedIrreversible { offending_block } => assert_eq!(offending_block, b1_hash),
        other => panic!("expected reorg to be refused on an irreversible block, got {other:?}"),
    }
    assert!(!dag.can_reorg(&b1_hash, &sibling_hash));
}
