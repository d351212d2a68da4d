//! Benchmarks for the consensus kernel's CPU-bound hot paths: the VDF
//! sequential hash chain and PHANTOM DAG insertion/ordering.
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use timelock_consensus::block::BlockHeader;
use timelock_consensus::constants::vdf::CHECKPOINT_INTERVAL;
use timelock_consensus::dag::PhantomDag;
use timelock_consensus::vdf;

fn bench_vdf_compute(c: &mut Criterion) {
    let seed = [7u8; 32];
    c.bench_function("vdf_compute_one_checkpoint_interval", |b| {
        b.iter(|| vdf::compute(black_box(seed), black_box(CHECKPOINT_INTERVAL)).unwrap())
    });
}

fn bench_vdf_verify_sampled(c: &mut Criterion) {
    let seed = [7u8; 32];
    let output = vdf::compute(seed, CHECKPOINT_INTERVAL * 8).unwrap();
    c.bench_function("vdf_verify_sampled_5_segments", |b| {
        b.iter(|| vdf::verify_sampled(black_box(&output), black_box(5)))
    });
}

fn genesis_header() -> BlockHeader {
    BlockHeader {
        version: 1,
        timestamp_ms: 0,
        height: 0,
        parent_hashes: vec![],
        vdf_output: [0u8; 32],
        vdf_iterations: 0,
        heartbeat_root: [0u8; 32],
        tx_root: [0u8; 32],
        state_root: [0u8; 32],
        producer_id: [0u8; 32],
        nonce: 0,
    }
}

fn child_header(parent: &BlockHeader, parent_hash: [u8; 32], height: u64, nonce: u64) -> BlockHeader {
    BlockHeader {
        version: 1,
        timestamp_ms: height as i64,
        height,
        parent_hashes: vec![parent_hash],
        vdf_output: vdf::compute(parent.vdf_output, CHECKPOINT_INTERVAL).unwrap().output,
        vdf_iterations: CHECKPOINT_INTERVAL,
        heartbeat_root: [0u8; 32],
        tx_root: [0u8; 32],
        state_root: [0u8; 32],
        producer_id: [height as u8; 32],
        nonce,
    }
}

fn bench_dag_linear_chain_insertion(c: &mut Criterion) {
    c.bench_function("dag_insert_linear_chain_of_100", |b| {
        b.iter(|| {
            let dag = PhantomDag::new(8);
            let genesis = genesis_header();
            let genesis_hash = genesis.hash();
            dag.add_block(genesis.clone(), 0).unwrap();

            let mut parent = genesis;
            let mut parent_hash = genesis_hash;
            for height in 1..100u64 {
                let header = child_header(&parent, parent_hash, height, 0);
                parent_hash = header.hash();
                dag.add_block(header.clone(), height as i64).unwrap();
                parent = header;
            }
            black_box(dag.main_chain())
        })
    });
}

fn bench_dag_ordered_blocks(c: &mut Criterion) {
    let dag = PhantomDag::new(8);
    let genesis = genesis_header();
    let genesis_hash = genesis.hash();
    dag.add_block(genesis.clone(), 0).unwrap();

    let mut parent = genesis;
    let mut parent_hash = genesis_hash;
    for height in 1..200u64 {
        let header = child_header(&parent, parent_hash, height, 0);
        parent_hash = header.hash();
        dag.add_block(header.clone(), height as i64).unwrap();
        parent = header;
    }

    c.bench_function("dag_ordered_blocks_200_chain", |b| {
        b.iter(|| black_box(dag.ordered_blocks()))
    });
}

criterion_group!(
    benches,
    bench_vdf_compute,
    bench_vdf_verify_sampled,
    bench_dag_linear_chain_insertion,
    bench_dag_ordered_blocks,
);
criterion_main!(benches);
