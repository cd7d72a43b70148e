use criterion::{criterion_group, criterion_main, Criterion};
use ledger_core::{
    hash_block,
    pow::{proof_of_work, valid_proof},
    Block, Transaction,
};
use rand::{rngs::StdRng, Rng, SeedableRng};
use std::hint::black_box;

fn bench_pow(c: &mut Criterion) {
    c.bench_function("proof_of_work_from_genesis", |b| {
        b.iter(|| proof_of_work(black_box(1)));
    });

    c.bench_function("valid_proof", |b| {
        b.iter(|| valid_proof(black_box(12_370), black_box(162_897)));
    });
}

fn bench_hash(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(42);
    let transactions: Vec<Transaction> = (0..100)
        .map(|i| Transaction {
            id: i,
            block_id: 2,
            sender: format!("alice-{i}"),
            receiver: "bob".into(),
            amount: rng.gen_range(1..10),
            timestamp: 1_600_000_000 + i,
        })
        .collect();
    let block = Block {
        id: 2,
        previous_hash: "0".repeat(64),
        proof: 12_370,
        transactions,
        timestamp: 1_600_000_200,
    };

    c.bench_function("hash_block_100_txs", |b| {
        b.iter(|| hash_block(black_box(&block)));
    });
}

criterion_group!(benches, bench_pow, bench_hash);
criterion_main!(benches);
