//! Criterion benchmarks for sluice-core critical operations.
//!
//! Covers: Ed25519 sign/verify, single-transaction validation, and the two
//! batch commit policies on a batch with conflicts and chains.

use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};

use sluice_core::constants::COIN;
use sluice_core::crypto::{KeyPair, sign_transaction_input};
use sluice_core::handler::GreedyCommitter;
use sluice_core::selector::MaxFeeSelector;
use sluice_core::types::{Hash256, OutPoint, Transaction, TxOutput};
use sluice_core::utxo_pool::UtxoPool;
use sluice_core::validation::Validator;

fn seed(i: u8) -> OutPoint {
    OutPoint::new(Hash256([i; 32]), 0)
}

fn spend(kp: &KeyPair, from: &[OutPoint], outputs: &[i64]) -> Transaction {
    let mut tx = Transaction::new();
    for op in from {
        tx.add_input(op.txid, op.index);
    }
    for v in outputs {
        tx.add_output(*v, kp.public_key());
    }
    for i in 0..from.len() {
        sign_transaction_input(&mut tx, i, kp).expect("input in range");
    }
    tx.finalize();
    tx
}

fn sample_pool(kp: &KeyPair, n: u8) -> UtxoPool {
    (1..=n)
        .map(|i| (seed(i), TxOutput::new(10 * COIN, kp.public_key())))
        .collect()
}

/// Twelve transactions over six seed UTXOs: conflicting pairs, a
/// two-input spend, and chains that consume earlier outputs.
fn conflicting_batch(kp: &KeyPair) -> Vec<Transaction> {
    let mut batch = Vec::new();
    for i in 1..=4u8 {
        batch.push(spend(kp, &[seed(i)], &[9 * COIN]));
        batch.push(spend(kp, &[seed(i)], &[(8 - i64::from(i % 2)) * COIN]));
    }
    let wide = spend(kp, &[seed(5), seed(6)], &[17 * COIN]);
    let parent = spend(kp, &[seed(6)], &[9 * COIN]);
    let child = spend(kp, &[OutPoint::new(parent.hash().expect("finalized"), 0)], &[6 * COIN]);
    let lone = spend(kp, &[seed(5)], &[8 * COIN]);
    batch.extend([child, wide, parent, lone]);
    batch
}

fn bench_ed25519(c: &mut Criterion) {
    let keypair = KeyPair::from_secret_bytes([42u8; 32]);
    let message = [0x5Au8; 72];
    let signature = keypair.sign(&message);
    let pubkey = keypair.public_key();

    c.bench_function("ed25519_sign", |b| {
        b.iter(|| keypair.sign(black_box(&message)))
    });

    c.bench_function("ed25519_verify", |b| {
        b.iter(|| pubkey.verify(black_box(&message), black_box(&signature)))
    });
}

fn bench_validate(c: &mut Criterion) {
    let kp = KeyPair::from_secret_bytes([1u8; 32]);
    let pool = sample_pool(&kp, 2);
    let tx = spend(&kp, &[seed(1), seed(2)], &[12 * COIN, 7 * COIN]);
    let validator = Validator::new();

    c.bench_function("validate_two_inputs", |b| {
        b.iter(|| validator.validate(black_box(&pool), black_box(&tx)))
    });
}

fn bench_commit_policies(c: &mut Criterion) {
    let kp = KeyPair::from_secret_bytes([2u8; 32]);
    let pool = sample_pool(&kp, 6);
    let batch = conflicting_batch(&kp);
    let greedy = GreedyCommitter::new();
    let selector = MaxFeeSelector::new();

    c.bench_function("commit_greedy_12_txs", |b| {
        b.iter_batched(
            || pool.clone(),
            |mut p| greedy.commit(&mut p, black_box(&batch)),
            BatchSize::SmallInput,
        )
    });

    c.bench_function("commit_max_fee_12_txs", |b| {
        b.iter_batched(
            || pool.clone(),
            |mut p| selector.commit(&mut p, black_box(&batch)),
            BatchSize::SmallInput,
        )
    });
}

criterion_group!(benches, bench_ed25519, bench_validate, bench_commit_policies);
criterion_main!(benches);
