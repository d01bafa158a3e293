//! Shared test helpers for integration and property tests.

use sluice_core::constants::COIN;
use sluice_core::crypto::{KeyPair, PublicKey, sign_transaction_input};
use sluice_core::handler::GreedyCommitter;
use sluice_core::types::{Hash256, OutPoint, Transaction, TxOutput};
use sluice_core::utxo_pool::UtxoPool;

/// Deterministic keypair from a seed byte.
pub fn keypair(seed: u8) -> KeyPair {
    KeyPair::from_secret_bytes([seed; 32])
}

/// Outpoint of a pre-existing (seed) UTXO.
pub fn seed_outpoint(n: u8) -> OutPoint {
    OutPoint::new(Hash256([n; 32]), 0)
}

/// Build, sign (every input with `kp`) and finalize a transaction.
pub fn make_signed_tx(kp: &KeyPair, inputs: &[OutPoint], outputs: &[(i64, PublicKey)]) -> Transaction {
    let mut tx = Transaction::new();
    for op in inputs {
        tx.add_input(op.txid, op.index);
    }
    for (value, owner) in outputs {
        tx.add_output(*value, owner.clone());
    }
    for i in 0..inputs.len() {
        sign_transaction_input(&mut tx, i, kp).unwrap();
    }
    tx.finalize();
    tx
}

/// Pool holding `seed_outpoint(i)` = `values[i]`, all owned by `kp`.
pub fn seeded_pool(kp: &KeyPair, values: &[i64]) -> UtxoPool {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| (seed_outpoint(i as u8), TxOutput::new(*v, kp.public_key())))
        .collect()
}

/// Outpoint of output `index` of a finalized transaction.
pub fn output_of(tx: &Transaction, index: u32) -> OutPoint {
    OutPoint::new(tx.hash().unwrap(), index)
}

/// Whether `subset` can all be committed together against `pool`.
///
/// A set of transactions is collectively valid iff the greedy fixed point
/// over it accepts every member.
pub fn collectively_valid(pool: &UtxoPool, subset: &[Transaction]) -> Option<i64> {
    let mut scratch = pool.clone();
    let outcome = GreedyCommitter::new().commit(&mut scratch, subset);
    (outcome.accepted.len() == subset.len()).then_some(outcome.total_fee)
}

/// Highest total fee over every collectively valid subset of `batch`.
///
/// Exponential in the batch size; keep batches small.
pub fn brute_force_best_fee(pool: &UtxoPool, batch: &[Transaction]) -> i64 {
    assert!(batch.len() <= 16, "oracle batch too large");
    (0u32..(1 << batch.len()))
        .filter_map(|mask| {
            let subset: Vec<Transaction> = batch
                .iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, tx)| tx.clone())
                .collect();
            collectively_valid(pool, &subset)
        })
        .max()
        .unwrap_or(0)
}

/// One generated transaction: which earlier sources it spends, and its fee.
#[derive(Clone, Debug)]
pub struct TxPlan {
    /// Indices into the growing source list (taken modulo its length).
    pub inputs: Vec<usize>,
    /// Fee in hundredths of a coin. Negative plans produce overspends.
    pub fee_cents: i64,
}

/// Build a seed pool and a batch from generated plans.
///
/// Sources start as the seed UTXOs; each planned transaction then adds its
/// single output as a new source, so later plans can chain on earlier
/// ones. The returned batch is in plan order.
pub fn build_batch(kp: &KeyPair, seed_values: &[i64], plans: &[TxPlan]) -> (UtxoPool, Vec<Transaction>) {
    let pool = seeded_pool(kp, seed_values);
    let mut sources: Vec<(OutPoint, i64)> = seed_values
        .iter()
        .enumerate()
        .map(|(i, v)| (seed_outpoint(i as u8), *v))
        .collect();

    let mut batch = Vec::with_capacity(plans.len());
    for plan in plans {
        let mut picked: Vec<(OutPoint, i64)> = Vec::new();
        for &i in &plan.inputs {
            let source = sources[i % sources.len()];
            if !picked.iter().any(|(op, _)| *op == source.0) {
                picked.push(source);
            }
        }
        let total_in: i64 = picked.iter().map(|(_, v)| v).sum();
        let out_value = total_in - plan.fee_cents * (COIN / 100);
        let inputs: Vec<OutPoint> = picked.iter().map(|(op, _)| *op).collect();
        let tx = make_signed_tx(kp, &inputs, &[(out_value, kp.public_key())]);
        sources.push((output_of(&tx, 0), out_value));
        batch.push(tx);
    }
    (pool, batch)
}
