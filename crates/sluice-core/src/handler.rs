//! Greedy batch committer.
//!
//! Scans an unordered batch repeatedly, accepting every transaction that is
//! valid against the pool as it stands at that moment. Each acceptance is
//! applied to the pool immediately, so later transactions in the same scan
//! see its spent inputs gone and its outputs available. Scans repeat until
//! one accepts nothing.
//!
//! The result depends on batch order: it is a maximal valid subset under
//! greedy insertion, not necessarily the most profitable one. See
//! [`MaxFeeSelector`](crate::selector::MaxFeeSelector) for that.

use std::collections::HashSet;

use tracing::{debug, info, trace, warn};

use crate::crypto::Ed25519Verifier;
use crate::traits::SignatureVerifier;
use crate::types::{Hash256, Transaction};
use crate::utxo_pool::UtxoPool;
use crate::validation::Validator;

/// Result of a greedy commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    /// Accepted transactions in acceptance order.
    pub accepted: Vec<Transaction>,
    /// Sum of the accepted transactions' fees in base units.
    pub total_fee: i64,
    /// Number of full scans over the batch, including the final empty one.
    pub passes: usize,
}

/// Fixed-point greedy committer.
#[derive(Debug, Clone, Default)]
pub struct GreedyCommitter<V = Ed25519Verifier> {
    validator: Validator<V>,
}

impl GreedyCommitter<Ed25519Verifier> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: SignatureVerifier> GreedyCommitter<V> {
    pub fn with_validator(validator: Validator<V>) -> Self {
        Self { validator }
    }

    /// Accept transactions from `batch` until a fixed point, mutating `pool`.
    pub fn commit(&self, pool: &mut UtxoPool, batch: &[Transaction]) -> BatchOutcome {
        let mut taken = vec![false; batch.len()];
        let mut accepted_ids: HashSet<Hash256> = HashSet::new();
        let mut accepted = Vec::new();
        let mut total_fee: i64 = 0;
        let mut passes = 0;

        loop {
            passes += 1;
            let mut changed = false;

            for (i, tx) in batch.iter().enumerate() {
                if taken[i] {
                    continue;
                }
                if tx.hash().is_some_and(|h| accepted_ids.contains(&h)) {
                    trace!(index = i, "greedy: repeated transaction skipped");
                    taken[i] = true;
                    continue;
                }
                let validated = match self.validator.validate(pool, tx) {
                    Ok(v) => v,
                    Err(e) => {
                        trace!(index = i, pass = passes, error = %e, "greedy: candidate rejected");
                        continue;
                    }
                };
                if let Err(e) = pool.apply_transaction(tx) {
                    warn!(index = i, error = %e, "greedy: validated transaction failed to apply");
                    continue;
                }

                taken[i] = true;
                changed = true;
                total_fee = total_fee.saturating_add(validated.fee);
                if let Some(txid) = tx.hash() {
                    accepted_ids.insert(txid);
                    debug!(%txid, fee = validated.fee, pass = passes, "greedy: accepted");
                }
                accepted.push(tx.clone());
            }

            if !changed {
                break;
            }
        }

        info!(
            candidates = batch.len(),
            accepted = accepted.len(),
            total_fee,
            passes,
            "greedy: batch committed"
        );

        BatchOutcome {
            accepted,
            total_fee,
            passes,
        }
    }
}

/// Greedily commit `batch` to `pool` with Ed25519 signatures.
///
/// Returns the accepted transactions in acceptance order.
pub fn commit_greedy(pool: &mut UtxoPool, batch: &[Transaction]) -> Vec<Transaction> {
    GreedyCommitter::new().commit(pool, batch).accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::crypto::{KeyPair, PublicKey, sign_transaction_input};
    use crate::types::{Hash256, OutPoint, TxOutput};

    fn seed_outpoint() -> OutPoint {
        OutPoint::new(Hash256([0xA0; 32]), 0)
    }

    fn recipient() -> PublicKey {
        KeyPair::from_secret_bytes([0xBB; 32]).public_key()
    }

    /// Finalized transaction spending `from` (signed by `kp`) into `outputs`.
    fn spend(kp: &KeyPair, from: &[OutPoint], outputs: &[(i64, PublicKey)]) -> Transaction {
        let mut tx = Transaction::new();
        for op in from {
            tx.add_input(op.txid, op.index);
        }
        for (value, owner) in outputs {
            tx.add_output(*value, owner.clone());
        }
        for i in 0..from.len() {
            sign_transaction_input(&mut tx, i, kp).unwrap();
        }
        tx.finalize();
        tx
    }

    fn seeded_pool(kp: &KeyPair) -> UtxoPool {
        let mut pool = UtxoPool::new();
        pool.add_utxo(seed_outpoint(), TxOutput::new(10 * COIN, kp.public_key()));
        pool
    }

    #[test]
    fn empty_batch_is_noop() {
        let kp = KeyPair::generate();
        let mut pool = seeded_pool(&kp);
        let before = pool.clone();
        assert!(commit_greedy(&mut pool, &[]).is_empty());
        assert_eq!(pool, before);
    }

    #[test]
    fn single_valid_tx_is_committed() {
        let kp = KeyPair::generate();
        let mut pool = seeded_pool(&kp);
        let tx1 = spend(&kp, &[seed_outpoint()], &[(7 * COIN, recipient())]);

        let outcome = GreedyCommitter::new().commit(&mut pool, &[tx1.clone()]);
        assert_eq!(outcome.accepted, vec![tx1.clone()]);
        assert_eq!(outcome.total_fee, 3 * COIN);
        assert!(!pool.contains(&seed_outpoint()));
        let created = OutPoint::new(tx1.hash().unwrap(), 0);
        assert_eq!(pool.get(&created).unwrap().value, 7 * COIN);
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn double_spend_accepts_exactly_one() {
        let kp = KeyPair::generate();
        let mut pool = seeded_pool(&kp);
        let tx1 = spend(&kp, &[seed_outpoint()], &[(7 * COIN, recipient())]);
        let tx2 = spend(&kp, &[seed_outpoint()], &[(9 * COIN, recipient())]);

        let accepted = commit_greedy(&mut pool, &[tx2.clone(), tx1]);
        // Batch order decides: tx2 comes first.
        assert_eq!(accepted, vec![tx2]);
    }

    #[test]
    fn chained_tx_out_of_order_accepted_on_later_pass() {
        let kp = KeyPair::generate();
        let mut pool = seeded_pool(&kp);
        let parent = spend(&kp, &[seed_outpoint()], &[(9 * COIN, kp.public_key())]);
        let child_in = OutPoint::new(parent.hash().unwrap(), 0);
        let child = spend(&kp, &[child_in], &[(8 * COIN, recipient())]);

        let outcome = GreedyCommitter::new().commit(&mut pool, &[child.clone(), parent.clone()]);
        assert_eq!(outcome.accepted, vec![parent, child.clone()]);
        assert_eq!(outcome.total_fee, 2 * COIN);
        assert_eq!(outcome.passes, 3);
        assert!(!pool.contains(&child_in));
        assert!(pool.contains(&OutPoint::new(child.hash().unwrap(), 0)));
    }

    #[test]
    fn unfinalized_and_invalid_are_skipped() {
        let kp = KeyPair::generate();
        let mut pool = seeded_pool(&kp);
        let mut unfinalized = spend(&kp, &[seed_outpoint()], &[(COIN, recipient())]);
        unfinalized.add_output(0, recipient());
        let overspend = spend(&kp, &[seed_outpoint()], &[(11 * COIN, recipient())]);

        assert!(commit_greedy(&mut pool, &[unfinalized, overspend]).is_empty());
        assert!(pool.contains(&seed_outpoint()));
    }

    #[test]
    fn repeated_zero_input_transaction_accepted_once() {
        let mut pool = UtxoPool::new();
        let mut free = Transaction::new();
        free.add_output(0, recipient());
        free.finalize();

        let outcome = GreedyCommitter::new().commit(&mut pool, &[free.clone(), free.clone()]);
        assert_eq!(outcome.accepted, vec![free.clone()]);
        assert_eq!(outcome.total_fee, 0);
        assert_eq!(pool.len(), 1);
        assert!(pool.contains(&OutPoint::new(free.hash().unwrap(), 0)));
    }

    #[test]
    fn rerun_reaches_fixed_point() {
        let kp = KeyPair::generate();
        let mut pool = seeded_pool(&kp);
        let tx1 = spend(&kp, &[seed_outpoint()], &[(7 * COIN, recipient())]);
        let batch = vec![tx1];

        assert_eq!(commit_greedy(&mut pool, &batch).len(), 1);
        let after = pool.clone();
        assert!(commit_greedy(&mut pool, &batch).is_empty());
        assert_eq!(pool, after);
    }
}
