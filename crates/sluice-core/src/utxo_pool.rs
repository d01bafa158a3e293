//! In-memory unspent-output set.
//!
//! [`UtxoPool`] maps an [`OutPoint`] to the [`TxOutput`] it names. It has
//! value semantics: `clone()` and [`From`] a seed map produce independent
//! copies, so mutating one pool never affects another.
//!
//! Transactions passed to [`UtxoPool::apply_transaction`] must already be
//! validated. The pool only checks that the transaction is finalized and
//! that every spent outpoint is present, so a failed apply never leaves a
//! partial mutation behind.

use std::collections::HashMap;

use crate::error::TransactionError;
use crate::traits::UtxoView;
use crate::types::{OutPoint, Transaction, TxOutput};

/// Result of applying a transaction to the pool.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApplyResult {
    /// Number of UTXOs removed (the transaction's inputs).
    pub utxos_spent: usize,
    /// Number of UTXOs inserted (the transaction's outputs).
    pub utxos_created: usize,
}

/// The set of unspent transaction outputs at a point in ledger time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UtxoPool {
    utxos: HashMap<OutPoint, TxOutput>,
}

impl UtxoPool {
    /// Create an empty pool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the output stored under `outpoint`.
    pub fn add_utxo(&mut self, outpoint: OutPoint, output: TxOutput) {
        self.utxos.insert(outpoint, output);
    }

    /// Remove a UTXO, returning the output it held.
    pub fn remove_utxo(&mut self, outpoint: &OutPoint) -> Option<TxOutput> {
        self.utxos.remove(outpoint)
    }

    pub fn get(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.utxos.get(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.utxos.contains_key(outpoint)
    }

    /// Number of unspent outputs in the pool.
    pub fn len(&self) -> usize {
        self.utxos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.utxos.is_empty()
    }

    /// All outpoints currently in the pool, in no particular order.
    pub fn all_utxos(&self) -> Vec<OutPoint> {
        self.utxos.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &TxOutput)> {
        self.utxos.iter()
    }

    /// Sum of all unspent values. Returns None on overflow.
    pub fn total_value(&self) -> Option<i64> {
        self.utxos
            .values()
            .try_fold(0i64, |acc, out| acc.checked_add(out.value))
    }

    /// Spend a validated transaction's inputs and create its outputs.
    ///
    /// # Errors
    ///
    /// - [`TransactionError::NotFinalized`] if the transaction has no hash
    /// - [`TransactionError::UnknownUtxo`] if any input is not in the pool
    ///
    /// The pool is unchanged when an error is returned.
    pub fn apply_transaction(&mut self, tx: &Transaction) -> Result<ApplyResult, TransactionError> {
        tx.txid()?;
        if let Some(missing) = tx
            .inputs()
            .iter()
            .find(|input| !self.utxos.contains_key(&input.previous_output))
        {
            return Err(TransactionError::UnknownUtxo(
                missing.previous_output.to_string(),
            ));
        }

        let mut spent = 0;
        for input in tx.inputs() {
            if self.utxos.remove(&input.previous_output).is_some() {
                spent += 1;
            }
        }

        let mut created = 0;
        for (outpoint, output) in tx.created_utxos() {
            self.utxos.insert(outpoint, output.clone());
            created += 1;
        }

        Ok(ApplyResult {
            utxos_spent: spent,
            utxos_created: created,
        })
    }
}

impl UtxoView for UtxoPool {
    fn get_utxo(&self, outpoint: &OutPoint) -> Option<&TxOutput> {
        self.utxos.get(outpoint)
    }
}

impl From<HashMap<OutPoint, TxOutput>> for UtxoPool {
    fn from(utxos: HashMap<OutPoint, TxOutput>) -> Self {
        Self { utxos }
    }
}

impl FromIterator<(OutPoint, TxOutput)> for UtxoPool {
    fn from_iter<I: IntoIterator<Item = (OutPoint, TxOutput)>>(iter: I) -> Self {
        Self {
            utxos: iter.into_iter().collect(),
        }
    }
}

impl Extend<(OutPoint, TxOutput)> for UtxoPool {
    fn extend<I: IntoIterator<Item = (OutPoint, TxOutput)>>(&mut self, iter: I) {
        self.utxos.extend(iter);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::COIN;
    use crate::crypto::{KeyPair, PublicKey};
    use crate::types::Hash256;

    // ------------------------------------------------------------------
    // Helpers
    // ------------------------------------------------------------------

    fn owner(seed: u8) -> PublicKey {
        KeyPair::from_secret_bytes([seed; 32]).public_key()
    }

    fn op(seed: u8, index: u32) -> OutPoint {
        OutPoint::new(Hash256([seed; 32]), index)
    }

    fn seeded_pool() -> UtxoPool {
        [
            (op(0xA0, 0), TxOutput::new(10 * COIN, owner(1))),
            (op(0xA0, 1), TxOutput::new(5 * COIN, owner(1))),
        ]
        .into_iter()
        .collect()
    }

    fn spend(outpoints: &[OutPoint], values: &[i64]) -> Transaction {
        let mut tx = Transaction::new();
        for o in outpoints {
            tx.add_input(o.txid, o.index);
        }
        for v in values {
            tx.add_output(*v, owner(2));
        }
        tx.finalize();
        tx
    }

    // ------------------------------------------------------------------
    // Basic container operations
    // ------------------------------------------------------------------

    #[test]
    fn new_pool_is_empty() {
        let pool = UtxoPool::new();
        assert!(pool.is_empty());
        assert_eq!(pool.len(), 0);
        assert_eq!(pool.total_value(), Some(0));
    }

    #[test]
    fn add_get_remove() {
        let mut pool = UtxoPool::new();
        pool.add_utxo(op(1, 0), TxOutput::new(COIN, owner(1)));
        assert!(pool.contains(&op(1, 0)));
        assert_eq!(pool.get(&op(1, 0)).unwrap().value, COIN);

        let removed = pool.remove_utxo(&op(1, 0)).unwrap();
        assert_eq!(removed.value, COIN);
        assert!(!pool.contains(&op(1, 0)));
        assert!(pool.remove_utxo(&op(1, 0)).is_none());
    }

    #[test]
    fn all_utxos_lists_every_key() {
        let pool = seeded_pool();
        let mut keys = pool.all_utxos();
        keys.sort();
        assert_eq!(keys, vec![op(0xA0, 0), op(0xA0, 1)]);
    }

    #[test]
    fn clone_is_independent() {
        let original = seeded_pool();
        let mut copy = original.clone();
        copy.remove_utxo(&op(0xA0, 0));
        copy.add_utxo(op(0xB0, 0), TxOutput::new(COIN, owner(3)));

        assert_eq!(original.len(), 2);
        assert!(original.contains(&op(0xA0, 0)));
        assert!(!original.contains(&op(0xB0, 0)));
    }

    #[test]
    fn from_seed_map_copies() {
        let mut seed = HashMap::new();
        seed.insert(op(1, 0), TxOutput::new(COIN, owner(1)));
        let pool = UtxoPool::from(seed.clone());
        seed.clear();
        assert_eq!(pool.len(), 1);
    }

    // ------------------------------------------------------------------
    // apply_transaction
    // ------------------------------------------------------------------

    #[test]
    fn apply_spends_and_creates() {
        let mut pool = seeded_pool();
        let tx = spend(&[op(0xA0, 0)], &[7 * COIN, 2 * COIN]);
        let result = pool.apply_transaction(&tx).unwrap();

        assert_eq!(result, ApplyResult { utxos_spent: 1, utxos_created: 2 });
        assert!(!pool.contains(&op(0xA0, 0)));
        let h = tx.hash().unwrap();
        assert_eq!(pool.get(&OutPoint::new(h, 0)).unwrap().value, 7 * COIN);
        assert_eq!(pool.get(&OutPoint::new(h, 1)).unwrap().value, 2 * COIN);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn apply_unknown_input_leaves_pool_unchanged() {
        let mut pool = seeded_pool();
        let before = pool.clone();
        let tx = spend(&[op(0xA0, 0), op(0xEE, 0)], &[COIN]);

        assert!(matches!(
            pool.apply_transaction(&tx).unwrap_err(),
            TransactionError::UnknownUtxo(_)
        ));
        assert_eq!(pool, before);
    }

    #[test]
    fn apply_unfinalized_rejected() {
        let mut pool = seeded_pool();
        let mut tx = Transaction::new();
        tx.add_input(op(0xA0, 0).txid, 0);
        assert_eq!(
            pool.apply_transaction(&tx).unwrap_err(),
            TransactionError::NotFinalized
        );
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn utxo_view_impl_matches_get() {
        let pool = seeded_pool();
        assert!(pool.contains_utxo(&op(0xA0, 1)));
        assert_eq!(pool.get_utxo(&op(0xA0, 1)), pool.get(&op(0xA0, 1)));
    }
}
