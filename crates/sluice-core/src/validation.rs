//! Transaction validation against an unspent-output set.
//!
//! A transaction is valid iff:
//! - it is finalized (has a content hash),
//! - every input references a UTXO present in the set,
//! - no UTXO is referenced by more than one of its inputs,
//! - every input's signature verifies against the spent output's owner,
//! - every output value is non-negative,
//! - total input value covers total output value (fee >= 0).
//!
//! Validation never mutates the set. [`Validator::validate`] reports the
//! first rule that fails; [`Validator::is_valid`] and the free function
//! [`is_valid`] collapse that into a `bool`, since invalidity is an expected
//! outcome when screening a batch.

use std::collections::HashSet;

use crate::crypto::{self, Ed25519Verifier};
use crate::error::TransactionError;
use crate::traits::{SignatureVerifier, UtxoView};
use crate::types::Transaction;

/// Summary of a successfully validated transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedTransaction {
    /// Total value of all spent inputs in base units.
    pub total_input: i64,
    /// Total value of all created outputs in base units.
    pub total_output: i64,
    /// Transaction fee in base units (`total_input - total_output`).
    pub fee: i64,
}

/// Stateless transaction validator, generic over the signature scheme.
#[derive(Debug, Clone, Default)]
pub struct Validator<V = Ed25519Verifier> {
    verifier: V,
}

impl Validator<Ed25519Verifier> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<V: SignatureVerifier> Validator<V> {
    /// Create a validator that checks signatures with `verifier`.
    pub fn with_verifier(verifier: V) -> Self {
        Self { verifier }
    }

    /// Validate `tx` against `utxos`, returning its totals and fee.
    pub fn validate<U: UtxoView + ?Sized>(
        &self,
        utxos: &U,
        tx: &Transaction,
    ) -> Result<ValidatedTransaction, TransactionError> {
        tx.txid()?;

        let mut seen = HashSet::with_capacity(tx.num_inputs());
        let mut total_input: i64 = 0;

        for (i, input) in tx.inputs().iter().enumerate() {
            let outpoint = &input.previous_output;
            let spent = utxos
                .get_utxo(outpoint)
                .ok_or_else(|| TransactionError::UnknownUtxo(outpoint.to_string()))?;

            if !seen.insert(outpoint) {
                return Err(TransactionError::DuplicateInput(outpoint.to_string()));
            }

            crypto::verify_transaction_input(&self.verifier, tx, i, &spent.owner)
                .map_err(|_| TransactionError::InvalidSignature { index: i })?;

            total_input = total_input
                .checked_add(spent.value)
                .ok_or(TransactionError::ValueOverflow)?;
        }

        if let Some(i) = tx.outputs().iter().position(|out| out.value < 0) {
            return Err(TransactionError::NegativeOutput(i));
        }

        let total_output = tx
            .total_output_value()
            .ok_or(TransactionError::ValueOverflow)?;

        if total_input < total_output {
            return Err(TransactionError::InsufficientFunds {
                have: total_input,
                need: total_output,
            });
        }

        Ok(ValidatedTransaction {
            total_input,
            total_output,
            fee: total_input - total_output,
        })
    }

    pub fn is_valid<U: UtxoView + ?Sized>(&self, utxos: &U, tx: &Transaction) -> bool {
        self.validate(utxos, tx).is_ok()
    }
}

/// Check `tx` against `utxos` with Ed25519 signatures.
pub fn is_valid<U: UtxoView + ?Sized>(utxos: &U, tx: &Transaction) -> bool {
    Validator::new().is_valid(utxos, tx)
}
