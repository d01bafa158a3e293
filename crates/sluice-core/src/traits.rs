//! Trait interfaces at the collaborator boundaries.
//!
//! - [`SignatureVerifier`]: asymmetric signature verification
//!   ([`Ed25519Verifier`](crate::crypto::Ed25519Verifier) implements)
//! - [`UtxoView`]: read-only lookups into an unspent-output set
//!   ([`UtxoPool`](crate::utxo_pool::UtxoPool) implements)

use crate::crypto::PublicKey;
use crate::types::{OutPoint, TxOutput};

/// Verifies a signature over an exact byte message.
///
/// Callers must pass byte-identical messages for signing and verification.
/// An unusable key or malformed signature is reported as `false`.
pub trait SignatureVerifier {
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool;
}

/// Read-only view of an unspent-output set.
pub trait UtxoView {
    /// Look up an unspent output. Returns `None` if spent or unknown.
    fn get_utxo(&self, outpoint: &OutPoint) -> Option<&TxOutput>;

    /// Check whether a UTXO exists and is unspent.
    ///
    /// Default implementation delegates to [`get_utxo`](Self::get_utxo).
    fn contains_utxo(&self, outpoint: &OutPoint) -> bool {
        self.get_utxo(outpoint).is_some()
    }
}
