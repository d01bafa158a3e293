//! Ed25519 key handling and transaction input signing.
//!
//! Provides key generation, per-input transaction signing, and the default
//! [`SignatureVerifier`] implementation. Uses ed25519-dalek for the
//! underlying Ed25519 implementation.
//!
//! # Signing scheme
//!
//! Each input signs its [`signing_payload`](Transaction::signing_payload):
//! the outpoint it spends plus every output of the transaction. Signatures
//! are excluded from the payload, so inputs can be signed in any order.
//! Outputs are owned by a public key directly; verification looks up the
//! owner of the spent output and checks the input's signature against it.

use ed25519_dalek::{Signer, Verifier};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

use crate::constants::{PUBLIC_KEY_LEN, SIGNATURE_LEN};
use crate::error::CryptoError;
use crate::traits::SignatureVerifier;
use crate::types::Transaction;

/// Ed25519 keypair for signing transaction inputs.
///
/// The secret key is zeroized on drop by the underlying library.
pub struct KeyPair {
    signing_key: ed25519_dalek::SigningKey,
}

impl KeyPair {
    /// Generate a random keypair using the OS cryptographic RNG.
    pub fn generate() -> Self {
        let mut csprng = rand::rngs::OsRng;
        Self {
            signing_key: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Create a keypair from 32-byte secret key material.
    pub fn from_secret_bytes(bytes: [u8; 32]) -> Self {
        Self {
            signing_key: ed25519_dalek::SigningKey::from_bytes(&bytes),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            verifying_key: self.signing_key.verifying_key(),
        }
    }

    /// Raw secret key bytes. Handle with care.
    pub fn secret_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Sign a message, returning the raw 64-byte Ed25519 signature.
    pub fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_LEN] {
        self.signing_key.sign(message).to_bytes()
    }
}

impl Clone for KeyPair {
    fn clone(&self) -> Self {
        Self::from_secret_bytes(self.secret_bytes())
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key())
            .finish_non_exhaustive()
    }
}

/// Ed25519 public key owning transaction outputs.
#[derive(Clone)]
pub struct PublicKey {
    verifying_key: ed25519_dalek::VerifyingKey,
}

impl PublicKey {
    /// Create a public key from raw bytes (32 bytes).
    pub fn from_bytes(bytes: &[u8; PUBLIC_KEY_LEN]) -> Result<Self, CryptoError> {
        let vk = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| CryptoError::InvalidPublicKey)?;
        Ok(Self { verifying_key: vk })
    }

    /// Parse a public key from a hex string.
    pub fn from_hex(s: &str) -> Result<Self, CryptoError> {
        let mut bytes = [0u8; PUBLIC_KEY_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| CryptoError::InvalidPublicKey)?;
        Self::from_bytes(&bytes)
    }

    /// Encoded public key bytes, as committed to in signing payloads and hashes.
    pub fn to_bytes(&self) -> [u8; PUBLIC_KEY_LEN] {
        self.verifying_key.to_bytes()
    }

    /// Verify an Ed25519 signature on a message.
    ///
    /// Signatures that are not exactly 64 bytes are rejected with
    /// [`CryptoError::InvalidSignature`].
    pub fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
        let bytes: [u8; SIGNATURE_LEN] = signature
            .try_into()
            .map_err(|_| CryptoError::InvalidSignature)?;
        let sig = ed25519_dalek::Signature::from_bytes(&bytes);
        self.verifying_key
            .verify(message, &sig)
            .map_err(|_| CryptoError::VerificationFailed)
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", hex::encode(self.to_bytes()))
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.to_bytes()))
    }
}

impl PartialEq for PublicKey {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for PublicKey {}

impl std::hash::Hash for PublicKey {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.to_bytes().hash(state);
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.to_bytes()))
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// Ed25519 signature verifier used by default throughout validation.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &PublicKey, message: &[u8], signature: &[u8]) -> bool {
        public_key.verify(message, signature).is_ok()
    }
}

/// Sign a transaction input in place.
///
/// Computes the signing payload for `input_index`, signs it with `keypair`,
/// and stores the signature in the input. Clears any previously assigned
/// hash; call [`Transaction::finalize`] once every input is signed.
pub fn sign_transaction_input(
    tx: &mut Transaction,
    input_index: usize,
    keypair: &KeyPair,
) -> Result<(), CryptoError> {
    let payload = tx.signing_payload(input_index)?;
    let signature = keypair.sign(&payload);
    tx.add_signature(input_index, signature.to_vec())
}

/// Verify a transaction input's signature against the spent output's owner.
pub fn verify_transaction_input<V: SignatureVerifier + ?Sized>(
    verifier: &V,
    tx: &Transaction,
    input_index: usize,
    owner: &PublicKey,
) -> Result<(), CryptoError> {
    let payload = tx.signing_payload(input_index)?;
    let input = &tx.inputs()[input_index];
    if verifier.verify(owner, &payload, &input.signature) {
        Ok(())
    } else {
        Err(CryptoError::VerificationFailed)
    }
}
