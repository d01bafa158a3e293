//! Core ledger types: hashes, outpoints, inputs, outputs, transactions.
//!
//! All monetary values are in base units (1 coin = 10^8 units). Values are
//! signed so that a negative output can be represented and rejected by
//! validation rather than by the type system.
//!
//! # Canonical encodings
//!
//! Both encodings are big-endian and fixed-width per field:
//!
//! - **Signing payload** for input `i`: `prev_txid(32) || index(4)`, then for
//!   every output `value(8) || owner(32)`. Signatures are never included.
//! - **Raw transaction** (hashed by [`Transaction::finalize`]): for every input
//!   `prev_txid(32) || index(4) || signature`, then for every output
//!   `value(8) || owner(32)`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::constants::{HASH_LEN, OUTPUT_INDEX_LEN, PUBLIC_KEY_LEN, VALUE_LEN};
use crate::crypto::PublicKey;
use crate::error::{CryptoError, TransactionError};

/// A 32-byte SHA-256 hash. Used as the transaction identifier.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Hash256(pub [u8; HASH_LEN]);

impl Hash256 {
    /// The zero hash (32 zero bytes).
    pub const ZERO: Self = Self([0u8; HASH_LEN]);

    /// Create a Hash256 from a byte array.
    pub fn from_bytes(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Return the underlying bytes.
    pub fn as_bytes(&self) -> &[u8; HASH_LEN] {
        &self.0
    }

    /// Check if this is the zero hash.
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; HASH_LEN]
    }

    /// SHA-256 digest of arbitrary bytes.
    pub fn digest(data: &[u8]) -> Self {
        Self(Sha256::digest(data).into())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl From<[u8; HASH_LEN]> for Hash256 {
    fn from(bytes: [u8; HASH_LEN]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Hash256 {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(self.0))
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mut bytes = [0u8; HASH_LEN];
        hex::decode_to_slice(&s, &mut bytes).map_err(serde::de::Error::custom)?;
        Ok(Self(bytes))
    }
}

/// Reference to a specific output of a previous transaction.
///
/// This is the UTXO key: two outpoints are the same UTXO iff their txid and
/// index are equal.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    /// Transaction ID containing the referenced output.
    pub txid: Hash256,
    /// Index of the output within the transaction.
    pub index: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, index: u32) -> Self {
        Self { txid, index }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.txid, self.index)
    }
}

/// A transaction input, spending a previous output.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxInput {
    /// The outpoint being spent.
    pub previous_output: OutPoint,
    /// Signature over the input's signing payload. Empty until signed.
    #[serde(with = "hex_bytes", default)]
    pub signature: Vec<u8>,
}

/// A transaction output, creating a new UTXO.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct TxOutput {
    /// Value in base units. Negative values are representable but invalid.
    pub value: i64,
    /// Public key allowed to spend this output.
    pub owner: PublicKey,
}

impl TxOutput {
    pub fn new(value: i64, owner: PublicKey) -> Self {
        Self { value, owner }
    }
}

/// A transaction transferring value between owners.
///
/// Built incrementally: add inputs and outputs, sign each input over its
/// [`signing_payload`](Self::signing_payload), then call
/// [`finalize`](Self::finalize) to assign the content hash. Any mutation
/// after finalization clears the hash, so a transaction with a hash always
/// carries the hash of its current content.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(from = "TransactionBody", into = "TransactionBody")]
pub struct Transaction {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
    hash: Option<Hash256>,
}

/// Serialized form of a [`Transaction`]. The hash is recomputed on load.
#[derive(Serialize, Deserialize)]
struct TransactionBody {
    inputs: Vec<TxInput>,
    outputs: Vec<TxOutput>,
}

impl From<TransactionBody> for Transaction {
    fn from(body: TransactionBody) -> Self {
        let mut tx = Transaction {
            inputs: body.inputs,
            outputs: body.outputs,
            hash: None,
        };
        tx.finalize();
        tx
    }
}

impl From<Transaction> for TransactionBody {
    fn from(tx: Transaction) -> Self {
        Self {
            inputs: tx.inputs,
            outputs: tx.outputs,
        }
    }
}

impl Transaction {
    /// Create an empty, unfinalized transaction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an input spending `prev_txid:index`, unsigned.
    pub fn add_input(&mut self, prev_txid: Hash256, index: u32) {
        self.inputs.push(TxInput {
            previous_output: OutPoint::new(prev_txid, index),
            signature: Vec::new(),
        });
        self.hash = None;
    }

    /// Append an output paying `value` to `owner`.
    pub fn add_output(&mut self, value: i64, owner: PublicKey) {
        self.outputs.push(TxOutput::new(value, owner));
        self.hash = None;
    }

    /// Set the signature of input `index`.
    pub fn add_signature(&mut self, index: usize, signature: Vec<u8>) -> Result<(), CryptoError> {
        let len = self.inputs.len();
        let input = self
            .inputs
            .get_mut(index)
            .ok_or(CryptoError::InputIndexOutOfBounds { index, len })?;
        input.signature = signature;
        self.hash = None;
        Ok(())
    }

    /// Remove the input at `index`, returning it.
    pub fn remove_input(&mut self, index: usize) -> Option<TxInput> {
        if index >= self.inputs.len() {
            return None;
        }
        self.hash = None;
        Some(self.inputs.remove(index))
    }

    /// Remove the first input spending `outpoint`, returning it.
    pub fn remove_input_by_outpoint(&mut self, outpoint: &OutPoint) -> Option<TxInput> {
        let pos = self
            .inputs
            .iter()
            .position(|input| input.previous_output == *outpoint)?;
        self.remove_input(pos)
    }

    /// Bytes that input `index` must sign.
    pub fn signing_payload(&self, index: usize) -> Result<Vec<u8>, CryptoError> {
        let input = self.inputs.get(index).ok_or(CryptoError::InputIndexOutOfBounds {
            index,
            len: self.inputs.len(),
        })?;

        let mut data = Vec::with_capacity(
            HASH_LEN + OUTPUT_INDEX_LEN + self.outputs.len() * (VALUE_LEN + PUBLIC_KEY_LEN),
        );
        data.extend_from_slice(input.previous_output.txid.as_bytes());
        data.extend_from_slice(&input.previous_output.index.to_be_bytes());
        self.encode_outputs(&mut data);
        Ok(data)
    }

    /// Canonical serialization of all inputs (with signatures) and outputs.
    pub fn raw_bytes(&self) -> Vec<u8> {
        let mut data = Vec::new();
        for input in &self.inputs {
            data.extend_from_slice(input.previous_output.txid.as_bytes());
            data.extend_from_slice(&input.previous_output.index.to_be_bytes());
            data.extend_from_slice(&input.signature);
        }
        self.encode_outputs(&mut data);
        data
    }

    fn encode_outputs(&self, data: &mut Vec<u8>) {
        for output in &self.outputs {
            data.extend_from_slice(&output.value.to_be_bytes());
            data.extend_from_slice(&output.owner.to_bytes());
        }
    }

    /// Compute and store the content hash (SHA-256 of [`raw_bytes`](Self::raw_bytes)).
    pub fn finalize(&mut self) -> Hash256 {
        let hash = Hash256::digest(&self.raw_bytes());
        self.hash = Some(hash);
        hash
    }

    /// The content hash, if the transaction has been finalized.
    pub fn hash(&self) -> Option<Hash256> {
        self.hash
    }

    /// The content hash, or [`TransactionError::NotFinalized`].
    pub fn txid(&self) -> Result<Hash256, TransactionError> {
        self.hash.ok_or(TransactionError::NotFinalized)
    }

    pub fn inputs(&self) -> &[TxInput] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[TxOutput] {
        &self.outputs
    }

    pub fn input(&self, index: usize) -> Option<&TxInput> {
        self.inputs.get(index)
    }

    pub fn output(&self, index: usize) -> Option<&TxOutput> {
        self.outputs.get(index)
    }

    pub fn num_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn num_outputs(&self) -> usize {
        self.outputs.len()
    }

    /// Sum of all output values. Returns None on overflow.
    pub fn total_output_value(&self) -> Option<i64> {
        self.outputs
            .iter()
            .try_fold(0i64, |acc, out| acc.checked_add(out.value))
    }

    /// Outpoints of the UTXOs this transaction creates, paired with the outputs.
    ///
    /// Empty if the transaction is not finalized.
    pub fn created_utxos(&self) -> impl Iterator<Item = (OutPoint, &TxOutput)> + '_ {
        let txid = self.hash;
        self.outputs
            .iter()
            .enumerate()
            .filter_map(move |(i, out)| txid.map(|h| (OutPoint::new(h, i as u32), out)))
    }
}

/// Hex string (de)serialization for signature bytes.
mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
