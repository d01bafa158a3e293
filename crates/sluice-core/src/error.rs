//! Error types for the Sluice ledger.
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransactionError {
    #[error("transaction not finalized")] NotFinalized,
    #[error("unknown UTXO: {0}")] UnknownUtxo(String),
    #[error("duplicate input: {0}")] DuplicateInput(String),
    #[error("invalid signature on input {index}")] InvalidSignature { index: usize },
    #[error("negative output value at index {0}")] NegativeOutput(usize),
    #[error("insufficient funds: have {have}, need {need}")] InsufficientFunds { have: i64, need: i64 },
    #[error("value overflow")] ValueOverflow,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid public key bytes")] InvalidPublicKey,
    #[error("invalid signature bytes")] InvalidSignature,
    #[error("signature verification failed")] VerificationFailed,
    #[error("input index out of bounds: {index} >= {len}")] InputIndexOutOfBounds { index: usize, len: usize },
}

#[derive(Error, Debug)]
pub enum SluiceError {
    #[error(transparent)] Transaction(#[from] TransactionError),
    #[error(transparent)] Crypto(#[from] CryptoError),
    #[error("io: {0}")] Io(#[from] std::io::Error),
    #[error("json: {0}")] Json(#[from] serde_json::Error),
}
