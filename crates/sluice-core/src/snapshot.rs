//! JSON snapshots of a UTXO pool and of transaction batches.
//!
//! A pool snapshot is a JSON array of [`UtxoRecord`]s sorted by outpoint, so
//! saving the same pool twice produces identical files. A batch file is a
//! JSON array of transactions; each is re-finalized on load.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::SluiceError;
use crate::types::{OutPoint, Transaction, TxOutput};
use crate::utxo_pool::UtxoPool;

/// One entry of a pool snapshot.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UtxoRecord {
    pub outpoint: OutPoint,
    pub output: TxOutput,
}

/// Pool contents as records sorted by outpoint.
pub fn pool_records(pool: &UtxoPool) -> Vec<UtxoRecord> {
    let mut records: Vec<UtxoRecord> = pool
        .iter()
        .map(|(outpoint, output)| UtxoRecord {
            outpoint: *outpoint,
            output: output.clone(),
        })
        .collect();
    records.sort_by(|a, b| a.outpoint.cmp(&b.outpoint));
    records
}

pub fn pool_to_json(pool: &UtxoPool) -> Result<String, SluiceError> {
    Ok(serde_json::to_string_pretty(&pool_records(pool))?)
}

pub fn pool_from_json(json: &str) -> Result<UtxoPool, SluiceError> {
    let records: Vec<UtxoRecord> = serde_json::from_str(json)?;
    Ok(records
        .into_iter()
        .map(|r| (r.outpoint, r.output))
        .collect())
}

pub fn load_pool(path: &Path) -> Result<UtxoPool, SluiceError> {
    let pool = pool_from_json(&fs::read_to_string(path)?)?;
    debug!(path = %path.display(), utxos = pool.len(), "loaded pool snapshot");
    Ok(pool)
}

pub fn save_pool(path: &Path, pool: &UtxoPool) -> Result<(), SluiceError> {
    fs::write(path, pool_to_json(pool)?)?;
    debug!(path = %path.display(), utxos = pool.len(), "saved pool snapshot");
    Ok(())
}

pub fn load_batch(path: &Path) -> Result<Vec<Transaction>, SluiceError> {
    let batch: Vec<Transaction> = serde_json::from_str(&fs::read_to_string(path)?)?;
    debug!(path = %path.display(), transactions = batch.len(), "loaded batch");
    Ok(batch)
}

pub fn save_batch(path: &Path, batch: &[Transaction]) -> Result<(), SluiceError> {
    fs::write(path, serde_json::to_string_pretty(batch)?)?;
    Ok(())
}
