//! Ledger constants. All monetary values in base units (1 coin = 10^8 units).

/// Base units per coin.
pub const COIN: i64 = 100_000_000;

/// Length in bytes of a transaction hash.
pub const HASH_LEN: usize = 32;

/// Length in bytes of an encoded owner public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length in bytes of an Ed25519 signature.
pub const SIGNATURE_LEN: usize = 64;

/// Length in bytes of an encoded output index.
pub const OUTPUT_INDEX_LEN: usize = 4;

/// Length in bytes of an encoded output value.
pub const VALUE_LEN: usize = 8;

/// Default node budget for the max-fee search.
///
/// Each include or exclude decision counts as one node. Batches of up to
/// roughly twenty independent candidates finish well inside this budget.
pub const DEFAULT_MAX_SEARCH_NODES: u64 = 1 << 22;
