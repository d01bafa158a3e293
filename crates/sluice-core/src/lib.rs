//! # sluice-core
//! UTXO validation and batch commit policies for the Sluice ledger.
//!
//! - [`validation`]: single-transaction validity against a UTXO pool.
//! - [`handler`]: greedy fixed-point batch commit.
//! - [`selector`]: max-fee batch commit by branch-and-bound search.

pub mod config;
pub mod constants;
pub mod crypto;
pub mod error;
pub mod handler;
pub mod selector;
pub mod snapshot;
pub mod traits;
pub mod types;
pub mod utxo_pool;
pub mod validation;

pub use handler::commit_greedy;
pub use selector::commit_max_fee;
pub use validation::is_valid;
