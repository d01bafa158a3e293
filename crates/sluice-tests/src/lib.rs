//! Integration and property test suite for the Sluice ledger.
//!
//! Exercises the validator and both commit policies end to end, and checks
//! the max-fee selector against an exhaustive oracle on random batches.

pub mod helpers;
