//! Transaction Module
//!
//! Unsigned/signed transaction model and the digests its inputs sign.

pub mod sighash;
pub mod transaction;

pub use sighash::{legacy_sighash, segwit_sighash};
pub use transaction::{Transaction, TxInput, TxOutput, DEFAULT_SEQUENCE, TX_VERSION};
