//! Script Codec
//!
//! Var-ints, data pushes, locking-script templates and address decoding.

pub mod address;
pub mod encoding;
pub mod templates;

use thiserror::Error;

use crate::error::SignerError;

pub use address::address_to_script;
pub use encoding::{decode_var_int, encode_var_int, push_data, write_var_int};
pub use templates::{hash160, multisig, p2pkh, p2sh, p2wpkh, p2wsh, parse_multisig, witness_program};

/// Errors from script construction and parsing
#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("Data of {0} bytes is too large to push")]
    PushTooLarge(usize),

    #[error("Truncated var_int")]
    TruncatedVarInt,

    #[error("Invalid multisig script: {0}")]
    InvalidMultisig(String),

    #[error("Invalid witness program: {0}")]
    InvalidWitnessProgram(String),
}

pub type ScriptResult<T> = Result<T, ScriptError>;

impl From<ScriptError> for SignerError {
    fn from(e: ScriptError) -> Self {
        match e {
            ScriptError::InvalidWitnessProgram(_) => SignerError::invalid_address(e.to_string()),
            _ => SignerError::invalid_transaction(e.to_string()),
        }
    }
}
