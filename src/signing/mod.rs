//! Signature Assembly
//!
//! Two round formats come back from the remote service:
//! 1. Prepared transactions, which are rebuilt, verified, signed and
//!    finalized locally (`assembler`)
//! 2. Signature requests, where the service supplies the digests and
//!    collects signatures per signer slot (`request`)

pub mod assembler;
pub mod prepared;
pub mod request;
pub mod summary;

pub use assembler::{
    build_unsigned, create_and_sign_transaction, create_and_sign_with_user_key, InputSignature, SignedPayload,
};
pub use prepared::{AddressType, InputAddressData, OutputCategory, PreparedInput, PreparedOutput, PreparedTransaction};
pub use request::{RoundOutcome, SignatureRequest, SignerSlot};
pub use summary::{summarize_prepared_transaction, TransactionSummary};
