//! Signature Digests
//!
//! Digests for legacy inputs and for BIP-143 segwit v0 inputs. The caller
//! picks the sighash type; the signer itself always uses `SIGHASH_ALL`.

use bitcoin::hashes::{sha256d, Hash};

use super::transaction::Transaction;
use crate::error::{SignerError, SignerResult};
use crate::script::encoding::write_var_int;

/// Legacy digest: every scriptSig emptied except the signed input, which
/// carries `subscript`; sighash type appended as u32 LE.
pub fn legacy_sighash(
    tx: &Transaction,
    input_index: usize,
    subscript: &[u8],
    sighash_type: u32,
) -> SignerResult<[u8; 32]> {
    check_index(tx, input_index)?;

    let mut serialized = Vec::new();
    serialized.extend_from_slice(&tx.version.to_le_bytes());

    write_var_int(tx.inputs.len() as u64, &mut serialized);
    for (i, input) in tx.inputs.iter().enumerate() {
        serialized.extend_from_slice(&input.outpoint_bytes());
        if i == input_index {
            write_var_int(subscript.len() as u64, &mut serialized);
            serialized.extend_from_slice(subscript);
        } else {
            serialized.push(0x00);
        }
        serialized.extend_from_slice(&input.sequence.to_le_bytes());
    }

    write_var_int(tx.outputs.len() as u64, &mut serialized);
    for output in &tx.outputs {
        output.write_to(&mut serialized);
    }

    serialized.extend_from_slice(&tx.locktime.to_le_bytes());
    serialized.extend_from_slice(&sighash_type.to_le_bytes());

    Ok(sha256d::Hash::hash(&serialized).to_byte_array())
}

/// BIP-143 digest for a segwit v0 input spending `value`
pub fn segwit_sighash(
    tx: &Transaction,
    input_index: usize,
    subscript: &[u8],
    value: u64,
    sighash_type: u32,
) -> SignerResult<[u8; 32]> {
    check_index(tx, input_index)?;
    let input = &tx.inputs[input_index];

    let mut prevouts = Vec::with_capacity(tx.inputs.len() * 36);
    let mut sequences = Vec::with_capacity(tx.inputs.len() * 4);
    for inp in &tx.inputs {
        prevouts.extend_from_slice(&inp.outpoint_bytes());
        sequences.extend_from_slice(&inp.sequence.to_le_bytes());
    }

    let mut outputs = Vec::new();
    for out in &tx.outputs {
        out.write_to(&mut outputs);
    }

    let mut serialized = Vec::with_capacity(160 + subscript.len());
    serialized.extend_from_slice(&tx.version.to_le_bytes());
    serialized.extend_from_slice(sha256d::Hash::hash(&prevouts).as_byte_array());
    serialized.extend_from_slice(sha256d::Hash::hash(&sequences).as_byte_array());
    serialized.extend_from_slice(&input.outpoint_bytes());
    write_var_int(subscript.len() as u64, &mut serialized);
    serialized.extend_from_slice(subscript);
    serialized.extend_from_slice(&value.to_le_bytes());
    serialized.extend_from_slice(&input.sequence.to_le_bytes());
    serialized.extend_from_slice(sha256d::Hash::hash(&outputs).as_byte_array());
    serialized.extend_from_slice(&tx.locktime.to_le_bytes());
    serialized.extend_from_slice(&sighash_type.to_le_bytes());

    Ok(sha256d::Hash::hash(&serialized).to_byte_array())
}

fn check_index(tx: &Transaction, input_index: usize) -> SignerResult<()> {
    if input_index >= tx.inputs.len() {
        return Err(SignerError::invalid_transaction(format!(
            "Input index {} out of range ({} inputs)",
            input_index,
            tx.inputs.len()
        )));
    }
    Ok(())
}
