//! Locking-script templates

use bitcoin::hashes::{hash160 as h160, sha256, Hash};

use super::encoding::push_data;
use super::{ScriptError, ScriptResult};

pub const OP_0: u8 = 0x00;
pub const OP_1: u8 = 0x51;
pub const OP_16: u8 = 0x60;
pub const OP_DUP: u8 = 0x76;
pub const OP_EQUAL: u8 = 0x87;
pub const OP_EQUALVERIFY: u8 = 0x88;
pub const OP_HASH160: u8 = 0xa9;
pub const OP_CHECKSIG: u8 = 0xac;
pub const OP_CHECKMULTISIG: u8 = 0xae;

/// RIPEMD160(SHA256(data))
pub fn hash160(data: &[u8]) -> [u8; 20] {
    h160::Hash::hash(data).to_byte_array()
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha256::Hash::hash(data).to_byte_array()
}

/// OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG
pub fn p2pkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(25);
    script.extend_from_slice(&[OP_DUP, OP_HASH160, 0x14]);
    script.extend_from_slice(pubkey_hash);
    script.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
    script
}

/// OP_HASH160 <20> OP_EQUAL
pub fn p2sh(script_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(23);
    script.extend_from_slice(&[OP_HASH160, 0x14]);
    script.extend_from_slice(script_hash);
    script.push(OP_EQUAL);
    script
}

/// OP_0 <20>
pub fn p2wpkh(pubkey_hash: &[u8; 20]) -> Vec<u8> {
    let mut script = Vec::with_capacity(22);
    script.extend_from_slice(&[OP_0, 0x14]);
    script.extend_from_slice(pubkey_hash);
    script
}

/// OP_0 <32>
pub fn p2wsh(script_hash: &[u8; 32]) -> Vec<u8> {
    let mut script = Vec::with_capacity(34);
    script.extend_from_slice(&[OP_0, 0x20]);
    script.extend_from_slice(script_hash);
    script
}

/// OP_n <program> for any witness version 0..=16
pub fn witness_program(version: u8, program: &[u8]) -> ScriptResult<Vec<u8>> {
    if version > 16 {
        return Err(ScriptError::InvalidWitnessProgram(format!(
            "version {} out of range",
            version
        )));
    }
    if !(2..=40).contains(&program.len()) {
        return Err(ScriptError::InvalidWitnessProgram(format!(
            "program length {} out of range",
            program.len()
        )));
    }
    if version == 0 && program.len() != 20 && program.len() != 32 {
        return Err(ScriptError::InvalidWitnessProgram(format!(
            "version 0 program must be 20 or 32 bytes, got {}",
            program.len()
        )));
    }

    let mut script = vec![if version == 0 { OP_0 } else { OP_1 - 1 + version }];
    script.extend(push_data(program)?);
    Ok(script)
}

/// OP_m <pubkey>... OP_n OP_CHECKMULTISIG
pub fn multisig(required: usize, pubkeys: &[Vec<u8>]) -> ScriptResult<Vec<u8>> {
    let n = pubkeys.len();
    if required == 0 || required > n || n > 16 {
        return Err(ScriptError::InvalidMultisig(format!(
            "{}-of-{} is not a valid threshold",
            required, n
        )));
    }

    let mut script = vec![OP_1 - 1 + required as u8];
    for key in pubkeys {
        if key.len() != 33 && key.len() != 65 {
            return Err(ScriptError::InvalidMultisig(format!(
                "public key of {} bytes",
                key.len()
            )));
        }
        script.extend(push_data(key)?);
    }
    script.push(OP_1 - 1 + n as u8);
    script.push(OP_CHECKMULTISIG);
    Ok(script)
}

/// Read back a bare multisig script: required count and keys in script order
pub fn parse_multisig(script: &[u8]) -> ScriptResult<(usize, Vec<Vec<u8>>)> {
    let small_int = |op: u8| -> Option<usize> {
        (OP_1..=OP_16).contains(&op).then(|| (op - OP_1 + 1) as usize)
    };

    if script.len() < 3 || script[script.len() - 1] != OP_CHECKMULTISIG {
        return Err(ScriptError::InvalidMultisig("missing OP_CHECKMULTISIG".to_string()));
    }

    let required = small_int(script[0])
        .ok_or_else(|| ScriptError::InvalidMultisig("missing required count".to_string()))?;
    let declared = small_int(script[script.len() - 2])
        .ok_or_else(|| ScriptError::InvalidMultisig("missing key count".to_string()))?;

    let body = &script[1..script.len() - 2];
    let mut keys = Vec::with_capacity(declared);
    let mut pos = 0;
    while pos < body.len() {
        let len = body[pos] as usize;
        if len != 33 && len != 65 {
            return Err(ScriptError::InvalidMultisig(format!("unexpected push of {} bytes", len)));
        }
        let key = body
            .get(pos + 1..pos + 1 + len)
            .ok_or_else(|| ScriptError::InvalidMultisig("truncated public key".to_string()))?;
        keys.push(key.to_vec());
        pos += 1 + len;
    }

    if keys.len() != declared || required > declared {
        return Err(ScriptError::InvalidMultisig(format!(
            "{}-of-{} with {} keys",
            required,
            declared,
            keys.len()
        )));
    }

    Ok((required, keys))
}
