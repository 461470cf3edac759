//! Transaction model and wire serialization

use bitcoin::hashes::{sha256d, Hash};

use crate::error::{SignerError, SignerResult};
use crate::script::encoding::write_var_int;

pub const TX_VERSION: i32 = 1;
pub const DEFAULT_SEQUENCE: u32 = 0xffff_ffff;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxInput {
    /// Previous txid in display (big-endian) order
    pub previous_txid: [u8; 32],
    pub previous_output_index: u32,
    pub script_sig: Vec<u8>,
    pub sequence: u32,
    pub witness: Vec<Vec<u8>>,
}

impl TxInput {
    pub fn new(previous_txid_hex: &str, previous_output_index: u32) -> SignerResult<Self> {
        let bytes = hex::decode(previous_txid_hex.trim())?;
        let previous_txid: [u8; 32] = bytes.as_slice().try_into().map_err(|_| {
            SignerError::invalid_transaction(format!(
                "Previous txid must be 32 bytes, got {}",
                bytes.len()
            ))
        })?;

        Ok(Self {
            previous_txid,
            previous_output_index,
            script_sig: Vec::new(),
            sequence: DEFAULT_SEQUENCE,
            witness: Vec::new(),
        })
    }

    /// Outpoint as serialized on the wire: reversed txid then LE index
    pub fn outpoint_bytes(&self) -> [u8; 36] {
        let mut out = [0u8; 36];
        out[..32].copy_from_slice(&self.previous_txid);
        out[..32].reverse();
        out[32..].copy_from_slice(&self.previous_output_index.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxOutput {
    pub value: u64,
    pub script_pubkey: Vec<u8>,
}

impl TxOutput {
    pub fn new(value: u64, script_pubkey: Vec<u8>) -> Self {
        Self { value, script_pubkey }
    }

    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.value.to_le_bytes());
        write_var_int(self.script_pubkey.len() as u64, out);
        out.extend_from_slice(&self.script_pubkey);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub version: i32,
    pub inputs: Vec<TxInput>,
    pub outputs: Vec<TxOutput>,
    pub locktime: u32,
}

impl Transaction {
    pub fn new(inputs: Vec<TxInput>, outputs: Vec<TxOutput>) -> Self {
        Self {
            version: TX_VERSION,
            inputs,
            outputs,
            locktime: 0,
        }
    }

    pub fn has_witness(&self) -> bool {
        self.inputs.iter().any(|i| !i.witness.is_empty())
    }

    /// BIP144 layout when any input has a witness, legacy layout otherwise
    pub fn serialize(&self) -> Vec<u8> {
        self.encode(self.has_witness())
    }

    pub fn serialize_without_witness(&self) -> Vec<u8> {
        self.encode(false)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.serialize())
    }

    /// Reversed double-SHA256 of the legacy layout
    pub fn txid(&self) -> String {
        let mut hash = sha256d::Hash::hash(&self.serialize_without_witness()).to_byte_array();
        hash.reverse();
        hex::encode(hash)
    }

    fn encode(&self, with_witness: bool) -> Vec<u8> {
        let mut out = Vec::with_capacity(10 + self.inputs.len() * 150 + self.outputs.len() * 40);

        out.extend_from_slice(&self.version.to_le_bytes());
        if with_witness {
            out.extend_from_slice(&[0x00, 0x01]);
        }

        write_var_int(self.inputs.len() as u64, &mut out);
        for input in &self.inputs {
            out.extend_from_slice(&input.outpoint_bytes());
            write_var_int(input.script_sig.len() as u64, &mut out);
            out.extend_from_slice(&input.script_sig);
            out.extend_from_slice(&input.sequence.to_le_bytes());
        }

        write_var_int(self.outputs.len() as u64, &mut out);
        for output in &self.outputs {
            output.write_to(&mut out);
        }

        if with_witness {
            for input in &self.inputs {
                write_var_int(input.witness.len() as u64, &mut out);
                for item in &input.witness {
                    write_var_int(item.len() as u64, &mut out);
                    out.extend_from_slice(item);
                }
            }
        }

        out.extend_from_slice(&self.locktime.to_le_bytes());
        out
    }
}
