//! Signature Assembler
//!
//! Builds the unsigned transaction from a prepared skeleton, checks it
//! against the addresses it spends, signs every input the supplied keys
//! can sign, and either finalizes the transaction or hands back the
//! signatures produced so far.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::crypto::keys::KeyMaterial;
use crate::crypto::passphrase::{extract_key_with, EncryptionKey};
use crate::error::{SignerError, SignerResult};
use crate::script::address::address_to_script;
use crate::script::encoding::push_data;
use crate::script::templates::{hash160, p2pkh, p2wpkh, p2wsh, sha256, OP_0};
use crate::signing::prepared::{AddressType, InputAddressData, PreparedTransaction};
use crate::tx::sighash::{legacy_sighash, segwit_sighash};
use crate::tx::transaction::{Transaction, TxInput, TxOutput};
use crate::types::{SigningState, SIGHASH_ALL};
use crate::utils::amount::parse_amount;
use crate::{log_debug, log_error, log_info};

const MODULE: &str = "signing";

pub const UNSIGNED_TXID_MISMATCH: &str =
    "Expected unsigned transaction ID mismatch. Please report this error to support@block.io.";

/// One signature produced this round; DER hex without the sighash byte
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSignature {
    pub input_index: usize,
    pub public_key: String,
    pub signature: String,
}

/// Result of `create_and_sign_transaction`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub tx_type: String,
    pub tx_hex: String,
    /// `None` once the transaction is complete
    pub signatures: Option<Vec<InputSignature>>,
}

impl SignedPayload {
    pub fn state(&self) -> SigningState {
        match &self.signatures {
            None => SigningState::FullySigned,
            Some(sigs) if sigs.is_empty() => SigningState::Unsigned,
            Some(_) => SigningState::PartiallySigned,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.signatures.is_none()
    }

    /// The broadcastable hex, or `InsufficientSignatures` for a partial round
    pub fn require_complete(&self) -> SignerResult<&str> {
        match &self.signatures {
            None => Ok(&self.tx_hex),
            Some(sigs) => Err(SignerError::insufficient_signatures(format!(
                "Transaction is {:?} with {} signatures from this round",
                self.state(),
                sigs.len()
            ))),
        }
    }
}

/// Per-input signing plan
struct InputPlan<'a> {
    data: &'a InputAddressData,
    value: u64,
    subscript: Vec<u8>,
    /// Signer keys in the order signatures must appear
    signer_keys: Vec<String>,
    required: usize,
}

impl<'a> InputPlan<'a> {
    fn new(data: &'a InputAddressData, value: u64) -> SignerResult<Self> {
        if data.address_type.is_multisig() {
            let (redeem, keys) = data.redeem()?;
            Ok(Self {
                data,
                value,
                subscript: redeem,
                signer_keys: keys,
                required: data.required_signatures,
            })
        } else {
            let key = data.single_key()?;
            Ok(Self {
                data,
                value,
                subscript: p2pkh(&hash160(&key)),
                signer_keys: data.public_keys.clone(),
                required: 1,
            })
        }
    }

    fn digest(&self, tx: &Transaction, index: usize) -> SignerResult<[u8; 32]> {
        if self.data.address_type.is_segwit() {
            segwit_sighash(tx, index, &self.subscript, self.value, SIGHASH_ALL)
        } else {
            legacy_sighash(tx, index, &self.subscript, SIGHASH_ALL)
        }
    }
}

/// Sign a prepared transaction with the given keys
pub fn create_and_sign_transaction(
    prepared: &PreparedTransaction,
    keys: &[KeyMaterial],
) -> SignerResult<SignedPayload> {
    let mut tx = build_unsigned(prepared)?;
    let plans = plan_inputs(prepared)?;

    let unsigned_txid = tx.txid();
    if let Some(expected) = prepared.expected_unsigned_txid.as_deref() {
        if !expected.trim().eq_ignore_ascii_case(&unsigned_txid) {
            log_error!(
                MODULE,
                "Unsigned transaction does not match the expected txid",
                expected_txid = expected,
                unsigned_txid = unsigned_txid
            );
            return Err(SignerError::integrity_mismatch(UNSIGNED_TXID_MISMATCH).rejected());
        }
        log_info!(MODULE, "Verified unsigned transaction", unsigned_txid = unsigned_txid);
    }

    let unsigned_hex = tx.to_hex();

    // input index -> signer public key -> DER signature
    let mut collected: Vec<HashMap<String, Vec<u8>>> = vec![HashMap::new(); plans.len()];
    for (index, plan) in plans.iter().enumerate() {
        let mut cached: Option<[u8; 32]> = None;
        for key in keys {
            let Some(signer) = plan.signer_keys.iter().find(|k| key.matches_public_key(k)) else {
                continue;
            };
            if collected[index].contains_key(signer) {
                continue;
            }
            let digest = match cached {
                Some(d) => d,
                None => {
                    let d = plan.digest(&tx, index)?;
                    cached = Some(d);
                    d
                }
            };
            collected[index].insert(signer.clone(), key.sign(&digest)?);
        }
    }

    let produced: usize = collected.iter().map(|c| c.len()).sum();
    let complete_inputs = plans
        .iter()
        .zip(&collected)
        .filter(|(plan, sigs)| sigs.len() >= plan.required)
        .count();

    log_debug!(
        MODULE,
        "Signing round finished",
        inputs = plans.len(),
        complete_inputs = complete_inputs,
        signatures = produced
    );

    if complete_inputs == plans.len() {
        for (index, (plan, sigs)) in plans.iter().zip(&collected).enumerate() {
            finalize_input(&mut tx.inputs[index], plan, sigs)?;
        }
        log_info!(MODULE, "Transaction fully signed", txid = tx.txid());
        return Ok(SignedPayload {
            tx_type: prepared.tx_type.clone(),
            tx_hex: tx.to_hex(),
            signatures: None,
        });
    }

    let mut signatures = Vec::with_capacity(produced);
    for (index, (plan, sigs)) in plans.iter().zip(&collected).enumerate() {
        for signer in &plan.signer_keys {
            if let Some(sig) = sigs.get(signer) {
                signatures.push(InputSignature {
                    input_index: index,
                    public_key: signer.clone(),
                    signature: hex::encode(sig),
                });
            }
        }
    }

    log_info!(
        MODULE,
        "Transaction partially signed",
        complete_inputs = complete_inputs,
        inputs = plans.len()
    );

    Ok(SignedPayload {
        tx_type: prepared.tx_type.clone(),
        tx_hex: unsigned_hex,
        signatures: Some(signatures),
    })
}

/// Decrypt the prepared transaction's user key with an already stretched
/// key, then sign with it alongside `keys`
pub fn create_and_sign_with_user_key(
    prepared: &PreparedTransaction,
    keys: Vec<KeyMaterial>,
    encryption_key: &EncryptionKey,
) -> SignerResult<SignedPayload> {
    let mut keys = keys;
    if let Some(user_key) = prepared.user_key.as_ref() {
        keys.push(extract_key_with(user_key, encryption_key)?);
    }
    create_and_sign_transaction(prepared, &keys)
}

/// Unsigned transaction exactly as the skeleton describes it
pub fn build_unsigned(prepared: &PreparedTransaction) -> SignerResult<Transaction> {
    let mut inputs = Vec::with_capacity(prepared.inputs.len());
    for (position, input) in prepared.inputs.iter().enumerate() {
        if input.input_index != position {
            return Err(SignerError::invalid_transaction(format!(
                "Input at position {} has input_index {}",
                position, input.input_index
            )));
        }
        inputs.push(TxInput::new(&input.previous_txid, input.previous_output_index)?);
    }

    let mut outputs = Vec::with_capacity(prepared.outputs.len());
    for (position, output) in prepared.outputs.iter().enumerate() {
        if output.output_index != position {
            return Err(SignerError::invalid_transaction(format!(
                "Output at position {} has output_index {}",
                position, output.output_index
            )));
        }
        let script = address_to_script(&output.receiving_address, prepared.network)?;
        outputs.push(TxOutput::new(parse_amount(&output.output_value)?, script));
    }

    if inputs.is_empty() || outputs.is_empty() {
        return Err(SignerError::invalid_transaction(
            "Transaction needs at least one input and one output",
        ));
    }

    Ok(Transaction::new(inputs, outputs))
}

fn plan_inputs(prepared: &PreparedTransaction) -> SignerResult<Vec<InputPlan<'_>>> {
    let address_data = prepared.address_data_map();
    let mut plans = Vec::with_capacity(prepared.inputs.len());

    for input in &prepared.inputs {
        let data = address_data.get(input.spending_address.as_str()).ok_or_else(|| {
            SignerError::invalid_transaction(format!(
                "No address data for spending address {}",
                input.spending_address
            ))
        })?;

        let committed = address_to_script(&input.spending_address, prepared.network)?;
        if data.locking_script()? != committed {
            log_error!(
                MODULE,
                "Address data does not match spending address",
                address = input.spending_address
            );
            return Err(SignerError::integrity_mismatch(format!(
                "Declared {:?} script does not match address {}",
                data.address_type, input.spending_address
            )));
        }

        plans.push(InputPlan::new(data, parse_amount(&input.input_value)?)?);
    }

    Ok(plans)
}

fn with_sighash(der: &[u8], sighash_type: u32) -> Vec<u8> {
    let mut sig = Vec::with_capacity(der.len() + 1);
    sig.extend_from_slice(der);
    sig.push(sighash_type as u8);
    sig
}

/// Write scriptSig and witness for a fully signed input
fn finalize_input(
    input: &mut TxInput,
    plan: &InputPlan<'_>,
    sigs: &HashMap<String, Vec<u8>>,
) -> SignerResult<()> {
    // first `required` signatures in redeem key order
    let ordered: Vec<Vec<u8>> = plan
        .signer_keys
        .iter()
        .filter_map(|k| sigs.get(k))
        .take(plan.required)
        .map(|der| with_sighash(der, SIGHASH_ALL))
        .collect();

    if ordered.len() < plan.required {
        return Err(SignerError::insufficient_signatures(format!(
            "Input needs {} signatures, have {}",
            plan.required,
            ordered.len()
        )));
    }

    match plan.data.address_type {
        AddressType::P2pkh => {
            let pubkey = plan.data.single_key()?;
            let mut script_sig = push_data(&ordered[0])?;
            script_sig.extend(push_data(&pubkey)?);
            input.script_sig = script_sig;
        }
        AddressType::P2wpkh => {
            input.witness = vec![ordered[0].clone(), plan.data.single_key()?];
        }
        AddressType::P2wpkhOverP2sh => {
            let pubkey = plan.data.single_key()?;
            input.script_sig = push_data(&p2wpkh(&hash160(&pubkey)))?;
            input.witness = vec![ordered[0].clone(), pubkey];
        }
        AddressType::P2sh => {
            let mut script_sig = vec![OP_0];
            for sig in &ordered {
                script_sig.extend(push_data(sig)?);
            }
            script_sig.extend(push_data(&plan.subscript)?);
            input.script_sig = script_sig;
        }
        AddressType::P2wshOverP2sh => {
            input.script_sig = push_data(&p2wsh(&sha256(&plan.subscript)))?;
            input.witness = multisig_witness(ordered, &plan.subscript);
        }
        AddressType::WitnessV0 => {
            input.witness = multisig_witness(ordered, &plan.subscript);
        }
    }

    Ok(())
}

fn multisig_witness(sigs: Vec<Vec<u8>>, redeem: &[u8]) -> Vec<Vec<u8>> {
    let mut witness = Vec::with_capacity(sigs.len() + 2);
    witness.push(Vec::new());
    witness.extend(sigs);
    witness.push(redeem.to_vec());
    witness
}
