//! Prepared Transaction Model
//!
//! The unsigned skeleton the remote service returns from
//! `prepare_transaction`, `prepare_sweep_transaction` and
//! `prepare_dtrust_transaction`.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

use crate::crypto::passphrase::EncryptedPassphrase;
use crate::error::{SignerError, SignerResult};
use crate::script::templates::{hash160, multisig, p2pkh, p2sh, p2wpkh, p2wsh, parse_multisig, sha256};
use crate::types::Network;

// =============================================================================
// Address types
// =============================================================================

/// How an input's locking script is built and satisfied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    #[serde(rename = "P2PKH")]
    P2pkh,
    #[serde(rename = "P2WPKH")]
    P2wpkh,
    #[serde(rename = "P2WPKH-over-P2SH")]
    P2wpkhOverP2sh,
    #[serde(rename = "P2SH")]
    P2sh,
    #[serde(rename = "P2WSH-over-P2SH")]
    P2wshOverP2sh,
    #[serde(rename = "WITNESS_V0")]
    WitnessV0,
}

impl AddressType {
    /// BIP-143 digest instead of the legacy one
    pub fn is_segwit(&self) -> bool {
        !matches!(self, AddressType::P2pkh | AddressType::P2sh)
    }

    /// Spent through a redeem script rather than a single key
    pub fn is_multisig(&self) -> bool {
        matches!(
            self,
            AddressType::P2sh | AddressType::P2wshOverP2sh | AddressType::WitnessV0
        )
    }
}

// =============================================================================
// Prepared transaction
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedInput {
    pub input_index: usize,
    pub previous_txid: String,
    pub previous_output_index: u32,
    pub input_value: String,
    pub spending_address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputCategory {
    #[serde(rename = "user-specified")]
    UserSpecified,
    #[serde(rename = "change")]
    Change,
    #[serde(rename = "blockio-fee")]
    BlockioFee,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedOutput {
    pub output_index: usize,
    pub output_category: OutputCategory,
    pub output_value: String,
    pub receiving_address: String,
}

/// Script details for one spending address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAddressData {
    pub address: String,
    pub address_type: AddressType,
    pub public_keys: Vec<String>,
    pub required_signatures: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redeem_script: Option<String>,
}

impl InputAddressData {
    /// Redeem script for multisig types, taken from the record or rebuilt
    /// from the declared keys. Keys come back in script order.
    pub fn redeem(&self) -> SignerResult<(Vec<u8>, Vec<String>)> {
        match self.redeem_script.as_deref() {
            Some(redeem_hex) => {
                let redeem = hex::decode(redeem_hex.trim())?;
                let (required, keys) = parse_multisig(&redeem)?;
                if required != self.required_signatures {
                    return Err(SignerError::integrity_mismatch(format!(
                        "Redeem script for {} requires {} signatures, record says {}",
                        self.address, required, self.required_signatures
                    )));
                }

                let keys: Vec<String> = keys.iter().map(hex::encode).collect();
                let mut declared = self.public_keys.clone();
                let mut in_script = keys.clone();
                declared.sort();
                in_script.sort();
                if declared != in_script {
                    return Err(SignerError::integrity_mismatch(format!(
                        "Redeem script keys for {} differ from the declared public keys",
                        self.address
                    )));
                }
                Ok((redeem, keys))
            }
            None => {
                let keys = self
                    .public_keys
                    .iter()
                    .map(|k| hex::decode(k))
                    .collect::<Result<Vec<_>, _>>()?;
                let redeem = multisig(self.required_signatures, &keys)?;
                Ok((redeem, self.public_keys.clone()))
            }
        }
    }

    /// The single key of a non-multisig address
    pub fn single_key(&self) -> SignerResult<Vec<u8>> {
        match self.public_keys.as_slice() {
            [key] => Ok(hex::decode(key)?),
            keys => Err(SignerError::invalid_transaction(format!(
                "{:?} address {} must declare exactly one public key, got {}",
                self.address_type,
                self.address,
                keys.len()
            ))),
        }
    }

    /// Locking script this address data commits to
    pub fn locking_script(&self) -> SignerResult<Vec<u8>> {
        let script = match self.address_type {
            AddressType::P2pkh => p2pkh(&hash160(&self.single_key()?)),
            AddressType::P2wpkh => p2wpkh(&hash160(&self.single_key()?)),
            AddressType::P2wpkhOverP2sh => {
                let inner = p2wpkh(&hash160(&self.single_key()?));
                p2sh(&hash160(&inner))
            }
            AddressType::P2sh => p2sh(&hash160(&self.redeem()?.0)),
            AddressType::P2wshOverP2sh => {
                let inner = p2wsh(&sha256(&self.redeem()?.0));
                p2sh(&hash160(&inner))
            }
            AddressType::WitnessV0 => p2wsh(&sha256(&self.redeem()?.0)),
        };
        Ok(script)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreparedTransaction {
    pub network: Network,
    pub tx_type: String,
    pub inputs: Vec<PreparedInput>,
    pub outputs: Vec<PreparedOutput>,
    pub input_address_data: Vec<InputAddressData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_key: Option<EncryptedPassphrase>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_unsigned_txid: Option<String>,
}

impl PreparedTransaction {
    /// Accepts either the full API response or its `data` object
    pub fn from_value(value: Value) -> SignerResult<Self> {
        let data = match value {
            Value::Object(mut map) if map.contains_key("data") && !map.contains_key("inputs") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        Ok(serde_json::from_value(data)?)
    }

    pub fn from_json(json: &str) -> SignerResult<Self> {
        Self::from_value(serde_json::from_str(json)?)
    }

    pub fn address_data_map(&self) -> HashMap<&str, &InputAddressData> {
        self.input_address_data
            .iter()
            .map(|d| (d.address.as_str(), d))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PUB0: &str = "03820317ad251bca573c8fda2b8f26ffc9aae9d5ecb15b50ee08d8f9e009def38e";
    const PUB1: &str = "0238de8c9eb2842ecaf0cc61ee6ba23fe4e46f1cfd82eac0910e1d8e865bd76df9";

    fn data(address_type: AddressType, keys: &[&str], required: usize) -> InputAddressData {
        InputAddressData {
            address: "addr".to_string(),
            address_type,
            public_keys: keys.iter().map(|k| k.to_string()).collect(),
            required_signatures: required,
            redeem_script: None,
        }
    }

    #[test]
    fn test_locking_scripts() {
        let cases = [
            (AddressType::P2pkh, vec![PUB0], 1, "76a914b2b2380a1e486aff5ae5ae74c892e902a72c0a4c88ac"),
            (AddressType::P2wpkh, vec![PUB0], 1, "0014b2b2380a1e486aff5ae5ae74c892e902a72c0a4c"),
            (AddressType::P2wpkhOverP2sh, vec![PUB0], 1, "a914dd4edd1406541e476450fda7924720fe19f337b987"),
            (AddressType::P2sh, vec![PUB0, PUB1], 2, "a9142069605a7742286aef950b68ae7818f7294e876c87"),
            (
                AddressType::WitnessV0,
                vec![PUB0, PUB1],
                2,
                "0020d42b8341140559b7da105e8669e8f7d5a03773642ad82403ba91b80ffcc415de",
            ),
            (AddressType::P2wshOverP2sh, vec![PUB0, PUB1], 2, "a914c99a494597ade09b5194f9ec8e02d96607ae647987"),
        ];

        for (address_type, keys, required, expected) in cases {
            let script = data(address_type, &keys, required).locking_script().unwrap();
            assert_eq!(hex::encode(script), expected, "{:?}", address_type);
        }
    }

    #[test]
    fn test_redeem_script_must_match_keys() {
        let mut d = data(AddressType::P2sh, &[PUB0, PUB1], 2);
        d.redeem_script = Some(hex::encode(
            multisig(1, &[hex::decode(PUB0).unwrap(), hex::decode(PUB1).unwrap()]).unwrap(),
        ));
        assert!(d.redeem().is_err());
    }

    #[test]
    fn test_redeem_script_sets_key_order() {
        let mut d = data(AddressType::P2sh, &[PUB1, PUB0], 2);
        d.redeem_script = Some(hex::encode(
            multisig(2, &[hex::decode(PUB0).unwrap(), hex::decode(PUB1).unwrap()]).unwrap(),
        ));
        let (_, keys) = d.redeem().unwrap();
        assert_eq!(keys, vec![PUB0.to_string(), PUB1.to_string()]);
    }

    #[test]
    fn test_single_key_types_need_one_key() {
        let d = data(AddressType::P2pkh, &[PUB0, PUB1], 1);
        assert!(d.locking_script().is_err());
    }

    #[test]
    fn test_from_full_response() {
        let json = r#"{
            "status": "success",
            "data": {
                "network": "LTCTEST",
                "tx_type": "basic",
                "inputs": [],
                "outputs": [],
                "input_address_data": []
            }
        }"#;
        let prepared = PreparedTransaction::from_json(json).unwrap();
        assert_eq!(prepared.network, Network::LitecoinTestnet);
        assert!(prepared.user_key.is_none());
    }
}
