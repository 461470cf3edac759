//! Signature Requests
//!
//! The withdrawal and dTrust round format: a `reference_id`, digests to
//! sign per input, and signer slots keyed by public key. Every field the
//! remote service sends is kept so the request can be posted back as
//! `signature_data` unchanged apart from the filled slots.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::crypto::keys::KeyMaterial;
use crate::crypto::passphrase::EncryptedPassphrase;
use crate::error::{SignerError, SignerResult};
use crate::types::SigningState;
use crate::log_debug;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignerSlot {
    pub signer_public_key: String,
    #[serde(default)]
    pub signed_data: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SignerSlot {
    pub fn is_filled(&self) -> bool {
        self.signed_data.as_deref().map_or(false, |s| !s.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_no: Option<u64>,
    pub data_to_sign: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signatures_needed: Option<usize>,
    pub signers: Vec<SignerSlot>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RequestInput {
    /// Slots that must be filled; every listed signer when unstated
    pub fn required(&self) -> usize {
        self.signatures_needed.unwrap_or(self.signers.len())
    }

    pub fn filled(&self) -> usize {
        self.signers.iter().filter(|s| s.is_filled()).count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureRequest {
    pub reference_id: String,
    pub inputs: Vec<RequestInput>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What one `sign_with` call did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RoundOutcome {
    pub signed_slots: usize,
    pub state: SigningState,
}

impl SignatureRequest {
    /// Accepts either the full API response or its `data` object
    pub fn from_value(value: Value) -> SignerResult<Self> {
        let data = match value {
            Value::Object(mut map) if map.contains_key("data") && !map.contains_key("reference_id") => {
                map.remove("data").unwrap_or(Value::Null)
            }
            other => other,
        };
        Ok(serde_json::from_value(data)?)
    }

    /// The encrypted passphrase record attached by the service, if any
    pub fn encrypted_passphrase(&self) -> SignerResult<Option<EncryptedPassphrase>> {
        match self.extra.get("encrypted_passphrase") {
            None | Some(Value::Null) => Ok(None),
            Some(v) => Ok(Some(serde_json::from_value(v.clone())?)),
        }
    }

    pub fn state(&self) -> SigningState {
        let required: usize = self.inputs.iter().map(|i| i.required()).sum();
        let filled: usize = self.inputs.iter().map(|i| i.filled().min(i.required())).sum();
        SigningState::from_counts(filled, required)
    }

    /// Fill every empty slot one of `keys` matches. Works on a copy; on
    /// error the request is left untouched.
    pub fn sign_with(&mut self, keys: &[KeyMaterial]) -> SignerResult<RoundOutcome> {
        let mut inputs = self.inputs.clone();
        let mut signed_slots = 0;

        for input in inputs.iter_mut() {
            let mut digest: Option<Vec<u8>> = None;

            for slot in input.signers.iter_mut().filter(|s| !s.is_filled()) {
                let Some(key) = keys.iter().find(|k| k.matches_public_key(&slot.signer_public_key)) else {
                    continue;
                };

                if digest.is_none() {
                    let bytes = hex::decode(input.data_to_sign.trim())?;
                    if bytes.len() != 32 {
                        return Err(SignerError::invalid_input(format!(
                            "data_to_sign must be 32 bytes, got {}",
                            bytes.len()
                        )));
                    }
                    digest = Some(bytes);
                }

                let sig = key.sign(digest.as_deref().unwrap_or_default())?;
                slot.signed_data = Some(hex::encode(sig));
                signed_slots += 1;
            }
        }

        self.inputs = inputs;
        let state = self.state();

        log_debug!(
            "signing",
            "Signature request round finished",
            reference_id = self.reference_id,
            signed_slots = signed_slots,
            state = format!("{:?}", state)
        );

        Ok(RoundOutcome { signed_slots, state })
    }

    /// JSON posted back as the `signature_data` parameter
    pub fn to_signature_data(&self) -> SignerResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use serde_json::json;

    const SECRET: &str = "6b0e34587dece0ef042c4c7205ce6b3d4a64d0bc484735b9325f7971a0ead963";
    const PUBKEY: &str = "029c06f988dc6b44696e002e8abf496a13c73c2f1db3bde2dfb69be129f3711b01";
    const DIGEST: &str = "feedfacedeadbeeffeedfacedeadbeeffeedfacedeadbeeffeedfacedeadbeef";

    fn request() -> SignatureRequest {
        SignatureRequest::from_value(json!({
            "status": "success",
            "data": {
                "reference_id": "ref-1",
                "more_signatures_needed": true,
                "inputs": [{
                    "input_no": 0,
                    "signatures_needed": 2,
                    "data_to_sign": DIGEST,
                    "signers": [
                        {"signer_public_key": PUBKEY, "signed_data": null},
                        {"signer_public_key": "02ffff", "signed_data": null}
                    ]
                }],
                "encrypted_passphrase": {
                    "signer_address": "addr",
                    "signer_public_key": PUBKEY,
                    "passphrase": "AAAA"
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_sign_matching_slot() {
        let mut req = request();
        let key = KeyMaterial::from_hex_secret(SECRET).unwrap();
        let outcome = req.sign_with(&[key]).unwrap();

        assert_eq!(outcome.signed_slots, 1);
        assert_eq!(outcome.state, SigningState::PartiallySigned);
        assert_eq!(
            req.inputs[0].signers[0].signed_data.as_deref(),
            Some("3044022042b9b4d673c85798f226c85f55ea6e114a0805bd5a0efba35f14c05235bb67b2022016333edae230c0ab607e948b48ceaefb5cab07300fb869d9da0a1b0f6bb53f65")
        );
        assert!(req.inputs[0].signers[1].signed_data.is_none());
    }

    #[test]
    fn test_filled_slots_are_not_resigned() {
        let mut req = request();
        req.inputs[0].signers[0].signed_data = Some("3000".to_string());
        let key = KeyMaterial::from_hex_secret(SECRET).unwrap();
        let outcome = req.sign_with(&[key]).unwrap();
        assert_eq!(outcome.signed_slots, 0);
        assert_eq!(req.inputs[0].signers[0].signed_data.as_deref(), Some("3000"));
    }

    #[test]
    fn test_failed_round_leaves_request_untouched() {
        let mut req = request();
        req.inputs.push(RequestInput {
            input_no: Some(1),
            data_to_sign: "abcd".to_string(),
            signatures_needed: Some(1),
            signers: vec![SignerSlot {
                signer_public_key: PUBKEY.to_string(),
                signed_data: None,
                extra: Map::new(),
            }],
            extra: Map::new(),
        });
        let before = req.clone();
        let key = KeyMaterial::from_hex_secret(SECRET).unwrap();
        let err = req.sign_with(&[key]).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert_eq!(req, before);
    }

    #[test]
    fn test_unknown_fields_survive() {
        let req = request();
        let data: Value = serde_json::from_str(&req.to_signature_data().unwrap()).unwrap();
        assert_eq!(data["more_signatures_needed"], json!(true));
        assert_eq!(data["encrypted_passphrase"]["signer_address"], json!("addr"));
        assert_eq!(data["inputs"][0]["input_no"], json!(0));
    }

    #[test]
    fn test_encrypted_passphrase_record() {
        let record = request().encrypted_passphrase().unwrap().unwrap();
        assert_eq!(record.public_key.as_deref(), Some(PUBKEY));
        assert_eq!(record.encrypted_passphrase, "AAAA");
    }

    #[test]
    fn test_state_without_signatures() {
        assert_eq!(request().state(), SigningState::Unsigned);
    }
}
