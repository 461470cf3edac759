//! API client
//!
//! Dispatches remote method calls through the operation table and runs
//! the signing steps some of them need. Keys never leave the process:
//! withdrawals are signed locally, sweeps send only the public key.

use serde_json::{Map, Value};

use super::operations::{CallKind, OperationTable};
use super::session::Session;
use super::transport::{parse_response, HttpTransport, Transport};
use crate::crypto::keys::KeyMaterial;
use crate::error::{SignerError, SignerResult};
use crate::signing::assembler::{self, SignedPayload};
use crate::signing::prepared::PreparedTransaction;
use crate::signing::request::SignatureRequest;
use crate::signing::summary::{self, TransactionSummary};
use crate::utils::config::ClientConfig;
use crate::{log_debug, log_info, log_warn};

const MODULE: &str = "api";

pub const FINALIZE_WITHDRAWAL: &str = "sign_and_finalize_withdrawal";

pub const WITHDRAWAL_NOT_FINALIZED: &str = "Invalid Secret PIN or insufficient signatures for withdrawal.";

/// A prepared sweep and the key that was swept from
pub struct SweepPreparation {
    pub prepared: PreparedTransaction,
    pub key: KeyMaterial,
}

pub struct Client {
    api_key: String,
    api_version: u8,
    transport: Box<dyn Transport>,
    operations: OperationTable,
    session: Session,
}

impl Client {
    /// Client over HTTPS
    pub fn new(config: ClientConfig) -> SignerResult<Self> {
        let transport = HttpTransport::new(&config)?;
        Ok(Self::with_transport(config, transport))
    }

    pub fn from_env() -> SignerResult<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn with_transport(config: ClientConfig, transport: impl Transport + 'static) -> Self {
        Self {
            api_key: config.api_key,
            api_version: config.api_version,
            transport: Box::new(transport),
            operations: OperationTable::new(),
            session: Session::new(config.pin),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn operations_mut(&mut self) -> &mut OperationTable {
        &mut self.operations
    }

    /// Call a remote method, running whatever flow its kind requires
    pub fn call(&self, method: &str, params: Map<String, Value>) -> SignerResult<Value> {
        match self.operations.kind_of(method) {
            CallKind::Standard => self.request(method, params),
            CallKind::Withdraw => self.withdraw(method, params),
            CallKind::Sweep => self.sweep(method, params).map(|(response, _)| response),
        }
    }

    fn request(&self, method: &str, mut params: Map<String, Value>) -> SignerResult<Value> {
        params.insert("api_key".to_string(), Value::String(self.api_key.clone()));

        log_debug!(MODULE, "API call", method = method);
        let response = self.transport.send(method, &params)?;
        parse_response(method, response)
    }

    fn withdraw(&self, method: &str, mut params: Map<String, Value>) -> SignerResult<Value> {
        if self.api_version == 1 {
            if let Some(pin) = self.session.with_pin(|p| Value::String(p.to_string())) {
                params.insert("pin".to_string(), pin);
            }
        }

        let response = self.request(method, params)?;
        if !has_reference_id(&response) {
            return Ok(response);
        }

        let mut request = SignatureRequest::from_value(response)?;
        let record = request.encrypted_passphrase()?.ok_or_else(|| {
            SignerError::invalid_transaction("Signature request carries no encrypted passphrase")
        })?;
        let key = self.session.extract_key(&record)?;
        let outcome = request.sign_with(std::slice::from_ref(&key))?;

        log_info!(
            MODULE,
            "Signed withdrawal request",
            method = method,
            reference_id = request.reference_id,
            signed_slots = outcome.signed_slots
        );

        let mut finalize = Map::new();
        finalize.insert(
            "signature_data".to_string(),
            Value::String(request.to_signature_data()?),
        );
        let response = self.request(FINALIZE_WITHDRAWAL, finalize)?;

        if has_reference_id(&response) {
            let err = SignerError::insufficient_signatures(WITHDRAWAL_NOT_FINALIZED).rejected();
            log_warn!(
                MODULE,
                "Withdrawal not finalized",
                reference_id = request.reference_id,
                state = format!("{:?}", err.state)
            );
            return Err(err);
        }

        Ok(response)
    }

    fn sweep(&self, method: &str, mut params: Map<String, Value>) -> SignerResult<(Value, KeyMaterial)> {
        let wif = match params.remove("private_key") {
            Some(Value::String(wif)) => zeroize::Zeroizing::new(wif),
            Some(_) => return Err(SignerError::invalid_input("private_key must be a string")),
            None => return Err(SignerError::invalid_input("private_key is required for a sweep")),
        };

        let key = KeyMaterial::from_encoded_secret(&wif)?;
        params.insert("public_key".to_string(), Value::String(key.public_key_hex()));

        let response = self.request(method, params)?;
        Ok((response, key))
    }

    /// `prepare_sweep_transaction`, keeping the parsed key for signing
    pub fn prepare_sweep_transaction(&self, params: Map<String, Value>) -> SignerResult<SweepPreparation> {
        let (response, key) = self.sweep("prepare_sweep_transaction", params)?;
        Ok(SweepPreparation {
            prepared: PreparedTransaction::from_value(response)?,
            key,
        })
    }

    pub fn prepare_transaction(&self, params: Map<String, Value>) -> SignerResult<PreparedTransaction> {
        PreparedTransaction::from_value(self.call("prepare_transaction", params)?)
    }

    pub fn prepare_dtrust_transaction(&self, params: Map<String, Value>) -> SignerResult<PreparedTransaction> {
        PreparedTransaction::from_value(self.call("prepare_dtrust_transaction", params)?)
    }

    /// Sign locally. The user key is decrypted with the session PIN when
    /// the prepared transaction carries one and a PIN is available.
    pub fn create_and_sign_transaction(
        &self,
        prepared: &PreparedTransaction,
        keys: &[KeyMaterial],
    ) -> SignerResult<SignedPayload> {
        match prepared.user_key.as_ref() {
            Some(user_key) if self.session.has_pin() => {
                let mut all = Vec::with_capacity(keys.len() + 1);
                all.push(self.session.extract_key(user_key)?);
                all.extend(keys.iter().map(KeyMaterial::clone));
                assembler::create_and_sign_transaction(prepared, &all)
            }
            Some(_) if keys.is_empty() => Err(SignerError::invalid_input(
                "A PIN is required to sign with the prepared transaction's user key",
            )),
            _ => assembler::create_and_sign_transaction(prepared, keys),
        }
    }

    pub fn summarize_prepared_transaction(&self, prepared: &PreparedTransaction) -> SignerResult<TransactionSummary> {
        summary::summarize_prepared_transaction(prepared)
    }

    /// Post a signed (or partially signed) payload
    pub fn submit_transaction(&self, payload: &SignedPayload) -> SignerResult<Value> {
        let mut params = Map::new();
        params.insert("transaction_data".to_string(), serde_json::to_value(payload)?);
        self.call("submit_transaction", params)
    }
}

fn has_reference_id(response: &Value) -> bool {
    response
        .get("data")
        .and_then(|d| d.get("reference_id"))
        .map_or(false, |r| !r.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::transport::TransportResponse;
    use crate::crypto::passphrase::{encrypt_passphrase, stretch, EncryptionAlgorithm};
    use crate::error::ErrorCode;
    use crate::types::SigningState;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    const DIGEST: &str = "feedfacedeadbeeffeedfacedeadbeeffeedfacedeadbeeffeedfacedeadbeef";
    const PASSPHRASE: &str = "deadbeeffeedface";

    #[derive(Default)]
    struct MockTransport {
        replies: Mutex<VecDeque<TransportResponse>>,
        sent: Mutex<Vec<(String, Map<String, Value>)>>,
    }

    impl MockTransport {
        fn reply(self: &Arc<Self>, status: u16, body: Value) -> Arc<Self> {
            self.replies.lock().unwrap().push_back(TransportResponse {
                status,
                body: body.to_string(),
            });
            Arc::clone(self)
        }

        fn sent(&self) -> Vec<(String, Map<String, Value>)> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Transport for MockTransport {
        fn send(&self, method: &str, params: &Map<String, Value>) -> SignerResult<TransportResponse> {
            self.sent.lock().unwrap().push((method.to_string(), params.clone()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| SignerError::network("no reply queued"))
        }
    }

    fn client(mock: &Arc<MockTransport>, version: u8) -> Client {
        let config = ClientConfig::new("test-api-key")
            .with_pin("123456")
            .with_api_version(version);
        Client::with_transport(config, Arc::clone(mock))
    }

    fn signature_request() -> Value {
        let passphrase = hex::decode(PASSPHRASE).unwrap();
        let key = stretch("123456", "", 1024).unwrap();
        let record = encrypt_passphrase(&passphrase, &key, EncryptionAlgorithm::legacy()).unwrap();
        let signer = KeyMaterial::from_passphrase(&passphrase).unwrap().public_key_hex();

        json!({
            "status": "success",
            "data": {
                "reference_id": "0a1b2c3d",
                "inputs": [{
                    "input_no": 0,
                    "signatures_needed": 1,
                    "data_to_sign": DIGEST,
                    "signers": [{"signer_public_key": signer, "signed_data": null}]
                }],
                "encrypted_passphrase": serde_json::to_value(record).unwrap()
            }
        })
    }

    #[test]
    fn test_standard_call_adds_api_key() {
        let mock = Arc::new(MockTransport::default()).reply(200, json!({"status": "success", "data": {"x": 1}}));
        let response = client(&mock, 2).call("get_balance", Map::new()).unwrap();
        assert_eq!(response["data"]["x"], 1);

        let sent = mock.sent();
        assert_eq!(sent[0].0, "get_balance");
        assert_eq!(sent[0].1["api_key"], "test-api-key");
        assert!(sent[0].1.get("pin").is_none());
    }

    #[test]
    fn test_withdraw_signs_and_finalizes() {
        let mock = Arc::new(MockTransport::default())
            .reply(200, signature_request())
            .reply(200, json!({"status": "success", "data": {"txid": "abcd"}}));
        let c = client(&mock, 2);

        let response = c.call("withdraw", Map::new()).unwrap();
        assert_eq!(response["data"]["txid"], "abcd");

        let sent = mock.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].0, FINALIZE_WITHDRAWAL);

        let data: Value = serde_json::from_str(sent[1].1["signature_data"].as_str().unwrap()).unwrap();
        let expected = KeyMaterial::from_passphrase(&hex::decode(PASSPHRASE).unwrap())
            .unwrap()
            .sign_hex(DIGEST)
            .unwrap();
        assert_eq!(data["inputs"][0]["signers"][0]["signed_data"], Value::String(expected));
        assert_eq!(data["reference_id"], "0a1b2c3d");
        assert_eq!(c.session().cached_keys(), 1);
    }

    #[test]
    fn test_withdraw_without_signature_request() {
        let mock = Arc::new(MockTransport::default()).reply(200, json!({"status": "success", "data": {"txid": "ff"}}));
        let response = client(&mock, 2).call("withdraw_from_labels", Map::new()).unwrap();
        assert_eq!(response["data"]["txid"], "ff");
        assert_eq!(mock.sent().len(), 1);
    }

    #[test]
    fn test_withdraw_not_finalized() {
        let mock = Arc::new(MockTransport::default())
            .reply(200, signature_request())
            .reply(200, signature_request());
        let err = client(&mock, 2).call("withdraw", Map::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientSignatures);
        assert_eq!(err.message, WITHDRAWAL_NOT_FINALIZED);
        assert_eq!(err.state, Some(SigningState::Rejected));
    }

    #[test]
    fn test_v1_withdraw_sends_pin() {
        let mock = Arc::new(MockTransport::default()).reply(200, json!({"status": "success", "data": {}}));
        client(&mock, 1).call("withdraw", Map::new()).unwrap();
        assert_eq!(mock.sent()[0].1["pin"], "123456");
    }

    #[test]
    fn test_sweep_sends_public_key_only() {
        let wif = "cTj8Ydq9LhZgttMpxb7YjYSqsZ2ZfmyzVprQgjEzAzQ28frQi4ML";
        let mock = Arc::new(MockTransport::default()).reply(
            200,
            json!({"status": "success", "data": {
                "network": "LTCTEST",
                "tx_type": "sweep",
                "inputs": [],
                "outputs": [],
                "input_address_data": []
            }}),
        );

        let mut params = Map::new();
        params.insert("private_key".to_string(), json!(wif));
        params.insert("to_address".to_string(), json!("QTLcyTFrH7T6kqUsi1VV2mJVXmX3AmwUNH"));
        let sweep = client(&mock, 2).prepare_sweep_transaction(params).unwrap();

        let sent = mock.sent();
        assert!(sent[0].1.get("private_key").is_none());
        assert_eq!(sent[0].1["public_key"], Value::String(sweep.key.public_key_hex()));
        assert!(!sent[0].1.values().any(|v| v.as_str() == Some(wif)));
        assert_eq!(sweep.prepared.tx_type, "sweep");
    }

    #[test]
    fn test_sweep_rejects_bad_wif() {
        let mock = Arc::new(MockTransport::default());
        let mut params = Map::new();
        params.insert("private_key".to_string(), json!("not-a-wif"));
        let err = client(&mock, 2).call("prepare_sweep_transaction", params).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidKeyEncoding);
        assert!(mock.sent().is_empty());
    }

    #[test]
    fn test_remote_failure() {
        let mock = Arc::new(MockTransport::default())
            .reply(200, json!({"status": "fail", "data": {"error_message": "Invalid API Key"}}));
        let err = client(&mock, 2).call("get_balance", Map::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::RemoteApi);
        assert_eq!(err.message, "Failed: Invalid API Key");
    }

    #[test]
    fn test_submit_transaction_payload() {
        let mock = Arc::new(MockTransport::default()).reply(200, json!({"status": "success", "data": {"txid": "aa"}}));
        let payload = SignedPayload {
            tx_type: "basic".to_string(),
            tx_hex: "0100".to_string(),
            signatures: None,
        };
        client(&mock, 2).submit_transaction(&payload).unwrap();

        let sent = mock.sent();
        assert_eq!(sent[0].0, "submit_transaction");
        assert_eq!(sent[0].1["transaction_data"]["tx_hex"], "0100");
        assert!(sent[0].1["transaction_data"]["signatures"].is_null());
    }
}
