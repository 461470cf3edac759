//! Address decoding and encoding
//!
//! Base58Check addresses map to P2PKH/P2SH by version byte; bech32 and
//! bech32m addresses map to witness programs. The network decides which
//! prefixes are accepted.

use bech32::{FromBase32, ToBase32, Variant};
use bitcoin::hashes::{sha256d, Hash};

use super::templates::{p2pkh, p2sh, witness_program, OP_0, OP_1, OP_16};
use crate::error::{SignerError, SignerResult};
use crate::types::Network;

/// Locking script committed to by `address` on `network`
pub fn address_to_script(address: &str, network: Network) -> SignerResult<Vec<u8>> {
    let trimmed = address.trim();
    if trimmed.is_empty() {
        return Err(SignerError::invalid_address("Address is empty"));
    }

    let segwit_prefix = format!("{}1", network.bech32_hrp());
    if trimmed.to_lowercase().starts_with(&segwit_prefix) {
        segwit_to_script(trimmed, network)
    } else {
        base58_to_script(trimmed, network)
    }
}

fn segwit_to_script(address: &str, network: Network) -> SignerResult<Vec<u8>> {
    let (hrp, data, variant) = bech32::decode(address)
        .map_err(|e| SignerError::invalid_address(format!("Invalid bech32 address: {}", e)))?;

    if hrp != network.bech32_hrp() {
        return Err(SignerError::invalid_address(format!(
            "Address prefix {} does not belong to {}",
            hrp, network
        )));
    }

    let (version, program) = data
        .split_first()
        .ok_or_else(|| SignerError::invalid_address("Missing witness version"))?;
    let version = version.to_u8();

    let expected_variant = if version == 0 { Variant::Bech32 } else { Variant::Bech32m };
    if variant != expected_variant {
        return Err(SignerError::invalid_address(format!(
            "Witness version {} uses the wrong checksum variant",
            version
        )));
    }

    let program = Vec::<u8>::from_base32(program)
        .map_err(|e| SignerError::invalid_address(format!("Invalid witness program: {}", e)))?;

    Ok(witness_program(version, &program)?)
}

fn base58_to_script(address: &str, network: Network) -> SignerResult<Vec<u8>> {
    let decoded = bs58::decode(address)
        .into_vec()
        .map_err(|e| SignerError::invalid_address(format!("Invalid base58: {}", e)))?;

    if decoded.len() != 25 {
        return Err(SignerError::invalid_address(format!(
            "Address decodes to {} bytes, expected 25",
            decoded.len()
        )));
    }

    let (payload, checksum) = decoded.split_at(21);
    if &sha256d::Hash::hash(payload)[..4] != checksum {
        return Err(SignerError::invalid_address("Invalid address checksum"));
    }

    let mut hash = [0u8; 20];
    hash.copy_from_slice(&payload[1..]);

    match payload[0] {
        v if v == network.p2pkh_prefix() => Ok(p2pkh(&hash)),
        v if v == network.p2sh_prefix() => Ok(p2sh(&hash)),
        v => Err(SignerError::invalid_address(format!(
            "Version byte 0x{:02x} is not valid for {}",
            v, network
        ))),
    }
}

/// Address for a standard locking script, the inverse of `address_to_script`
pub fn script_to_address(script: &[u8], network: Network) -> SignerResult<String> {
    match script {
        [0x76, 0xa9, 0x14, hash @ .., 0x88, 0xac] if hash.len() == 20 => {
            Ok(base58_address(network.p2pkh_prefix(), hash))
        }
        [0xa9, 0x14, hash @ .., 0x87] if hash.len() == 20 => {
            Ok(base58_address(network.p2sh_prefix(), hash))
        }
        [op, len, program @ ..]
            if (*op == OP_0 || (OP_1..=OP_16).contains(op)) && *len as usize == program.len() =>
        {
            let version = if *op == OP_0 { 0 } else { op - OP_1 + 1 };
            // validates program length rules
            witness_program(version, program)?;
            segwit_address(version, program, network)
        }
        _ => Err(SignerError::invalid_address("Script has no standard address form")),
    }
}

fn base58_address(version: u8, hash: &[u8]) -> String {
    let mut payload = Vec::with_capacity(25);
    payload.push(version);
    payload.extend_from_slice(hash);
    let checksum = sha256d::Hash::hash(&payload);
    payload.extend_from_slice(&checksum[..4]);
    bs58::encode(payload).into_string()
}

fn segwit_address(version: u8, program: &[u8], network: Network) -> SignerResult<String> {
    let variant = if version == 0 { Variant::Bech32 } else { Variant::Bech32m };
    let mut data = vec![bech32::u5::try_from_u8(version)
        .map_err(|e| SignerError::invalid_address(format!("Invalid witness version: {}", e)))?];
    data.extend(program.to_base32());

    bech32::encode(network.bech32_hrp(), data, variant)
        .map_err(|e| SignerError::invalid_address(format!("Bech32 encoding failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    const VECTORS: [(&str, &str); 6] = [
        ("mwop54ocwGjeErSTLCKgKxrdYp1k9o6Cgk", "76a914b2b2380a1e486aff5ae5ae74c892e902a72c0a4c88ac"),
        ("tltc1qk2erszs7fp407kh94e6v3yhfq2njczjvg4hnz6", "0014b2b2380a1e486aff5ae5ae74c892e902a72c0a4c"),
        ("Qgn9vENxxnNCPun8CN6KR1PPB7WCo9oxqc", "a914dd4edd1406541e476450fda7924720fe19f337b987"),
        ("QPZMy7ivpYdkJRLhtTx7tj5Fa4doQ2auWk", "a9142069605a7742286aef950b68ae7818f7294e876c87"),
        (
            "tltc1q6s4cxsg5q4vm0ksst6rxn68h6ksrwumy9tvzgqa6jxuqllxyzh0qxt7q8g",
            "0020d42b8341140559b7da105e8669e8f7d5a03773642ad82403ba91b80ffcc415de",
        ),
        ("QeyxkrKbgKvxbBY1HLiBYjMnZx1HDRMYmd", "a914c99a494597ade09b5194f9ec8e02d96607ae647987"),
    ];

    #[test]
    fn test_litecoin_testnet_addresses() {
        for (address, script) in VECTORS {
            let decoded = address_to_script(address, Network::LitecoinTestnet).unwrap();
            assert_eq!(hex::encode(&decoded), script, "{}", address);
        }
    }

    #[test]
    fn test_script_to_address_inverse() {
        for (address, script) in VECTORS {
            let encoded = script_to_address(&hex::decode(script).unwrap(), Network::LitecoinTestnet).unwrap();
            assert_eq!(encoded, address);
        }
    }

    #[test]
    fn test_wrong_network() {
        let err = address_to_script("tltc1qk2erszs7fp407kh94e6v3yhfq2njczjvg4hnz6", Network::Litecoin).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAddress);

        let err = address_to_script("QPZMy7ivpYdkJRLhtTx7tj5Fa4doQ2auWk", Network::BitcoinTestnet).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAddress);
    }

    #[test]
    fn test_bad_checksum() {
        let err = address_to_script("mwop54ocwGjeErSTLCKgKxrdYp1k9o6Cgm", Network::LitecoinTestnet).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidAddress);
    }

    #[test]
    fn test_taproot_passthrough() {
        // BIP350 test vector
        let script = address_to_script(
            "bc1p0xlxvlhemja6c4dqv22uapctqupfhlxm9h8z3k2e72q4k9hcz7vqzk5jj0",
            Network::Bitcoin,
        )
        .unwrap();
        assert_eq!(
            hex::encode(script),
            "512079be667ef9dcbbac55a06295ce870b07029bfcdb2dce28d959f2815b16f81798"
        );
    }

    #[test]
    fn test_v1_with_bech32_checksum_rejected() {
        let program = [0x79u8; 32];
        let mut data = vec![bech32::u5::try_from_u8(1).unwrap()];
        data.extend(program.to_base32());
        let wrong = bech32::encode("bc", data, Variant::Bech32).unwrap();
        assert!(address_to_script(&wrong, Network::Bitcoin).is_err());
    }
}
