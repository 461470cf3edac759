//! Shared types
//!
//! Data structures that cross module boundaries are defined here
//! for consistent serialization.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::SignerError;

// =============================================================================
// Network Types
// =============================================================================

/// Networks the remote service prepares transactions for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Network {
    #[serde(rename = "BTC")]
    Bitcoin,
    #[serde(rename = "BTCTEST")]
    BitcoinTestnet,
    #[serde(rename = "LTC")]
    Litecoin,
    #[serde(rename = "LTCTEST")]
    LitecoinTestnet,
    #[serde(rename = "DOGE")]
    Dogecoin,
    #[serde(rename = "DOGETEST")]
    DogecoinTestnet,
}

impl Network {
    pub const ALL: [Network; 6] = [
        Network::Bitcoin,
        Network::BitcoinTestnet,
        Network::Litecoin,
        Network::LitecoinTestnet,
        Network::Dogecoin,
        Network::DogecoinTestnet,
    ];

    /// Ticker used by the remote service
    pub fn code(&self) -> &'static str {
        match self {
            Network::Bitcoin => "BTC",
            Network::BitcoinTestnet => "BTCTEST",
            Network::Litecoin => "LTC",
            Network::LitecoinTestnet => "LTCTEST",
            Network::Dogecoin => "DOGE",
            Network::DogecoinTestnet => "DOGETEST",
        }
    }

    /// Version byte prefixed to WIF-encoded secrets
    pub fn wif_prefix(&self) -> u8 {
        match self {
            Network::Bitcoin => 0x80,
            Network::BitcoinTestnet | Network::LitecoinTestnet => 0xef,
            Network::Litecoin => 0xb0,
            Network::Dogecoin => 0x9e,
            Network::DogecoinTestnet => 0xf1,
        }
    }

    pub fn p2pkh_prefix(&self) -> u8 {
        match self {
            Network::Bitcoin => 0x00,
            Network::BitcoinTestnet | Network::LitecoinTestnet => 0x6f,
            Network::Litecoin => 0x30,
            Network::Dogecoin => 0x1e,
            Network::DogecoinTestnet => 0x71,
        }
    }

    pub fn p2sh_prefix(&self) -> u8 {
        match self {
            Network::Bitcoin => 0x05,
            Network::BitcoinTestnet | Network::DogecoinTestnet => 0xc4,
            Network::Litecoin => 0x32,
            Network::LitecoinTestnet => 0x3a,
            Network::Dogecoin => 0x16,
        }
    }

    /// Human-readable part of segwit addresses
    pub fn bech32_hrp(&self) -> &'static str {
        match self {
            Network::Bitcoin => "bc",
            Network::BitcoinTestnet => "tb",
            Network::Litecoin => "ltc",
            Network::LitecoinTestnet => "tltc",
            Network::Dogecoin => "doge",
            Network::DogecoinTestnet => "tdge",
        }
    }

    pub fn is_testnet(&self) -> bool {
        matches!(
            self,
            Network::BitcoinTestnet | Network::LitecoinTestnet | Network::DogecoinTestnet
        )
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Network {
    type Err = SignerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Network::ALL
            .iter()
            .copied()
            .find(|n| n.code().eq_ignore_ascii_case(s))
            .ok_or_else(|| SignerError::invalid_input(format!("Unknown network: {}", s)))
    }
}

// =============================================================================
// Signing Types
// =============================================================================

/// Sighash type the signer commits to; its low byte follows every DER signature
pub const SIGHASH_ALL: u32 = 0x01;

/// Where a transaction (or signature request) stands after a signing round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SigningState {
    Unsigned,
    PartiallySigned,
    FullySigned,
    Rejected,
}

impl SigningState {
    /// Derive the state from how many slots are filled against the threshold
    pub fn from_counts(filled: usize, required: usize) -> Self {
        if filled == 0 && required > 0 {
            SigningState::Unsigned
        } else if filled >= required {
            SigningState::FullySigned
        } else {
            SigningState::PartiallySigned
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SigningState::FullySigned | SigningState::Rejected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_roundtrip() {
        for network in Network::ALL {
            let json = serde_json::to_string(&network).unwrap();
            assert_eq!(json, format!("\"{}\"", network.code()));
            assert_eq!(network.code().parse::<Network>().unwrap(), network);
        }
    }

    #[test]
    fn test_network_prefixes() {
        assert_eq!(Network::LitecoinTestnet.p2sh_prefix(), 0x3a);
        assert_eq!(Network::DogecoinTestnet.wif_prefix(), 0xf1);
        assert_eq!(Network::Bitcoin.bech32_hrp(), "bc");
        assert!("XMR".parse::<Network>().is_err());
    }

    #[test]
    fn test_signing_state_from_counts() {
        assert_eq!(SigningState::from_counts(0, 2), SigningState::Unsigned);
        assert_eq!(SigningState::from_counts(1, 2), SigningState::PartiallySigned);
        assert_eq!(SigningState::from_counts(3, 3), SigningState::FullySigned);
        assert!(SigningState::Rejected.is_terminal());
    }
}
