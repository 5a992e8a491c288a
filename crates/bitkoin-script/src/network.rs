//! Network parameters.
//!
//! The prefixes and version bytes that distinguish one network from
//! another. Loadable from JSON so callers can describe their own networks.

use serde::{Deserialize, Serialize};

/// BIP32 extended key version bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bip32Versions {
    /// Version for extended public keys.
    pub public: u32,
    /// Version for extended private keys.
    pub private: u32,
}

/// Prefixes and version bytes for one network.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkParams {
    /// Prefix prepended to signed messages.
    pub message_prefix: String,
    /// Human-readable part of bech32 addresses.
    pub bech32: String,
    /// Extended key versions.
    pub bip32: Bip32Versions,
    /// Base58 version byte of pay-to-pubkey-hash addresses.
    pub pub_key_hash: u8,
    /// Base58 version byte of pay-to-script-hash addresses.
    pub script_hash: u8,
    /// Version byte of WIF-encoded private keys.
    pub wif: u8,
}

impl NetworkParams {
    /// The main network.
    pub fn mainnet() -> Self {
        NetworkParams {
            message_prefix: "\x18Bitkoin Signed Message:\n".to_string(),
            bech32: "bk".to_string(),
            bip32: Bip32Versions {
                public: 0x0488_b21e,
                private: 0x0488_ade4,
            },
            pub_key_hash: 0x00,
            script_hash: 0x05,
            wif: 0x80,
        }
    }

    /// The test network.
    pub fn testnet() -> Self {
        NetworkParams {
            message_prefix: "\x18Bitkoin Signed Message:\n".to_string(),
            bech32: "tk".to_string(),
            bip32: Bip32Versions {
                public: 0x0435_87cf,
                private: 0x0435_8394,
            },
            pub_key_hash: 0x6f,
            script_hash: 0xc4,
            wif: 0xef,
        }
    }
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::mainnet()
    }
}
