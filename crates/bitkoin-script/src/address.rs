/// Base58Check address handling.
///
/// Converts between P2PKH/P2SH output scripts and their Base58Check address
/// strings, using the version bytes of a `NetworkParams`.

use bitkoin_primitives::hash::sha256d;

use crate::network::NetworkParams;
use crate::template::Template;
use crate::{Script, ScriptError};

/// Version byte + 20-byte hash + 4-byte checksum.
const ADDRESS_PAYLOAD_LEN: usize = 25;

/// A decoded Base58Check address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Address {
    /// The version byte.
    pub version: u8,
    /// The 20-byte hash the address commits to.
    pub hash: [u8; 20],
}

impl Address {
    /// Parse a Base58Check address string and verify its checksum.
    ///
    /// # Returns
    /// The version byte and hash, or an error for bad characters, a bad
    /// length or a checksum mismatch.
    pub fn from_string(addr: &str) -> Result<Self, ScriptError> {
        let decoded = bs58::decode(addr)
            .into_vec()
            .map_err(|_| ScriptError::InvalidAddress(format!("bad char for '{}'", addr)))?;

        if decoded.len() != ADDRESS_PAYLOAD_LEN {
            return Err(ScriptError::InvalidAddressLength(addr.to_string()));
        }

        let checksum = sha256d(&decoded[..21]);
        if decoded[21..] != checksum[..4] {
            return Err(ScriptError::EncodingChecksumFailed);
        }

        let mut hash = [0u8; 20];
        hash.copy_from_slice(&decoded[1..21]);
        Ok(Address {
            version: decoded[0],
            hash,
        })
    }

    /// Encode as a Base58Check string.
    pub fn to_base58(&self) -> String {
        let mut payload = Vec::with_capacity(ADDRESS_PAYLOAD_LEN);
        payload.push(self.version);
        payload.extend_from_slice(&self.hash);
        let checksum = sha256d(&payload);
        payload.extend_from_slice(&checksum[..4]);
        bs58::encode(payload).into_string()
    }
}

/// The address paying to `script` on `network`.
///
/// # Returns
/// The address string, or `NoMatchingAddress` if the script is neither
/// P2PKH nor P2SH.
pub fn from_output_script(script: &Script, network: &NetworkParams) -> Result<String, ScriptError> {
    let address = match Template::classify(script) {
        Template::P2pkh { pubkey_hash } => Address {
            version: network.pub_key_hash,
            hash: pubkey_hash,
        },
        Template::P2sh { script_hash } => Address {
            version: network.script_hash,
            hash: script_hash,
        },
        _ => return Err(ScriptError::NoMatchingAddress(script.to_hex())),
    };
    Ok(address.to_base58())
}

/// The output script paying to `address` on `network`.
///
/// # Returns
/// The script, or `UnsupportedAddress` if the version byte belongs to
/// neither the P2PKH nor the P2SH prefix of `network`.
pub fn to_output_script(address: &str, network: &NetworkParams) -> Result<Script, ScriptError> {
    let decoded = Address::from_string(address)?;
    let template = if decoded.version == network.pub_key_hash {
        Template::P2pkh { pubkey_hash: decoded.hash }
    } else if decoded.version == network.script_hash {
        Template::P2sh { script_hash: decoded.hash }
    } else {
        return Err(ScriptError::UnsupportedAddress(address.to_string()));
    };
    template.to_script()
}
