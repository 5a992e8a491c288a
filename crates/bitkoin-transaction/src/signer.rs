//! The signing capability consumed by the transaction builder.
//!
//! The builder never touches key material. It asks a `Signer` for the public
//! key it answers for and for a signature over a 32-byte digest.

use bitkoin_primitives::ec::{PrivateKey, Signature};
use bitkoin_primitives::PrimitivesError;

/// Anything that can produce ECDSA signatures for one public key.
pub trait Signer {
    /// The SEC1-encoded public key whose signatures this signer produces.
    fn public_key(&self) -> Vec<u8>;

    /// Sign a 32-byte digest.
    ///
    /// # Arguments
    /// * `digest` - The signature hash to sign.
    /// * `low_r` - Prefer a nonce whose `r` value encodes without a leading
    ///   zero byte in DER.
    ///
    /// # Returns
    /// The signature, or an error if the key material is unavailable.
    fn sign(&self, digest: &[u8; 32], low_r: bool) -> Result<Signature, PrimitivesError>;
}

impl Signer for PrivateKey {
    /// The compressed public key.
    fn public_key(&self) -> Vec<u8> {
        self.pub_key().to_compressed().to_vec()
    }

    fn sign(&self, digest: &[u8; 32], low_r: bool) -> Result<Signature, PrimitivesError> {
        Signature::sign(digest, self, low_r)
    }
}

/// Encode a signature the way it is pushed in an unlocking script: DER
/// followed by the hash type byte.
pub fn encode_signature(signature: &Signature, hash_type: u32) -> Vec<u8> {
    let mut der = signature.to_der();
    der.push(hash_type as u8);
    der
}

/// Split a pushed signature into the DER signature and its hash type.
///
/// # Returns
/// `None` if the push is empty or the DER part does not parse.
pub fn decode_signature(pushed: &[u8]) -> Option<(Signature, u32)> {
    let (&hash_type, der) = pushed.split_last()?;
    let signature = Signature::from_der(der).ok()?;
    Some((signature, hash_type as u32))
}
