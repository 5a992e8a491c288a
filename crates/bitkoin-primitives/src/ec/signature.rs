//! ECDSA signature with DER serialization and RFC6979 deterministic nonces.
//!
//! Supports DER encoding/decoding, low-S normalization, optional low-R
//! nonce grinding and signature verification.

use k256::ecdsa::signature::hazmat::{PrehashVerifier, RandomizedPrehashSigner};
use k256::ecdsa;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::ec::private_key::PrivateKey;
use crate::ec::public_key::PublicKey;
use crate::PrimitivesError;

/// The secp256k1 curve order N.
const CURVE_ORDER: [u8; 32] = [
    0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFE, 0xBA, 0xAE, 0xDC, 0xE6, 0xAF, 0x48, 0xA0, 0x3B, 0xBF, 0xD2, 0x5E, 0x8C, 0xD0, 0x36,
    0x41, 0x41,
];

/// Half of the secp256k1 curve order (N/2), used for low-S normalization.
const HALF_ORDER: [u8; 32] = [
    0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF,
    0xFF, 0x5D, 0x57, 0x6E, 0x73, 0x57, 0xA4, 0x50, 0x1D, 0xDF, 0xE9, 0x2F, 0x46, 0x68, 0x1B,
    0x20, 0xA0,
];

/// Upper bound on low-R grinding rounds. Each round succeeds with
/// probability one half.
const MAX_LOW_R_ROUNDS: u64 = 256;

/// An ECDSA signature with R and S components, both big-endian.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Signature {
    r: [u8; 32],
    s: [u8; 32],
}

impl Signature {
    /// Create a signature from raw R and S 32-byte arrays.
    pub fn new(r: [u8; 32], s: [u8; 32]) -> Self {
        Signature { r, s }
    }

    /// The R component.
    pub fn r(&self) -> &[u8; 32] {
        &self.r
    }

    /// The S component.
    pub fn s(&self) -> &[u8; 32] {
        &self.s
    }

    /// Whether the DER encoding of R needs no sign-padding byte, i.e. the
    /// high bit of R is clear.
    pub fn has_low_r(&self) -> bool {
        self.r[0] < 0x80
    }

    /// Parse a DER-encoded ECDSA signature.
    ///
    /// Expected format: 0x30 <len> 0x02 <r_len> <r> 0x02 <s_len> <s>
    ///
    /// # Arguments
    /// * `bytes` - DER-encoded signature bytes, without a hash-type suffix.
    ///
    /// # Returns
    /// `Ok(Signature)` on success, or an error if the DER encoding is malformed.
    pub fn from_der(bytes: &[u8]) -> Result<Self, PrimitivesError> {
        let malformed =
            |why: &str| PrimitivesError::InvalidSignature(format!("malformed signature: {}", why));

        if bytes.len() < 8 {
            return Err(malformed("too short"));
        }
        if bytes[0] != 0x30 {
            return Err(malformed("no header magic"));
        }
        let sig_len = bytes[1] as usize;
        if sig_len + 2 != bytes.len() {
            return Err(malformed("bad length"));
        }

        let mut idx = 2;
        if bytes[idx] != 0x02 {
            return Err(malformed("no 1st int marker"));
        }
        let r_len = bytes[idx + 1] as usize;
        idx += 2;
        if r_len == 0 || idx + r_len + 2 > bytes.len() {
            return Err(malformed("bogus R length"));
        }
        let r_bytes = &bytes[idx..idx + r_len];
        idx += r_len;

        if bytes[idx] != 0x02 {
            return Err(malformed("no 2nd int marker"));
        }
        let s_len = bytes[idx + 1] as usize;
        idx += 2;
        if s_len == 0 || idx + s_len != bytes.len() {
            return Err(malformed("bogus S length"));
        }
        let s_bytes = &bytes[idx..idx + s_len];

        let r = to_32_bytes(r_bytes)?;
        let s = to_32_bytes(s_bytes)?;

        if is_zero(&r) || is_zero(&s) {
            return Err(PrimitivesError::InvalidSignature(
                "signature component is zero".to_string(),
            ));
        }
        if !is_less_than(&r, &CURVE_ORDER) || !is_less_than(&s, &CURVE_ORDER) {
            return Err(PrimitivesError::InvalidSignature(
                "signature component is >= curve.N".to_string(),
            ));
        }

        Ok(Signature { r, s })
    }

    /// Serialize the signature in DER format with low-S normalization.
    pub fn to_der(&self) -> Vec<u8> {
        let s = if is_greater_than(&self.s, &HALF_ORDER) {
            subtract_from_order(&self.s)
        } else {
            self.s
        };

        let rb = canonicalize_int(&self.r);
        let sb = canonicalize_int(&s);

        let total_len = 6 + rb.len() + sb.len();
        let mut out = Vec::with_capacity(total_len);
        out.push(0x30);
        out.push((total_len - 2) as u8);
        out.push(0x02);
        out.push(rb.len() as u8);
        out.extend_from_slice(&rb);
        out.push(0x02);
        out.push(sb.len() as u8);
        out.extend_from_slice(&sb);
        out
    }

    /// Sign a 32-byte digest with RFC6979 deterministic nonces.
    ///
    /// With `low_r` set, the nonce is re-derived with counter-seeded extra
    /// entropy until R has its high bit clear, which saves one byte of DER.
    /// The result is deterministic for a given key, digest and flag.
    ///
    /// # Arguments
    /// * `hash` - The 32-byte digest to sign.
    /// * `priv_key` - The private key to sign with.
    /// * `low_r` - Whether to grind for a low R value.
    ///
    /// # Errors
    /// `InvalidSignature` if signing fails, or if `low_r` is set and no
    /// low-R signature turns up within the round cap.
    pub fn sign(hash: &[u8; 32], priv_key: &PrivateKey, low_r: bool) -> Result<Self, PrimitivesError> {
        let signing_key = priv_key.signing_key();

        let (k256_sig, _recovery_id) = signing_key
            .sign_prehash_recoverable(hash)
            .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;
        let sig = Self::from_k256(&k256_sig);
        if !low_r {
            return Ok(sig);
        }

        grind_low_r(sig, |counter| {
            let mut rng = StdRng::seed_from_u64(counter);
            let k256_sig: ecdsa::Signature = signing_key
                .sign_prehash_with_rng(&mut rng, hash)
                .map_err(|e| PrimitivesError::InvalidSignature(e.to_string()))?;
            Ok(Self::from_k256(&k256_sig))
        })
    }

    /// Verify this signature against a 32-byte digest and public key.
    pub fn verify(&self, hash: &[u8; 32], pub_key: &PublicKey) -> bool {
        let k256_sig = match ecdsa::Signature::from_scalars(
            k256::FieldBytes::from(self.r),
            k256::FieldBytes::from(self.s),
        ) {
            Ok(sig) => sig,
            Err(_) => return false,
        };
        let k256_sig = k256_sig.normalize_s().unwrap_or(k256_sig);

        pub_key
            .verifying_key()
            .verify_prehash(hash, &k256_sig)
            .is_ok()
    }

    fn from_k256(sig: &ecdsa::Signature) -> Self {
        let (r_bytes, s_bytes) = sig.split_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&r_bytes);
        s.copy_from_slice(&s_bytes);
        if is_greater_than(&s, &HALF_ORDER) {
            s = subtract_from_order(&s);
        }
        Signature { r, s }
    }
}

/// Strip leading zeros and add a 0x00 sign-padding byte when the high bit
/// is set.
fn canonicalize_int(val: &[u8; 32]) -> Vec<u8> {
    let start = val.iter().position(|&b| b != 0).unwrap_or(31);
    let trimmed = &val[start..];

    if trimmed[0] & 0x80 != 0 {
        let mut out = Vec::with_capacity(trimmed.len() + 1);
        out.push(0x00);
        out.extend_from_slice(trimmed);
        out
    } else {
        trimmed.to_vec()
    }
}

/// Left-pad a variable-length big-endian integer to 32 bytes.
fn to_32_bytes(bytes: &[u8]) -> Result<[u8; 32], PrimitivesError> {
    let mut trimmed = bytes;
    while trimmed.len() > 1 && trimmed[0] == 0 {
        trimmed = &trimmed[1..];
    }
    if trimmed.len() > 32 {
        return Err(PrimitivesError::InvalidSignature(
            "integer value too large for 32 bytes".to_string(),
        ));
    }
    let mut out = [0u8; 32];
    out[32 - trimmed.len()..].copy_from_slice(trimmed);
    Ok(out)
}

fn is_zero(val: &[u8; 32]) -> bool {
    val.iter().all(|&b| b == 0)
}

fn is_less_than(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a < b
}

fn is_greater_than(a: &[u8; 32], b: &[u8; 32]) -> bool {
    a > b
}

/// N - val, for low-S normalization.
fn subtract_from_order(val: &[u8; 32]) -> [u8; 32] {
    let mut result = [0u8; 32];
    let mut borrow: i32 = 0;
    for i in (0..32).rev() {
        let diff = CURVE_ORDER[i] as i32 - val[i] as i32 - borrow;
        if diff < 0 {
            result[i] = (diff + 256) as u8;
            borrow = 1;
        } else {
            result[i] = diff as u8;
            borrow = 0;
        }
    }
    result
}

/// Re-sign with `next(1)`, `next(2)`, ... until R is low, giving up after
/// `MAX_LOW_R_ROUNDS` attempts.
fn grind_low_r<F>(first: Signature, mut next: F) -> Result<Signature, PrimitivesError>
where
    F: FnMut(u64) -> Result<Signature, PrimitivesError>,
{
    let mut sig = first;
    let mut counter = 0u64;
    while !sig.has_low_r() {
        if counter == MAX_LOW_R_ROUNDS {
            return Err(PrimitivesError::InvalidSignature(format!(
                "no low-R nonce in {} rounds",
                MAX_LOW_R_ROUNDS
            )));
        }
        counter += 1;
        sig = next(counter)?;
    }
    Ok(sig)
}
