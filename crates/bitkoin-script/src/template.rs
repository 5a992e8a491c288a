//! Standard script templates.
//!
//! Output scripts are classified into a closed set of templates that the
//! transaction builder knows how to satisfy. Input scripts and witness
//! stacks are classified by the shape of what they push, so a partially
//! signed transaction can be taken apart again.

use std::fmt;

use serde::{Deserialize, Serialize};

use bitkoin_primitives::ec::PublicKey;
use bitkoin_primitives::hash::{hash160, sha256};

use crate::chunk::ScriptChunk;
use crate::opcodes::*;
use crate::script::Script;
use crate::ScriptError;

/// The kind of a script, without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptType {
    /// Pay to public key hash.
    P2pkh,
    /// Pay to bare public key.
    P2pk,
    /// Bare m-of-n multisig.
    Multisig,
    /// Pay to script hash.
    P2sh,
    /// Version 0 witness pay to public key hash.
    P2wpkh,
    /// Version 0 witness pay to script hash.
    P2wsh,
    /// `OP_RETURN` data carrier.
    NullData,
    /// Anything else.
    NonStandard,
}

impl fmt::Display for ScriptType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScriptType::P2pkh => "pubkeyhash",
            ScriptType::P2pk => "pubkey",
            ScriptType::Multisig => "multisig",
            ScriptType::P2sh => "scripthash",
            ScriptType::P2wpkh => "witnesspubkeyhash",
            ScriptType::P2wsh => "witnessscripthash",
            ScriptType::NullData => "nulldata",
            ScriptType::NonStandard => "nonstandard",
        };
        f.write_str(name)
    }
}

/// A classified output script together with the values it commits to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Template {
    /// `OP_DUP OP_HASH160 <20> OP_EQUALVERIFY OP_CHECKSIG`
    P2pkh { pubkey_hash: [u8; 20] },
    /// `<pubkey> OP_CHECKSIG`
    P2pk { pubkey: Vec<u8> },
    /// `OP_m <pubkey>... OP_n OP_CHECKMULTISIG`
    Multisig { m: usize, pubkeys: Vec<Vec<u8>> },
    /// `OP_HASH160 <20> OP_EQUAL`
    P2sh { script_hash: [u8; 20] },
    /// `OP_0 <20>`
    P2wpkh { pubkey_hash: [u8; 20] },
    /// `OP_0 <32>`
    P2wsh { script_hash: [u8; 32] },
    /// `OP_RETURN` followed by arbitrary bytes.
    NullData { data: Vec<u8> },
    /// Not one of the above.
    NonStandard,
}

impl Template {
    /// Pay to the hash160 of `pubkey`.
    pub fn p2pkh(pubkey: &[u8]) -> Template {
        Template::P2pkh { pubkey_hash: hash160(pubkey) }
    }

    /// Witness pay to the hash160 of `pubkey`.
    pub fn p2wpkh(pubkey: &[u8]) -> Template {
        Template::P2wpkh { pubkey_hash: hash160(pubkey) }
    }

    /// Pay to the hash160 of a redeem script.
    pub fn p2sh(redeem_script: &Script) -> Template {
        Template::P2sh { script_hash: hash160(redeem_script.to_bytes()) }
    }

    /// Witness pay to the sha256 of a witness script.
    pub fn p2wsh(witness_script: &Script) -> Template {
        Template::P2wsh { script_hash: sha256(witness_script.to_bytes()) }
    }

    /// Classify an output script.
    pub fn classify(script: &Script) -> Template {
        let b = script.to_bytes();

        if b.len() == 25
            && b[0] == OP_DUP
            && b[1] == OP_HASH160
            && b[2] == OP_DATA_20
            && b[23] == OP_EQUALVERIFY
            && b[24] == OP_CHECKSIG
        {
            return Template::P2pkh { pubkey_hash: array_at(b, 3) };
        }
        if b.len() == 23 && b[0] == OP_HASH160 && b[1] == OP_DATA_20 && b[22] == OP_EQUAL {
            return Template::P2sh { script_hash: array_at(b, 2) };
        }
        if b.len() == 22 && b[0] == OP_0 && b[1] == OP_DATA_20 {
            return Template::P2wpkh { pubkey_hash: array_at(b, 2) };
        }
        if b.len() == 34 && b[0] == OP_0 && b[1] == OP_DATA_32 {
            return Template::P2wsh { script_hash: array_at(b, 2) };
        }
        if b.first() == Some(&OP_RETURN) {
            return Template::NullData { data: b[1..].to_vec() };
        }

        let chunks = match script.chunks() {
            Ok(chunks) => chunks,
            Err(_) => return Template::NonStandard,
        };
        classify_p2pk(&chunks)
            .or_else(|| classify_multisig(&chunks))
            .unwrap_or(Template::NonStandard)
    }

    /// The kind of this template.
    pub fn script_type(&self) -> ScriptType {
        match self {
            Template::P2pkh { .. } => ScriptType::P2pkh,
            Template::P2pk { .. } => ScriptType::P2pk,
            Template::Multisig { .. } => ScriptType::Multisig,
            Template::P2sh { .. } => ScriptType::P2sh,
            Template::P2wpkh { .. } => ScriptType::P2wpkh,
            Template::P2wsh { .. } => ScriptType::P2wsh,
            Template::NullData { .. } => ScriptType::NullData,
            Template::NonStandard => ScriptType::NonStandard,
        }
    }

    /// Encode the template as an output script.
    ///
    /// # Returns
    /// The script, or `NonStandardTemplate` for `NonStandard` and for a
    /// multisig with an impossible m-of-n.
    pub fn to_script(&self) -> Result<Script, ScriptError> {
        let mut b = Vec::new();
        match self {
            Template::P2pkh { pubkey_hash } => {
                b.extend_from_slice(&[OP_DUP, OP_HASH160, OP_DATA_20]);
                b.extend_from_slice(pubkey_hash);
                b.extend_from_slice(&[OP_EQUALVERIFY, OP_CHECKSIG]);
            }
            Template::P2pk { pubkey } => {
                let mut script = Script::new();
                script.append_push_data(pubkey)?;
                script.append_opcodes(&[OP_CHECKSIG])?;
                return Ok(script);
            }
            Template::Multisig { m, pubkeys } => {
                let n = pubkeys.len();
                let (op_m, op_n) = match (small_int_op(*m), small_int_op(n)) {
                    (Some(op_m), Some(op_n)) if *m >= 1 && *m <= n => (op_m, op_n),
                    _ => {
                        return Err(ScriptError::NonStandardTemplate(format!(
                            "{}-of-{} multisig",
                            m, n
                        )))
                    }
                };
                let mut script = Script::new();
                script.append_opcodes(&[op_m])?;
                for pubkey in pubkeys {
                    script.append_push_data(pubkey)?;
                }
                script.append_opcodes(&[op_n, OP_CHECKMULTISIG])?;
                return Ok(script);
            }
            Template::P2sh { script_hash } => {
                b.extend_from_slice(&[OP_HASH160, OP_DATA_20]);
                b.extend_from_slice(script_hash);
                b.push(OP_EQUAL);
            }
            Template::P2wpkh { pubkey_hash } => {
                b.extend_from_slice(&[OP_0, OP_DATA_20]);
                b.extend_from_slice(pubkey_hash);
            }
            Template::P2wsh { script_hash } => {
                b.extend_from_slice(&[OP_0, OP_DATA_32]);
                b.extend_from_slice(script_hash);
            }
            Template::NullData { data } => {
                b.push(OP_RETURN);
                b.extend_from_slice(data);
            }
            Template::NonStandard => {
                return Err(ScriptError::NonStandardTemplate(
                    ScriptType::NonStandard.to_string(),
                ))
            }
        }
        Ok(Script::from(b))
    }
}

fn array_at<const N: usize>(bytes: &[u8], offset: usize) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(&bytes[offset..offset + N]);
    out
}

fn classify_p2pk(chunks: &[ScriptChunk]) -> Option<Template> {
    match chunks {
        [key, last] if last.op == OP_CHECKSIG => {
            let pubkey = key.data.as_deref()?;
            is_canonical_pubkey(pubkey).then(|| Template::P2pk { pubkey: pubkey.to_vec() })
        }
        _ => None,
    }
}

fn classify_multisig(chunks: &[ScriptChunk]) -> Option<Template> {
    if chunks.len() < 4 || chunks[chunks.len() - 1].op != OP_CHECKMULTISIG {
        return None;
    }
    let first = chunks[0].op;
    let second_last = chunks[chunks.len() - 2].op;
    if !is_small_int_op(first) || !is_small_int_op(second_last) {
        return None;
    }
    let m = small_int_value(first)?;
    let n = small_int_value(second_last)?;

    let keys = &chunks[1..chunks.len() - 2];
    if keys.len() != n || m > n {
        return None;
    }
    let pubkeys = keys
        .iter()
        .map(|chunk| {
            chunk
                .data
                .as_ref()
                .filter(|key| is_canonical_pubkey(key))
                .cloned()
        })
        .collect::<Option<Vec<_>>>()?;

    Some(Template::Multisig { m, pubkeys })
}

/// Classify an unlocking script by the shape of its pushes.
///
/// Checked in order: P2PKH, P2SH, multisig, P2PK. Scripts with non-push
/// opcodes are non-standard.
pub fn classify_input(script_sig: &Script) -> ScriptType {
    let stack = match script_sig.push_stack() {
        Some(stack) => stack,
        None => return ScriptType::NonStandard,
    };

    if is_p2pkh_input(&stack) {
        ScriptType::P2pkh
    } else if is_p2sh_input(&stack) {
        ScriptType::P2sh
    } else if is_multisig_input(&stack) {
        ScriptType::Multisig
    } else if is_p2pk_input(&stack) {
        ScriptType::P2pk
    } else {
        ScriptType::NonStandard
    }
}

/// Classify a witness stack: P2WPKH, P2WSH or non-standard.
pub fn classify_witness(stack: &[Vec<u8>]) -> ScriptType {
    if stack.len() == 2
        && is_canonical_signature(&stack[0])
        && stack[1].len() == 33
        && is_canonical_pubkey(&stack[1])
    {
        return ScriptType::P2wpkh;
    }

    match stack.split_last() {
        Some((witness_script, inner)) if !witness_script.is_empty() => {
            let witness_script = Script::from_bytes(witness_script);
            if stack_satisfies(inner, &witness_script) {
                ScriptType::P2wsh
            } else {
                ScriptType::NonStandard
            }
        }
        _ => ScriptType::NonStandard,
    }
}

fn is_p2pkh_input(stack: &[Vec<u8>]) -> bool {
    stack.len() == 2 && is_canonical_signature(&stack[0]) && is_canonical_pubkey(&stack[1])
}

fn is_p2pk_input(stack: &[Vec<u8>]) -> bool {
    stack.len() == 1 && is_canonical_signature(&stack[0])
}

/// `OP_0` followed by signatures, where missing signatures are `OP_0`
/// placeholders.
fn is_multisig_input(stack: &[Vec<u8>]) -> bool {
    stack.len() >= 2
        && stack[0].is_empty()
        && stack[1..]
            .iter()
            .all(|sig| sig.is_empty() || is_canonical_signature(sig))
}

fn is_p2sh_input(stack: &[Vec<u8>]) -> bool {
    let (redeem, inner) = match stack.split_last() {
        Some((redeem, inner)) if !redeem.is_empty() => (redeem, inner),
        _ => return false,
    };
    let redeem = Script::from_bytes(redeem);
    match Template::classify(&redeem).script_type() {
        ScriptType::P2wpkh | ScriptType::P2wsh => inner.is_empty(),
        _ => stack_satisfies(inner, &redeem),
    }
}

/// Whether `stack` has the shape of an unlocking stack for `script`.
fn stack_satisfies(stack: &[Vec<u8>], script: &Script) -> bool {
    match Template::classify(script).script_type() {
        ScriptType::P2pkh => is_p2pkh_input(stack),
        ScriptType::P2pk => is_p2pk_input(stack),
        ScriptType::Multisig => is_multisig_input(stack),
        _ => false,
    }
}

/// Whether a hash type names one of ALL, NONE or SINGLE, with or without
/// ANYONECANPAY.
fn is_defined_hash_type(hash_type: u8) -> bool {
    matches!(hash_type & !0x80, 0x01..=0x03)
}

/// Strict DER signature followed by a defined hash-type byte.
pub fn is_canonical_signature(sig: &[u8]) -> bool {
    match sig.split_last() {
        Some((&hash_type, der)) => is_defined_hash_type(hash_type) && is_strict_der(der),
        None => false,
    }
}

/// Strict DER: `0x30 len 0x02 rlen R 0x02 slen S`, minimal and
/// non-negative integers.
fn is_strict_der(der: &[u8]) -> bool {
    let len = der.len();
    if !(8..=72).contains(&len) || der[0] != 0x30 || der[1] as usize != len - 2 || der[2] != 0x02 {
        return false;
    }
    let r_len = der[3] as usize;
    if r_len == 0 || 5 + r_len >= len || der[4 + r_len] != 0x02 {
        return false;
    }
    let s_len = der[5 + r_len] as usize;
    if s_len == 0 || 6 + r_len + s_len != len {
        return false;
    }

    let r = &der[4..4 + r_len];
    let s = &der[6 + r_len..];
    is_minimal_positive(r) && is_minimal_positive(s)
}

fn is_minimal_positive(int: &[u8]) -> bool {
    if int[0] & 0x80 != 0 {
        return false;
    }
    !(int.len() > 1 && int[0] == 0x00 && int[1] & 0x80 == 0)
}

/// A SEC1 public key, compressed or uncompressed, that lies on the curve.
pub fn is_canonical_pubkey(pubkey: &[u8]) -> bool {
    let shape_ok = match pubkey.len() {
        33 => pubkey[0] == 0x02 || pubkey[0] == 0x03,
        65 => pubkey[0] == 0x04,
        _ => false,
    };
    shape_ok && PublicKey::from_bytes(pubkey).is_ok()
}
