//! Per-input signing state of the transaction builder.
//!
//! An `InputMeta` records what is known about the output an input spends,
//! which script the signature digest commits to, which public keys may sign
//! and which signatures have been collected. The free functions here move
//! an input between three representations: analysed from an existing
//! unlocking script (`expand_input`), prepared for a new signature
//! (`prepare_input`) and rendered back into an unlocking script and
//! witness (`render`).

use log::warn;

use bitkoin_primitives::ec::PublicKey;
use bitkoin_primitives::hash::hash160;
use bitkoin_script::{classify_input, classify_witness, Script, ScriptType, Template};

use crate::signer::decode_signature;
use crate::transaction::Transaction;
use crate::TransactionError;

/// What the builder knows about one input.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InputMeta {
    /// Locking script of the spent output, when known.
    pub prev_out_script: Option<Script>,
    /// Template of `prev_out_script`.
    pub prev_out_type: Option<ScriptType>,
    /// Value of the spent output, when known. Required for witness digests.
    pub value: Option<u64>,
    /// Redeem script of a P2SH output.
    pub redeem_script: Option<Script>,
    /// Template of `redeem_script`.
    pub redeem_script_type: Option<ScriptType>,
    /// Witness script of a P2WSH output (bare or nested in P2SH).
    pub witness_script: Option<Script>,
    /// Template of `witness_script`.
    pub witness_script_type: Option<ScriptType>,
    /// The script the signature digest commits to.
    pub sign_script: Option<Script>,
    /// Template satisfied by the signatures: P2PKH, P2PK or multisig.
    pub sign_type: Option<ScriptType>,
    /// Whether signatures use the witness digest and land in the witness.
    pub has_witness: bool,
    /// Public keys allowed to sign, in script order.
    pub pubkeys: Vec<Vec<u8>>,
    /// Pushed signatures (DER + hash type byte). Positional with `pubkeys`
    /// once the input is prepared; before that, in the order found.
    pub signatures: Vec<Option<Vec<u8>>>,
    /// Signatures needed to satisfy `sign_type`.
    pub required_signatures: usize,
}

impl InputMeta {
    /// Whether a signature can be added without further preparation.
    pub fn can_sign(&self) -> bool {
        self.sign_script.is_some()
            && self.sign_type.is_some()
            && !self.pubkeys.is_empty()
            && self.signatures.len() == self.pubkeys.len()
            && (!self.has_witness || self.value.is_some())
    }

    /// Hash types of the signatures collected so far.
    pub fn signature_hash_types(&self) -> impl Iterator<Item = u32> + '_ {
        self.signatures
            .iter()
            .flatten()
            .filter_map(|sig| sig.last().map(|&hash_type| hash_type as u32))
    }

    /// Number of signatures collected so far.
    pub fn signature_count(&self) -> usize {
        self.signatures.iter().flatten().count()
    }

    fn set_prev_out(&mut self, script: Script) {
        self.prev_out_type = Some(Template::classify(&script).script_type());
        self.prev_out_script = Some(script);
    }

    fn set_redeem(&mut self, script: Script) {
        self.redeem_script_type = Some(Template::classify(&script).script_type());
        self.redeem_script = Some(script);
    }

    fn set_witness_script(&mut self, script: Script) {
        self.witness_script_type = Some(Template::classify(&script).script_type());
        self.witness_script = Some(script);
    }
}

/// Signing material extracted from a script the signatures satisfy.
struct Signable {
    sign_type: ScriptType,
    pubkeys: Vec<Vec<u8>>,
    required: usize,
}

/// Digest of input `index` for a signature of `hash_type`.
pub(crate) fn signature_digest(
    tx: &Transaction,
    index: usize,
    meta: &InputMeta,
    hash_type: u32,
) -> Result<[u8; 32], TransactionError> {
    let script = meta
        .sign_script
        .as_ref()
        .ok_or_else(|| TransactionError::SigningError("input has no signing script".to_string()))?;
    if meta.has_witness {
        let value = meta.value.ok_or_else(|| {
            TransactionError::SigningError("witness input requires the spent value".to_string())
        })?;
        tx.witness_v0_signature_hash(index, script, value, hash_type)
    } else {
        Ok(tx.signature_hash(index, script, hash_type))
    }
}

// -----------------------------------------------------------------------
// Preparing an input for a new signature
// -----------------------------------------------------------------------

/// Fill in the signing fields of `meta` for a signer holding `our_pubkey`.
///
/// Explicit scripts take precedence over the spent output script; with
/// nothing known the input is treated as P2PKH to `our_pubkey`. Signatures
/// already present are kept if they verify against one of the resulting
/// public keys.
pub(crate) fn prepare_input(
    tx: &Transaction,
    index: usize,
    meta: &mut InputMeta,
    our_pubkey: &[u8],
    redeem_script: Option<Script>,
    witness_script: Option<Script>,
) -> Result<(), TransactionError> {
    let redeem_script = redeem_script.or_else(|| meta.redeem_script.clone());
    let witness_script = witness_script.or_else(|| meta.witness_script.clone());
    let previous = std::mem::take(&mut meta.signatures);

    let signable = match (redeem_script, witness_script) {
        (Some(redeem), Some(witness_script)) => {
            if redeem != Template::p2wsh(&witness_script).to_script()? {
                return Err(TransactionError::SigningError(
                    "redeem script does not wrap the witness script".to_string(),
                ));
            }
            prepare_nested_witness_script(meta, redeem, witness_script, our_pubkey)?
        }
        (Some(redeem), None) => {
            expect_prev_out(meta, Template::p2sh(&redeem).to_script()?)?;
            let signable = match Template::classify(&redeem) {
                Template::P2wpkh { pubkey_hash } => {
                    let signable = key_hash_signable(&pubkey_hash, our_pubkey)?;
                    meta.sign_script = Some(Template::P2pkh { pubkey_hash }.to_script()?);
                    meta.has_witness = true;
                    signable
                }
                Template::P2wsh { .. } => {
                    return Err(TransactionError::SigningError(
                        "witness script required to sign P2SH-P2WSH input".to_string(),
                    ))
                }
                _ => {
                    let signable = expand_signable(&redeem, our_pubkey)?;
                    meta.sign_script = Some(redeem.clone());
                    meta.has_witness = false;
                    signable
                }
            };
            meta.set_redeem(redeem);
            signable
        }
        (None, Some(witness_script)) => {
            if meta.prev_out_type == Some(ScriptType::P2sh) {
                let redeem = Template::p2wsh(&witness_script).to_script()?;
                prepare_nested_witness_script(meta, redeem, witness_script, our_pubkey)?
            } else {
                expect_prev_out(meta, Template::p2wsh(&witness_script).to_script()?)?;
                let signable = expand_signable(&witness_script, our_pubkey)?;
                meta.sign_script = Some(witness_script.clone());
                meta.has_witness = true;
                meta.set_witness_script(witness_script);
                signable
            }
        }
        (None, None) => match meta.prev_out_script.clone() {
            Some(prev_out_script) => match Template::classify(&prev_out_script) {
                Template::P2sh { .. } => {
                    return Err(TransactionError::SigningError(
                        "redeem script required to sign P2SH input".to_string(),
                    ))
                }
                Template::P2wsh { .. } => {
                    return Err(TransactionError::SigningError(
                        "witness script required to sign P2WSH input".to_string(),
                    ))
                }
                Template::P2wpkh { pubkey_hash } => {
                    let signable = key_hash_signable(&pubkey_hash, our_pubkey)?;
                    meta.sign_script = Some(Template::P2pkh { pubkey_hash }.to_script()?);
                    meta.has_witness = true;
                    signable
                }
                _ => {
                    let signable = expand_signable(&prev_out_script, our_pubkey)?;
                    meta.sign_script = Some(prev_out_script);
                    meta.has_witness = false;
                    signable
                }
            },
            None => {
                let script = Template::p2pkh(our_pubkey).to_script()?;
                meta.set_prev_out(script.clone());
                meta.sign_script = Some(script);
                meta.has_witness = false;
                Signable {
                    sign_type: ScriptType::P2pkh,
                    pubkeys: vec![our_pubkey.to_vec()],
                    required: 1,
                }
            }
        },
    };

    meta.sign_type = Some(signable.sign_type);
    meta.pubkeys = signable.pubkeys;
    meta.required_signatures = signable.required;
    attach_signatures(tx, index, meta, previous);
    Ok(())
}

fn prepare_nested_witness_script(
    meta: &mut InputMeta,
    redeem: Script,
    witness_script: Script,
    our_pubkey: &[u8],
) -> Result<Signable, TransactionError> {
    expect_prev_out(meta, Template::p2sh(&redeem).to_script()?)?;
    let signable = expand_signable(&witness_script, our_pubkey)?;
    meta.set_redeem(redeem);
    meta.sign_script = Some(witness_script.clone());
    meta.has_witness = true;
    meta.set_witness_script(witness_script);
    Ok(signable)
}

/// Record `expected` as the spent output script, or check it against the
/// one already known.
fn expect_prev_out(meta: &mut InputMeta, expected: Script) -> Result<(), TransactionError> {
    if let Some(known) = &meta.prev_out_script {
        if *known != expected {
            return Err(TransactionError::SigningError(format!(
                "previous output script {} does not match the supplied scripts",
                known
            )));
        }
        return Ok(());
    }
    meta.set_prev_out(expected);
    Ok(())
}

fn key_hash_signable(pubkey_hash: &[u8; 20], our_pubkey: &[u8]) -> Result<Signable, TransactionError> {
    if hash160(our_pubkey) != *pubkey_hash {
        return Err(TransactionError::SigningError(
            "key pair cannot sign for this input".to_string(),
        ));
    }
    Ok(Signable {
        sign_type: ScriptType::P2pkh,
        pubkeys: vec![our_pubkey.to_vec()],
        required: 1,
    })
}

/// Signing material of a script satisfied directly by signatures.
fn expand_signable(script: &Script, our_pubkey: &[u8]) -> Result<Signable, TransactionError> {
    match Template::classify(script) {
        Template::P2pkh { pubkey_hash } => key_hash_signable(&pubkey_hash, our_pubkey),
        Template::P2pk { pubkey } => Ok(Signable {
            sign_type: ScriptType::P2pk,
            pubkeys: vec![pubkey],
            required: 1,
        }),
        Template::Multisig { m, pubkeys } => Ok(Signable {
            sign_type: ScriptType::Multisig,
            pubkeys,
            required: m,
        }),
        other => Err(TransactionError::UnsupportedScript(format!(
            "{} script cannot be signed",
            other.script_type()
        ))),
    }
}

/// Place `found` signatures next to the public keys they verify against.
///
/// When the digest cannot be computed yet (no public keys, or a witness
/// input without its value) the signatures are kept as found.
fn attach_signatures(
    tx: &Transaction,
    index: usize,
    meta: &mut InputMeta,
    found: Vec<Option<Vec<u8>>>,
) {
    if meta.pubkeys.is_empty() || meta.sign_script.is_none() || (meta.has_witness && meta.value.is_none()) {
        meta.signatures = found;
        return;
    }

    let mut signatures = vec![None; meta.pubkeys.len()];
    for sig in found.into_iter().flatten() {
        match signature_position(tx, index, meta, &sig) {
            Some(position) if signatures[position].is_none() => signatures[position] = Some(sig),
            _ => warn!(
                "input {}: signature {} matches no public key, dropping it",
                index,
                hex::encode(&sig)
            ),
        }
    }
    meta.signatures = signatures;
}

fn signature_position(tx: &Transaction, index: usize, meta: &InputMeta, pushed: &[u8]) -> Option<usize> {
    let (signature, hash_type) = decode_signature(pushed)?;
    let digest = signature_digest(tx, index, meta, hash_type).ok()?;
    meta.pubkeys.iter().position(|pubkey| {
        PublicKey::from_bytes(pubkey)
            .map(|key| key.verify(&digest, &signature))
            .unwrap_or(false)
    })
}

// -----------------------------------------------------------------------
// Analysing an existing input
// -----------------------------------------------------------------------

/// Recover the signing state of input `index` from its unlocking script and
/// witness.
///
/// Unrecognised inputs yield an empty `InputMeta`; they are carried through
/// unchanged and only count as signed if they already carry data.
pub(crate) fn expand_input(tx: &Transaction, index: usize) -> Result<InputMeta, TransactionError> {
    let mut meta = InputMeta::default();
    let input = match tx.inputs.get(index) {
        Some(input) if input.is_signed() => input,
        _ => return Ok(meta),
    };
    let witness = &input.witness;

    let found = if input.unlock_script.is_empty() {
        match classify_witness(witness) {
            ScriptType::P2wpkh => {
                meta.set_prev_out(Template::p2wpkh(&witness[1]).to_script()?);
                expand_key_hash_witness(&mut meta, witness)?
            }
            ScriptType::P2wsh => match witness.split_last() {
                Some((witness_script, inner)) => {
                    let witness_script = Script::from_bytes(witness_script);
                    meta.set_prev_out(Template::p2wsh(&witness_script).to_script()?);
                    expand_embedded(&mut meta, witness_script, inner, true)
                }
                None => return Ok(meta),
            },
            _ => return Ok(meta),
        }
    } else {
        let stack = match input.unlock_script.push_stack() {
            Some(stack) => stack,
            None => return Ok(meta),
        };
        match classify_input(&input.unlock_script) {
            ScriptType::P2pkh => {
                let (sig, pubkey) = (&stack[0], &stack[1]);
                let script = Template::p2pkh(pubkey).to_script()?;
                meta.set_prev_out(script.clone());
                meta.sign_script = Some(script);
                meta.sign_type = Some(ScriptType::P2pkh);
                meta.pubkeys = vec![pubkey.clone()];
                meta.required_signatures = 1;
                vec![Some(sig.clone())]
            }
            ScriptType::P2sh => match stack.split_last() {
                Some((redeem, inner)) => {
                    let redeem = Script::from_bytes(redeem);
                    meta.set_prev_out(Template::p2sh(&redeem).to_script()?);
                    meta.set_redeem(redeem.clone());
                    match Template::classify(&redeem) {
                        Template::P2wpkh { .. } if classify_witness(witness) == ScriptType::P2wpkh => {
                            expand_key_hash_witness(&mut meta, witness)?
                        }
                        Template::P2wsh { .. } if classify_witness(witness) == ScriptType::P2wsh => {
                            match witness.split_last() {
                                Some((witness_script, inner)) => {
                                    let witness_script = Script::from_bytes(witness_script);
                                    expand_embedded(&mut meta, witness_script, inner, true)
                                }
                                None => return Ok(meta),
                            }
                        }
                        Template::P2wpkh { .. } | Template::P2wsh { .. } => return Ok(meta),
                        _ => expand_embedded(&mut meta, redeem, inner, false),
                    }
                }
                None => return Ok(meta),
            },
            ScriptType::P2pk => {
                // The key is only in the spent output, which is unknown here.
                meta.prev_out_type = Some(ScriptType::P2pk);
                meta.sign_type = Some(ScriptType::P2pk);
                meta.required_signatures = 1;
                meta.signatures = vec![Some(stack[0].clone())];
                return Ok(meta);
            }
            ScriptType::Multisig => {
                meta.prev_out_type = Some(ScriptType::Multisig);
                meta.sign_type = Some(ScriptType::Multisig);
                meta.signatures = multisig_signatures(&stack);
                return Ok(meta);
            }
            _ => return Ok(meta),
        }
    };

    attach_signatures(tx, index, &mut meta, found);
    Ok(meta)
}

/// `[signature, pubkey]` witness of a P2WPKH spend, bare or nested.
fn expand_key_hash_witness(
    meta: &mut InputMeta,
    witness: &[Vec<u8>],
) -> Result<Vec<Option<Vec<u8>>>, TransactionError> {
    let (sig, pubkey) = (&witness[0], &witness[1]);
    meta.sign_script = Some(Template::p2pkh(pubkey).to_script()?);
    meta.sign_type = Some(ScriptType::P2pkh);
    meta.has_witness = true;
    meta.pubkeys = vec![pubkey.clone()];
    meta.required_signatures = 1;
    Ok(vec![Some(sig.clone())])
}

/// Signatures of a stack satisfying an embedded redeem or witness script.
fn expand_embedded(
    meta: &mut InputMeta,
    script: Script,
    stack: &[Vec<u8>],
    witness: bool,
) -> Vec<Option<Vec<u8>>> {
    let found = match Template::classify(&script) {
        Template::P2pkh { .. } => {
            meta.sign_type = Some(ScriptType::P2pkh);
            meta.pubkeys = stack.get(1).cloned().into_iter().collect();
            meta.required_signatures = 1;
            vec![stack.first().cloned()]
        }
        Template::P2pk { pubkey } => {
            meta.sign_type = Some(ScriptType::P2pk);
            meta.pubkeys = vec![pubkey];
            meta.required_signatures = 1;
            vec![stack.first().cloned()]
        }
        Template::Multisig { m, pubkeys } => {
            meta.sign_type = Some(ScriptType::Multisig);
            meta.pubkeys = pubkeys;
            meta.required_signatures = m;
            multisig_signatures(stack)
        }
        _ => return Vec::new(),
    };

    meta.sign_script = Some(script.clone());
    meta.has_witness = witness;
    if witness {
        meta.set_witness_script(script);
    }
    found
}

/// Multisig stacks start with the dummy element consumed by
/// `OP_CHECKMULTISIG`; empty pushes after it are missing signatures.
fn multisig_signatures(stack: &[Vec<u8>]) -> Vec<Option<Vec<u8>>> {
    stack
        .iter()
        .skip(1)
        .map(|sig| if sig.is_empty() { None } else { Some(sig.clone()) })
        .collect()
}

// -----------------------------------------------------------------------
// Rendering
// -----------------------------------------------------------------------

/// Build the unlocking script and witness stack for a prepared input.
///
/// In strict mode multisig inputs carry exactly `required_signatures`
/// signatures and missing signatures are an error. Otherwise every slot is
/// rendered, with empty pushes standing in for missing signatures, so the
/// result can be analysed again by `expand_input`.
pub(crate) fn render(meta: &InputMeta, strict: bool) -> Result<(Script, Vec<Vec<u8>>), TransactionError> {
    let stack = signature_stack(meta, strict)?;

    let rendered = match meta.prev_out_type {
        Some(ScriptType::P2sh) => {
            let redeem = meta.redeem_script.as_ref().ok_or_else(|| {
                TransactionError::SigningError("P2SH input has no redeem script".to_string())
            })?;
            if meta.has_witness {
                let script_sig = Script::from_pushes(&[redeem.to_bytes()])?;
                (script_sig, with_witness_script(meta, stack)?)
            } else {
                let mut pushes = stack;
                pushes.push(redeem.to_bytes().to_vec());
                (Script::from_pushes(&pushes)?, Vec::new())
            }
        }
        Some(ScriptType::P2wsh) => (Script::new(), with_witness_script(meta, stack)?),
        Some(ScriptType::P2wpkh) => (Script::new(), stack),
        _ => (Script::from_pushes(&stack)?, Vec::new()),
    };
    Ok(rendered)
}

fn with_witness_script(meta: &InputMeta, mut stack: Vec<Vec<u8>>) -> Result<Vec<Vec<u8>>, TransactionError> {
    if meta.redeem_script_type == Some(ScriptType::P2wpkh) {
        return Ok(stack);
    }
    let witness_script = meta.witness_script.as_ref().ok_or_else(|| {
        TransactionError::SigningError("witness input has no witness script".to_string())
    })?;
    stack.push(witness_script.to_bytes().to_vec());
    Ok(stack)
}

fn signature_stack(meta: &InputMeta, strict: bool) -> Result<Vec<Vec<u8>>, TransactionError> {
    let not_enough = || {
        TransactionError::NotEnoughSignatures(format!(
            "{} of {} signatures present",
            meta.signature_count(),
            meta.required_signatures.max(1)
        ))
    };
    let first = meta.signatures.iter().flatten().next().cloned();

    match meta.sign_type {
        Some(ScriptType::P2pkh) => match (first, meta.pubkeys.first()) {
            (Some(sig), Some(pubkey)) => Ok(vec![sig, pubkey.clone()]),
            _ if strict => Err(not_enough()),
            _ => Ok(Vec::new()),
        },
        Some(ScriptType::P2pk) => match first {
            Some(sig) => Ok(vec![sig]),
            None if strict => Err(not_enough()),
            None => Ok(Vec::new()),
        },
        Some(ScriptType::Multisig) => {
            let mut stack = vec![Vec::new()];
            if strict {
                let present: Vec<Vec<u8>> = meta
                    .signatures
                    .iter()
                    .flatten()
                    .take(meta.required_signatures)
                    .cloned()
                    .collect();
                if present.len() < meta.required_signatures {
                    return Err(not_enough());
                }
                stack.extend(present);
            } else {
                stack.extend(meta.signatures.iter().map(|sig| sig.clone().unwrap_or_default()));
            }
            Ok(stack)
        }
        other => Err(TransactionError::UnsupportedScript(format!(
            "cannot render signatures for {}",
            other.map(|t| t.to_string()).unwrap_or_else(|| "unknown script".to_string())
        ))),
    }
}
