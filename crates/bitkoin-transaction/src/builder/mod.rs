//! Stateful transaction assembly and signing.
//!
//! A `TransactionBuilder` owns an in-progress transaction plus one
//! `InputMeta` per input. Every mutation is checked against the signatures
//! collected so far: a signature commits to part of the transaction, and
//! the builder refuses any change that would invalidate it.
//!
//! | Signature hash type | `add_input` | `add_output`                     |
//! |---------------------|-------------|----------------------------------|
//! | ALL                 | refused     | refused                          |
//! | NONE                | refused     | allowed                          |
//! | SINGLE on input j   | refused     | allowed once output j exists     |
//! | any + ANYONECANPAY  | allowed     | as for the base type             |

mod input_meta;

pub use input_meta::InputMeta;

use log::{debug, trace};

use bitkoin_primitives::chainhash::Hash;
use bitkoin_primitives::ec::public_key::COMPRESSED_LEN;
use bitkoin_script::{address, NetworkParams, Script, Template};

use crate::input::TransactionInput;
use crate::sighash::{SIGHASH_ALL, SIGHASH_ANYONECANPAY, SIGHASH_MASK, SIGHASH_NONE, SIGHASH_SINGLE};
use crate::signer::{encode_signature, Signer};
use crate::transaction::{Transaction, WIDE_TIME_VERSION};
use crate::TransactionError;

use input_meta::{expand_input, prepare_input, render, signature_digest};

/// Default fee ceiling in base units per virtual byte.
pub const DEFAULT_MAXIMUM_FEE_RATE: u64 = 2500;

/// The output an input spends: its locking script and, if known, its value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PrevOutput {
    /// Locking script of the spent output.
    pub script: Script,
    /// Value of the spent output.
    pub value: Option<u64>,
}

/// Arguments of [`TransactionBuilder::sign`].
pub struct SignParams<'a> {
    /// Index of the input to sign.
    pub input_index: usize,
    /// Produces the signature.
    pub signer: &'a dyn Signer,
    /// The spent output, if the builder does not know it yet.
    pub prev_output: Option<PrevOutput>,
    /// Redeem script of a P2SH output.
    pub redeem_script: Option<Script>,
    /// Signature hash type. Defaults to `SIGHASH_ALL`.
    pub hash_type: u32,
    /// Value of the spent output, for witness inputs.
    pub witness_value: Option<u64>,
    /// Witness script of a P2WSH output.
    pub witness_script: Option<Script>,
}

impl<'a> SignParams<'a> {
    /// Sign input `input_index` with `signer` under `SIGHASH_ALL`.
    pub fn new(input_index: usize, signer: &'a dyn Signer) -> Self {
        SignParams {
            input_index,
            signer,
            prev_output: None,
            redeem_script: None,
            hash_type: SIGHASH_ALL,
            witness_value: None,
            witness_script: None,
        }
    }

    /// Supply the spent output.
    pub fn with_prev_output(mut self, script: Script, value: Option<u64>) -> Self {
        self.prev_output = Some(PrevOutput { script, value });
        self
    }

    /// Supply the redeem script of a P2SH output.
    pub fn with_redeem_script(mut self, redeem_script: Script) -> Self {
        self.redeem_script = Some(redeem_script);
        self
    }

    /// Sign under `hash_type` instead of `SIGHASH_ALL`.
    pub fn with_hash_type(mut self, hash_type: u32) -> Self {
        self.hash_type = hash_type;
        self
    }

    /// Supply the spent value of a witness input.
    pub fn with_witness_value(mut self, value: u64) -> Self {
        self.witness_value = Some(value);
        self
    }

    /// Supply the witness script of a P2WSH output.
    pub fn with_witness_script(mut self, witness_script: Script) -> Self {
        self.witness_script = Some(witness_script);
        self
    }
}

/// Assembles a transaction and collects its signatures.
#[derive(Clone, Debug)]
pub struct TransactionBuilder {
    network: NetworkParams,
    maximum_fee_rate: u64,
    low_r: bool,
    tx: Transaction,
    inputs: Vec<InputMeta>,
}

impl TransactionBuilder {
    /// Create an empty builder for `network`.
    pub fn new(network: NetworkParams) -> Self {
        TransactionBuilder {
            network,
            maximum_fee_rate: DEFAULT_MAXIMUM_FEE_RATE,
            low_r: false,
            tx: Transaction::new(),
            inputs: Vec::new(),
        }
    }

    /// Rebuild the builder state of an existing, possibly partially signed,
    /// transaction.
    ///
    /// Each unlocking script and witness is matched against the standard
    /// templates to recover redeem and witness scripts, public keys and the
    /// signatures already applied. Multisig signatures are placed next to
    /// the key they verify against.
    ///
    /// # Returns
    /// The builder, or `InvalidTransaction` for coinbase or duplicate
    /// inputs.
    pub fn from_transaction(tx: &Transaction, network: NetworkParams) -> Result<Self, TransactionError> {
        let mut builder = TransactionBuilder::new(network);
        builder.tx.version = tx.version;
        builder.tx.time = tx.time;
        builder.tx.lock_time = tx.lock_time;
        builder.tx.outputs = tx.outputs.clone();

        for (index, input) in tx.inputs.iter().enumerate() {
            builder.check_new_input(&input.prev_hash, input.prev_index)?;
            let meta = expand_input(tx, index)?;
            debug!(
                "input {}: recovered {} signature(s) for {}",
                index,
                meta.signature_count(),
                meta.sign_type
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "unknown script".to_string())
            );
            builder.tx.inputs.push(input.clone());
            builder.inputs.push(meta);
        }

        Ok(builder)
    }

    // -----------------------------------------------------------------
    // Configuration
    // -----------------------------------------------------------------

    /// Fee ceiling, in base units per virtual byte, enforced by `sign`.
    pub fn set_maximum_fee_rate(&mut self, rate: u64) {
        self.maximum_fee_rate = rate;
    }

    /// Grind signature nonces until `r` has its high bit clear.
    pub fn set_low_r(&mut self, low_r: bool) {
        self.low_r = low_r;
    }

    /// Set the transaction lock time.
    pub fn set_lock_time(&mut self, lock_time: u32) {
        self.tx.lock_time = lock_time;
    }

    /// Set the transaction version. This also picks the width of `time`:
    /// below version 2 only 32 bits are written, and building fails if the
    /// current time does not fit.
    pub fn set_version(&mut self, version: i32) {
        self.tx.version = version;
    }

    /// Set the transaction creation time. Values above `u32::MAX` need
    /// version 2 or later; see [`TransactionBuilder::set_version`].
    pub fn set_time(&mut self, time: u64) {
        self.tx.time = time;
    }

    /// The network used for address conversion.
    pub fn network(&self) -> &NetworkParams {
        &self.network
    }

    /// The configured fee ceiling.
    pub fn maximum_fee_rate(&self) -> u64 {
        self.maximum_fee_rate
    }

    /// Per-input signing state.
    pub fn inputs(&self) -> &[InputMeta] {
        &self.inputs
    }

    /// The transaction as assembled so far, partial signatures included.
    pub fn transaction(&self) -> &Transaction {
        &self.tx
    }

    // -----------------------------------------------------------------
    // Inputs
    // -----------------------------------------------------------------

    /// Add an input spending `prev_hash:vout`.
    ///
    /// # Arguments
    /// * `prev_hash` - Hash of the spent transaction, wire byte order.
    /// * `vout` - Index of the spent output.
    /// * `sequence` - Defaults to `0xFFFFFFFF`.
    /// * `prev_out_script` - Locking script of the spent output, if known.
    ///
    /// # Returns
    /// The new input's index, or `IllegalMutation` if a signature without
    /// ANYONECANPAY already exists.
    pub fn add_input(
        &mut self,
        prev_hash: Hash,
        vout: u32,
        sequence: Option<u32>,
        prev_out_script: Option<Script>,
    ) -> Result<usize, TransactionError> {
        self.push_input(prev_hash, vout, sequence, prev_out_script, None)
    }

    /// Add an input spending output `vout` of `prev_tx`. The spent output's
    /// script and value are recorded.
    pub fn add_input_from_tx(
        &mut self,
        prev_tx: &Transaction,
        vout: u32,
        sequence: Option<u32>,
    ) -> Result<usize, TransactionError> {
        let output = prev_tx.outputs.get(vout as usize).ok_or_else(|| {
            TransactionError::InvalidTransaction(format!(
                "previous transaction has no output {}",
                vout
            ))
        })?;
        let (script, value) = (output.lock_script.clone(), output.value);
        self.push_input(prev_tx.tx_id(), vout, sequence, Some(script), Some(value))
    }

    /// Add an input spending `txid:vout`, where `txid` is the byte-reversed
    /// hex id as displayed.
    pub fn add_input_from_txid(
        &mut self,
        txid: &str,
        vout: u32,
        sequence: Option<u32>,
        prev_out_script: Option<Script>,
    ) -> Result<usize, TransactionError> {
        let prev_hash = Hash::from_hex(txid)?;
        self.push_input(prev_hash, vout, sequence, prev_out_script, None)
    }

    fn push_input(
        &mut self,
        prev_hash: Hash,
        vout: u32,
        sequence: Option<u32>,
        prev_out_script: Option<Script>,
        value: Option<u64>,
    ) -> Result<usize, TransactionError> {
        if !self.can_modify_inputs() {
            return Err(TransactionError::IllegalMutation(
                "adding an input would invalidate existing signatures".to_string(),
            ));
        }
        self.check_new_input(&prev_hash, vout)?;

        let mut meta = InputMeta {
            value,
            ..InputMeta::default()
        };
        if let Some(script) = prev_out_script {
            meta.prev_out_type = Some(Template::classify(&script).script_type());
            meta.prev_out_script = Some(script);
        }

        let mut input = TransactionInput::new(prev_hash, vout);
        if let Some(sequence) = sequence {
            input.sequence = sequence;
        }
        self.tx.inputs.push(input);
        self.inputs.push(meta);

        let index = self.tx.inputs.len() - 1;
        debug!("added input {} spending {}:{}", index, prev_hash, vout);
        Ok(index)
    }

    fn check_new_input(&self, prev_hash: &Hash, vout: u32) -> Result<(), TransactionError> {
        if Transaction::is_coinbase_hash(prev_hash.as_bytes()) {
            return Err(TransactionError::InvalidTransaction(
                "coinbase inputs are not supported".to_string(),
            ));
        }
        if self
            .tx
            .inputs
            .iter()
            .any(|input| input.prev_hash == *prev_hash && input.prev_index == vout)
        {
            return Err(TransactionError::InvalidTransaction(format!(
                "duplicate input {}:{}",
                prev_hash, vout
            )));
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Outputs
    // -----------------------------------------------------------------

    /// Add an output paying `value` to `lock_script`.
    ///
    /// # Returns
    /// The new output's index, or `IllegalMutation` if an existing
    /// signature commits to the output list.
    pub fn add_output(&mut self, lock_script: Script, value: u64) -> Result<usize, TransactionError> {
        if !self.can_modify_outputs() {
            return Err(TransactionError::IllegalMutation(
                "adding an output would invalidate existing signatures".to_string(),
            ));
        }
        let index = self.tx.add_output(lock_script, value);
        debug!("added output {} of value {}", index, value);
        Ok(index)
    }

    /// Add an output paying `value` to a base58check address of this
    /// builder's network.
    pub fn add_output_address(&mut self, addr: &str, value: u64) -> Result<usize, TransactionError> {
        let lock_script = address::to_output_script(addr, &self.network)?;
        self.add_output(lock_script, value)
    }

    // -----------------------------------------------------------------
    // Mutation legality
    // -----------------------------------------------------------------

    /// `(input index, hash type)` of every signature collected so far.
    fn signature_hash_types(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        self.inputs
            .iter()
            .enumerate()
            .flat_map(|(index, meta)| meta.signature_hash_types().map(move |hash_type| (index, hash_type)))
    }

    /// Inputs may be added only while every signature is ANYONECANPAY.
    fn can_modify_inputs(&self) -> bool {
        self.signature_hash_types()
            .all(|(_, hash_type)| hash_type & SIGHASH_ANYONECANPAY != 0)
    }

    /// Outputs may be added unless a signature covers all outputs, or a
    /// SINGLE signature covers the position of the next output.
    fn can_modify_outputs(&self) -> bool {
        let next_output = self.tx.outputs.len();
        self.signature_hash_types()
            .all(|(index, hash_type)| match hash_type & SIGHASH_MASK {
                SIGHASH_NONE => true,
                SIGHASH_SINGLE => index < next_output,
                _ => false,
            })
    }

    /// Whether signing under `hash_type` now would commit to an empty output
    /// list that can no longer grow.
    fn needs_outputs(&self, hash_type: u32) -> bool {
        if !self.tx.outputs.is_empty() {
            return false;
        }
        if hash_type & SIGHASH_MASK == SIGHASH_ALL {
            return true;
        }
        self.signature_hash_types()
            .any(|(_, existing)| existing & SIGHASH_NONE == 0)
    }

    // -----------------------------------------------------------------
    // Signing
    // -----------------------------------------------------------------

    /// Sign one input.
    ///
    /// The input is prepared from whatever is known about the spent output
    /// (recorded metadata, `prev_output`, or the redeem and witness
    /// scripts), its digest is computed with the legacy or witness
    /// algorithm, and the signer's signature is placed at its public key's
    /// position. The unlocking script and witness are re-rendered.
    ///
    /// The call is atomic: on any error the builder is unchanged.
    ///
    /// # Errors
    /// * `InputOutOfRange` for a bad index.
    /// * `InvalidTransaction` when signing would commit to no outputs.
    /// * `UnsupportedScript` when the spent script has no signing template.
    /// * `SigningError` for inconsistent scripts or values, a key that
    ///   cannot sign, a duplicate signature, or an uncompressed key in a
    ///   witness input.
    /// * `FeeRateExceeded` when the known fee divided by the virtual size
    ///   exceeds the configured maximum.
    pub fn sign(&mut self, params: SignParams<'_>) -> Result<(), TransactionError> {
        let SignParams {
            input_index: index,
            signer,
            prev_output,
            redeem_script,
            hash_type,
            witness_value,
            witness_script,
        } = params;

        let count = self.tx.inputs.len();
        if index >= count {
            return Err(TransactionError::InputOutOfRange { index, count });
        }
        if self.needs_outputs(hash_type) {
            return Err(TransactionError::InvalidTransaction(
                "transaction needs outputs".to_string(),
            ));
        }

        let mut meta = self.inputs[index].clone();
        check_consistent("redeem script", &meta.redeem_script, &redeem_script)?;
        check_consistent("witness script", &meta.witness_script, &witness_script)?;
        if let Some(prev) = prev_output {
            apply_prev_output(&mut meta, prev)?;
        }
        if let Some(value) = witness_value {
            apply_value(&mut meta, value)?;
        }

        let pubkey = signer.public_key();
        if !meta.can_sign() {
            prepare_input(&self.tx, index, &mut meta, &pubkey, redeem_script, witness_script)?;
            if !meta.can_sign() {
                let reason = if meta.has_witness && meta.value.is_none() {
                    "witness input requires the spent value"
                } else {
                    "input cannot be signed"
                };
                return Err(TransactionError::SigningError(reason.to_string()));
            }
        }

        let digest = signature_digest(&self.tx, index, &meta, hash_type)?;
        trace!("input {} digest {} (hash type {:#04x})", index, hex::encode(digest), hash_type);

        let position = meta
            .pubkeys
            .iter()
            .position(|key| *key == pubkey)
            .ok_or_else(|| TransactionError::SigningError("key pair cannot sign for this input".to_string()))?;
        if meta.signatures[position].is_some() {
            return Err(TransactionError::SigningError(
                "signature already exists".to_string(),
            ));
        }
        if meta.has_witness && pubkey.len() != COMPRESSED_LEN {
            return Err(TransactionError::SigningError(
                "uncompressed public keys cannot sign witness inputs".to_string(),
            ));
        }

        let signature = signer.sign(&digest, self.low_r)?;
        meta.signatures[position] = Some(encode_signature(&signature, hash_type));

        let mut tx = self.tx.clone();
        let (unlock_script, witness) = render(&meta, false)?;
        tx.inputs[index].unlock_script = unlock_script;
        tx.inputs[index].witness = witness;
        self.check_fee_rate(&tx, index, &meta)?;

        debug!(
            "signed input {} ({} of {} signatures)",
            index,
            meta.signature_count(),
            meta.required_signatures
        );
        self.tx = tx;
        self.inputs[index] = meta;
        Ok(())
    }

    /// Fee is the sum of known input values minus the outputs; inputs of
    /// unknown value count as zero.
    fn check_fee_rate(&self, tx: &Transaction, index: usize, meta: &InputMeta) -> Result<(), TransactionError> {
        let inputs: u128 = self
            .inputs
            .iter()
            .enumerate()
            .filter_map(|(i, m)| if i == index { meta.value } else { m.value })
            .map(u128::from)
            .sum();
        let outputs: u128 = tx.outputs.iter().map(|o| u128::from(o.value)).sum();
        let fee = inputs.saturating_sub(outputs);

        let vsize = tx.virtual_size() as u128;
        let maximum = u128::from(self.maximum_fee_rate) * vsize;
        if fee > maximum {
            let fee_rate = (fee + vsize - 1) / vsize;
            return Err(TransactionError::FeeRateExceeded {
                fee_rate: u64::try_from(fee_rate).unwrap_or(u64::MAX),
                maximum: self.maximum_fee_rate,
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------
    // Finalizing
    // -----------------------------------------------------------------

    /// Finalize a fully signed transaction.
    ///
    /// Inputs of a known template are rendered with exactly the required
    /// signatures; other inputs must already carry an unlocking script or a
    /// witness.
    ///
    /// # Errors
    /// `InvalidTransaction` without inputs or outputs or when `time` is too
    /// wide for the version, `NotEnoughSignatures` if any input is not fully
    /// signed.
    pub fn build(&self) -> Result<Transaction, TransactionError> {
        self.finish(true)
    }

    /// Finalize whatever has been signed so far, for handing to another
    /// signer.
    ///
    /// # Errors
    /// `InvalidTransaction` when `time` is too wide for the version.
    pub fn build_incomplete(&self) -> Result<Transaction, TransactionError> {
        self.finish(false)
    }

    fn finish(&self, strict: bool) -> Result<Transaction, TransactionError> {
        if self.tx.version < WIDE_TIME_VERSION && self.tx.time > u64::from(u32::MAX) {
            return Err(TransactionError::InvalidTransaction(format!(
                "time {} does not fit the 32-bit field of version {}",
                self.tx.time, self.tx.version
            )));
        }
        if strict {
            if self.tx.inputs.is_empty() {
                return Err(TransactionError::InvalidTransaction(
                    "transaction has no inputs".to_string(),
                ));
            }
            if self.tx.outputs.is_empty() {
                return Err(TransactionError::InvalidTransaction(
                    "transaction has no outputs".to_string(),
                ));
            }
        }

        let mut tx = self.tx.clone();
        for (index, meta) in self.inputs.iter().enumerate() {
            let known = meta.sign_script.is_some() && meta.sign_type.is_some();
            if known && (strict || meta.signature_count() > 0) {
                let (unlock_script, witness) = render(meta, strict).map_err(|e| match e {
                    TransactionError::NotEnoughSignatures(reason) => {
                        TransactionError::NotEnoughSignatures(format!("input {}: {}", index, reason))
                    }
                    other => other,
                })?;
                tx.inputs[index].unlock_script = unlock_script;
                tx.inputs[index].witness = witness;
            } else if strict && !tx.inputs[index].is_signed() {
                return Err(TransactionError::NotEnoughSignatures(format!(
                    "input {} is not signed",
                    index
                )));
            }
        }
        Ok(tx)
    }
}

impl Default for TransactionBuilder {
    fn default() -> Self {
        Self::new(NetworkParams::default())
    }
}

fn check_consistent(what: &str, known: &Option<Script>, given: &Option<Script>) -> Result<(), TransactionError> {
    match (known, given) {
        (Some(known), Some(given)) if known != given => Err(TransactionError::SigningError(format!(
            "inconsistent {}",
            what
        ))),
        _ => Ok(()),
    }
}

fn apply_prev_output(meta: &mut InputMeta, prev: PrevOutput) -> Result<(), TransactionError> {
    if let Some(known) = &meta.prev_out_script {
        if *known != prev.script {
            return Err(TransactionError::SigningError(format!(
                "previous output script {} does not match the recorded {}",
                prev.script, known
            )));
        }
    } else {
        meta.prev_out_type = Some(Template::classify(&prev.script).script_type());
        meta.prev_out_script = Some(prev.script);
    }
    if let Some(value) = prev.value {
        apply_value(meta, value)?;
    }
    Ok(())
}

fn apply_value(meta: &mut InputMeta, value: u64) -> Result<(), TransactionError> {
    match meta.value {
        Some(known) if known != value => Err(TransactionError::SigningError(format!(
            "input value {} does not match witness value {}",
            known, value
        ))),
        _ => {
            meta.value = Some(value);
            Ok(())
        }
    }
}
