//! Signature hash computation for transaction signing.
//!
//! Two algorithms are provided. The legacy algorithm serializes a modified
//! copy of the transaction; it is used for every non-witness template. The
//! version 0 witness algorithm commits to the spent value and hashes the
//! prevouts, sequences and outputs separately.

use bitkoin_primitives::hash::sha256d;
use bitkoin_primitives::util::ByteWriter;
use bitkoin_script::Script;

use crate::output::TransactionOutput;
use crate::transaction::Transaction;
use crate::TransactionError;

// -----------------------------------------------------------------------
// Sighash flag constants
// -----------------------------------------------------------------------

/// Sign all inputs and all outputs (the default).
pub const SIGHASH_ALL: u32 = 0x01;

/// Sign all inputs but no outputs, allowing outputs to be modified.
pub const SIGHASH_NONE: u32 = 0x02;

/// Sign all inputs and only the output with the same index as the signed input.
pub const SIGHASH_SINGLE: u32 = 0x03;

/// Combined with another flag: only sign the current input, allowing other
/// inputs to be added later.
pub const SIGHASH_ANYONECANPAY: u32 = 0x80;

/// Mask applied to extract the base sighash type (ALL, NONE, SINGLE).
pub const SIGHASH_MASK: u32 = 0x1f;

/// The digest returned by the legacy algorithm for an input index past the
/// inputs, or a SINGLE signature past the outputs. It is `1` read as a
/// 256-bit big-endian integer.
pub const SIGHASH_ONE: [u8; 32] = {
    let mut one = [0u8; 32];
    one[31] = 0x01;
    one
};

// -----------------------------------------------------------------------
// Legacy signature hash
// -----------------------------------------------------------------------

/// Compute the legacy signature hash for input `input_index`.
///
/// A deep copy of the transaction is reshaped according to `hash_type`,
/// serialized, suffixed with `hash_type` as a little-endian u32 and
/// double-hashed. The live transaction is never touched.
///
/// # Arguments
/// * `tx` - The transaction being signed.
/// * `input_index` - Index of the input being signed.
/// * `prev_out_script` - The script being satisfied. `OP_CODESEPARATOR`s are
///   stripped before it is committed to.
/// * `hash_type` - Base type in the low five bits, optionally with
///   `SIGHASH_ANYONECANPAY`.
///
/// # Returns
/// The 32-byte digest, or [`SIGHASH_ONE`] when `input_index` is past the
/// inputs or a SINGLE signature has no matching output.
pub fn signature_hash(
    tx: &Transaction,
    input_index: usize,
    prev_out_script: &Script,
    hash_type: u32,
) -> [u8; 32] {
    if input_index >= tx.inputs.len() {
        return SIGHASH_ONE;
    }

    let script_code = prev_out_script.remove_code_separators();
    let mut tx_tmp = tx.clone();

    match hash_type & SIGHASH_MASK {
        SIGHASH_NONE => {
            tx_tmp.outputs.clear();
            zero_other_sequences(&mut tx_tmp, input_index);
        }
        SIGHASH_SINGLE => {
            if input_index >= tx.outputs.len() {
                return SIGHASH_ONE;
            }
            tx_tmp.outputs.truncate(input_index + 1);
            for output in &mut tx_tmp.outputs[..input_index] {
                *output = TransactionOutput::blank();
            }
            zero_other_sequences(&mut tx_tmp, input_index);
        }
        _ => {}
    }

    if hash_type & SIGHASH_ANYONECANPAY != 0 {
        let mut input = tx_tmp.inputs.swap_remove(input_index);
        input.unlock_script = script_code;
        tx_tmp.inputs = vec![input];
    } else {
        for (i, input) in tx_tmp.inputs.iter_mut().enumerate() {
            input.unlock_script = if i == input_index {
                script_code.clone()
            } else {
                Script::new()
            };
        }
    }

    let mut writer = ByteWriter::with_capacity(tx_tmp.byte_length() + 4);
    tx_tmp.write_to(&mut writer);
    writer.write_u32_le(hash_type);
    sha256d(writer.as_bytes())
}

fn zero_other_sequences(tx: &mut Transaction, input_index: usize) {
    for (i, input) in tx.inputs.iter_mut().enumerate() {
        if i != input_index {
            input.sequence = 0;
        }
    }
}

// -----------------------------------------------------------------------
// Version 0 witness signature hash
// -----------------------------------------------------------------------

/// Compute the version 0 witness signature hash for input `input_index`.
///
/// # Arguments
/// * `tx` - The transaction being signed.
/// * `input_index` - Index of the input being signed.
/// * `script_code` - The script being satisfied (for P2WPKH, the equivalent
///   P2PKH script).
/// * `value` - Value of the output being spent.
/// * `hash_type` - The combined sighash flags.
///
/// # Returns
/// The 32-byte digest, or `InputOutOfRange`.
pub fn witness_v0_signature_hash(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    value: u64,
    hash_type: u32,
) -> Result<[u8; 32], TransactionError> {
    let preimage = witness_v0_preimage(tx, input_index, script_code, value, hash_type)?;
    Ok(sha256d(&preimage))
}

/// The bytes hashed by [`witness_v0_signature_hash`]:
///
/// 1. version (4 bytes LE)
/// 2. hashPrevouts (32 bytes), zero with ANYONECANPAY
/// 3. hashSequence (32 bytes), zero with ANYONECANPAY, SINGLE or NONE
/// 4. outpoint of the signed input (32 + 4 bytes)
/// 5. script code (varint + script)
/// 6. value (8 bytes LE)
/// 7. sequence of the signed input (4 bytes LE)
/// 8. hashOutputs (32 bytes): all outputs, the matching output for SINGLE,
///    otherwise zero
/// 9. lock time (4 bytes LE)
/// 10. hash type (4 bytes LE)
pub fn witness_v0_preimage(
    tx: &Transaction,
    input_index: usize,
    script_code: &Script,
    value: u64,
    hash_type: u32,
) -> Result<Vec<u8>, TransactionError> {
    let input = tx.inputs.get(input_index).ok_or(TransactionError::InputOutOfRange {
        index: input_index,
        count: tx.inputs.len(),
    })?;
    let base_type = hash_type & SIGHASH_MASK;
    let anyone_can_pay = hash_type & SIGHASH_ANYONECANPAY != 0;

    let hash_prevouts = if anyone_can_pay {
        [0u8; 32]
    } else {
        prevouts_hash(tx)
    };

    let hash_sequence =
        if anyone_can_pay || base_type == SIGHASH_SINGLE || base_type == SIGHASH_NONE {
            [0u8; 32]
        } else {
            sequence_hash(tx)
        };

    let hash_outputs = if base_type != SIGHASH_SINGLE && base_type != SIGHASH_NONE {
        outputs_hash(&tx.outputs)
    } else if base_type == SIGHASH_SINGLE && input_index < tx.outputs.len() {
        outputs_hash(&tx.outputs[input_index..=input_index])
    } else {
        [0u8; 32]
    };

    let mut writer = ByteWriter::with_capacity(156 + script_code.len() + 9);
    writer.write_i32_le(tx.version);
    writer.write_bytes(&hash_prevouts);
    writer.write_bytes(&hash_sequence);
    writer.write_bytes(input.prev_hash.as_bytes());
    writer.write_u32_le(input.prev_index);
    writer.write_var_bytes(script_code.to_bytes());
    writer.write_u64_le(value);
    writer.write_u32_le(input.sequence);
    writer.write_bytes(&hash_outputs);
    writer.write_u32_le(tx.lock_time);
    writer.write_u32_le(hash_type);

    Ok(writer.into_bytes())
}

/// Double-hash of every outpoint (hash + index) in input order.
fn prevouts_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = ByteWriter::with_capacity(tx.inputs.len() * 36);
    for input in &tx.inputs {
        writer.write_bytes(input.prev_hash.as_bytes());
        writer.write_u32_le(input.prev_index);
    }
    sha256d(writer.as_bytes())
}

/// Double-hash of every input sequence number in input order.
fn sequence_hash(tx: &Transaction) -> [u8; 32] {
    let mut writer = ByteWriter::with_capacity(tx.inputs.len() * 4);
    for input in &tx.inputs {
        writer.write_u32_le(input.sequence);
    }
    sha256d(writer.as_bytes())
}

/// Double-hash of the serialized outputs.
fn outputs_hash(outputs: &[TransactionOutput]) -> [u8; 32] {
    let mut writer = ByteWriter::new();
    for output in outputs {
        output.write_to(&mut writer);
    }
    sha256d(writer.as_bytes())
}
