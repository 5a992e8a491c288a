//! Core transaction type.
//!
//! Represents a transaction with version, creation time, inputs, outputs
//! and lock time. Supports binary and hex serialization, size and weight
//! computation, transaction id computation with the coinbase special case,
//! and both signature-hash algorithms.

use std::fmt;

use bitkoin_primitives::chainhash::{double_hash_h, Hash};
use bitkoin_primitives::util::{ByteReader, ByteWriter, VarInt};
use bitkoin_script::Script;

use crate::input::{malformed, TransactionInput, DEFAULT_SEQUENCE_NUMBER};
use crate::output::TransactionOutput;
use crate::sighash;
use crate::TransactionError;

/// Versions below this carry a 32-bit `time`; this and above carry 64 bits.
pub const WIDE_TIME_VERSION: i32 = 2;

/// A transaction consisting of a version, a creation time, a set of inputs,
/// a set of outputs and a lock time.
///
/// # Wire format
///
/// | Field        | Size                                   |
/// |--------------|----------------------------------------|
/// | version      | 4 bytes (LE, signed)                   |
/// | time         | 4 bytes if version < 2, else 8 (LE)    |
/// | input count  | VarInt                                 |
/// | inputs       | variable (per input)                   |
/// | output count | VarInt                                 |
/// | outputs      | variable (per output)                  |
/// | lock_time    | 4 bytes (LE)                           |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    /// Transaction format version. Also selects the width of `time`.
    pub version: i32,

    /// Creation timestamp. Only the low 32 bits are serialized when
    /// `version < 2`.
    pub time: u64,

    /// Ordered list of transaction inputs.
    pub inputs: Vec<TransactionInput>,

    /// Ordered list of transaction outputs.
    pub outputs: Vec<TransactionOutput>,

    /// Lock time.
    pub lock_time: u32,
}

impl Transaction {
    /// Create a new empty transaction with version 1, time 0 and lock time 0.
    pub fn new() -> Self {
        Transaction {
            version: 1,
            time: 0,
            inputs: Vec::new(),
            outputs: Vec::new(),
            lock_time: 0,
        }
    }

    // -----------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------

    /// Parse a transaction from a hex-encoded string.
    pub fn from_hex(hex_str: &str) -> Result<Self, TransactionError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| TransactionError::MalformedTransaction(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Parse exactly one transaction; trailing bytes are an error.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        Self::parse(bytes, false)
    }

    /// Parse a transaction from the start of `bytes`.
    ///
    /// # Arguments
    /// * `bytes` - The raw transaction bytes.
    /// * `allow_trailing` - Accept bytes after the transaction. Used when
    ///   the transaction is embedded in a larger buffer and the caller
    ///   advances by `byte_length()`.
    ///
    /// # Returns
    /// `Ok(Transaction)` on success, or `MalformedTransaction` if the data
    /// is truncated or, without `allow_trailing`, has trailing bytes.
    pub fn parse(bytes: &[u8], allow_trailing: bool) -> Result<Self, TransactionError> {
        let mut reader = ByteReader::new(bytes);
        let tx = Self::read_from(&mut reader)?;
        if !allow_trailing && reader.remaining() != 0 {
            return Err(TransactionError::MalformedTransaction(format!(
                "trailing {} bytes after transaction",
                reader.remaining()
            )));
        }
        Ok(tx)
    }

    /// Deserialize a transaction from a `ByteReader`.
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, TransactionError> {
        let version = reader.read_i32_le().map_err(malformed("version"))?;
        let time = if version < WIDE_TIME_VERSION {
            reader.read_u32_le().map_err(malformed("time"))? as u64
        } else {
            reader.read_u64_le().map_err(malformed("time"))?
        };

        let input_count = read_count(reader, "input count")?;
        let mut inputs = Vec::new();
        for _ in 0..input_count {
            inputs.push(TransactionInput::read_from(reader)?);
        }

        let output_count = read_count(reader, "output count")?;
        let mut outputs = Vec::new();
        for _ in 0..output_count {
            outputs.push(TransactionOutput::read_from(reader)?);
        }

        let lock_time = reader.read_u32_le().map_err(malformed("lock time"))?;

        Ok(Transaction {
            version,
            time,
            inputs,
            outputs,
            lock_time,
        })
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// Serialize this transaction into a `ByteWriter`.
    ///
    /// Below version 2 only the low 32 bits of `time` are written.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_i32_le(self.version);
        if self.version < WIDE_TIME_VERSION {
            writer.write_u32_le(self.time as u32);
        } else {
            writer.write_u64_le(self.time);
        }

        writer.write_varint(VarInt::from(self.inputs.len()));
        for input in &self.inputs {
            input.write_to(writer);
        }

        writer.write_varint(VarInt::from(self.outputs.len()));
        for output in &self.outputs {
            output.write_to(writer);
        }

        writer.write_u32_le(self.lock_time);
    }

    /// Serialize this transaction to raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.byte_length());
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Serialize this transaction to a hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.to_bytes())
    }

    // -----------------------------------------------------------------
    // Size
    // -----------------------------------------------------------------

    /// Serialized size in bytes, computed without serializing.
    pub fn byte_length(&self) -> usize {
        let fixed = if self.version < WIDE_TIME_VERSION { 12 } else { 16 };
        fixed
            + VarInt::from(self.inputs.len()).length()
            + VarInt::from(self.outputs.len()).length()
            + self.inputs.iter().map(TransactionInput::byte_length).sum::<usize>()
            + self.outputs.iter().map(TransactionOutput::byte_length).sum::<usize>()
    }

    /// Weight: three times the base size plus the total size.
    ///
    /// Witness data is never serialized, so base and total size coincide
    /// and the weight is always four times `byte_length()`.
    pub fn weight(&self) -> usize {
        let base = self.byte_length();
        let total = self.byte_length();
        base * 3 + total
    }

    /// Virtual size: weight divided by four, rounded up.
    pub fn virtual_size(&self) -> usize {
        (self.weight() + 3) / 4
    }

    // -----------------------------------------------------------------
    // Transaction ID
    // -----------------------------------------------------------------

    /// The transaction id: the double-hash of the serialization, or the
    /// all-zero hash for a coinbase transaction.
    pub fn tx_id(&self) -> Hash {
        if self.is_coinbase() {
            return Hash::ZERO;
        }
        double_hash_h(&self.to_bytes())
    }

    /// The transaction id as byte-reversed hex.
    pub fn tx_id_hex(&self) -> String {
        self.tx_id().to_string()
    }

    /// Whether this transaction has exactly one input and that input spends
    /// the all-zero hash.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && Self::is_coinbase_hash(self.inputs[0].prev_hash.as_bytes())
    }

    /// Whether `hash` is the 32-byte all-zero previous hash of a coinbase
    /// input.
    pub fn is_coinbase_hash(hash: &[u8]) -> bool {
        hash.len() == 32 && hash.iter().all(|&b| b == 0)
    }

    // -----------------------------------------------------------------
    // Inputs and outputs
    // -----------------------------------------------------------------

    /// Append an input and return its index.
    ///
    /// # Arguments
    /// * `prev_hash` - Hash of the transaction being spent, wire order. Must
    ///   be exactly 32 bytes.
    /// * `prev_index` - Output index being spent.
    /// * `sequence` - Defaults to `0xFFFFFFFF`.
    /// * `unlock_script` - Defaults to empty.
    pub fn add_input(
        &mut self,
        prev_hash: &[u8],
        prev_index: u32,
        sequence: Option<u32>,
        unlock_script: Option<Script>,
    ) -> Result<usize, TransactionError> {
        let mut input = TransactionInput::new(Hash::from_bytes(prev_hash)?, prev_index);
        input.sequence = sequence.unwrap_or(DEFAULT_SEQUENCE_NUMBER);
        input.unlock_script = unlock_script.unwrap_or_default();
        self.inputs.push(input);
        Ok(self.inputs.len() - 1)
    }

    /// Append an output and return its index.
    pub fn add_output(&mut self, lock_script: Script, value: u64) -> usize {
        self.outputs.push(TransactionOutput::new(lock_script, value));
        self.outputs.len() - 1
    }

    /// Replace the unlocking script of input `index`.
    pub fn set_input_script(&mut self, index: usize, script: Script) -> Result<(), TransactionError> {
        self.input_mut(index)?.unlock_script = script;
        Ok(())
    }

    /// Replace the witness stack of input `index`.
    pub fn set_witness(&mut self, index: usize, witness: Vec<Vec<u8>>) -> Result<(), TransactionError> {
        self.input_mut(index)?.witness = witness;
        Ok(())
    }

    /// Whether any input carries a witness stack.
    pub fn has_witnesses(&self) -> bool {
        self.inputs.iter().any(|input| !input.witness.is_empty())
    }

    /// Sum of all output values, or `None` on overflow.
    pub fn total_output_value(&self) -> Option<u64> {
        self.outputs
            .iter()
            .try_fold(0u64, |acc, output| acc.checked_add(output.value))
    }

    fn input_mut(&mut self, index: usize) -> Result<&mut TransactionInput, TransactionError> {
        let count = self.inputs.len();
        self.inputs
            .get_mut(index)
            .ok_or(TransactionError::InputOutOfRange { index, count })
    }

    // -----------------------------------------------------------------
    // Signature hash
    // -----------------------------------------------------------------

    /// Legacy signature hash of input `input_index`.
    ///
    /// See [`sighash::signature_hash`].
    pub fn signature_hash(&self, input_index: usize, prev_out_script: &Script, hash_type: u32) -> [u8; 32] {
        sighash::signature_hash(self, input_index, prev_out_script, hash_type)
    }

    /// Version 0 witness signature hash of input `input_index`.
    ///
    /// See [`sighash::witness_v0_signature_hash`].
    pub fn witness_v0_signature_hash(
        &self,
        input_index: usize,
        script_code: &Script,
        value: u64,
        hash_type: u32,
    ) -> Result<[u8; 32], TransactionError> {
        sighash::witness_v0_signature_hash(self, input_index, script_code, value, hash_type)
    }
}

/// Read a list length, rejecting counts that cannot fit the buffer.
fn read_count(reader: &mut ByteReader<'_>, what: &'static str) -> Result<u64, TransactionError> {
    let count = reader.read_varint().map_err(malformed(what))?.value();
    if count > reader.remaining() as u64 {
        return Err(TransactionError::MalformedTransaction(format!(
            "{} {} exceeds remaining {} bytes",
            what,
            count,
            reader.remaining()
        )));
    }
    Ok(count)
}

impl Default for Transaction {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Transaction {
    /// Display the transaction as its hex-encoded serialization.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}
