//! Transaction input referencing a previous output.
//!
//! Contains the previous transaction hash, output index, unlocking script
//! and sequence number. Witness data travels alongside the input in memory
//! but is not part of the wire format.

use bitkoin_primitives::chainhash::Hash;
use bitkoin_primitives::util::{var_slice_size, ByteReader, ByteWriter};
use bitkoin_script::Script;

use crate::TransactionError;

/// Default sequence number indicating a finalized input.
pub const DEFAULT_SEQUENCE_NUMBER: u32 = 0xFFFF_FFFF;

/// Bytes of an input besides its script: hash, index, sequence.
const INPUT_FIXED_LEN: usize = 32 + 4 + 4;

/// A single input in a transaction.
///
/// # Wire format
///
/// | Field          | Size           |
/// |----------------|----------------|
/// | prev_hash      | 32 bytes       |
/// | prev_index     | 4 bytes (LE)   |
/// | script length  | VarInt         |
/// | unlock_script  | variable       |
/// | sequence       | 4 bytes (LE)   |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionInput {
    /// Hash of the transaction being spent, in wire byte order.
    pub prev_hash: Hash,

    /// Index of the output within the previous transaction.
    pub prev_index: u32,

    /// The unlocking script. Empty until signed.
    pub unlock_script: Script,

    /// Sequence number. Defaults to `0xFFFFFFFF`.
    pub sequence: u32,

    /// Witness stack. Held in memory only; never serialized.
    pub witness: Vec<Vec<u8>>,
}

impl TransactionInput {
    /// Create an unsigned input spending `prev_hash:prev_index`.
    pub fn new(prev_hash: Hash, prev_index: u32) -> Self {
        TransactionInput {
            prev_hash,
            prev_index,
            unlock_script: Script::new(),
            sequence: DEFAULT_SEQUENCE_NUMBER,
            witness: Vec::new(),
        }
    }

    /// Deserialize an input from a `ByteReader`.
    ///
    /// # Returns
    /// `Ok(TransactionInput)` on success, or `MalformedTransaction` if the
    /// data is truncated.
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, TransactionError> {
        let prev_hash = Hash::new(reader.read_array().map_err(malformed("previous hash"))?);
        let prev_index = reader.read_u32_le().map_err(malformed("output index"))?;
        let script = reader.read_var_bytes().map_err(malformed("unlocking script"))?;
        let sequence = reader.read_u32_le().map_err(malformed("sequence number"))?;

        Ok(TransactionInput {
            prev_hash,
            prev_index,
            unlock_script: Script::from_bytes(script),
            sequence,
            witness: Vec::new(),
        })
    }

    /// Serialize this input into a `ByteWriter`.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_bytes(self.prev_hash.as_bytes());
        writer.write_u32_le(self.prev_index);
        writer.write_var_bytes(self.unlock_script.to_bytes());
        writer.write_u32_le(self.sequence);
    }

    /// Serialized size in bytes.
    pub fn byte_length(&self) -> usize {
        INPUT_FIXED_LEN + var_slice_size(self.unlock_script.len())
    }

    /// Whether the input carries an unlocking script or a witness.
    pub fn is_signed(&self) -> bool {
        !self.unlock_script.is_empty() || !self.witness.is_empty()
    }
}

/// Map a cursor error to `MalformedTransaction`, naming the field read.
pub(crate) fn malformed(
    what: &'static str,
) -> impl Fn(bitkoin_primitives::PrimitivesError) -> TransactionError {
    move |e| TransactionError::MalformedTransaction(format!("reading {}: {}", what, e))
}
