//! Transaction output with value and locking script.

use bitkoin_primitives::util::{var_slice_size, ByteReader, ByteWriter};
use bitkoin_script::Script;

use crate::input::malformed;
use crate::TransactionError;

/// A single output in a transaction.
///
/// # Wire format
///
/// | Field          | Size           |
/// |----------------|----------------|
/// | value          | 8 bytes (LE)   |
/// | script length  | VarInt         |
/// | lock_script    | variable       |
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionOutput {
    /// Amount in the smallest unit.
    pub value: u64,

    /// The locking script that defines spending conditions.
    pub lock_script: Script,
}

impl TransactionOutput {
    /// Create an output paying `value` to `lock_script`.
    pub fn new(lock_script: Script, value: u64) -> Self {
        TransactionOutput { value, lock_script }
    }

    /// The placeholder that replaces outputs before the signed index in a
    /// SINGLE signature hash: empty script, all-ones value.
    pub fn blank() -> Self {
        TransactionOutput {
            value: u64::MAX,
            lock_script: Script::new(),
        }
    }

    /// Deserialize an output from a `ByteReader`.
    pub fn read_from(reader: &mut ByteReader<'_>) -> Result<Self, TransactionError> {
        let value = reader.read_u64_le().map_err(malformed("output value"))?;
        let script = reader.read_var_bytes().map_err(malformed("locking script"))?;
        Ok(TransactionOutput {
            value,
            lock_script: Script::from_bytes(script),
        })
    }

    /// Serialize this output into a `ByteWriter`.
    pub fn write_to(&self, writer: &mut ByteWriter) {
        writer.write_u64_le(self.value);
        writer.write_var_bytes(self.lock_script.to_bytes());
    }

    /// Serialize this output to a byte vector.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut writer = ByteWriter::with_capacity(self.byte_length());
        self.write_to(&mut writer);
        writer.into_bytes()
    }

    /// Serialized size in bytes.
    pub fn byte_length(&self) -> usize {
        8 + var_slice_size(self.lock_script.len())
    }
}
