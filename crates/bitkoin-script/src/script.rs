/// Script type - a sequence of opcodes and data pushes.
///
/// Scripts appear in transaction inputs (unlocking) and outputs (locking).
/// The `Script` wraps a `Vec<u8>`; the bytes are never re-encoded, so a
/// parsed script serializes back to exactly what was read.

use std::fmt;

use bitkoin_primitives::util::ByteReader;

use crate::chunk::{decode_script, push_data_prefix, read_chunk, ScriptChunk};
use crate::opcodes::*;
use crate::ScriptError;

/// A script, represented as a byte vector newtype.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Script(Vec<u8>);

impl Script {
    /// Create a new empty script.
    pub fn new() -> Self {
        Script(Vec::new())
    }

    /// Create a script from a hex-encoded string.
    ///
    /// # Arguments
    /// * `hex_str` - A hex string (e.g. "76a914...88ac").
    ///
    /// # Returns
    /// A `Script` wrapping the decoded bytes, or an error if the hex is invalid.
    pub fn from_hex(hex_str: &str) -> Result<Self, ScriptError> {
        Ok(Script(hex::decode(hex_str)?))
    }

    /// Create a script from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Script(bytes.to_vec())
    }

    /// Build a push-only script from a stack of payloads, in order.
    ///
    /// Empty payloads become `OP_0`; everything else gets its minimal push
    /// prefix.
    pub fn from_pushes<T: AsRef<[u8]>>(stack: &[T]) -> Result<Self, ScriptError> {
        let mut script = Script::new();
        for item in stack {
            script.append_push_data(item.as_ref())?;
        }
        Ok(script)
    }

    /// Encode the script as a lowercase hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Return a reference to the underlying bytes.
    pub fn to_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Consume the script and return its bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    /// Length of the script in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the script has no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Parse the script into a vector of decoded chunks.
    ///
    /// # Returns
    /// A vector of `ScriptChunk` values, or an error if a push is truncated.
    pub fn chunks(&self) -> Result<Vec<ScriptChunk>, ScriptError> {
        decode_script(&self.0)
    }

    /// The pushed payloads of a push-only script, in order.
    ///
    /// # Returns
    /// `None` if the script is malformed or contains a non-push opcode.
    pub fn push_stack(&self) -> Option<Vec<Vec<u8>>> {
        let chunks = self.chunks().ok()?;
        chunks
            .iter()
            .map(|chunk| chunk.push_data().map(|d| d.to_vec()))
            .collect()
    }

    /// Append data bytes with the minimal push prefix.
    ///
    /// # Returns
    /// `Ok(())` on success, or an error if the data is too large.
    pub fn append_push_data(&mut self, data: &[u8]) -> Result<(), ScriptError> {
        let prefix = push_data_prefix(data.len())?;
        self.0.extend_from_slice(&prefix);
        self.0.extend_from_slice(data);
        Ok(())
    }

    /// Append raw opcodes.
    ///
    /// Push opcodes (`OP_DATA_1` through `OP_PUSHDATA4`) are rejected; use
    /// `append_push_data` for those.
    pub fn append_opcodes(&mut self, opcodes: &[u8]) -> Result<(), ScriptError> {
        if let Some(&op) = opcodes
            .iter()
            .find(|&&op| (OP_DATA_1..=OP_PUSHDATA4).contains(&op))
        {
            return Err(ScriptError::InvalidOpcodeType(op));
        }
        self.0.extend_from_slice(opcodes);
        Ok(())
    }

    /// Return a copy with every `OP_CODESEPARATOR` operation removed.
    ///
    /// Operations are walked one at a time, so a separator byte inside a
    /// push payload is kept, and every kept push retains its original
    /// encoding. A truncated trailing push is copied through unchanged.
    pub fn remove_code_separators(&self) -> Script {
        let mut out = Vec::with_capacity(self.0.len());
        let mut reader = ByteReader::new(&self.0);

        while reader.remaining() > 0 {
            let start = reader.offset();
            match read_chunk(&mut reader) {
                Ok(chunk) if chunk.op == OP_CODESEPARATOR => {}
                Ok(_) => out.extend_from_slice(&self.0[start..reader.offset()]),
                Err(_) => {
                    out.extend_from_slice(&self.0[start..]);
                    break;
                }
            }
        }

        Script(out)
    }
}

impl Default for Script {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Vec<u8>> for Script {
    fn from(bytes: Vec<u8>) -> Self {
        Script(bytes)
    }
}

impl AsRef<[u8]> for Script {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for Script {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Script({})", self.to_hex())
    }
}

impl serde::Serialize for Script {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> serde::Deserialize<'de> for Script {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Script::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const P2PKH_HEX: &str = "76a914e2a623699e81b291c0327f408fea765d534baa2a88ac";

    #[test]
    fn test_from_hex_roundtrip() {
        let script = Script::from_hex(P2PKH_HEX).unwrap();
        assert_eq!(script.to_hex(), P2PKH_HEX);
        assert_eq!(script.len(), 25);

        assert!(Script::from_hex("").unwrap().is_empty());
        assert!(Script::from_hex("ZZZZ").is_err());
    }

    #[test]
    fn test_from_pushes() {
        let stack = vec![vec![], vec![0xaa; 3], vec![0xbb; 80]];
        let script = Script::from_pushes(&stack).unwrap();

        let mut expected = vec![OP_0, 0x03, 0xaa, 0xaa, 0xaa, OP_PUSHDATA1, 80];
        expected.extend_from_slice(&[0xbb; 80]);
        assert_eq!(script.to_bytes(), &expected[..]);

        assert_eq!(script.push_stack().unwrap(), stack);
    }

    #[test]
    fn test_push_stack_rejects_opcodes() {
        let script = Script::from_hex(P2PKH_HEX).unwrap();
        assert!(script.push_stack().is_none());
        assert!(Script::from_hex("05aabb").unwrap().push_stack().is_none());
        assert_eq!(Script::new().push_stack().unwrap(), Vec::<Vec<u8>>::new());
    }

    #[test]
    fn test_append_opcodes_rejects_pushdata() {
        let mut script = Script::new();
        script.append_opcodes(&[OP_DUP, OP_HASH160]).unwrap();
        assert_eq!(script.to_hex(), "76a9");
        assert!(script.append_opcodes(&[OP_PUSHDATA1]).is_err());
        assert!(script.append_opcodes(&[OP_DATA_20]).is_err());
        assert_eq!(script.len(), 2);
    }

    #[test]
    fn test_remove_code_separators() {
        // OP_CODESEPARATOR OP_DUP <abab> OP_CODESEPARATOR OP_CHECKSIG
        let script = Script::from_hex("ab7602abababac").unwrap();
        assert_eq!(script.remove_code_separators().to_hex(), "7602ababac");
    }

    #[test]
    fn test_remove_code_separators_keeps_push_encoding() {
        // A one-byte payload sent through OP_PUSHDATA1 stays that way.
        let script = Script::from_hex("4c01abab76").unwrap();
        assert_eq!(script.remove_code_separators().to_hex(), "4c01ab76");
    }

    #[test]
    fn test_remove_code_separators_truncated_tail() {
        // The trailing push claims 5 bytes but only 2 follow.
        let script = Script::from_hex("ab05abab").unwrap();
        assert_eq!(script.remove_code_separators().to_hex(), "05abab");
    }

    #[test]
    fn test_serde_roundtrip() {
        let script = Script::from_hex(P2PKH_HEX).unwrap();
        let json = serde_json::to_string(&script).unwrap();
        assert_eq!(json, format!("\"{}\"", P2PKH_HEX));
        let back: Script = serde_json::from_str(&json).unwrap();
        assert_eq!(back, script);
    }

    #[test]
    fn test_display_and_debug() {
        let script = Script::from_hex("76a9").unwrap();
        assert_eq!(format!("{}", script), "76a9");
        assert_eq!(format!("{:?}", script), "Script(76a9)");
        assert_eq!(Script::default(), Script::new());
    }
}
