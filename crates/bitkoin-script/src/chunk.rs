//! Script chunk parsing and encoding.
//!
//! A script chunk is either an opcode or a data push with its associated
//! bytes. Decoding walks the script with a `ByteReader`; encoding picks the
//! minimal push prefix for each payload.

use bitkoin_primitives::util::ByteReader;

use crate::opcodes::*;
use crate::ScriptError;

/// A single parsed element of a script.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScriptChunk {
    /// The opcode byte. For direct pushes (1-75 bytes), this is the length.
    pub op: u8,
    /// The data payload, if this chunk is a push operation.
    pub data: Option<Vec<u8>>,
}

impl ScriptChunk {
    /// Whether this chunk pushes data onto the stack. `OP_0` counts as a
    /// push of the empty vector.
    pub fn is_push(&self) -> bool {
        self.op == OP_0 || self.data.is_some()
    }

    /// The pushed bytes. `OP_0` yields an empty slice; non-push opcodes
    /// yield `None`.
    pub fn push_data(&self) -> Option<&[u8]> {
        match (&self.data, self.op) {
            (Some(data), _) => Some(data.as_slice()),
            (None, OP_0) => Some(&[][..]),
            _ => None,
        }
    }
}

/// Decode raw script bytes into a vector of `ScriptChunk` values.
///
/// # Returns
/// The parsed chunks, or `DataTooSmall` if a push runs past the end.
pub fn decode_script(bytes: &[u8]) -> Result<Vec<ScriptChunk>, ScriptError> {
    let mut reader = ByteReader::new(bytes);
    let mut chunks = Vec::new();
    while reader.remaining() > 0 {
        chunks.push(read_chunk(&mut reader)?);
    }
    Ok(chunks)
}

/// Read one chunk at the reader's position.
pub(crate) fn read_chunk(reader: &mut ByteReader<'_>) -> Result<ScriptChunk, ScriptError> {
    let truncated = |_| ScriptError::DataTooSmall;

    let op = reader.read_u8().map_err(truncated)?;
    let len = match op {
        OP_DATA_1..=OP_DATA_75 => op as usize,
        OP_PUSHDATA1 => reader.read_u8().map_err(truncated)? as usize,
        OP_PUSHDATA2 => reader.read_u16_le().map_err(truncated)? as usize,
        OP_PUSHDATA4 => reader.read_u32_le().map_err(truncated)? as usize,
        _ => return Ok(ScriptChunk { op, data: None }),
    };
    let data = reader.read_bytes(len).map_err(truncated)?;
    Ok(ScriptChunk {
        op,
        data: Some(data.to_vec()),
    })
}

/// Compute the push prefix for a payload of the given length.
///
/// A zero length yields `OP_0`, so an empty payload encodes as a single
/// `OP_0` byte.
///
/// # Returns
/// The prefix bytes, or `DataTooBig` above the four-byte length limit.
pub fn push_data_prefix(data_len: usize) -> Result<Vec<u8>, ScriptError> {
    if data_len <= OP_DATA_75 as usize {
        Ok(vec![data_len as u8])
    } else if data_len <= 0xFF {
        Ok(vec![OP_PUSHDATA1, data_len as u8])
    } else if data_len <= 0xFFFF {
        let mut buf = vec![OP_PUSHDATA2];
        buf.extend_from_slice(&(data_len as u16).to_le_bytes());
        Ok(buf)
    } else if data_len <= 0xFFFF_FFFF {
        let mut buf = vec![OP_PUSHDATA4];
        buf.extend_from_slice(&(data_len as u32).to_le_bytes());
        Ok(buf)
    } else {
        Err(ScriptError::DataTooBig)
    }
}

/// Encode a sequence of payloads, each with its own minimal push prefix.
pub fn encode_push_datas<T: AsRef<[u8]>>(parts: &[T]) -> Result<Vec<u8>, ScriptError> {
    let mut result = Vec::new();
    for part in parts {
        let part = part.as_ref();
        result.extend_from_slice(&push_data_prefix(part.len())?);
        result.extend_from_slice(part);
    }
    Ok(result)
}
