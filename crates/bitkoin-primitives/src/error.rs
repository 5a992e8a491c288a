/// Unified error type for all primitives operations.
///
/// Covers errors from byte cursors, hashing, EC operations and encoding.
#[derive(Debug, thiserror::Error)]
pub enum PrimitivesError {
    #[error("invalid private key: {0}")]
    InvalidPrivateKey(String),

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid hex: {0}")]
    InvalidHex(String),

    #[error("invalid hash: {0}")]
    InvalidHash(String),

    /// A read ran past the end of the buffer.
    #[error("out of bounds: offset {offset} + {needed} exceeds buffer length {len}")]
    OutOfBounds { offset: usize, needed: usize, len: usize },

    /// A CompactSize length does not fit the platform's address space.
    #[error("varint too large: {0}")]
    VarIntTooLarge(u64),
}

impl From<hex::FromHexError> for PrimitivesError {
    fn from(e: hex::FromHexError) -> Self {
        PrimitivesError::InvalidHex(e.to_string())
    }
}
