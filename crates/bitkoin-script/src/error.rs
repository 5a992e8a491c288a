/// Error types for script operations.
///
/// Covers push decoding, template encoding and address conversion.
#[derive(Debug, thiserror::Error)]
pub enum ScriptError {
    /// Generic invalid script error.
    #[error("invalid script: {0}")]
    InvalidScript(String),

    /// Invalid address string.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid address length after Base58 decoding.
    #[error("invalid address length for '{0}'")]
    InvalidAddressLength(String),

    /// The address version byte matches neither prefix of the network.
    #[error("{0} has no matching script")]
    UnsupportedAddress(String),

    /// The output script has no address form.
    #[error("{0} has no matching address")]
    NoMatchingAddress(String),

    /// Base58Check checksum does not match.
    #[error("checksum failed")]
    EncodingChecksumFailed,

    /// Hex decoding error.
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Not enough data in script to complete a push operation.
    #[error("not enough data")]
    DataTooSmall,

    /// Push data exceeds maximum allowed size.
    #[error("data too big")]
    DataTooBig,

    /// Attempted to append a push opcode without data.
    #[error("use append_push_data for push opcode 0x{0:02x}")]
    InvalidOpcodeType(u8),

    /// A template cannot be encoded as a script.
    #[error("cannot encode {0} template")]
    NonStandardTemplate(String),

    /// Error from primitives crate.
    #[error("primitives error: {0}")]
    Primitives(#[from] bitkoin_primitives::PrimitivesError),
}
