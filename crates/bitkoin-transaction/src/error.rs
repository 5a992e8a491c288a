/// Error types for transaction operations.
#[derive(Debug, thiserror::Error)]
pub enum TransactionError {
    /// The bytes do not form a transaction: truncated, trailing data or an
    /// impossible length.
    #[error("malformed transaction: {0}")]
    MalformedTransaction(String),

    /// The transaction is structurally unusable (e.g. missing inputs or outputs).
    #[error("invalid transaction: {0}")]
    InvalidTransaction(String),

    /// An existing signature forbids the requested change.
    #[error("illegal mutation: {0}")]
    IllegalMutation(String),

    /// `build` was called before every input was signed.
    #[error("not enough signatures: {0}")]
    NotEnoughSignatures(String),

    /// Signing would leave a fee above the configured ceiling.
    #[error("fee rate {fee_rate} exceeds maximum {maximum} per virtual byte")]
    FeeRateExceeded { fee_rate: u64, maximum: u64 },

    /// An input index past the end of the input list.
    #[error("no input at index {index} (transaction has {count})")]
    InputOutOfRange { index: usize, count: usize },

    /// The previous output's script has no signing template.
    #[error("unsupported script: {0}")]
    UnsupportedScript(String),

    /// Any other failure while signing an input.
    #[error("signing error: {0}")]
    SigningError(String),

    /// An underlying script error (forwarded from `bitkoin-script`).
    #[error("script error: {0}")]
    Script(#[from] bitkoin_script::ScriptError),

    /// An underlying primitives error (forwarded from `bitkoin-primitives`).
    #[error("primitives error: {0}")]
    Primitives(#[from] bitkoin_primitives::PrimitivesError),
}
