/// Error types for block operations.
#[derive(Debug, thiserror::Error)]
pub enum BlockError {
    /// Fewer bytes than a block header.
    #[error("block too short: {len} bytes, header needs 80")]
    TooShort { len: usize },

    /// The bytes after the header do not form a transaction list.
    #[error("malformed block: {0}")]
    MalformedBlock(String),

    /// A merkle root was requested for an empty transaction list.
    #[error("cannot compute merkle root for zero transactions")]
    EmptyMerkleTree,

    /// The block was parsed header-only and carries no transactions.
    #[error("block has no transactions")]
    MissingTransactions,

    #[error("transaction error: {0}")]
    Transaction(#[from] bitkoin_transaction::TransactionError),

    #[error("primitives error: {0}")]
    Primitives(#[from] bitkoin_primitives::PrimitivesError),
}
