/// Bitkoin SDK - Transaction codec, signature hashing and signing.
///
/// Provides the `Transaction` type with its binary codec and size
/// accounting, the legacy and witness signature-hash algorithms, the
/// `Signer` capability and the `TransactionBuilder` that assembles and
/// signs transactions without invalidating existing signatures.

pub mod transaction;
pub mod input;
pub mod output;
pub mod sighash;
pub mod signer;
pub mod builder;

mod error;
pub use error::TransactionError;
pub use transaction::Transaction;
pub use input::TransactionInput;
pub use output::TransactionOutput;
pub use signer::Signer;
pub use builder::{InputMeta, PrevOutput, SignParams, TransactionBuilder};
