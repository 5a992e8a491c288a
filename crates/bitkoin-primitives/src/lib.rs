/// Bitkoin SDK - Cryptographic primitives, hashing, and utilities.
///
/// This crate provides the foundational building blocks for the Bitkoin SDK:
/// - Hash functions (SHA-256, SHA-256d, RIPEMD-160, Hash160)
/// - Chain hash type for transaction and block identification
/// - Byte cursors with CompactSize (VarInt) encoding
/// - Elliptic curve keys and ECDSA signatures on secp256k1

pub mod hash;
pub mod chainhash;
pub mod util;
pub mod ec;

mod error;
pub use error::PrimitivesError;
