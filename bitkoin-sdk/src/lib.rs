#![deny(missing_docs)]

//! Bitkoin SDK - Complete SDK.
//!
//! Re-exports all Bitkoin SDK components for convenient single-crate usage.

pub use bitkoin_primitives as primitives;
pub use bitkoin_script as script;
pub use bitkoin_transaction as transaction;
pub use bitkoin_block as block;
