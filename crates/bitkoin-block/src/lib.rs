//! Bitkoin SDK - blocks.
//!
//! Parses and serializes blocks (an 80-byte header plus an optional
//! transaction list), computes merkle roots over transaction ids and checks
//! proof of work against the compact target in the header.

pub mod block;
pub mod merkle;
mod error;

pub use block::{Block, HEADER_SIZE};
pub use error::BlockError;
pub use merkle::{merkle_root, merkle_tree_parent, merkle_tree_parent_str};
