/// Bitkoin SDK - Script bytes, standard templates and addresses.
///
/// Provides the `Script` type, opcode constants, push-chunk decoding, the
/// closed set of standard script templates, network parameters and
/// base58check address conversion.

pub mod script;
pub mod opcodes;
pub mod chunk;
pub mod template;
pub mod network;
pub mod address;

mod error;
pub use error::ScriptError;
pub use script::Script;
pub use chunk::ScriptChunk;
pub use template::{classify_input, classify_witness, ScriptType, Template};
pub use network::{Bip32Versions, NetworkParams};
