//! Block header and transaction list.
//!
//! A block is an 80-byte header optionally followed by its transactions.
//! Parsing exactly 80 bytes yields a header-only block.

use std::fmt;

use log::{debug, trace};

use bitkoin_primitives::chainhash::{double_hash_h, Hash};
use bitkoin_primitives::util::{ByteReader, ByteWriter, VarInt};
use bitkoin_transaction::Transaction;

use crate::merkle::merkle_root;
use crate::BlockError;

/// Size of a serialized block header.
pub const HEADER_SIZE: usize = 80;

/// A block header and, for a full block, its transactions.
///
/// # Wire format
///
/// | Field         | Size             |
/// |---------------|------------------|
/// | version       | 4 bytes (LE)     |
/// | prev_hash     | 32 bytes         |
/// | merkle_root   | 32 bytes         |
/// | timestamp     | 4 bytes (LE)     |
/// | bits          | 4 bytes (LE)     |
/// | nonce         | 4 bytes (LE)     |
/// | tx count      | VarInt           |
/// | transactions  | variable         |
///
/// The last two fields are absent in a header-only block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    /// Block format version.
    pub version: i32,
    /// Hash of the previous block header, internal byte order.
    pub prev_hash: Hash,
    /// Merkle root of the transactions, internal byte order.
    pub merkle_root: Hash,
    /// Block timestamp.
    pub timestamp: u32,
    /// Compact proof-of-work target.
    pub bits: u32,
    /// Proof-of-work nonce.
    pub nonce: u32,
    /// The transactions, or `None` for a header-only block.
    pub transactions: Option<Vec<Transaction>>,
}

impl Block {
    // -----------------------------------------------------------------
    // Deserialization
    // -----------------------------------------------------------------

    /// Parse a block from a hex string.
    pub fn from_hex(hex_str: &str) -> Result<Self, BlockError> {
        let bytes = hex::decode(hex_str)
            .map_err(|e| BlockError::MalformedBlock(format!("invalid hex: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    /// Parse a block. Transactions are read back-to-back from one cursor,
    /// so non-minimal length prefixes inside them are accepted.
    ///
    /// # Returns
    /// A header-only block for exactly 80 bytes, a full block for more, or
    /// `TooShort` / `MalformedBlock`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlockError> {
        if bytes.len() < HEADER_SIZE {
            return Err(BlockError::TooShort { len: bytes.len() });
        }

        let mut reader = ByteReader::new(bytes);
        let mut block = Block {
            version: reader.read_i32_le()?,
            prev_hash: Hash::new(reader.read_array()?),
            merkle_root: Hash::new(reader.read_array()?),
            timestamp: reader.read_u32_le()?,
            bits: reader.read_u32_le()?,
            nonce: reader.read_u32_le()?,
            transactions: None,
        };
        if bytes.len() == HEADER_SIZE {
            trace!("parsed header-only block {}", block.id());
            return Ok(block);
        }

        let count = reader
            .read_varint()
            .map_err(|e| BlockError::MalformedBlock(format!("reading transaction count: {}", e)))?
            .value();
        if count > reader.remaining() as u64 {
            return Err(BlockError::MalformedBlock(format!(
                "transaction count {} exceeds remaining {} bytes",
                count,
                reader.remaining()
            )));
        }

        let mut transactions = Vec::with_capacity(count as usize);
        for index in 0..count {
            let tx = Transaction::read_from(&mut reader).map_err(|e| {
                BlockError::MalformedBlock(format!("transaction {}: {}", index, e))
            })?;
            transactions.push(tx);
        }
        if reader.remaining() != 0 {
            return Err(BlockError::MalformedBlock(format!(
                "trailing {} bytes after transactions",
                reader.remaining()
            )));
        }

        block.transactions = Some(transactions);
        debug!("parsed block {} with {} transactions", block.id(), count);
        Ok(block)
    }

    // -----------------------------------------------------------------
    // Serialization
    // -----------------------------------------------------------------

    /// The 80-byte header.
    pub fn header_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut writer = ByteWriter::with_capacity(HEADER_SIZE);
        self.write_header(&mut writer);
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(writer.as_bytes());
        header
    }

    fn write_header(&self, writer: &mut ByteWriter) {
        writer.write_i32_le(self.version);
        writer.write_bytes(self.prev_hash.as_bytes());
        writer.write_bytes(self.merkle_root.as_bytes());
        writer.write_u32_le(self.timestamp);
        writer.write_u32_le(self.bits);
        writer.write_u32_le(self.nonce);
    }

    /// Serialize the block. With `header_only`, or for a block without
    /// transactions, only the 80-byte header is written.
    pub fn to_bytes(&self, header_only: bool) -> Vec<u8> {
        let transactions = match (&self.transactions, header_only) {
            (Some(transactions), false) => transactions,
            _ => return self.header_bytes().to_vec(),
        };

        let mut writer = ByteWriter::with_capacity(self.byte_length());
        self.write_header(&mut writer);
        writer.write_varint(VarInt::from(transactions.len()));
        for tx in transactions {
            tx.write_to(&mut writer);
        }
        writer.into_bytes()
    }

    /// Serialize the block to a hex string.
    pub fn to_hex(&self, header_only: bool) -> String {
        hex::encode(self.to_bytes(header_only))
    }

    /// Serialized size: 80 for a header-only block.
    pub fn byte_length(&self) -> usize {
        match &self.transactions {
            Some(transactions) => {
                HEADER_SIZE
                    + VarInt::from(transactions.len()).length()
                    + transactions.iter().map(Transaction::byte_length).sum::<usize>()
            }
            None => HEADER_SIZE,
        }
    }

    /// Weight, following the transaction convention of three times the
    /// base size plus the total size.
    pub fn weight(&self) -> usize {
        let size = self.byte_length();
        size * 3 + size
    }

    // -----------------------------------------------------------------
    // Identity
    // -----------------------------------------------------------------

    /// Double-hash of the header.
    pub fn hash(&self) -> Hash {
        double_hash_h(&self.header_bytes())
    }

    /// The block id as byte-reversed hex.
    pub fn id(&self) -> String {
        self.hash().to_string()
    }

    // -----------------------------------------------------------------
    // Merkle root
    // -----------------------------------------------------------------

    /// Merkle root of `transactions`, whose leaves are the transaction ids
    /// (the zero hash for a coinbase).
    ///
    /// # Returns
    /// The root, or `EmptyMerkleTree` for an empty list.
    pub fn calculate_merkle_root(transactions: &[Transaction]) -> Result<Hash, BlockError> {
        let leaves: Vec<Hash> = transactions.iter().map(Transaction::tx_id).collect();
        merkle_root(&leaves).ok_or(BlockError::EmptyMerkleTree)
    }

    /// Whether the stored merkle root matches the transactions.
    ///
    /// # Returns
    /// `MissingTransactions` for a header-only block.
    pub fn check_merkle_root(&self) -> Result<bool, BlockError> {
        let transactions = self
            .transactions
            .as_ref()
            .ok_or(BlockError::MissingTransactions)?;
        Ok(Self::calculate_merkle_root(transactions)? == self.merkle_root)
    }

    /// Same as [`Block::check_merkle_root`].
    pub fn check_tx_roots(&self) -> Result<bool, BlockError> {
        self.check_merkle_root()
    }

    // -----------------------------------------------------------------
    // Proof of work
    // -----------------------------------------------------------------

    /// Expand compact `bits` into a 32-byte big-endian target.
    ///
    /// The top byte is the size of the target in bytes; the low 23 bits are
    /// the three most significant bytes. Mantissa bytes that would fall
    /// outside the 32-byte buffer are dropped.
    pub fn calculate_target(bits: u32) -> [u8; 32] {
        let exponent = (bits >> 24) as i64;
        let mantissa = (bits & 0x007f_ffff).to_be_bytes();
        let start = 29 - (exponent - 3);

        let mut target = [0u8; 32];
        for (k, &byte) in mantissa[1..].iter().enumerate() {
            let position = start + k as i64;
            if (0..32).contains(&position) {
                target[position as usize] = byte;
            }
        }
        target
    }

    /// Whether the header hash, read as a big-endian integer, is at most
    /// the target encoded in `bits`.
    pub fn check_proof_of_work(&self) -> bool {
        self.hash().reversed() <= Self::calculate_target(self.bits)
    }
}

impl fmt::Display for Block {
    /// Display the block as its full hex serialization.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex(false))
    }
}
