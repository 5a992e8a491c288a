use proptest::prelude::*;

use bitkoin_block::{merkle_root, merkle_tree_parent, Block, HEADER_SIZE};
use bitkoin_primitives::chainhash::Hash;
use bitkoin_script::Script;
use bitkoin_transaction::{Transaction, TransactionInput, TransactionOutput};

fn arb_transaction() -> impl Strategy<Value = Transaction> {
    let arb_input = (
        prop::array::uniform32(any::<u8>()),
        any::<u32>(),
        prop::collection::vec(any::<u8>(), 0..40),
    )
        .prop_map(|(hash, index, script)| {
            let mut input = TransactionInput::new(Hash::new(hash), index);
            input.unlock_script = Script::from(script);
            input
        });
    let arb_output = (any::<u64>(), prop::collection::vec(any::<u8>(), 0..30))
        .prop_map(|(value, script)| TransactionOutput::new(Script::from(script), value));

    (
        1i32..3,
        any::<u32>(),
        prop::collection::vec(arb_input, 0..3),
        prop::collection::vec(arb_output, 0..3),
    )
        .prop_map(|(version, time, inputs, outputs)| Transaction {
            version,
            time: time as u64,
            inputs,
            outputs,
            lock_time: 0,
        })
}

fn arb_header() -> impl Strategy<Value = Block> {
    (
        any::<i32>(),
        prop::array::uniform32(any::<u8>()),
        prop::array::uniform32(any::<u8>()),
        any::<u32>(),
        any::<u32>(),
        any::<u32>(),
    )
        .prop_map(|(version, prev, root, timestamp, bits, nonce)| Block {
            version,
            prev_hash: Hash::new(prev),
            merkle_root: Hash::new(root),
            timestamp,
            bits,
            nonce,
            transactions: None,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn header_roundtrip(block in arb_header()) {
        let bytes = block.to_bytes(false);
        prop_assert_eq!(bytes.len(), HEADER_SIZE);
        prop_assert_eq!(Block::from_bytes(&bytes).unwrap(), block);
    }

    #[test]
    fn full_block_roundtrip(
        header in arb_header(),
        transactions in prop::collection::vec(arb_transaction(), 1..5),
    ) {
        let mut block = header;
        block.merkle_root = Block::calculate_merkle_root(&transactions).unwrap();
        block.transactions = Some(transactions);

        let bytes = block.to_bytes(false);
        prop_assert_eq!(block.byte_length(), bytes.len());
        prop_assert_eq!(block.weight(), bytes.len() * 4);

        let parsed = Block::from_bytes(&bytes).unwrap();
        prop_assert!(parsed.check_merkle_root().unwrap());
        prop_assert_eq!(parsed.hash(), block.hash());
        prop_assert_eq!(&parsed, &block);
    }

    #[test]
    fn single_leaf_is_root(leaf in prop::array::uniform32(any::<u8>())) {
        let leaf = Hash::new(leaf);
        prop_assert_eq!(merkle_root(&[leaf]), Some(leaf));
    }

    #[test]
    fn odd_level_duplicates_last(leaves in prop::collection::vec(prop::array::uniform32(any::<u8>()), 3..4)) {
        let leaves: Vec<Hash> = leaves.into_iter().map(Hash::new).collect();
        let expected = merkle_tree_parent(
            &merkle_tree_parent(&leaves[0], &leaves[1]),
            &merkle_tree_parent(&leaves[2], &leaves[2]),
        );
        prop_assert_eq!(merkle_root(&leaves), Some(expected));
    }
}
