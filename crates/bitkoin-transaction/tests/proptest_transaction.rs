use proptest::prelude::*;

use bitkoin_primitives::chainhash::Hash;
use bitkoin_script::Script;
use bitkoin_transaction::sighash::{SIGHASH_ALL, SIGHASH_NONE, SIGHASH_ONE, SIGHASH_SINGLE};
use bitkoin_transaction::{Transaction, TransactionInput, TransactionOutput};

/// Strategy to generate an arbitrary transaction, including empty input and
/// output lists and scripts long enough to need a 3-byte length prefix.
fn arb_transaction() -> impl Strategy<Value = Transaction> {
    let arb_input = (
        prop::array::uniform32(any::<u8>()),
        any::<u32>(),
        prop::collection::vec(any::<u8>(), 0..300),
        any::<u32>(),
    )
        .prop_map(|(hash, index, script, sequence)| {
            let mut input = TransactionInput::new(Hash::new(hash), index);
            input.unlock_script = Script::from(script);
            input.sequence = sequence;
            input
        });

    let arb_output = (any::<u64>(), prop::collection::vec(any::<u8>(), 0..64))
        .prop_map(|(value, script)| TransactionOutput::new(Script::from(script), value));

    (
        any::<i32>(),
        any::<u64>(),
        prop::collection::vec(arb_input, 0..4),
        prop::collection::vec(arb_output, 0..4),
        any::<u32>(),
    )
        .prop_map(|(version, time, inputs, outputs, lock_time)| Transaction {
            version,
            // Narrow versions only carry the low 32 bits.
            time: if version < 2 { time & 0xffff_ffff } else { time },
            inputs,
            outputs,
            lock_time,
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn transaction_roundtrip(tx in arb_transaction()) {
        let bytes = tx.to_bytes();
        let parsed = Transaction::from_bytes(&bytes).unwrap();
        prop_assert_eq!(&parsed, &tx);
        prop_assert_eq!(parsed.to_bytes(), bytes);
    }

    #[test]
    fn byte_length_matches_serialization(tx in arb_transaction()) {
        prop_assert_eq!(tx.byte_length(), tx.to_bytes().len());
        prop_assert_eq!(tx.virtual_size(), tx.byte_length());
    }

    #[test]
    fn truncated_bytes_never_parse(tx in arb_transaction(), cut in 1usize..16) {
        let bytes = tx.to_bytes();
        let end = bytes.len().saturating_sub(cut);
        prop_assert!(Transaction::from_bytes(&bytes[..end]).is_err());
    }

    #[test]
    fn sentinel_past_the_inputs(tx in arb_transaction(), extra in 0usize..3) {
        let script = Script::from_bytes(&[0x51]);
        let index = tx.inputs.len() + extra;
        prop_assert_eq!(tx.signature_hash(index, &script, SIGHASH_ALL), SIGHASH_ONE);
    }

    #[test]
    fn none_digest_ignores_outputs(mut tx in arb_transaction(), value in any::<u64>()) {
        prop_assume!(!tx.inputs.is_empty());
        let script = Script::from_bytes(&[0x51]);
        let digest = tx.signature_hash(0, &script, SIGHASH_NONE);
        tx.outputs.push(TransactionOutput::new(Script::new(), value));
        prop_assert_eq!(tx.signature_hash(0, &script, SIGHASH_NONE), digest);
    }

    #[test]
    fn single_digest_sentinel_past_the_outputs(tx in arb_transaction()) {
        let script = Script::new();
        for index in 0..tx.inputs.len() {
            let digest = tx.signature_hash(index, &script, SIGHASH_SINGLE);
            prop_assert_eq!(digest == SIGHASH_ONE, index >= tx.outputs.len());
        }
    }
}
