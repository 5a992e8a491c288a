use proptest::prelude::*;

use bitkoin_primitives::chainhash::Hash;
use bitkoin_primitives::ec::private_key::PrivateKey;
use bitkoin_primitives::ec::signature::Signature;
use bitkoin_primitives::hash::sha256;
use bitkoin_primitives::util::{ByteReader, ByteWriter, VarInt};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn ecdsa_sign_verify(
        seed in prop::array::uniform32(any::<u8>()),
        msg in prop::collection::vec(any::<u8>(), 0..256),
        low_r in any::<bool>(),
    ) {
        // Not every 32-byte array is a valid scalar.
        if let Ok(pk) = PrivateKey::from_bytes(&seed) {
            let hash = sha256(&msg);
            let sig = Signature::sign(&hash, &pk, low_r).unwrap();
            prop_assert!(pk.pub_key().verify(&hash, &sig));
            if low_r {
                prop_assert!(sig.has_low_r());
            }
            let reparsed = Signature::from_der(&sig.to_der()).unwrap();
            prop_assert_eq!(reparsed, sig);
        }
    }

    #[test]
    fn hash_display_parses_back(bytes in prop::array::uniform32(any::<u8>())) {
        let hash = Hash::new(bytes);
        let parsed = Hash::from_hex(&hash.to_string()).unwrap();
        prop_assert_eq!(parsed, hash);
    }

    #[test]
    fn varint_length_matches_encoding(value in any::<u64>()) {
        let vi = VarInt(value);
        let bytes = vi.to_bytes();
        prop_assert_eq!(bytes.len(), vi.length());

        let mut reader = ByteReader::new(&bytes);
        prop_assert_eq!(reader.read_varint().unwrap(), vi);
        prop_assert_eq!(reader.remaining(), 0);
    }

    #[test]
    fn truncated_reads_never_panic(data in prop::collection::vec(any::<u8>(), 0..16)) {
        let mut reader = ByteReader::new(&data);
        let _ = reader.read_var_bytes();
        let _ = reader.read_u64_le();
        prop_assert!(reader.offset() <= data.len());
    }

    #[test]
    fn var_bytes_prefix_is_minimal(payload in prop::collection::vec(any::<u8>(), 0..600)) {
        let mut writer = ByteWriter::new();
        writer.write_var_bytes(&payload);
        prop_assert_eq!(writer.len(), bitkoin_primitives::util::var_slice_size(payload.len()));
    }
}
