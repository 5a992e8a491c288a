use proptest::prelude::*;

use bitkoin_script::chunk::decode_script;
use bitkoin_script::opcodes::OP_CODESEPARATOR;
use bitkoin_script::{Script, Template};

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn script_hex_roundtrip(data in prop::collection::vec(any::<u8>(), 0..256)) {
        let script = Script::from_bytes(&data);
        let script2 = Script::from_hex(&script.to_hex()).unwrap();
        prop_assert_eq!(script2.to_bytes(), &data[..]);
    }

    #[test]
    fn pushes_decode_back(stack in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..300), 0..8)) {
        let script = Script::from_pushes(&stack).unwrap();
        prop_assert_eq!(script.push_stack().unwrap(), stack);
    }

    #[test]
    fn code_separator_removal_is_idempotent(data in prop::collection::vec(any::<u8>(), 0..128)) {
        let once = Script::from_bytes(&data).remove_code_separators();
        let twice = once.remove_code_separators();
        prop_assert_eq!(&once, &twice);
        prop_assert!(once.len() <= data.len());

        if let Ok(chunks) = decode_script(once.to_bytes()) {
            prop_assert!(chunks.iter().all(|c| c.op != OP_CODESEPARATOR));
        }
    }

    #[test]
    fn classify_never_panics(data in prop::collection::vec(any::<u8>(), 0..64)) {
        let template = Template::classify(&Script::from_bytes(&data));
        if let Ok(script) = template.to_script() {
            prop_assert_eq!(Template::classify(&script), template);
        }
    }
}
