use proptest::prelude::*;

use crate::gpg::{parse_machine_readable_index, sanitize_public_key, short_key_id, SHORT_KEY_ID_LEN};

const HEADER: &str = "-----BEGIN PGP PUBLIC KEY BLOCK-----";
const FOOTER: &str = "-----END PGP PUBLIC KEY BLOCK-----";

fn field() -> impl Strategy<Value = String> {
    "[0-9A-Za-z]{0,12}"
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    // Arbitrary bodies parse without panicking and every record has a key id
    // taken from a well-formed pub line.
    #[test]
    fn test_parse_arbitrary_body(body in ".{0,512}") {
        for listing in parse_machine_readable_index(&body) {
            let line = format!("pub:{}:", listing.key_id);
            prop_assert!(body.contains(&line));
        }
    }

    // Only pub lines with exactly seven fields produce a record.
    #[test]
    fn test_field_count(fields in proptest::collection::vec(field(), 0..12)) {
        let line = std::iter::once("pub".to_string())
            .chain(fields.iter().cloned())
            .collect::<Vec<_>>()
            .join(":");
        let listings = parse_machine_readable_index(&line);
        if fields.len() == 6 {
            prop_assert_eq!(listings.len(), 1);
            prop_assert_eq!(&listings[0].key_id, &fields[0]);
        } else {
            prop_assert!(listings.is_empty());
        }
    }

    // A usable key is only reported when the flag field is free of r, d and e.
    #[test]
    fn test_flags_decide_usability(flags in "[a-z]{0,4}") {
        let listings = parse_machine_readable_index(&format!("pub:ABCD:1:2048:::{flags}"));
        prop_assert_eq!(listings.len(), 1);
        let expected = !flags.chars().any(|c| matches!(c, 'r' | 'd' | 'e'));
        prop_assert_eq!(listings[0].is_usable(), expected);
    }

    // Extracted keys are framed by the armor lines whatever surrounds them.
    #[test]
    fn test_sanitize_keeps_armor(
        prefix in "[^-]{0,64}",
        body in "[A-Za-z0-9+/=\n]{0,128}",
        suffix in ".{0,64}",
    ) {
        let text = format!("{prefix}{HEADER}\n{body}\n{FOOTER}{suffix}");
        let key = sanitize_public_key(&text).expect("armored key must be found");
        prop_assert!(key.starts_with(HEADER));
        prop_assert!(key.ends_with(FOOTER));
        prop_assert_eq!(key, format!("{HEADER}\n{body}\n{FOOTER}"));
    }

    #[test]
    fn test_short_key_id_is_suffix(key_id in "[0-9A-F]{0,40}") {
        let short = short_key_id(&key_id);
        prop_assert!(key_id.ends_with(short));
        prop_assert_eq!(short.len(), key_id.len().min(SHORT_KEY_ID_LEN));
    }
}
