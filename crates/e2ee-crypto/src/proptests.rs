use p256::elliptic_curve::sec1::ToEncodedPoint;
use p256::SecretKey;
use proptest::prelude::*;

use crate::point::{validate_point, UNCOMPRESSED_POINT_LEN};
use crate::pubkey::PubKey;

fn point_from_seed(seed: &[u8; 32]) -> Option<Vec<u8>> {
    let secret = SecretKey::from_slice(seed).ok()?;
    Some(secret.public_key().to_encoded_point(false).as_bytes().to_vec())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // Anything that is not exactly 65 bytes is rejected.
    #[test]
    fn test_wrong_length_rejected(data in proptest::collection::vec(any::<u8>(), 0..160)) {
        prop_assume!(data.len() != UNCOMPRESSED_POINT_LEN);
        prop_assert!(validate_point(&data).is_none());
    }

    // A valid point re-encodes to the same bytes and validates again.
    #[test]
    fn test_valid_point_round_trip(seed in any::<[u8; 32]>()) {
        let bytes = point_from_seed(&seed);
        prop_assume!(bytes.is_some());
        let bytes = bytes.unwrap();

        let point = validate_point(&bytes).expect("generated point must validate");
        prop_assert_eq!(&point.to_uncompressed()[..], &bytes[..]);
        let again = validate_point(&point.to_uncompressed()).expect("re-encoded point must validate");
        prop_assert_eq!(again, point);
    }

    // Flipping any bit of either coordinate moves the point off the curve.
    #[test]
    fn test_coordinate_bit_flip_rejected(
        seed in any::<[u8; 32]>(),
        index in 1usize..UNCOMPRESSED_POINT_LEN,
        bit in 0u8..8,
    ) {
        let bytes = point_from_seed(&seed);
        prop_assume!(bytes.is_some());
        let mut bytes = bytes.unwrap();

        bytes[index] ^= 1 << bit;
        prop_assert!(validate_point(&bytes).is_none());
    }

    // The same point in both roles is always rejected.
    #[test]
    fn test_reused_key_rejected(seed in any::<[u8; 32]>()) {
        let bytes = point_from_seed(&seed);
        prop_assume!(bytes.is_some());
        let bytes = bytes.unwrap();

        prop_assert!(validate_point(&bytes).is_some());
        prop_assert!(!PubKey::new(bytes.clone(), bytes).validate());
    }

    // Two distinct valid points form a valid pair.
    #[test]
    fn test_distinct_keys_accepted(seed_a in any::<[u8; 32]>(), seed_b in any::<[u8; 32]>()) {
        prop_assume!(seed_a != seed_b);
        let (a, b) = (point_from_seed(&seed_a), point_from_seed(&seed_b));
        prop_assume!(a.is_some() && b.is_some());

        prop_assert!(PubKey::new(a.unwrap(), b.unwrap()).validate());
    }
}
