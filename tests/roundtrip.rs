//! Property suites for the universal invariants: codec round trips,
//! emission round trips, total ordering, and extraction idempotence.

use std::cmp::Ordering;

use proptest::prelude::*;

use joist::strings::{decode_string, encode_string};
use joist::{to_text, to_text_pretty, ExtractOptions, ParseIndex, Value};

/// Finite decimals only: non-finite values deliberately emit as null, so
/// they cannot round trip by construction.
fn value_strategy() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Boolean),
        any::<i64>().prop_map(Value::Integer),
        (-1.0e9f64..1.0e9f64).prop_map(Value::Decimal),
        "[a-z0-9 _.]{0,12}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..6).prop_map(Value::Object),
        ]
    })
}

proptest! {
    /// Decoding undoes encoding for every Rust string.
    #[test]
    fn string_codec_round_trips(text in any::<String>()) {
        let encoded = encode_string(&text);
        prop_assert_eq!(decode_string(&encoded).unwrap(), text);
    }

    /// The wire form of any string parses as a valid JSON string token.
    #[test]
    fn encoded_strings_reparse(text in any::<String>()) {
        let value = Value::String(text.clone());
        let parsed = joist::parse(&to_text(&value)).unwrap();
        prop_assert_eq!(parsed.as_string().unwrap(), text.as_str());
    }

    /// Compact emission of any value parses back to an equal value.
    #[test]
    fn compact_emission_round_trips(value in value_strategy()) {
        let reparsed = joist::parse(&to_text(&value)).unwrap();
        prop_assert_eq!(reparsed, value);
    }

    /// Pretty emission parses back to the same value as compact.
    #[test]
    fn pretty_emission_round_trips(value in value_strategy()) {
        let reparsed = joist::parse(&to_text_pretty(&value)).unwrap();
        prop_assert_eq!(reparsed, value);
    }

    /// Comparison is reflexive, including through clones.
    #[test]
    fn compare_is_reflexive(value in value_strategy()) {
        let clone = value.clone();
        prop_assert_eq!(value.compare(&clone), Ordering::Equal);
    }

    /// Comparison is antisymmetric: swapping the sides reverses it.
    #[test]
    fn compare_is_antisymmetric(a in value_strategy(), b in value_strategy()) {
        prop_assert_eq!(a.compare(&b), b.compare(&a).reverse());
    }

    /// A valid document's index is structurally sound: it parses with no
    /// error and its signature is balanced.
    #[test]
    fn valid_documents_index_cleanly(value in value_strategy()) {
        let index = ParseIndex::parse(to_text(&value));
        prop_assert!(index.success());

        let signature = index.to_string();
        prop_assert!(signature.starts_with('^'));
        prop_assert!(signature.ends_with('$'));
        prop_assert_eq!(
            signature.matches('{').count(),
            signature.matches('}').count()
        );
        prop_assert_eq!(
            signature.matches('[').count(),
            signature.matches(']').count()
        );

        let rebuilt = index.extract_tree(&ExtractOptions::default()).unwrap();
        prop_assert_eq!(rebuilt, value);
    }

    /// Extracting twice from the same source yields equal values.
    #[test]
    fn extraction_is_idempotent(value in value_strategy()) {
        let text = to_text(&value);
        let first = joist::extract::<Value>(&text).unwrap();
        let second = joist::extract::<Value>(&text).unwrap();
        prop_assert_eq!(first, second);
    }

    /// Every i64 survives text round trips exactly.
    #[test]
    fn integers_round_trip_exactly(n in any::<i64>()) {
        prop_assert_eq!(joist::parse(&n.to_string()).unwrap(), Value::Integer(n));
    }

    /// The high u64 range round trips bit for bit through the integer
    /// variant.
    #[test]
    fn unsigned_integers_keep_bits(n in any::<u64>()) {
        prop_assert_eq!(joist::parse(&n.to_string()).unwrap(), Value::from(n));
        prop_assert_eq!(joist::extract::<u64>(&n.to_string()).unwrap(), n);
    }
}
