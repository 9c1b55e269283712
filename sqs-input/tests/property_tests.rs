//! Property-based tests for the never-fail record paths
//!
//! - Raw transform always yields a record, falling back to `{"message": body}`
//! - Structured transform always yields exactly six string fields
//! - Tag resolution never leaves the tag field in the record

use proptest::prelude::*;
use serde_json::{json, Value};
use sqs_input::{
    transform::{raw_record, structured_record, RAW_FALLBACK_FIELD},
    RawMessage, Record, TagResolver,
};

/// Strategy for flat JSON objects with string keys
fn object_strategy() -> impl Strategy<Value = Record> {
    prop::collection::btree_map(
        "[a-z]{1,8}",
        prop_oneof![
            any::<i64>().prop_map(Value::from),
            any::<bool>().prop_map(Value::from),
            "[ -~]{0,16}".prop_map(Value::from),
            Just(Value::Null),
        ],
        0..8,
    )
    .prop_map(|map| map.into_iter().collect())
}

proptest! {
    #[test]
    fn raw_record_never_fails(body in any::<String>()) {
        let record = raw_record(&body);

        match serde_json::from_str::<Value>(&body) {
            Ok(Value::Object(map)) => prop_assert_eq!(record, map),
            _ => {
                prop_assert_eq!(record.len(), 1);
                prop_assert_eq!(&record[RAW_FALLBACK_FIELD], &json!(body));
            }
        }
    }

    #[test]
    fn raw_record_round_trips_objects(object in object_strategy()) {
        let body = serde_json::to_string(&object).unwrap();
        prop_assert_eq!(raw_record(&body), object);
    }

    #[test]
    fn structured_record_has_six_string_fields(
        body in any::<String>(),
        handle in "[A-Za-z0-9+/=]{0,32}",
        id in "[a-f0-9-]{0,36}",
    ) {
        let message = RawMessage::new(body.clone(), handle).with_message_id(id);
        let record = structured_record(&message);

        prop_assert_eq!(record.len(), 6);
        prop_assert!(record.values().all(Value::is_string));
        prop_assert_eq!(&record["body"], &json!(body));
    }

    #[test]
    fn tag_field_never_survives_resolution(
        mut record in object_strategy(),
        key in "[a-z]{1,8}",
    ) {
        let had_key = record.contains_key(&key);
        let was_null = record.get(&key).map_or(false, Value::is_null);
        let before = record.len();

        let resolver = TagResolver::new("fixed", Some(key.clone()));
        let tag = resolver.resolve(&mut record);

        prop_assert!(!record.contains_key(&key));
        prop_assert_eq!(record.len(), if had_key { before - 1 } else { before });
        if !had_key || was_null {
            prop_assert_eq!(tag, "fixed");
        }
    }
}
