//! # Token Stream Property Tests
//!
//! Arbitrary documents produced by `serde_json` must survive a pass through
//! the token stream and the compact writer byte-for-byte, and the path stack
//! must always agree with the nesting depth.

use proptest::prelude::*;
use serde_json::Value;
use typedobj_core::{JsonEvent, JsonSource, JsonWriter, TokenSource};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i64>().prop_map(Value::from),
        "[a-zA-Z0-9 é\"\\\\/]{0,8}".prop_map(Value::String),
    ];
    leaf.prop_recursive(4, 48, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
            prop::collection::btree_map("[a-z~/]{0,4}", inner, 0..6)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

fn rewrite(text: &str) -> String {
    let source = JsonSource::from(text);
    let mut stream = source.open().unwrap();
    let mut writer = JsonWriter::new(Vec::new());
    loop {
        let event = stream.next_event().unwrap();
        if event == JsonEvent::EndOfStream {
            break;
        }
        writer.event(&event).unwrap();
    }
    String::from_utf8(writer.into_inner().unwrap()).unwrap()
}

proptest! {
    #[test]
    fn compact_rewrite_matches_serde_json(value in arb_json()) {
        let compact = serde_json::to_string(&value).unwrap();
        let pretty = serde_json::to_string_pretty(&value).unwrap();
        prop_assert_eq!(rewrite(&compact), compact.clone());
        prop_assert_eq!(rewrite(&pretty), compact);
    }

    #[test]
    fn path_depth_tracks_nesting(value in arb_json()) {
        let text = serde_json::to_string(&value).unwrap();
        let source = JsonSource::from(text);
        let mut stream = source.open().unwrap();
        let mut depth: usize = 0;
        loop {
            let event = stream.next_event().unwrap();
            match event {
                JsonEvent::EndOfStream => break,
                JsonEvent::ObjectStart | JsonEvent::ArrayStart => {
                    prop_assert_eq!(stream.depth(), depth + 1);
                    depth += 1;
                }
                JsonEvent::ObjectEnd | JsonEvent::ArrayEnd => {
                    depth -= 1;
                    prop_assert_eq!(stream.depth(), depth);
                }
                JsonEvent::FieldName(_) => {
                    prop_assert_eq!(stream.current_path().depth(), depth);
                }
                JsonEvent::Scalar(_) => {
                    prop_assert!(stream.current_path().depth() <= depth);
                }
            }
        }
        prop_assert_eq!(depth, 0);
    }
}
