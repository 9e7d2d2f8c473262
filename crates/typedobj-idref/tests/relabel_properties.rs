//! # Relabel Invariants
//!
//! Relabeling with an empty mapping must reproduce the compact encoding of
//! the input exactly, whatever IDs were recorded, and relabeling never
//! changes structure.

use proptest::prelude::*;
use serde_json::Value;
use typedobj_core::{JsonSource, TokenSource};
use typedobj_idref::{
    relabel_to_vec, IdMapping, IdReference, IdReferenceTracker, IdReferenceType,
};

fn arb_json() -> impl Strategy<Value = Value> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::Bool),
        any::<i32>().prop_map(Value::from),
        "[a-z]{0,4}".prop_map(Value::String),
    ];
    leaf.prop_recursive(3, 32, 5, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,3}", inner, 0..5)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Record every string value and key as a `ws` ID, the way a schema that
/// marks everything as an ID would.
fn track_everything(json: &str) -> IdReferenceTracker {
    let ws = IdReferenceType::new("ws").unwrap();
    let source = JsonSource::from(json);
    let mut stream = source.open().unwrap();
    let mut tracker = IdReferenceTracker::new();
    loop {
        match stream.next_event().unwrap() {
            typedobj_core::JsonEvent::EndOfStream => break,
            typedobj_core::JsonEvent::FieldName(name) => tracker
                .add(IdReference::field_name(ws.clone(), name, vec![], stream.current_path()))
                .unwrap(),
            typedobj_core::JsonEvent::Scalar(typedobj_core::ScalarValue::String(s)) => tracker
                .add(IdReference::value(ws.clone(), s, vec![], stream.current_path()))
                .unwrap(),
            _ => {}
        }
    }
    tracker
}

proptest! {
    #[test]
    fn empty_mapping_is_identity(value in arb_json()) {
        let pretty = serde_json::to_string_pretty(&value).unwrap();
        let compact = serde_json::to_string(&value).unwrap();
        let tracker = track_everything(&pretty);
        let source = JsonSource::from(pretty);
        let (out, outcome) = relabel_to_vec(source.open().unwrap(), &tracker, &IdMapping::new()).unwrap();
        prop_assert_eq!(String::from_utf8(out).unwrap(), compact.clone());
        prop_assert_eq!(outcome.size, compact.len() as u64);
        prop_assert_eq!(outcome.replaced, 0);
        // serde_json maps are sorted, so the compact form is naturally sorted.
        prop_assert!(outcome.naturally_sorted);
    }

    #[test]
    fn relabeling_preserves_structure(value in arb_json()) {
        let compact = serde_json::to_string(&value).unwrap();
        let tracker = track_everything(&compact);
        let mapping: IdMapping = tracker
            .references()
            .iter()
            .map(|r| (r.id.clone(), format!("X{}", r.id)))
            .collect();
        let source = JsonSource::from(compact);
        let (out, _) = relabel_to_vec(source.open().unwrap(), &tracker, &mapping).unwrap();
        let relabeled: Value = serde_json::from_slice(&out).unwrap();
        prop_assert_eq!(shape(&relabeled), shape(&value));
    }
}

/// The document with every string blanked, keeping keys in order positions.
fn shape(value: &Value) -> String {
    match value {
        Value::Object(m) => format!(
            "{{{}}}",
            m.values().map(shape).collect::<Vec<_>>().join(",")
        ),
        Value::Array(a) => format!("[{}]", a.iter().map(shape).collect::<Vec<_>>().join(",")),
        Value::String(_) => "s".into(),
        other => other.to_string(),
    }
}
