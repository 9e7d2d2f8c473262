//! Validate, relabel, sort and hash, in memory and through spool files.

use std::io::Read;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::json;
use typedobj_core::JsonSource;
use typedobj_idref::{IdMapping, IdReferenceTracker};
use typedobj_schema::{validate, SchemaNode};
use typedobj_store::{
    CanonicalPayload, MetadataError, MetadataSelection, PayloadError, PayloadStateError, SortError,
    TempFilesManager, KEY_ENTRY_OVERHEAD,
};

fn id_map_schema() -> SchemaNode {
    SchemaNode::from_value(&json!({
        "type": "object",
        "properties": {
            "m": {
                "type": "object",
                "id-reference": {"id-type": "ws", "attributes": []},
                "additionalProperties": {
                    "type": "string",
                    "id-reference": {"id-type": "ws", "attributes": []}
                }
            }
        },
        "additionalProperties": false,
        "required": ["m"]
    }))
    .unwrap()
}

fn validated(json: &str, mapping: &[(&str, &str)]) -> CanonicalPayload {
    let source = JsonSource::from(json);
    let report = validate(source.open().unwrap(), &id_map_schema()).unwrap();
    assert!(report.is_valid(), "{:?}", report.errors());
    let mapping: IdMapping = mapping.iter().copied().collect();
    CanonicalPayload::new(source, report.into_tracker(), mapping)
}

fn unvalidated(json: &str) -> CanonicalPayload {
    CanonicalPayload::new(JsonSource::from(json), IdReferenceTracker::new(), IdMapping::new())
}

fn read_all(payload: &CanonicalPayload) -> String {
    let mut out = String::new();
    payload.reader().unwrap().read_to_string(&mut out).unwrap();
    out
}

fn temp_files() -> (tempfile::TempDir, Arc<TempFilesManager>) {
    let dir = tempfile::tempdir().unwrap();
    let tfm = TempFilesManager::new(dir.path()).unwrap();
    (dir, tfm)
}

const REFMAP: &[(&str, &str)] = &[("z", "y"), ("d", "whoop"), ("a", "a"), ("b", "b")];
const EXPECTED: &str = r#"{"m":{"b":"whoop","y":"a"}}"#;
const EXPECTED_MD5: &str = "920d54af26c56df84e4c4df358952138";

#[test]
fn test_relabel_and_sort_in_memory() {
    let mut payload = validated(r#"{"m": {"z": "a", "b": "d"}}"#, REFMAP);
    assert_eq!(
        payload.size().unwrap_err().to_string(),
        "Must call calculateRelabeledSize() before getting said size"
    );
    assert_eq!(payload.calculate_relabeled_size().unwrap(), 27);
    assert_eq!(payload.relabeled_size(), Ok(27));
    assert_eq!(payload.calculate_relabeled_size().unwrap(), 27);
    assert_eq!(payload.md5(), Err(PayloadStateError::Md5NotCalculated));

    payload.sort(1_000, None).unwrap();
    assert_eq!(payload.md5().unwrap().to_hex(), EXPECTED_MD5);
    assert_eq!(read_all(&payload), EXPECTED);
    assert_eq!(payload.size(), Ok(27));
}

#[test]
fn test_relabel_and_sort_on_disk() {
    let (_dir, tfm) = temp_files();
    let mut payload = validated(r#"{"m": {"z": "a", "b": "d"}}"#, REFMAP);
    assert!(tfm.is_empty());

    payload.sort(1_000, Some(&tfm)).unwrap();
    assert_eq!(tfm.temp_files().len(), 1);
    assert_eq!(payload.md5().unwrap().to_hex(), EXPECTED_MD5);
    assert_eq!(read_all(&payload), EXPECTED);

    payload.release_cached_resources();
    assert!(tfm.is_empty());
}

#[test]
fn test_naturally_sorted_after_relabel() {
    for on_disk in [false, true] {
        let (_dir, tfm) = temp_files();
        let mut payload = validated(
            r#"{"m": {"c": "a", "z": "d"}}"#,
            &[("z", "y"), ("d", "whoop"), ("c", "c"), ("a", "a")],
        );
        payload.sort(0, on_disk.then_some(&tfm)).unwrap();
        assert_eq!(payload.is_naturally_sorted(), Ok(true));
        assert_eq!(read_all(&payload), r#"{"m":{"c":"a","y":"whoop"}}"#);
        assert_eq!(payload.md5().unwrap().to_hex(), "b5a128ad62a50790c65d66831eec6e66");
        assert_eq!(tfm.temp_files().len(), usize::from(on_disk));
        payload.destroy();
        assert!(tfm.is_empty());
    }
}

#[test]
fn test_reader_before_sort() {
    let payload = validated(r#"{"m": {"b": "a", "w": "d"}}"#, &[("b", "y")]);
    assert_eq!(
        payload.reader().unwrap_err().to_string(),
        "You must call sort() prior to accessing the object data."
    );
}

#[test]
fn test_relabel_into_duplicate_keys() {
    let (_dir, tfm) = temp_files();
    let mut payload = validated(
        r#"{"m": {"z": "a", "b": "d"}}"#,
        &[("z", "b"), ("d", "whoop"), ("b", "b"), ("a", "a")],
    );
    let err = payload.sort(225, Some(&tfm)).unwrap_err();
    assert_eq!(err.to_string(), "Duplicated key 'b' was found at /m");
    assert!(tfm.is_empty());
}

#[test]
fn test_key_size_boundaries() {
    let json = r#"{"z":"a","b":"d"}"#;
    let mut payload = unvalidated(json);
    let (_dir, tfm) = temp_files();

    let needed = 2 * (KEY_ENTRY_OVERHEAD + 1);
    payload.sort(needed, Some(&tfm)).unwrap();
    assert_eq!(payload.md5().unwrap().to_hex(), "16903d0745c0f47a90d92d1abd535b12");
    payload.release_cached_resources();
    assert!(tfm.is_empty());

    let err = payload.sort(needed - 1, Some(&tfm)).unwrap_err();
    assert_eq!(
        err.to_string(),
        "Memory necessary for sorting map keys exceeds the limit 143 bytes at /"
    );
    assert!(tfm.is_empty());

    // In memory the document itself is charged too.
    let length = json.len() as u64;
    payload.sort(needed + length, None).unwrap();
    assert_eq!(read_all(&payload), r#"{"b":"d","z":"a"}"#);
    let err = payload.sort(needed + length - 1, None).unwrap_err();
    assert!(matches!(
        err,
        typedobj_store::PayloadError::Sort(SortError::TooManyKeys { limit: 143, .. })
    ));
}

#[test]
fn test_failed_sort_leaves_no_output() {
    let mut payload = unvalidated(r#"{"z":"a","b":"d"}"#);
    payload.sort(1_000, None).unwrap();
    assert!(payload.sort(1, None).is_err());
    assert_eq!(payload.md5(), Err(PayloadStateError::Md5NotCalculated));
}

#[test]
fn test_deeply_nested_document_fails_cleanly() {
    let depth = 2000;
    let deep = format!(r#"{{"b":1,"a":{}{}}}"#, "[".repeat(depth), "]".repeat(depth));
    let (dir, tfm) = temp_files();

    let mut payload = unvalidated(&deep);
    let err = payload.sort(u64::MAX, None).unwrap_err();
    assert!(err.to_string().contains("nesting deeper than 512 levels"), "{err}");
    let err = payload.sort(u64::MAX, Some(&tfm)).unwrap_err();
    assert!(err.to_string().contains("nesting deeper than 512 levels"), "{err}");
    assert_eq!(payload.md5(), Err(PayloadStateError::Md5NotCalculated));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);

    let shallow = format!(r#"{{"b":1,"a":{}{}}}"#, "[".repeat(500), "]".repeat(500));
    let mut payload = unvalidated(&shallow);
    payload.sort(u64::MAX, None).unwrap();
    assert!(read_all(&payload).starts_with(r#"{"a":[[["#));
}

#[test]
fn test_metadata_follows_relabeling() {
    let schema = SchemaNode::from_value(&json!({
        "type": "object",
        "metadata-ws": {"owner": "owner", "entries": "length(m)"},
        "properties": {
            "owner": {"type": "string", "id-reference": {"id-type": "ws", "attributes": []}},
            "m": {"type": "object", "additionalProperties": {"type": "string"}}
        }
    }))
    .unwrap();
    let source = JsonSource::from(r#"{"owner":"d","m":{"z":"a","b":"d"}}"#);
    let report = validate(source.open().unwrap(), &schema).unwrap();
    let selection = MetadataSelection::from_value(report.root_metadata_selection().unwrap()).unwrap();
    let mapping: IdMapping = REFMAP.iter().copied().collect();
    let (_dir, tfm) = temp_files();

    let mut payload =
        CanonicalPayload::new(source, report.into_tracker(), mapping).with_metadata_selection(selection);
    payload.sort(1_000, Some(&tfm)).unwrap();
    let metadata = payload.extract_metadata(u64::MAX).unwrap();
    assert_eq!(metadata.get("owner"), Some("whoop"));
    assert_eq!(metadata.get("entries"), Some("2"));
    assert_eq!(
        serde_json::to_value(&metadata).unwrap(),
        json!({"entries": "2", "owner": "whoop"})
    );

    let err = payload.extract_metadata(metadata.byte_size() - 1).unwrap_err();
    assert!(matches!(err, PayloadError::Metadata(MetadataError::ExceededMaxSize { .. })));
}

#[test]
fn test_invalid_instance_has_no_metadata_selection() {
    let schema = SchemaNode::from_value(&json!({
        "type": "object",
        "metadata-ws": {"n": "n"},
        "properties": {"n": {"type": "integer"}}
    }))
    .unwrap();
    let report = validate(JsonSource::from(r#"{"n":"x"}"#).open().unwrap(), &schema).unwrap();
    assert!(!report.is_valid());
    assert!(report.root_metadata_selection().is_none());
}

fn json_value() -> impl Strategy<Value = serde_json::Value> {
    let leaf = prop_oneof![
        Just(serde_json::Value::Null),
        any::<bool>().prop_map(serde_json::Value::from),
        any::<i32>().prop_map(serde_json::Value::from),
        "[a-z]{0,6}".prop_map(serde_json::Value::from),
    ];
    leaf.prop_recursive(4, 32, 6, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..5).prop_map(serde_json::Value::from),
            prop::collection::btree_map("[a-zA-Z0-9é]{1,4}", inner, 0..5)
                .prop_map(|m| serde_json::Value::Object(m.into_iter().rev().collect())),
        ]
    })
}

proptest! {
    #[test]
    fn prop_canonical_form_is_idempotent(value in json_value()) {
        let text = serde_json::to_string(&value).unwrap();
        let mut first = unvalidated(&text);
        first.sort(u64::MAX, None).unwrap();
        let once = read_all(&first);

        let mut second = unvalidated(&once);
        second.sort(u64::MAX, None).unwrap();
        prop_assert_eq!(&read_all(&second), &once);
        prop_assert_eq!(second.md5().unwrap(), first.md5().unwrap());
        prop_assert_eq!(second.is_naturally_sorted(), Ok(true));
        prop_assert_eq!(first.size().unwrap(), text.len() as u64);
    }
}
