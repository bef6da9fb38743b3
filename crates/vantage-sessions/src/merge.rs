//! Partial-update merge rules.
//!
//! An update payload is a flat JSON object. `highlightFields` is broadcast
//! metadata and is split off before merging. Of the remaining fields,
//! `questions` appends to the record's existing sequence; every other field
//! overwrites. Each payload field is applied exactly once — an
//! overwrite-then-append double pass would duplicate the incoming
//! `questions` tail.

use serde_json::{Map, Value};
use tracing::warn;

use crate::record::SessionRecord;

/// Payload key carrying admin-UI highlight metadata.
pub const HIGHLIGHT_FIELDS_KEY: &str = "highlightFields";

/// Remove and parse the `highlightFields` entry from a payload.
///
/// Returns the listed field names; non-string entries are dropped. A missing
/// or non-array value yields an empty list. The key never reaches the record.
pub fn split_highlight_fields(payload: &mut Map<String, Value>) -> Vec<String> {
    match payload.remove(HIGHLIGHT_FIELDS_KEY) {
        Some(Value::Array(entries)) => entries
            .into_iter()
            .filter_map(|entry| match entry {
                Value::String(name) => Some(name),
                _ => None,
            })
            .collect(),
        Some(other) => {
            warn!(value = %other, "ignoring non-array highlightFields");
            Vec::new()
        }
        None => Vec::new(),
    }
}

/// Merge a payload into a record, applying each field exactly once.
///
/// - `questions` with an array value appends the incoming elements to the
///   end of the existing sequence, preserving both orders.
/// - `status`, `online`, and `ip` map onto the typed record fields when the
///   value has the right shape; mismatched shapes are ignored with a warning.
/// - `lastUpdate` is system-managed and cannot be set from a payload.
/// - Everything else lands in the record's ad hoc `extra` map, overwriting
///   any previous value under the same key.
///
/// `last_update` is refreshed after the merge.
pub fn apply_payload(record: &mut SessionRecord, payload: Map<String, Value>) {
    for (key, value) in payload {
        match (key.as_str(), value) {
            ("questions", Value::Array(entries)) => {
                record.questions.extend(entries);
            }
            ("questions", other) => {
                warn!(value = %other, "ignoring non-array questions value");
            }
            ("status", Value::String(status)) => record.status = status,
            ("status", other) => {
                warn!(value = %other, "ignoring non-string status value");
            }
            ("online", Value::Bool(online)) => record.online = online,
            ("online", other) => {
                warn!(value = %other, "ignoring non-bool online value");
            }
            ("ip", Value::String(ip)) => record.ip = Some(ip),
            ("ip", other) => {
                warn!(value = %other, "ignoring non-string ip value");
            }
            ("lastUpdate", _) => {
                warn!("ignoring client-supplied lastUpdate");
            }
            (_, value) => {
                let _ = record.extra.insert(key, value);
            }
        }
    }
    record.touch();
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("payload must be an object, got {other}"),
        }
    }

    #[test]
    fn questions_append_preserving_both_orders() {
        let mut record = SessionRecord::registered(None);
        record.questions = vec![json!("a"), json!("b")];

        apply_payload(&mut record, payload(json!({"questions": ["c"]})));

        assert_eq!(record.questions, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn repeated_merge_appends_exactly_once_each_time() {
        // Regression guard: the payload must be applied once, not once per
        // merge pass — repeating a merge may re-append, but never duplicate
        // within a single application.
        let mut record = SessionRecord::registered(None);
        record.questions = vec![json!("a"), json!("b")];

        apply_payload(&mut record, payload(json!({"questions": ["c"]})));
        assert_eq!(record.questions, vec![json!("a"), json!("b"), json!("c")]);

        apply_payload(&mut record, payload(json!({"questions": ["c"]})));
        assert_eq!(
            record.questions,
            vec![json!("a"), json!("b"), json!("c"), json!("c")],
            "second identical merge appends one more element, not two"
        );
    }

    #[test]
    fn status_overwrites_and_highlight_is_not_stored() {
        let mut record = SessionRecord::registered(None);
        let mut fields = payload(json!({"status": "x", "highlightFields": ["status"]}));

        let highlight = split_highlight_fields(&mut fields);
        apply_payload(&mut record, fields);

        assert_eq!(record.status, "x");
        assert_eq!(highlight, vec!["status".to_string()]);
        assert!(!record.extra.contains_key(HIGHLIGHT_FIELDS_KEY));
        let wire = serde_json::to_value(&record).unwrap();
        assert!(wire.get(HIGHLIGHT_FIELDS_KEY).is_none());
    }

    #[test]
    fn ad_hoc_fields_land_in_extra() {
        let mut record = SessionRecord::registered(None);
        apply_payload(
            &mut record,
            payload(json!({"username": "visitor7", "step": 2})),
        );
        assert_eq!(record.extra["username"], "visitor7");
        assert_eq!(record.extra["step"], 2);
    }

    #[test]
    fn ad_hoc_field_overwrites_previous_value() {
        let mut record = SessionRecord::registered(None);
        apply_payload(&mut record, payload(json!({"step": 1})));
        apply_payload(&mut record, payload(json!({"step": 2})));
        assert_eq!(record.extra["step"], 2);
    }

    #[test]
    fn typed_fields_with_wrong_shape_are_ignored() {
        let mut record = SessionRecord::registered(None);
        record.status = "idle".into();
        apply_payload(
            &mut record,
            payload(json!({"status": 42, "online": "yes", "questions": "not-an-array"})),
        );
        assert_eq!(record.status, "idle");
        assert!(record.online);
        assert!(record.questions.is_empty());
    }

    #[test]
    fn client_supplied_last_update_is_ignored() {
        let mut record = SessionRecord::registered(None);
        let before = record.last_update;
        apply_payload(&mut record, payload(json!({"lastUpdate": 1})));
        assert!(record.last_update >= before);
        assert!(!record.extra.contains_key("lastUpdate"));
    }

    #[test]
    fn merge_refreshes_last_update() {
        let mut record = SessionRecord::registered(None);
        record.last_update = 1;
        apply_payload(&mut record, payload(json!({"status": "submitted"})));
        assert!(record.last_update > 1);
    }

    #[test]
    fn highlight_fields_missing_or_malformed() {
        let mut none = payload(json!({"status": "x"}));
        assert!(split_highlight_fields(&mut none).is_empty());

        let mut scalar = payload(json!({"highlightFields": "status"}));
        assert!(split_highlight_fields(&mut scalar).is_empty());
        assert!(!scalar.contains_key(HIGHLIGHT_FIELDS_KEY));

        let mut mixed = payload(json!({"highlightFields": ["status", 7, null, "ip"]}));
        assert_eq!(
            split_highlight_fields(&mut mixed),
            vec!["status".to_string(), "ip".to_string()]
        );
    }

    #[test]
    fn online_bool_is_applied() {
        let mut record = SessionRecord::registered(None);
        apply_payload(&mut record, payload(json!({"online": false})));
        assert!(!record.online);
    }
}
