//! Conflict detection between a local and a server snapshot.
//!
//! Everything here is a pure function over borrowed payloads. A payload that
//! is not a JSON object (including `null` for "does not exist") has no
//! fields.

use chrono::DateTime;
use serde_json::Value;
use std::collections::BTreeSet;
use sync_types::{ConflictType, OperationKind, TimestampMillis};

use crate::canonical::values_equal;

/// Fields that identify a record rather than describe it.
///
/// They never count as conflicting.
pub const METADATA_FIELDS: [&str; 3] = ["id", "userId", "createdAt"];

/// Severity at or above which a conflict is not resolved automatically.
pub const AUTO_RESOLVE_SEVERITY_THRESHOLD: f64 = 0.3;

/// Decide whether a local and a server snapshot conflict.
///
/// Equal timestamps never conflict, even when the payloads differ.
/// Canonically equal payloads never conflict.
pub fn detect_conflict(
    local: &Value,
    server: &Value,
    local_timestamp: TimestampMillis,
    server_timestamp: TimestampMillis,
) -> bool {
    if local_timestamp == server_timestamp {
        return false;
    }
    !values_equal(local, server)
}

/// Classify a conflict from what each side did to the entity.
///
/// A server operation of `Delete` counts as the server no longer having the
/// entity.
pub fn get_conflict_type(
    local_exists: bool,
    server_exists: bool,
    local_op: OperationKind,
    server_op: Option<OperationKind>,
) -> ConflictType {
    let server_exists = server_exists && server_op != Some(OperationKind::Delete);
    let local_deleted = !local_exists || local_op == OperationKind::Delete;

    if local_deleted && server_exists {
        ConflictType::DeleteUpdate
    } else if local_op == OperationKind::Update && local_exists && !server_exists {
        ConflictType::UpdateDelete
    } else if local_op == OperationKind::Create && server_exists {
        ConflictType::CreateCreate
    } else {
        ConflictType::UpdateUpdate
    }
}

/// Whether a single field differs between two sides.
///
/// `None` and JSON `null` both mean "absent". Two RFC 3339 date strings are
/// compared by the instant they denote.
pub fn is_field_modified(a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    match (a, b) {
        (None, None) => false,
        (None, Some(_)) | (Some(_), None) => true,
        (Some(a), Some(b)) => {
            if let (Some(x), Some(y)) = (date_millis(a), date_millis(b)) {
                return x != y;
            }
            !values_equal(a, b)
        }
    }
}

/// Names of the fields that differ, excluding [`METADATA_FIELDS`].
pub fn get_conflicting_fields(local: &Value, server: &Value) -> BTreeSet<String> {
    all_field_names(local, server)
        .into_iter()
        .filter(|name| !METADATA_FIELDS.contains(name))
        .filter(|name| is_field_modified(local.get(*name), server.get(*name)))
        .map(str::to_string)
        .collect()
}

/// Fraction of fields that conflict, in `[0, 1]`.
///
/// The denominator is every key on either side, metadata included. Two
/// payloads without fields have severity 0.
pub fn calculate_conflict_severity(local: &Value, server: &Value) -> f64 {
    let total = all_field_names(local, server).len();
    if total == 0 {
        return 0.0;
    }
    get_conflicting_fields(local, server).len() as f64 / total as f64
}

/// Whether a conflict is mild enough to resolve without a human.
///
/// Conflicts involving a deletion always need a human.
pub fn can_auto_resolve(local: &Value, server: &Value, conflict_type: ConflictType) -> bool {
    if conflict_type.involves_delete() {
        return false;
    }
    calculate_conflict_severity(local, server) < AUTO_RESOLVE_SEVERITY_THRESHOLD
}

/// Union of the top-level keys of both payloads.
pub(crate) fn all_field_names<'a>(local: &'a Value, server: &'a Value) -> BTreeSet<&'a str> {
    local
        .as_object()
        .into_iter()
        .chain(server.as_object())
        .flat_map(|fields| fields.keys().map(String::as_str))
        .collect()
}

fn date_millis(value: &Value) -> Option<i64> {
    let text = value.as_str()?;
    DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.timestamp_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn fields(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn equal_timestamps_never_conflict() {
        let local = json!({"title": "A"});
        let server = json!({"title": "B"});
        assert!(!detect_conflict(&local, &server, 100, 100));
    }

    #[test]
    fn equal_payloads_never_conflict() {
        let local: Value = serde_json::from_str(r#"{"a":1,"b":2}"#).unwrap();
        let server: Value = serde_json::from_str(r#"{"b":2,"a":1}"#).unwrap();
        assert!(!detect_conflict(&local, &server, 100, 200));
    }

    #[test]
    fn differing_payloads_conflict() {
        let local = json!({"title": "A"});
        let server = json!({"title": "B"});
        assert!(detect_conflict(&local, &server, 100, 200));
        assert!(detect_conflict(&local, &Value::Null, 100, 0));
    }

    #[test]
    fn conflict_type_classification() {
        use OperationKind::*;

        assert_eq!(
            get_conflict_type(false, true, Delete, Some(Update)),
            ConflictType::DeleteUpdate
        );
        assert_eq!(
            get_conflict_type(true, true, Delete, None),
            ConflictType::DeleteUpdate
        );
        assert_eq!(
            get_conflict_type(true, false, Update, None),
            ConflictType::UpdateDelete
        );
        assert_eq!(
            get_conflict_type(true, true, Update, Some(Delete)),
            ConflictType::UpdateDelete
        );
        assert_eq!(
            get_conflict_type(true, true, Create, Some(Create)),
            ConflictType::CreateCreate
        );
        assert_eq!(
            get_conflict_type(true, true, Update, Some(Update)),
            ConflictType::UpdateUpdate
        );
    }

    #[test]
    fn field_presence_changes_are_modifications() {
        assert!(is_field_modified(Some(&json!("x")), None));
        assert!(is_field_modified(None, Some(&json!(0))));
        assert!(is_field_modified(Some(&Value::Null), Some(&json!(false))));
        assert!(!is_field_modified(None, None));
        assert!(!is_field_modified(Some(&Value::Null), None));
    }

    #[test]
    fn dates_compare_by_instant() {
        let a = json!("2024-03-01T10:00:00Z");
        let b = json!("2024-03-01T12:00:00+02:00");
        let c = json!("2024-03-01T10:00:01Z");
        assert!(!is_field_modified(Some(&a), Some(&b)));
        assert!(is_field_modified(Some(&a), Some(&c)));
    }

    #[test]
    fn objects_compare_canonically() {
        let a: Value = serde_json::from_str(r#"{"x":1,"y":[1,2]}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y":[1,2],"x":1}"#).unwrap();
        assert!(!is_field_modified(Some(&a), Some(&b)));
        assert!(is_field_modified(Some(&a), Some(&json!({"x": 2, "y": [1, 2]}))));
    }

    #[test]
    fn conflicting_fields_skip_metadata() {
        let local = json!({"id": "1", "userId": "u1", "createdAt": 1, "title": "A", "notes": "n"});
        let server = json!({"id": "2", "userId": "u2", "createdAt": 2, "title": "B", "notes": "n"});
        assert_eq!(get_conflicting_fields(&local, &server), fields(&["title"]));
    }

    #[test]
    fn conflicting_fields_include_one_sided_keys() {
        let local = json!({"title": "A", "tag": "work"});
        let server = json!({"title": "A", "due": "tomorrow"});
        assert_eq!(
            get_conflicting_fields(&local, &server),
            fields(&["due", "tag"])
        );
    }

    #[test]
    fn title_scenario_conflicts_on_title_and_updated_at() {
        let local = json!({"title": "A", "updatedAt": 100});
        let server = json!({"title": "B", "updatedAt": 200});
        // updatedAt is an ordinary field, not metadata.
        assert_eq!(
            get_conflicting_fields(&local, &server),
            fields(&["title", "updatedAt"])
        );

        let local = json!({"title": "A"});
        let server = json!({"title": "B"});
        assert_eq!(get_conflicting_fields(&local, &server), fields(&["title"]));
    }

    #[test]
    fn severity_is_fraction_of_all_keys() {
        let local = json!({"id": "1", "a": 1, "b": 2, "c": 3});
        let server = json!({"id": "1", "a": 1, "b": 5, "c": 3});
        assert_eq!(calculate_conflict_severity(&local, &server), 0.25);
    }

    #[test]
    fn severity_of_empty_payloads_is_zero() {
        assert_eq!(calculate_conflict_severity(&json!({}), &json!({})), 0.0);
        assert_eq!(calculate_conflict_severity(&Value::Null, &Value::Null), 0.0);
    }

    #[test]
    fn delete_conflicts_are_never_auto_resolved() {
        let same = json!({"a": 1});
        assert!(!can_auto_resolve(&same, &same, ConflictType::DeleteUpdate));
        assert!(!can_auto_resolve(&same, &same, ConflictType::UpdateDelete));
    }

    #[test]
    fn auto_resolve_threshold() {
        let local = json!({"a": 1, "b": 2, "c": 3, "d": 4});
        let low = json!({"a": 9, "b": 2, "c": 3, "d": 4}); // 0.25
        let high = json!({"a": 9, "b": 9, "c": 3, "d": 4}); // 0.5
        assert!(can_auto_resolve(&local, &low, ConflictType::UpdateUpdate));
        assert!(!can_auto_resolve(&local, &high, ConflictType::UpdateUpdate));
    }
}
