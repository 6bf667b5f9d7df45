//! Conflict resolution strategies.
//!
//! Each strategy turns a [`ConflictRecord`] into a [`ResolvedConflict`]
//! without touching storage. Resolving the same record with the same
//! strategy always yields the same `resolved_data`; only `resolved_at`
//! reflects the wall clock.
//!
//! `MERGE` picks conflicting fields by the record-level timestamps, not by a
//! per-field modification time. A field edited early on the newer side still
//! beats a field edited late on the older side.

use serde_json::{Map, Value};
use sync_types::{now_millis, ConflictRecord, Payload, ResolutionStrategy, ResolvedConflict};
use thiserror::Error;

use crate::detector::get_conflicting_fields;

/// Largest number of conflicting fields `auto_resolve` still merges.
pub const MERGE_FIELD_LIMIT: usize = 2;

/// Above this many conflicting fields the recommendation is `LATEST_WINS`.
pub const RECOMMEND_LATEST_ABOVE: usize = 5;

static ABSENT: Value = Value::Null;

/// Error type for resolution.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    /// The conflict cannot be resolved without a user-chosen payload.
    ///
    /// This is a signal rather than a failure: supply the payload through
    /// [`resolve_with_data`].
    #[error("conflict {conflict_id} requires user input")]
    RequiresUserInput {
        /// The conflict awaiting input.
        conflict_id: String,
    },
}

/// Result type alias for resolution.
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Resolve a conflict with the named strategy.
///
/// `None` selects a strategy with [`auto_resolve`].
pub fn resolve_conflict(
    conflict: &ConflictRecord,
    strategy: Option<ResolutionStrategy>,
) -> ResolveResult<ResolvedConflict> {
    match strategy {
        Some(ResolutionStrategy::LocalWins) => Ok(local_wins(conflict)),
        Some(ResolutionStrategy::ServerWins) => Ok(server_wins(conflict)),
        Some(ResolutionStrategy::LatestWins) => Ok(latest_wins(conflict)),
        Some(ResolutionStrategy::Merge) => Ok(merge(conflict)),
        Some(ResolutionStrategy::Manual) => Err(ResolveError::RequiresUserInput {
            conflict_id: conflict.id.clone(),
        }),
        None => Ok(auto_resolve(conflict)),
    }
}

/// Apply one strategy to every conflict.
pub fn batch_resolve(
    conflicts: &[ConflictRecord],
    strategy: Option<ResolutionStrategy>,
) -> Vec<ResolveResult<ResolvedConflict>> {
    conflicts
        .iter()
        .map(|conflict| resolve_conflict(conflict, strategy))
        .collect()
}

/// Keep the local version verbatim.
pub fn local_wins(conflict: &ConflictRecord) -> ResolvedConflict {
    resolved(
        conflict,
        ResolutionStrategy::LocalWins,
        version_or_null(&conflict.local_version),
    )
}

/// Keep the server version verbatim.
pub fn server_wins(conflict: &ConflictRecord) -> ResolvedConflict {
    resolved(
        conflict,
        ResolutionStrategy::ServerWins,
        version_or_null(&conflict.server_version),
    )
}

/// Keep the version with the later timestamp. Ties go to the server.
pub fn latest_wins(conflict: &ConflictRecord) -> ResolvedConflict {
    let data = if conflict.local_timestamp > conflict.server_timestamp {
        version_or_null(&conflict.local_version)
    } else {
        version_or_null(&conflict.server_version)
    };
    resolved(conflict, ResolutionStrategy::LatestWins, data)
}

/// Field-level merge of both versions.
///
/// Starts from the server version, carries over every local field that does
/// not conflict, and takes each conflicting field from the side with the later
/// record timestamp (ties go to the server). A conflicting field missing on
/// the winning side is dropped.
pub fn merge(conflict: &ConflictRecord) -> ResolvedConflict {
    let local = conflict.local_version.as_ref().unwrap_or(&ABSENT);
    let server = conflict.server_version.as_ref().unwrap_or(&ABSENT);
    let conflicting = get_conflicting_fields(local, server);

    let mut merged: Map<String, Value> = server.as_object().cloned().unwrap_or_default();

    if let Some(local_fields) = local.as_object() {
        for (name, value) in local_fields {
            if !conflicting.contains(name) {
                merged.insert(name.clone(), value.clone());
            }
        }
    }

    let winner = if conflict.local_timestamp > conflict.server_timestamp {
        local
    } else {
        server
    };
    for name in &conflicting {
        match winner.get(name.as_str()) {
            Some(value) => {
                merged.insert(name.clone(), value.clone());
            }
            None => {
                merged.remove(name);
            }
        }
    }

    resolved(conflict, ResolutionStrategy::Merge, Value::Object(merged))
}

/// Build a `MANUAL` resolution from a payload chosen by the user.
pub fn resolve_with_data(conflict: &ConflictRecord, data: Payload) -> ResolvedConflict {
    resolved(conflict, ResolutionStrategy::Manual, data)
}

/// Pick a strategy heuristically and apply it.
///
/// 1. Only the server has the entity: `SERVER_WINS`.
/// 2. Only the local side has it: `LOCAL_WINS`.
/// 3. No conflicting fields: `LOCAL_WINS`.
/// 4. Every conflicting field is temporal: `LATEST_WINS`.
/// 5. At most [`MERGE_FIELD_LIMIT`] conflicting fields: `MERGE`.
/// 6. Otherwise `LATEST_WINS`.
pub fn auto_resolve(conflict: &ConflictRecord) -> ResolvedConflict {
    match (&conflict.local_version, &conflict.server_version) {
        (None, Some(_)) => return server_wins(conflict),
        (Some(_), None) => return local_wins(conflict),
        _ => {}
    }

    let local = conflict.local_version.as_ref().unwrap_or(&ABSENT);
    let server = conflict.server_version.as_ref().unwrap_or(&ABSENT);
    let conflicting = get_conflicting_fields(local, server);

    if conflicting.is_empty() {
        local_wins(conflict)
    } else if conflicting.iter().all(|name| is_temporal_field(name)) {
        latest_wins(conflict)
    } else if conflicting.len() <= MERGE_FIELD_LIMIT {
        merge(conflict)
    } else {
        latest_wins(conflict)
    }
}

/// Strategy to suggest to a user looking at the conflict.
///
/// Differs from [`auto_resolve`] for three to five conflicting fields: this
/// recommends `MERGE` where `auto_resolve` applies `LATEST_WINS`.
pub fn get_recommended_strategy(conflict: &ConflictRecord) -> ResolutionStrategy {
    let local = conflict.local_version.as_ref().unwrap_or(&ABSENT);
    let server = conflict.server_version.as_ref().unwrap_or(&ABSENT);
    let count = get_conflicting_fields(local, server).len();

    if count == 0 {
        ResolutionStrategy::LocalWins
    } else if count <= MERGE_FIELD_LIMIT {
        ResolutionStrategy::Merge
    } else if count > RECOMMEND_LATEST_ABOVE {
        ResolutionStrategy::LatestWins
    } else {
        ResolutionStrategy::Merge
    }
}

fn is_temporal_field(name: &str) -> bool {
    let lower = name.to_ascii_lowercase();
    lower.contains("time") || lower.contains("date") || name == "updatedAt"
}

fn version_or_null(version: &Option<Payload>) -> Payload {
    version.clone().unwrap_or(Value::Null)
}

fn resolved(
    conflict: &ConflictRecord,
    strategy: ResolutionStrategy,
    data: Payload,
) -> ResolvedConflict {
    ResolvedConflict {
        conflict_id: conflict.id.clone(),
        strategy,
        resolved_data: data,
        resolved_at: now_millis(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn conflict(local: Option<Value>, server: Option<Value>, local_ts: i64, server_ts: i64) -> ConflictRecord {
        ConflictRecord {
            id: "conflict-1".into(),
            user_id: "user-1".into(),
            entity_type: "task".into(),
            entity_id: "task-1".into(),
            local_version: local,
            server_version: server,
            local_timestamp: local_ts,
            server_timestamp: server_ts,
            detected_at: 1_000,
            resolved: false,
        }
    }

    #[test]
    fn local_and_server_wins_are_verbatim() {
        let c = conflict(Some(json!({"a": 1})), Some(json!({"a": 2})), 1, 2);

        let local = resolve_conflict(&c, Some(ResolutionStrategy::LocalWins)).unwrap();
        assert_eq!(local.resolved_data, json!({"a": 1}));
        assert_eq!(local.strategy, ResolutionStrategy::LocalWins);
        assert_eq!(local.conflict_id, "conflict-1");

        let server = resolve_conflict(&c, Some(ResolutionStrategy::ServerWins)).unwrap();
        assert_eq!(server.resolved_data, json!({"a": 2}));
    }

    #[test]
    fn absent_side_resolves_to_null() {
        let c = conflict(None, Some(json!({"a": 2})), 1, 2);
        assert_eq!(local_wins(&c).resolved_data, Value::Null);
    }

    #[test]
    fn latest_wins_prefers_newer_and_ties_to_server() {
        let newer_local = conflict(Some(json!({"a": 1})), Some(json!({"a": 2})), 300, 200);
        assert_eq!(latest_wins(&newer_local).resolved_data, json!({"a": 1}));

        let newer_server = conflict(Some(json!({"a": 1})), Some(json!({"a": 2})), 100, 200);
        assert_eq!(latest_wins(&newer_server).resolved_data, json!({"a": 2}));

        let tie = conflict(Some(json!({"a": 1})), Some(json!({"a": 2})), 200, 200);
        assert_eq!(latest_wins(&tie).resolved_data, json!({"a": 2}));
    }

    #[test]
    fn merge_takes_conflicting_field_from_later_side() {
        let c = conflict(
            Some(json!({"title": "A", "notes": "local notes"})),
            Some(json!({"title": "B"})),
            100,
            200,
        );

        let merged = merge(&c).resolved_data;
        // notes exists only locally, so it conflicts and the server (later) drops it.
        assert_eq!(merged, json!({"title": "B"}));
    }

    #[test]
    fn merge_on_title_scenario_keeps_shared_and_metadata_fields() {
        let local = json!({"title": "A", "updatedAt": 100, "done": false, "createdAt": 50});
        let server = json!({"title": "B", "updatedAt": 200, "done": false});

        let server_newer = conflict(Some(local.clone()), Some(server.clone()), 100, 200);
        assert_eq!(
            merge(&server_newer).resolved_data,
            json!({"title": "B", "updatedAt": 200, "done": false, "createdAt": 50})
        );

        let local_newer = conflict(Some(local), Some(server), 300, 200);
        assert_eq!(
            merge(&local_newer).resolved_data,
            json!({"title": "A", "updatedAt": 100, "done": false, "createdAt": 50})
        );
    }

    #[test]
    fn merge_keeps_non_conflicting_local_fields() {
        let c = conflict(
            Some(json!({"id": "task-1", "title": "A", "done": true, "priority": 1})),
            Some(json!({"id": "task-1", "title": "B", "done": true, "priority": 1})),
            100,
            200,
        );

        let merged = merge(&c).resolved_data;
        assert_eq!(
            merged,
            json!({"id": "task-1", "title": "B", "done": true, "priority": 1})
        );
    }

    #[test]
    fn merge_with_newer_local_takes_local_values() {
        let c = conflict(
            Some(json!({"title": "A", "tag": "home"})),
            Some(json!({"title": "B", "due": "2024-05-01"})),
            500,
            200,
        );

        let merged = merge(&c).resolved_data;
        assert_eq!(merged, json!({"title": "A", "tag": "home"}));
    }

    #[test]
    fn manual_requires_user_input() {
        let c = conflict(Some(json!({"a": 1})), Some(json!({"a": 2})), 1, 2);
        let err = resolve_conflict(&c, Some(ResolutionStrategy::Manual)).unwrap_err();
        assert_eq!(
            err,
            ResolveError::RequiresUserInput {
                conflict_id: "conflict-1".into()
            }
        );

        let manual = resolve_with_data(&c, json!({"a": 3}));
        assert_eq!(manual.strategy, ResolutionStrategy::Manual);
        assert_eq!(manual.resolved_data, json!({"a": 3}));
    }

    #[test]
    fn auto_resolve_missing_local_takes_server() {
        let c = conflict(None, Some(json!({"x": 1})), 1, 2);
        let resolved = auto_resolve(&c);
        assert_eq!(resolved.strategy, ResolutionStrategy::ServerWins);
        assert_eq!(resolved.resolved_data, json!({"x": 1}));
    }

    #[test]
    fn auto_resolve_missing_server_takes_local() {
        let c = conflict(Some(json!({"x": 1})), None, 1, 2);
        assert_eq!(auto_resolve(&c).strategy, ResolutionStrategy::LocalWins);
    }

    #[test]
    fn auto_resolve_without_conflicting_fields_is_local_wins() {
        let c = conflict(Some(json!({"id": "a", "x": 1})), Some(json!({"id": "b", "x": 1})), 1, 2);
        assert_eq!(auto_resolve(&c).strategy, ResolutionStrategy::LocalWins);

        let both_absent = conflict(None, None, 1, 2);
        assert_eq!(auto_resolve(&both_absent).strategy, ResolutionStrategy::LocalWins);
    }

    #[test]
    fn auto_resolve_temporal_fields_use_latest_wins() {
        let c = conflict(
            Some(json!({"updatedAt": 1, "dueDate": "a", "startTime": "x", "title": "same"})),
            Some(json!({"updatedAt": 2, "dueDate": "b", "startTime": "y", "title": "same"})),
            1,
            2,
        );
        assert_eq!(auto_resolve(&c).strategy, ResolutionStrategy::LatestWins);
    }

    #[test]
    fn auto_resolve_few_fields_merge_many_fields_latest() {
        let two = conflict(
            Some(json!({"a": 1, "b": 1, "c": 1})),
            Some(json!({"a": 2, "b": 2, "c": 1})),
            1,
            2,
        );
        assert_eq!(auto_resolve(&two).strategy, ResolutionStrategy::Merge);

        let three = conflict(
            Some(json!({"a": 1, "b": 1, "c": 1})),
            Some(json!({"a": 2, "b": 2, "c": 2})),
            1,
            2,
        );
        assert_eq!(auto_resolve(&three).strategy, ResolutionStrategy::LatestWins);
    }

    #[test]
    fn recommendation_thresholds() {
        let with_fields = |n: usize| {
            let local: Map<String, Value> = (0..n).map(|i| (format!("f{i}"), json!(1))).collect();
            let server: Map<String, Value> = (0..n).map(|i| (format!("f{i}"), json!(2))).collect();
            conflict(Some(Value::Object(local)), Some(Value::Object(server)), 1, 2)
        };

        assert_eq!(get_recommended_strategy(&with_fields(0)), ResolutionStrategy::LocalWins);
        assert_eq!(get_recommended_strategy(&with_fields(2)), ResolutionStrategy::Merge);
        assert_eq!(get_recommended_strategy(&with_fields(4)), ResolutionStrategy::Merge);
        assert_eq!(get_recommended_strategy(&with_fields(5)), ResolutionStrategy::Merge);
        assert_eq!(get_recommended_strategy(&with_fields(6)), ResolutionStrategy::LatestWins);

        // The two heuristics disagree in the 3..=5 range.
        assert_eq!(auto_resolve(&with_fields(4)).strategy, ResolutionStrategy::LatestWins);
    }

    #[test]
    fn unrecognized_strategy_falls_back_to_auto() {
        let c = conflict(None, Some(json!({"x": 1})), 1, 2);
        let strategy = ResolutionStrategy::parse_lenient("SOMETHING_ELSE");
        let resolved = resolve_conflict(&c, strategy).unwrap();
        assert_eq!(resolved.strategy, ResolutionStrategy::ServerWins);
    }

    #[test]
    fn batch_resolve_maps_each_conflict() {
        let conflicts = vec![
            conflict(Some(json!({"a": 1})), Some(json!({"a": 2})), 1, 2),
            conflict(Some(json!({"a": 3})), None, 1, 2),
        ];

        let results = batch_resolve(&conflicts, Some(ResolutionStrategy::LocalWins));
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().resolved_data, json!({"a": 1}));
        assert_eq!(results[1].as_ref().unwrap().resolved_data, json!({"a": 3}));

        let manual = batch_resolve(&conflicts, Some(ResolutionStrategy::Manual));
        assert!(manual.iter().all(|r| r.is_err()));
    }
}
