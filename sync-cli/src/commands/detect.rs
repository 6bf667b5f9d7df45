//! Compare two snapshots offline, without touching the store.

use anyhow::Result;
use sync_core::{
    auto_resolve, calculate_conflict_severity, can_auto_resolve, detect_conflict,
    get_conflict_type, get_conflicting_fields, get_recommended_strategy,
};
use sync_types::{
    ConflictRecord, ConflictType, OperationKind, Payload, ResolutionStrategy, TimestampMillis,
};

/// Outcome of comparing two snapshots.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    /// Whether the snapshots conflict at all.
    pub conflict: bool,
    /// Classification from the sides' existence and the local operation.
    pub conflict_type: ConflictType,
    /// Fields that differ, metadata excluded.
    pub fields: Vec<String>,
    /// Share of fields that differ.
    pub severity: f64,
    /// Whether the engine would resolve it on its own.
    pub auto_resolvable: bool,
    /// Strategy `auto_resolve` would pick.
    pub auto_strategy: ResolutionStrategy,
    /// Strategy suggested to a user.
    pub recommended: ResolutionStrategy,
    /// Payload `auto_resolve` would produce.
    pub preview: Payload,
}

/// Compare `local` against `server`.
pub fn analyze(
    local: &Payload,
    server: &Payload,
    local_timestamp: TimestampMillis,
    server_timestamp: TimestampMillis,
    local_op: OperationKind,
) -> Detection {
    let conflict_type = get_conflict_type(!local.is_null(), !server.is_null(), local_op, None);
    let record = ConflictRecord {
        id: "cli".into(),
        user_id: String::new(),
        entity_type: String::new(),
        entity_id: String::new(),
        local_version: (!local.is_null()).then(|| local.clone()),
        server_version: (!server.is_null()).then(|| server.clone()),
        local_timestamp,
        server_timestamp,
        detected_at: 0,
        resolved: false,
    };
    let auto = auto_resolve(&record);

    Detection {
        conflict: detect_conflict(local, server, local_timestamp, server_timestamp),
        conflict_type,
        fields: get_conflicting_fields(local, server).into_iter().collect(),
        severity: calculate_conflict_severity(local, server),
        auto_resolvable: can_auto_resolve(local, server, conflict_type),
        auto_strategy: auto.strategy,
        recommended: get_recommended_strategy(&record),
        preview: auto.resolved_data,
    }
}

/// Run the detect command.
pub fn run(
    local: &Payload,
    server: &Payload,
    local_timestamp: TimestampMillis,
    server_timestamp: TimestampMillis,
    local_op: OperationKind,
) -> Result<Detection> {
    let detection = analyze(local, server, local_timestamp, server_timestamp, local_op);

    if !detection.conflict {
        println!("No conflict.");
        return Ok(detection);
    }

    println!("Conflict: {:?}", detection.conflict_type);
    println!("  Fields:          {}", detection.fields.join(", "));
    println!("  Severity:        {:.2}", detection.severity);
    println!("  Auto-resolvable: {}", detection.auto_resolvable);
    println!("  Auto strategy:   {}", detection.auto_strategy);
    println!("  Recommended:     {}", detection.recommended);
    println!("  Preview:");
    println!("{}", serde_json::to_string_pretty(&detection.preview)?);
    Ok(detection)
}
