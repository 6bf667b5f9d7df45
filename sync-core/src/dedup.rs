//! Replay ordering and deduplication planning for queued operations.
//!
//! Every queued operation carries a full snapshot, so only the latest
//! operation per entity matters for correctness. Collapsing the rest bounds
//! queue growth when the same entity is edited repeatedly while offline.
//! Intermediate states are discarded, not replayed.

use std::collections::BTreeMap;
use sync_types::QueuedOperation;

/// Sort operations into replay order: ascending timestamp, oldest first.
///
/// The sort is stable, so operations with equal timestamps keep their
/// relative order.
pub fn sort_for_replay(ops: &mut [QueuedOperation]) {
    ops.sort_by_key(|op| op.timestamp);
}

/// Ids of the operations a deduplication pass should delete.
///
/// Unsynced operations are grouped by `(entity_type, entity_id)`. In every
/// group with more than one member all but the latest operation are returned.
/// When timestamps tie, the operation listed last wins. Synced operations are
/// ignored.
pub fn plan_deduplication(ops: &[QueuedOperation]) -> Vec<String> {
    let mut groups: BTreeMap<(&str, &str), Vec<&QueuedOperation>> = BTreeMap::new();
    for op in ops.iter().filter(|op| !op.synced) {
        groups.entry(op.entity_key()).or_default().push(op);
    }

    let mut redundant = Vec::new();
    for (_, mut group) in groups {
        if group.len() < 2 {
            continue;
        }
        group.sort_by_key(|op| op.timestamp);
        group.pop();
        redundant.extend(group.into_iter().map(|op| op.id.clone()));
    }
    redundant
}
