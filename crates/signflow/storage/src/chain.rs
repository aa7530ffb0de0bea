//! Hash linking for the activity log.

use crate::{StorageError, StorageResult};
use signflow_types::{ActivityAppend, ActivityEvent};

/// blake3 over the canonical JSON of an event and its chain position.
pub fn compute_activity_hash(
    event: &ActivityAppend,
    previous_hash: Option<&str>,
    sequence: u64,
) -> StorageResult<String> {
    let serializable = serde_json::json!({
        "previous_hash": previous_hash,
        "sequence": sequence,
        "timestamp": event.timestamp,
        "actor": event.actor.as_ref().map(|id| id.as_str()),
        "action": event.action.as_str(),
        "document_id": event.document_id.map(|id| id.as_uuid().to_string()),
        "description": event.description,
        "success": event.success,
        "details": event.details,
    });
    let serialized =
        serde_json::to_vec(&serializable).map_err(|e| StorageError::Serialization(e.to_string()))?;
    Ok(blake3::hash(&serialized).to_hex().to_string())
}

/// Check that `events` (oldest first, starting at sequence 1) form an
/// unbroken chain.
pub fn verify_chain(events: &[ActivityEvent]) -> StorageResult<bool> {
    let mut previous: Option<&str> = None;
    for (index, event) in events.iter().enumerate() {
        if event.sequence != index as u64 + 1 || event.previous_hash.as_deref() != previous {
            return Ok(false);
        }
        let append = ActivityAppend {
            timestamp: event.timestamp,
            actor: event.actor.clone(),
            action: event.action,
            document_id: event.document_id,
            description: event.description.clone(),
            success: event.success,
            details: event.details.clone(),
        };
        if compute_activity_hash(&append, previous, event.sequence)? != event.hash {
            return Ok(false);
        }
        previous = Some(&event.hash);
    }
    Ok(true)
}
