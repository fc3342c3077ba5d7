//! # Two-Pass Replay
//!
//! Pure reconstruction of the latest `TransactionArchive` per global id from
//! a record stream.
//!
//! - Pass 1: the latest operator per global id decides whether it survives.
//! - Pass 2: surviving payloads are folded into their transaction archive.
//!   Resource payloads replace the branch with the same xid, never duplicate it.

use std::collections::{HashMap, HashSet};

use shared_types::{GlobalId, ResourceArchive, TransactionArchive};

use super::errors::SerializationError;
use super::record::{ArchivePayload, JournalOperator, JournalRecord};

/// Global ids whose latest record is a DELETE.
pub fn deleted_ids<'a>(records: impl IntoIterator<Item = &'a JournalRecord>) -> HashSet<GlobalId> {
    let mut latest: HashMap<GlobalId, bool> = HashMap::new();
    for record in records {
        latest.insert(record.global_id, record.operator == JournalOperator::Delete);
    }
    latest
        .into_iter()
        .filter_map(|(id, deleted)| deleted.then_some(id))
        .collect()
}

/// Rebuild the surviving archives in order of first appearance.
pub fn replay_records<F>(
    records: &[JournalRecord],
    mut decode: F,
) -> Result<Vec<TransactionArchive>, SerializationError>
where
    F: FnMut(&[u8]) -> Result<ArchivePayload, SerializationError>,
{
    let deleted = deleted_ids(records);

    let mut order: Vec<GlobalId> = Vec::new();
    let mut archives: HashMap<GlobalId, TransactionArchive> = HashMap::new();
    let mut orphans: HashMap<GlobalId, Vec<ResourceArchive>> = HashMap::new();

    for record in records {
        if deleted.contains(&record.global_id) || record.operator == JournalOperator::Delete {
            continue;
        }

        match decode(&record.payload)? {
            ArchivePayload::Transaction(archive) => {
                let id = record.global_id;
                if !archives.contains_key(&id) {
                    order.push(id);
                }
                let mut archive = archive;
                for resource in orphans.remove(&id).into_iter().flatten() {
                    if !archive.resources().any(|r| r.xid == resource.xid) {
                        archive.upsert_resource(resource);
                    }
                }
                archives.insert(id, archive);
            }
            ArchivePayload::Resource(resource) => match archives.get_mut(&record.global_id) {
                Some(parent) => {
                    parent.upsert_resource(resource);
                }
                None => orphans.entry(record.global_id).or_default().push(resource),
            },
        }
    }

    Ok(order
        .into_iter()
        .filter_map(|id| archives.remove(&id))
        .collect())
}
