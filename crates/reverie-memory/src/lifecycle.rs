// SPDX-FileCopyrightText: 2026 Reverie Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chronological chain maintenance for ingestion and deletion.
//!
//! Every memory of a collection sits on one `previous_memory_id` /
//! `next_memory_id` chain ordered by timestamp. The links are lookups only:
//! nothing is owned through them.

use std::collections::{BTreeSet, HashSet};

use crate::manager::CollectionIndex;
use crate::types::Memory;

/// Outcome of [`unlink_and_remove`].
#[derive(Debug, Default)]
pub struct Removal {
    /// Ids that were present and removed.
    pub removed: Vec<String>,
    /// Surviving neighbors whose links changed, in their updated form.
    pub touched: Vec<Memory>,
}

/// Link a batch of new memories to each other and to the current chain tail.
///
/// Must be called before the batch is inserted. The old tail's
/// `next_memory_id` is updated in place and its id is returned. The next
/// snapshot persists the change along with the batch.
pub fn chain_onto(state: &mut CollectionIndex, batch: &mut [Memory]) -> Option<String> {
    let tail = state.latest().map(|m| m.id.clone());

    let mut previous = tail.clone();
    for i in 0..batch.len() {
        batch[i].previous_memory_id = previous.clone();
        batch[i].next_memory_id = batch.get(i + 1).map(|m| m.id.clone());
        previous = Some(batch[i].id.clone());
    }

    let first = batch.first().map(|m| m.id.clone())?;
    let tail = tail?;
    let record = state.get_mut(&tail)?;
    record.memory.next_memory_id = Some(first);
    Some(tail)
}

/// Remove `ids` from the metadata and relink the chain around them.
///
/// Each removed run is bridged: the nearest surviving predecessor points to
/// the nearest surviving successor and back. For a single contiguous run this
/// is the head/tail relink; scattered ids are handled run by run. Unknown ids
/// are ignored. Vectors stay in the index as dead entries.
pub fn unlink_and_remove(state: &mut CollectionIndex, ids: &[String]) -> Removal {
    let doomed: HashSet<&str> = ids
        .iter()
        .map(String::as_str)
        .filter(|id| state.get(id).is_some())
        .collect();
    if doomed.is_empty() {
        return Removal::default();
    }

    let mut bridges = BTreeSet::new();
    for id in &doomed {
        let before = nearest_survivor(state, &doomed, id, Direction::Previous);
        let after = nearest_survivor(state, &doomed, id, Direction::Next);
        bridges.insert((before, after));
    }

    let mut touched_ids = BTreeSet::new();
    for (before, after) in bridges {
        if let Some(prev) = before.as_deref() {
            if let Some(record) = state.get_mut(prev) {
                record.memory.next_memory_id = after.clone();
                touched_ids.insert(prev.to_string());
            }
        }
        if let Some(next) = after.as_deref() {
            if let Some(record) = state.get_mut(next) {
                record.memory.previous_memory_id = before.clone();
                touched_ids.insert(next.to_string());
            }
        }
    }

    let mut removed: Vec<String> = doomed.iter().map(|id| id.to_string()).collect();
    removed.sort();
    for id in &removed {
        state.remove(id);
    }

    let touched = touched_ids
        .iter()
        .filter_map(|id| state.get(id).map(|r| r.memory.clone()))
        .collect();
    Removal { removed, touched }
}

#[derive(Clone, Copy)]
enum Direction {
    Previous,
    Next,
}

/// Follow links from `start` past doomed memories to the first id outside the set.
fn nearest_survivor(
    state: &CollectionIndex,
    doomed: &HashSet<&str>,
    start: &str,
    direction: Direction,
) -> Option<String> {
    let mut current = start.to_string();
    // Malformed links can form a cycle through the doomed set.
    for _ in 0..=doomed.len() {
        let memory = &state.get(&current)?.memory;
        let link = match direction {
            Direction::Previous => memory.previous_memory_id.as_ref(),
            Direction::Next => memory.next_memory_id.as_ref(),
        }?;
        if !doomed.contains(link.as_str()) {
            return Some(link.clone());
        }
        current = link.clone();
    }
    None
}
