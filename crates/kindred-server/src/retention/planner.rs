//! Packs expired records into batches that never exceed the batch limit.
//!
//! Flat collections: each record costs one delete, plus one counter update
//! the first time its user appears in the batch. Updates for the same user
//! are aggregated into a single `-n`.
//!
//! Parent/children collections: a parent and its children form a unit of
//! `children + 1` deletes, children first. Units are packed greedily. A unit
//! larger than the limit becomes a [`FamilyPlan::Sequence`] whose last batch
//! carries the parent delete.

use std::collections::BTreeMap;

use kindred_core::DocumentPath;

/// A record to delete, with the user whose counter it contributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlatRecord {
    pub path: DocumentPath,
    pub compensate: Option<String>,
}

/// Deletes plus aggregated decrements for one atomic batch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FlatChunk {
    pub deletes: Vec<DocumentPath>,
    /// user id -> number of deleted records that counted toward them
    pub decrements: BTreeMap<String, i64>,
}

impl FlatChunk {
    pub fn op_count(&self) -> usize {
        self.deletes.len() + self.decrements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.deletes.is_empty()
    }

    fn cost_of(&self, record: &FlatRecord) -> usize {
        match &record.compensate {
            Some(user) if !self.decrements.contains_key(user) => 2,
            _ => 1,
        }
    }

    fn push(&mut self, record: FlatRecord) {
        self.deletes.push(record.path);
        if let Some(user) = record.compensate {
            *self.decrements.entry(user).or_insert(0) += 1;
        }
    }
}

/// Greedy packing of flat records. `limit` must be at least 2.
pub fn plan_flat(records: impl IntoIterator<Item = FlatRecord>, limit: usize) -> Vec<FlatChunk> {
    debug_assert!(limit >= 2);
    let mut chunks = Vec::new();
    let mut current = FlatChunk::default();

    for record in records {
        if current.op_count() + current.cost_of(&record) > limit {
            chunks.push(std::mem::take(&mut current));
        }
        current.push(record);
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// A parent document and the children that must go before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FamilyUnit {
    pub parent: DocumentPath,
    pub children: Vec<DocumentPath>,
}

impl FamilyUnit {
    pub fn op_count(&self) -> usize {
        self.children.len() + 1
    }
}

/// One batch of whole units: every unit's children, then its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FamilyBatch {
    pub deletes: Vec<DocumentPath>,
    pub parents: Vec<DocumentPath>,
}

impl FamilyBatch {
    fn push(&mut self, unit: FamilyUnit) {
        self.deletes.extend(unit.children);
        self.deletes.push(unit.parent.clone());
        self.parents.push(unit.parent);
    }

    pub fn children_count(&self) -> usize {
        self.deletes.len() - self.parents.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FamilyPlan {
    Packed(FamilyBatch),
    /// Batches for one oversized unit. The parent delete is in the last
    /// batch, which must only be committed after every earlier one.
    Sequence {
        parent: DocumentPath,
        batches: Vec<Vec<DocumentPath>>,
    },
}

pub fn plan_families(units: impl IntoIterator<Item = FamilyUnit>, limit: usize) -> Vec<FamilyPlan> {
    debug_assert!(limit >= 1);
    let mut plans = Vec::new();
    let mut current = FamilyBatch::default();

    for unit in units {
        let size = unit.op_count();
        if size > limit {
            if !current.deletes.is_empty() {
                plans.push(FamilyPlan::Packed(std::mem::take(&mut current)));
            }
            plans.push(sequence(unit, limit));
            continue;
        }
        if current.deletes.len() + size > limit {
            plans.push(FamilyPlan::Packed(std::mem::take(&mut current)));
        }
        current.push(unit);
    }
    if !current.deletes.is_empty() {
        plans.push(FamilyPlan::Packed(current));
    }
    plans
}

fn sequence(unit: FamilyUnit, limit: usize) -> FamilyPlan {
    let mut batches: Vec<Vec<DocumentPath>> = unit
        .children
        .chunks(limit)
        .map(<[DocumentPath]>::to_vec)
        .collect();
    match batches.last_mut() {
        Some(last) if last.len() < limit => last.push(unit.parent.clone()),
        _ => batches.push(vec![unit.parent.clone()]),
    }
    FamilyPlan::Sequence {
        parent: unit.parent,
        batches,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(collection: &str, id: impl ToString) -> DocumentPath {
        DocumentPath::new(collection, id.to_string()).unwrap()
    }

    fn record(i: usize, user: Option<&str>) -> FlatRecord {
        FlatRecord {
            path: path("friendships", i),
            compensate: user.map(str::to_string),
        }
    }

    fn unit(id: &str, children: usize) -> FamilyUnit {
        let parent = path("chat_batches", id);
        let child_collection = parent.child_collection("messages");
        FamilyUnit {
            children: (0..children).map(|i| path(&child_collection, i)).collect(),
            parent,
        }
    }

    #[test]
    fn test_flat_chunks_respect_limit() {
        let records = (0..1200).map(|i| record(i, None));
        let chunks = plan_flat(records, 500);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.op_count() <= 500));
        assert_eq!(chunks[2].deletes.len(), 200);
    }

    #[test]
    fn test_flat_decrements_are_aggregated() {
        let records = (0..6).map(|i| record(i, Some(if i % 2 == 0 { "Y" } else { "Z" })));
        let chunks = plan_flat(records, 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].decrements.get("Y"), Some(&3));
        assert_eq!(chunks[0].decrements.get("Z"), Some(&3));
        assert_eq!(chunks[0].op_count(), 8);
    }

    #[test]
    fn test_flat_distinct_users_cost_two_ops() {
        let users: Vec<String> = (0..10).map(|i| format!("u{i}")).collect();
        let records = (0..10).map(|i| record(i, Some(users[i].as_str())));
        let chunks = plan_flat(records, 5);
        // 2 ops per record, so 2 records per batch of 5
        assert_eq!(chunks.len(), 5);
        assert!(chunks.iter().all(|c| c.op_count() <= 5));
    }

    #[test]
    fn test_small_families_are_packed() {
        let plans = plan_families([unit("a", 2), unit("b", 3), unit("c", 1)], 8);
        assert_eq!(plans.len(), 2);
        let FamilyPlan::Packed(first) = &plans[0] else {
            panic!("expected packed batch");
        };
        assert_eq!(first.deletes.len(), 7);
        assert_eq!(first.parents.len(), 2);
        // children before their parent
        assert_eq!(first.deletes[2], path("chat_batches", "a"));
        assert_eq!(first.deletes[6], path("chat_batches", "b"));
    }

    #[test]
    fn test_oversized_family_gets_a_sequence() {
        let plans = plan_families([unit("a", 1), unit("big", 10), unit("c", 0)], 4);
        assert_eq!(plans.len(), 3);
        let FamilyPlan::Sequence { parent, batches } = &plans[1] else {
            panic!("expected sequence");
        };
        assert_eq!(parent, &path("chat_batches", "big"));
        assert_eq!(batches.len(), 3);
        assert!(batches.iter().all(|b| b.len() <= 4));
        assert_eq!(batches[2].last(), Some(parent));
    }

    #[test]
    fn test_parent_gets_own_batch_when_last_is_full() {
        let plans = plan_families([unit("big", 8)], 4);
        let FamilyPlan::Sequence { batches, .. } = &plans[0] else {
            panic!("expected sequence");
        };
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2], vec![path("chat_batches", "big")]);
    }
}
