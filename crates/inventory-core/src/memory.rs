//! In-process lineage and sink, used for tests and for callers that already
//! hold a simulation's lineage in memory.

use std::collections::BTreeMap;
use std::convert::Infallible;

use contracts::lineage::{AgentId, ChildResource, OwnershipTransfer, ResourceId, RootResource, Time};
use contracts::OwnershipInterval;

use crate::{IntervalSink, LineageSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MemoryResource {
    created_at: Time,
    parents: [Option<ResourceId>; 2],
}

#[derive(Debug, Clone, Default)]
pub struct MemoryLineage {
    resources: BTreeMap<ResourceId, MemoryResource>,
    children: BTreeMap<ResourceId, Vec<ResourceId>>,
    creators: BTreeMap<ResourceId, AgentId>,
    transfers: BTreeMap<ResourceId, Vec<OwnershipTransfer>>,
}

impl MemoryLineage {
    /// Records a resource created directly by `creator`.
    pub fn create_root(&mut self, id: ResourceId, creator: AgentId, at: Time) -> &mut Self {
        self.insert_resource(id, at, [None, None]);
        self.creators.insert(id, creator);
        self
    }

    pub fn create_child(
        &mut self,
        id: ResourceId,
        at: Time,
        parent1: ResourceId,
        parent2: Option<ResourceId>,
    ) -> &mut Self {
        self.insert_resource(id, at, [Some(parent1), parent2]);
        self
    }

    /// Records a transfer of `id` to `receiver`. Transfers stay sorted by time;
    /// equal times keep insertion order.
    pub fn transfer(&mut self, id: ResourceId, receiver: AgentId, at: Time) -> &mut Self {
        let list = self.transfers.entry(id).or_default();
        let pos = list.partition_point(|existing| existing.time <= at);
        list.insert(
            pos,
            OwnershipTransfer {
                receiver,
                time: at,
            },
        );
        self
    }

    /// Creator-recorded resources ordered by creation time, then id.
    pub fn roots(&self) -> Vec<RootResource> {
        let mut roots: Vec<RootResource> = self
            .creators
            .iter()
            .filter_map(|(id, creator)| {
                self.resources.get(id).map(|resource| RootResource {
                    resource_id: *id,
                    creator: *creator,
                    created_at: resource.created_at,
                })
            })
            .collect();
        roots.sort_by_key(|root| (root.created_at, root.resource_id));
        roots
    }

    pub fn created_at(&self, id: ResourceId) -> Option<Time> {
        self.resources.get(&id).map(|resource| resource.created_at)
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = ResourceId> + '_ {
        self.resources.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    fn insert_resource(&mut self, id: ResourceId, at: Time, parents: [Option<ResourceId>; 2]) {
        if let Some(previous) = self.resources.get(&id).copied() {
            for parent in previous.parents.into_iter().flatten() {
                if let Some(kids) = self.children.get_mut(&parent) {
                    kids.retain(|kid| *kid != id);
                }
            }
        }

        for (slot, parent) in parents.into_iter().enumerate() {
            let Some(parent) = parent else {
                continue;
            };
            // Both slots naming the same parent is still a single edge.
            if slot == 1 && parents[0] == Some(parent) {
                continue;
            }
            self.children.entry(parent).or_default().push(id);
        }

        self.resources.insert(
            id,
            MemoryResource {
                created_at: at,
                parents,
            },
        );
    }
}

impl LineageSource for MemoryLineage {
    type Error = Infallible;

    fn children(&mut self, resource: ResourceId) -> Result<Vec<ChildResource>, Infallible> {
        let mut kids: Vec<ChildResource> = self
            .children
            .get(&resource)
            .into_iter()
            .flatten()
            .filter_map(|id| {
                self.resources.get(id).map(|child| ChildResource {
                    resource_id: *id,
                    created_at: child.created_at,
                })
            })
            .collect();
        kids.sort_by_key(|kid| (kid.created_at, kid.resource_id));
        Ok(kids)
    }

    fn transfers(&mut self, resource: ResourceId) -> Result<Vec<OwnershipTransfer>, Infallible> {
        Ok(self.transfers.get(&resource).cloned().unwrap_or_default())
    }
}

/// Collects intervals and remembers where flushes were requested.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    intervals: Vec<OwnershipInterval>,
    flush_marks: Vec<u64>,
}

impl MemorySink {
    pub fn intervals(&self) -> &[OwnershipInterval] {
        &self.intervals
    }

    pub fn flush_marks(&self) -> &[u64] {
        &self.flush_marks
    }

    pub fn into_intervals(self) -> Vec<OwnershipInterval> {
        self.intervals
    }
}

impl IntervalSink for MemorySink {
    type Error = Infallible;

    fn emit(&mut self, interval: OwnershipInterval) -> Result<(), Infallible> {
        self.intervals.push(interval);
        Ok(())
    }

    fn flush(&mut self, resources_done: u64) -> Result<(), Infallible> {
        self.flush_marks.push(resources_done);
        Ok(())
    }
}
