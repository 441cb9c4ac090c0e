use std::collections::HashSet;

use contracts::{ResourceId, RootResource, WalkConfig, WalkStats};
use tracing::debug;

use crate::interval::{resolve_node, NodeEntry};
use crate::{IntervalSink, LineageSource};

/// Depth-first lineage walk over one simulation.
///
/// Traversal uses an explicit worklist instead of recursion, so lineage depth
/// is bounded only by memory. Each resource is resolved at most once: the
/// first path that reaches a merged resource decides its owner and start time,
/// later paths are no-ops. The same check stops malformed cyclic lineage.
#[derive(Debug)]
pub struct InventoryWalker {
    flush_every: u64,
    visited: HashSet<ResourceId>,
    worklist: Vec<NodeEntry>,
    stats: WalkStats,
}

impl InventoryWalker {
    pub fn new(config: &WalkConfig) -> Self {
        Self {
            flush_every: config.flush_every,
            visited: HashSet::new(),
            worklist: Vec::new(),
            stats: WalkStats::default(),
        }
    }

    pub fn is_visited(&self, resource: ResourceId) -> bool {
        self.visited.contains(&resource)
    }

    pub fn stats(&self) -> WalkStats {
        self.stats
    }

    /// Walks every root and its descendants, emitting intervals into `sink`.
    ///
    /// The first source or sink error stops the walk and is returned as is;
    /// whatever the sink already accepted stays accepted.
    pub fn walk<L, S, E>(
        &mut self,
        roots: &[RootResource],
        source: &mut L,
        sink: &mut S,
    ) -> Result<WalkStats, E>
    where
        L: LineageSource<Error = E>,
        S: IntervalSink<Error = E>,
    {
        for (idx, root) in roots.iter().enumerate() {
            debug!(root = idx, resource_id = root.resource_id, "processing root");
            self.stats.roots += 1;
            self.worklist.push(NodeEntry {
                resource_id: root.resource_id,
                owner: root.creator,
                start_time: root.created_at,
            });
            self.drain(source, sink)?;
        }
        Ok(self.stats)
    }

    fn drain<L, S, E>(&mut self, source: &mut L, sink: &mut S) -> Result<(), E>
    where
        L: LineageSource<Error = E>,
        S: IntervalSink<Error = E>,
    {
        while let Some(entry) = self.worklist.pop() {
            if !self.visited.insert(entry.resource_id) {
                continue;
            }

            self.stats.resources += 1;
            if self.flush_every > 0 && self.stats.resources % self.flush_every == 0 {
                sink.flush(self.stats.resources)?;
            }

            let children = source.children(entry.resource_id)?;
            let transfers = source.transfers(entry.resource_id)?;
            let earliest_child = children.iter().map(|child| child.created_at).min();

            let resolution = resolve_node(entry, earliest_child, &transfers);
            for interval in resolution.intervals {
                sink.emit(interval)?;
                self.stats.intervals += 1;
            }

            // Reverse push keeps pre-order: the first child is fully explored
            // before its next sibling.
            for child in children.iter().rev() {
                if self.visited.contains(&child.resource_id) {
                    continue;
                }
                self.worklist.push(NodeEntry {
                    resource_id: child.resource_id,
                    owner: resolution.child_owner,
                    start_time: child.created_at,
                });
            }
        }
        Ok(())
    }
}
