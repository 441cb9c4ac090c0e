//! Storage-agnostic reconstruction of resource ownership intervals.
//!
//! The walker reads lineage (children and ownership transfers) through
//! [`LineageSource`] and hands every produced interval to an
//! [`IntervalSink`]. The SQLite implementations of both live in
//! `inventory-store`; [`memory`] provides in-process ones.

pub mod interval;
pub mod memory;
pub mod walker;

use contracts::lineage::{ChildResource, OwnershipTransfer, ResourceId};
use contracts::OwnershipInterval;

pub use interval::{effective_transfers, resolve_node, NodeEntry, Resolution};
pub use memory::{MemoryLineage, MemorySink};
pub use walker::InventoryWalker;

/// Read side of a lineage walk, scoped to a single simulation.
pub trait LineageSource {
    type Error;

    /// Resources with `resource` in either parent slot, ordered by creation
    /// time and then id.
    fn children(&mut self, resource: ResourceId) -> Result<Vec<ChildResource>, Self::Error>;

    /// Ownership changes recorded for `resource`, ascending by time.
    fn transfers(&mut self, resource: ResourceId)
        -> Result<Vec<OwnershipTransfer>, Self::Error>;
}

/// Write side of a lineage walk.
pub trait IntervalSink {
    type Error;

    fn emit(&mut self, interval: OwnershipInterval) -> Result<(), Self::Error>;

    /// Called every `flush_every` visited resources. `resources_done` is the
    /// walk's running resource count.
    fn flush(&mut self, resources_done: u64) -> Result<(), Self::Error>;
}
