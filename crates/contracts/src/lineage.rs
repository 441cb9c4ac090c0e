//! Lineage-focused contract re-exports.

pub use crate::{
    AgentId, ChildResource, OwnershipTransfer, ResourceId, RootResource, Time, OPEN_END,
};
