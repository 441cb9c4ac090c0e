use contracts::lineage::{AgentId, OwnershipTransfer, ResourceId, Time, OPEN_END};
use contracts::OwnershipInterval;

/// A resource as it is entered by the walk: who held it on arrival and from
/// when.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeEntry {
    pub resource_id: ResourceId,
    pub owner: AgentId,
    pub start_time: Time,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Transfer-derived intervals first, the leading interval last.
    pub intervals: Vec<OwnershipInterval>,
    /// Holder handed down to every child of the node.
    pub child_owner: AgentId,
}

/// Drops transfers that hand the resource to whoever already holds it at that
/// point of the sequence.
pub fn effective_transfers(
    owner: AgentId,
    transfers: &[OwnershipTransfer],
) -> Vec<OwnershipTransfer> {
    let mut holder = owner;
    let mut kept = Vec::with_capacity(transfers.len());
    for transfer in transfers {
        if transfer.receiver == holder {
            continue;
        }
        holder = transfer.receiver;
        kept.push(*transfer);
    }
    kept
}

/// Splits one node's lifetime into ownership intervals.
///
/// A transfer boundary wins over a child-creation boundary, including when
/// both fall on the same time value: the leading interval always ends at the
/// first effective transfer when there is one.
pub fn resolve_node(
    entry: NodeEntry,
    earliest_child: Option<Time>,
    transfers: &[OwnershipTransfer],
) -> Resolution {
    let tail_end = earliest_child.unwrap_or(OPEN_END);
    let kept = effective_transfers(entry.owner, transfers);

    let Some(first) = kept.first() else {
        return Resolution {
            intervals: vec![OwnershipInterval {
                resource_id: entry.resource_id,
                agent_id: entry.owner,
                start_time: entry.start_time,
                end_time: tail_end,
            }],
            child_owner: entry.owner,
        };
    };

    let mut intervals = Vec::with_capacity(kept.len() + 1);
    for (idx, transfer) in kept.iter().enumerate() {
        let end_time = kept.get(idx + 1).map_or(tail_end, |next| next.time);
        intervals.push(OwnershipInterval {
            resource_id: entry.resource_id,
            agent_id: transfer.receiver,
            start_time: transfer.time,
            end_time,
        });
    }
    intervals.push(OwnershipInterval {
        resource_id: entry.resource_id,
        agent_id: entry.owner,
        start_time: entry.start_time,
        end_time: first.time,
    });

    let child_owner = kept.last().map_or(entry.owner, |last| last.receiver);
    Resolution {
        intervals,
        child_owner,
    }
}
