//! Cross-boundary contracts shared by the walker, the SQLite store, and the CLI.

pub mod lineage;

use std::fmt;

use serde::{Deserialize, Serialize};

pub type ResourceId = i64;
pub type AgentId = i64;
pub type Time = i64;

/// End time of an interval that is still open at the end of observation.
///
/// Downstream readers of `Inventories` compare against this literal value, so
/// it stays the largest 32-bit signed integer even though times are `i64`.
pub const OPEN_END: Time = i32::MAX as Time;

pub const DEFAULT_FLUSH_EVERY: u64 = 100_000;
pub const DEFAULT_HISTORY_CAPACITY: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimId(String);

impl SimId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Table-name-safe rendering: anything outside `[A-Za-z0-9_]` becomes `_`.
    pub fn sanitized(&self) -> String {
        self.0
            .chars()
            .map(|ch| if ch.is_ascii_alphanumeric() { ch } else { '_' })
            .collect()
    }
}

impl fmt::Display for SimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SimId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// A resource created directly by an agent, with no parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootResource {
    pub resource_id: ResourceId,
    pub creator: AgentId,
    pub created_at: Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChildResource {
    pub resource_id: ResourceId,
    pub created_at: Time,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnershipTransfer {
    pub receiver: AgentId,
    pub time: Time,
}

/// Half-open `[start_time, end_time)` span during which `agent_id` held
/// `resource_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct OwnershipInterval {
    pub resource_id: ResourceId,
    pub agent_id: AgentId,
    pub start_time: Time,
    pub end_time: Time,
}

impl OwnershipInterval {
    pub fn is_open(&self) -> bool {
        self.end_time == OPEN_END
    }
}

impl fmt::Display for OwnershipInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let end = if self.is_open() {
            "open".to_string()
        } else {
            self.end_time.to_string()
        };
        write!(
            f,
            "res={} agent={} [{}, {})",
            self.resource_id, self.agent_id, self.start_time, end
        )
    }
}

/// One row of the `Inventories` output table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryRow {
    pub sim_id: SimId,
    #[serde(flatten)]
    pub interval: OwnershipInterval,
}

impl InventoryRow {
    /// Renders the row as a standalone `INSERT` statement, the form handed to
    /// history observers.
    pub fn to_insert_sql(&self) -> String {
        format!(
            "INSERT INTO Inventories VALUES('{}',{},{},{},{});",
            self.sim_id.as_str().replace('\'', "''"),
            self.interval.resource_id,
            self.interval.agent_id,
            self.interval.start_time,
            self.interval.end_time
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Number of visited resources between two buffer flushes.
    pub flush_every: u64,
    /// Bound of the history observer channel.
    pub history_capacity: usize,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            flush_every: DEFAULT_FLUSH_EVERY,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalkStats {
    pub roots: u64,
    pub resources: u64,
    pub intervals: u64,
    pub flushes: u64,
}

impl fmt::Display for WalkStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "roots={} resources={} intervals={} flushes={}",
            self.roots, self.resources, self.intervals, self.flushes
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationReport {
    pub sim_id: SimId,
    pub stats: WalkStats,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunReport {
    pub skipped_indices: Vec<String>,
    pub simulations: Vec<SimulationReport>,
}

impl RunReport {
    pub fn total_intervals(&self) -> u64 {
        self.simulations
            .iter()
            .map(|report| report.stats.intervals)
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_end_is_max_i32() {
        assert_eq!(OPEN_END, 2_147_483_647);
    }

    #[test]
    fn sanitized_sim_id_is_table_safe() {
        let sim = SimId::new("4e3f-9a'b c");
        assert_eq!(sim.sanitized(), "4e3f_9a_b_c");
    }

    #[test]
    fn insert_sql_escapes_quotes() {
        let row = InventoryRow {
            sim_id: SimId::new("it's"),
            interval: OwnershipInterval {
                resource_id: 1,
                agent_id: 7,
                start_time: 0,
                end_time: OPEN_END,
            },
        };

        assert_eq!(
            row.to_insert_sql(),
            "INSERT INTO Inventories VALUES('it''s',1,7,0,2147483647);"
        );
    }

    #[test]
    fn walk_config_round_trips_through_json() {
        let config = WalkConfig {
            flush_every: 10,
            history_capacity: 4,
        };
        let encoded = serde_json::to_string(&config).expect("serialize");
        let decoded: WalkConfig = serde_json::from_str(&encoded).expect("deserialize");
        assert_eq!(config, decoded);
    }

    #[test]
    fn run_report_sums_intervals() {
        let mut report = RunReport::default();
        for (sim, intervals) in [("a", 3), ("b", 4)] {
            report.simulations.push(SimulationReport {
                sim_id: SimId::new(sim),
                stats: WalkStats {
                    intervals,
                    ..WalkStats::default()
                },
                elapsed_ms: 0,
            });
        }
        assert_eq!(report.total_intervals(), 7);
    }
}
