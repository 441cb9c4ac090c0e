//! DDL run before and after the inventory walks.

use rusqlite::Connection;
use tracing::{info, warn};

use crate::error::{Result, StoreError};

pub const OUTPUT_TABLE: &str = "Inventories";

const OUTPUT_TABLE_DDL: &str = "
    DROP TABLE IF EXISTS Inventories;
    CREATE TABLE Inventories (
        SimID TEXT,
        ResID INTEGER,
        AgentID INTEGER,
        StartTime INTEGER,
        EndTime INTEGER
    );
";

/// Read-path indices on the source tables. Some tables are absent from older
/// databases, so each one is optional.
const SOURCE_INDICES: &[(&str, &[&str])] = &[
    ("Resources", &["SimID", "ID"]),
    ("Resources", &["Parent1"]),
    ("Resources", &["Parent2"]),
    ("Resources", &["StateID"]),
    ("Compositions", &["ID"]),
    ("Compositions", &["IsoID"]),
    ("Transactions", &["ID"]),
    ("Transactions", &["Time"]),
    ("Transactions", &["ReceiverID"]),
    ("TransactedResources", &["TransactionID"]),
    ("TransactedResources", &["ResourceID"]),
    ("ResCreators", &["SimID", "ResID"]),
    ("Agents", &["Prototype"]),
    ("Agents", &["ID"]),
];

const OUTPUT_INDICES: &[(&str, &[&str])] = &[
    (OUTPUT_TABLE, &["SimID", "AgentID"]),
    (OUTPUT_TABLE, &["SimID", "StartTime"]),
    (OUTPUT_TABLE, &["SimID", "EndTime"]),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedIndex {
    pub statement: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareReport {
    pub created: Vec<String>,
    pub skipped: Vec<SkippedIndex>,
}

/// `CREATE INDEX IF NOT EXISTS <table>_<col>_... ON <table> (<cols>)`.
pub fn index_sql(table: &str, columns: &[&str]) -> String {
    format!(
        "CREATE INDEX IF NOT EXISTS {table}_{} ON {table} ({})",
        columns.join("_"),
        columns.join(", ")
    )
}

/// Recreates the output table and indexes the source tables.
///
/// Replacing the output table is fatal on failure. A failing source index is
/// logged, recorded in the report, and skipped.
pub fn prepare(conn: &Connection) -> Result<PrepareReport> {
    info!("creating inventory table and source indices");
    conn.execute_batch(OUTPUT_TABLE_DDL)?;

    let mut report = PrepareReport::default();
    for (table, columns) in SOURCE_INDICES {
        let statement = index_sql(table, columns);
        match conn.execute_batch(&statement) {
            Ok(()) => report.created.push(statement),
            Err(err) => {
                warn!(%statement, error = %err, "skipping source index");
                report.skipped.push(SkippedIndex {
                    statement,
                    reason: err.to_string(),
                });
            }
        }
    }
    Ok(report)
}

/// Indexes the output table once every simulation has been walked.
pub fn finish(conn: &Connection) -> Result<()> {
    info!("creating inventory indices");
    for (table, columns) in OUTPUT_INDICES {
        conn.execute_batch(&index_sql(table, columns))
            .map_err(StoreError::Finish)?;
    }
    Ok(())
}
