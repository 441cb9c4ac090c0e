//! Read side of a walk: simulation listing, root discovery, the per-simulation
//! scratch lineage table, and a [`LineageSource`] backed by them.

use contracts::{ChildResource, OwnershipTransfer, ResourceId, RootResource, SimId};
use inventory_core::LineageSource;
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::schema::index_sql;

const SIMULATIONS_SQL: &str = "SELECT DISTINCT SimID FROM Resources ORDER BY SimID";

const ROOT_COUNT_SQL: &str = "SELECT COUNT(*) FROM ResCreators WHERE SimID = ?1";

const ROOTS_SQL: &str = "SELECT res.ID, res.TimeCreated, rc.ModelID
     FROM Resources AS res
     INNER JOIN ResCreators AS rc ON res.ID = rc.ResID
     WHERE res.SimID = ?1 AND rc.SimID = ?1
     ORDER BY res.TimeCreated ASC, res.ID ASC";

const TRANSFERS_SQL: &str = "SELECT tr.ReceiverID, tr.Time
     FROM Transactions AS tr
     INNER JOIN TransactedResources AS trr ON tr.ID = trr.TransactionID
     WHERE trr.ResourceID = ?1 AND tr.SimID = ?2 AND trr.SimID = ?2
     ORDER BY tr.Time ASC, tr.ID ASC";

pub fn list_simulations(conn: &Connection) -> Result<Vec<SimId>> {
    let mut stmt = conn.prepare(SIMULATIONS_SQL)?;
    let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;

    let mut sims = Vec::new();
    for row in rows {
        sims.push(SimId::new(row?));
    }
    Ok(sims)
}

/// Resources created directly by an agent, ordered by creation time then id.
pub fn load_roots(conn: &Connection, sim_id: &SimId) -> Result<Vec<RootResource>> {
    let expected: i64 = conn.query_row(ROOT_COUNT_SQL, [sim_id.as_str()], |row| row.get(0))?;

    let mut roots = Vec::with_capacity(usize::try_from(expected).unwrap_or(0));
    let mut stmt = conn.prepare(ROOTS_SQL)?;
    let rows = stmt.query_map([sim_id.as_str()], |row| {
        Ok(RootResource {
            resource_id: row.get(0)?,
            created_at: row.get(1)?,
            creator: row.get(2)?,
        })
    })?;
    for row in rows {
        roots.push(row?);
    }
    Ok(roots)
}

/// Lineage rows of one simulation copied into their own indexed table.
///
/// The table is left in place if a walk fails; [`ScratchTable::create`]
/// replaces any leftover of the same name.
#[derive(Debug)]
pub struct ScratchTable {
    name: String,
}

impl ScratchTable {
    pub fn name_for(sim_id: &SimId) -> String {
        format!("tmp_restbl_{}", sim_id.sanitized())
    }

    pub fn create(conn: &Connection, sim_id: &SimId) -> Result<Self> {
        let name = Self::name_for(sim_id);
        debug!(table = %name, "creating scratch resource table");

        conn.execute_batch(&format!("DROP TABLE IF EXISTS {name}"))?;
        conn.execute(
            &format!(
                "CREATE TABLE {name} AS
                 SELECT ID, TimeCreated, Parent1, Parent2 FROM Resources WHERE SimID = ?1"
            ),
            [sim_id.as_str()],
        )?;
        conn.execute_batch(&index_sql(&name, &["Parent1"]))?;
        conn.execute_batch(&index_sql(&name, &["Parent2"]))?;

        Ok(Self { name })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn children_sql(&self) -> String {
        format!(
            "SELECT ID, TimeCreated FROM {} WHERE Parent1 = ?1 OR Parent2 = ?1
             ORDER BY TimeCreated ASC, ID ASC",
            self.name
        )
    }

    pub fn discard(self, conn: &Connection) -> Result<()> {
        debug!(table = %self.name, "dropping scratch resource table");
        // Cached statements still reference the table.
        conn.flush_prepared_statement_cache();
        conn.execute_batch(&format!("DROP TABLE {}", self.name))?;
        Ok(())
    }
}

/// [`LineageSource`] over a scratch table and the transaction tables.
#[derive(Debug)]
pub struct SqliteLineage<'a> {
    conn: &'a Connection,
    sim_id: SimId,
    children_sql: String,
}

impl<'a> SqliteLineage<'a> {
    pub fn new(conn: &'a Connection, sim_id: &SimId, scratch: &ScratchTable) -> Self {
        Self {
            conn,
            sim_id: sim_id.clone(),
            children_sql: scratch.children_sql(),
        }
    }
}

impl LineageSource for SqliteLineage<'_> {
    type Error = StoreError;

    fn children(&mut self, resource: ResourceId) -> Result<Vec<ChildResource>> {
        let mut stmt = self.conn.prepare_cached(&self.children_sql)?;
        let rows = stmt.query_map([resource], |row| {
            Ok(ChildResource {
                resource_id: row.get(0)?,
                created_at: row.get(1)?,
            })
        })?;

        let mut children = Vec::new();
        for row in rows {
            children.push(row?);
        }
        Ok(children)
    }

    fn transfers(&mut self, resource: ResourceId) -> Result<Vec<OwnershipTransfer>> {
        let mut stmt = self.conn.prepare_cached(TRANSFERS_SQL)?;
        let rows = stmt.query_map(params![resource, self.sim_id.as_str()], |row| {
            Ok(OwnershipTransfer {
                receiver: row.get(0)?,
                time: row.get(1)?,
            })
        })?;

        let mut transfers = Vec::new();
        for row in rows {
            transfers.push(row?);
        }
        Ok(transfers)
    }
}
