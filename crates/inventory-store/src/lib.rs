//! SQLite facade that materializes the `Inventories` table in place.
//!
//! A full run is `prepare` → `walk_simulation` for every listed simulation →
//! `finish`; [`InventoryStore::build_all`] strings those together.

mod error;
pub mod history;
pub mod lineage;
mod persistence;
pub mod schema;

use std::path::Path;
use std::time::{Duration, Instant};

use contracts::{RunReport, SimId, SimulationReport, WalkConfig};
use inventory_core::InventoryWalker;
use rusqlite::{Connection, OpenFlags};
use tracing::{error, info};

pub use error::{Result, StoreError};
pub use history::{HistoryReceiver, HistorySender};
pub use lineage::{list_simulations, load_roots, ScratchTable, SqliteLineage};
pub use persistence::BatchedWriter;
pub use schema::{PrepareReport, SkippedIndex};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
pub struct InventoryStore {
    conn: Connection,
    config: WalkConfig,
}

impl InventoryStore {
    /// Opens an existing database read-write. A missing file is an error, not
    /// a fresh empty database.
    pub fn open(path: impl AsRef<Path>, config: WalkConfig) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(StoreError::MissingDatabase {
                path: path.to_path_buf(),
            });
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|source| StoreError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let store = Self::from_connection(conn, config);
        store.configure()?;
        Ok(store)
    }

    pub fn from_connection(conn: Connection, config: WalkConfig) -> Self {
        Self { conn, config }
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    pub fn config(&self) -> &WalkConfig {
        &self.config
    }

    pub fn prepare(&self) -> Result<PrepareReport> {
        schema::prepare(&self.conn)
    }

    pub fn simulations(&self) -> Result<Vec<SimId>> {
        list_simulations(&self.conn)
    }

    /// Builds the inventory rows of one simulation.
    ///
    /// On error the scratch table and every batch flushed so far stay in the
    /// database; nothing is rolled back beyond the batch in flight.
    pub fn walk_simulation(
        &self,
        sim_id: &SimId,
        history: Option<&HistorySender>,
    ) -> Result<SimulationReport> {
        let started = Instant::now();
        info!(%sim_id, "building inventories");

        let scratch = ScratchTable::create(&self.conn, sim_id)?;
        let roots = load_roots(&self.conn, sim_id)?;
        info!(%sim_id, roots = roots.len(), "found root resources");

        let mut source = SqliteLineage::new(&self.conn, sim_id, &scratch);
        let mut writer = BatchedWriter::new(&self.conn, sim_id.clone(), history);
        let mut walker = InventoryWalker::new(&self.config);
        let mut stats = walker.walk(&roots, &mut source, &mut writer)?;

        scratch.discard(&self.conn)?;
        writer.flush_pending(stats.resources)?;
        stats.flushes = writer.flushes();

        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        info!(%sim_id, %stats, elapsed_ms, "finished inventories");
        Ok(SimulationReport {
            sim_id: sim_id.clone(),
            stats,
            elapsed_ms,
        })
    }

    pub fn finish(&self) -> Result<()> {
        schema::finish(&self.conn)
    }

    /// Prepares the schema, walks every simulation in order, then indexes the
    /// output. The first failing simulation stops the run.
    pub fn build_all(&self, history: Option<&HistorySender>) -> Result<RunReport> {
        let prepared = self.prepare()?;
        let sims = self.simulations()?;
        info!(simulations = sims.len(), "walking simulations");

        let mut report = RunReport {
            skipped_indices: prepared
                .skipped
                .into_iter()
                .map(|skipped| skipped.statement)
                .collect(),
            simulations: Vec::with_capacity(sims.len()),
        };

        for sim_id in &sims {
            let sim_report = self.walk_simulation(sim_id, history).map_err(|err| {
                error!(%sim_id, error = %err, "inventory walk failed");
                StoreError::walk(sim_id, err)
            })?;
            report.simulations.push(sim_report);
        }

        self.finish()?;
        Ok(report)
    }

    fn configure(&self) -> Result<()> {
        self.conn.busy_timeout(BUSY_TIMEOUT)?;
        Ok(())
    }
}
