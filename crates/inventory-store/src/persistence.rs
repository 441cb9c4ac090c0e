use contracts::{InventoryRow, OwnershipInterval, SimId};
use inventory_core::IntervalSink;
use rusqlite::{params, Connection};
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::history::HistorySender;

const INSERT_INTERVAL_SQL: &str = "INSERT INTO Inventories VALUES (?1, ?2, ?3, ?4, ?5)";

/// Buffers one simulation's intervals and commits them in batches.
///
/// Every flush is a single transaction, so a batch lands completely or not at
/// all. The buffer is only cleared after its transaction commits.
#[derive(Debug)]
pub struct BatchedWriter<'a> {
    conn: &'a Connection,
    sim_id: SimId,
    buffer: Vec<OwnershipInterval>,
    history: Option<&'a HistorySender>,
    flushes: u64,
    written: u64,
}

impl<'a> BatchedWriter<'a> {
    pub fn new(conn: &'a Connection, sim_id: SimId, history: Option<&'a HistorySender>) -> Self {
        Self {
            conn,
            sim_id,
            buffer: Vec::new(),
            history,
            flushes: 0,
            written: 0,
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    pub fn flushes(&self) -> u64 {
        self.flushes
    }

    pub fn written(&self) -> u64 {
        self.written
    }

    /// Commits the buffered rows. An empty buffer opens no transaction.
    pub fn flush_pending(&mut self, resources_done: u64) -> Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        debug!(
            sim_id = %self.sim_id,
            rows = self.buffer.len(),
            resources_done,
            "dumping inventories"
        );

        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_INTERVAL_SQL)?;
            for interval in &self.buffer {
                stmt.execute(params![
                    self.sim_id.as_str(),
                    interval.resource_id,
                    interval.agent_id,
                    interval.start_time,
                    interval.end_time,
                ])?;
            }
        }
        tx.commit()?;

        self.written += self.buffer.len() as u64;
        self.flushes += 1;
        self.buffer.clear();
        Ok(())
    }
}

impl IntervalSink for BatchedWriter<'_> {
    type Error = StoreError;

    fn emit(&mut self, interval: OwnershipInterval) -> Result<()> {
        self.buffer.push(interval);
        if let Some(history) = self.history {
            let row = InventoryRow {
                sim_id: self.sim_id.clone(),
                interval,
            };
            history.send(row.to_insert_sql())?;
        }
        Ok(())
    }

    fn flush(&mut self, resources_done: u64) -> Result<()> {
        self.flush_pending(resources_done)
    }
}
