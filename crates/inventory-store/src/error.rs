use std::path::PathBuf;

use contracts::SimId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database file not found: {}", path.display())]
    MissingDatabase { path: PathBuf },
    #[error("failed to open {}: {source}", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("history observer hung up before the walk finished")]
    HistoryClosed,
    #[error("inventory walk failed for simulation {sim_id}: {source}")]
    Walk {
        sim_id: SimId,
        #[source]
        source: Box<StoreError>,
    },
    #[error("failed to create inventory indices: {0}")]
    Finish(#[source] rusqlite::Error),
}

impl StoreError {
    pub(crate) fn walk(sim_id: &SimId, source: StoreError) -> Self {
        Self::Walk {
            sim_id: sim_id.clone(),
            source: Box::new(source),
        }
    }
}
