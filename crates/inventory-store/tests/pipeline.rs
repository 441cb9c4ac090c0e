use std::path::{Path, PathBuf};
use std::thread;

use contracts::{WalkConfig, OPEN_END};
use inventory_store::{history, InventoryStore};
use rusqlite::Connection;
use tempfile::TempDir;

const AGENT_A: i64 = 11;
const AGENT_B: i64 = 12;
const AGENT_C: i64 = 13;

type Row = (String, i64, i64, i64, i64);

fn seed_database(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("cyclus.sqlite");
    let conn = Connection::open(&path).expect("create source db");
    conn.execute_batch(&format!(
        "
        CREATE TABLE Resources (ID INTEGER, SimID TEXT, TimeCreated INTEGER, Parent1 INTEGER, Parent2 INTEGER, StateID INTEGER);
        CREATE TABLE Compositions (ID INTEGER, IsoID INTEGER);
        CREATE TABLE Transactions (ID INTEGER, SimID TEXT, Time INTEGER, ReceiverID INTEGER);
        CREATE TABLE TransactedResources (TransactionID INTEGER, ResourceID INTEGER, SimID TEXT);
        CREATE TABLE ResCreators (SimID TEXT, ResID INTEGER, ModelID INTEGER);
        CREATE TABLE Agents (ID INTEGER, Prototype TEXT);

        INSERT INTO Agents VALUES ({AGENT_A}, 'Source'), ({AGENT_B}, 'Sink'), ({AGENT_C}, 'Store');

        -- sim-1: 1 created by A at 0, moved to B at 5, split into 2 at 10.
        INSERT INTO Resources VALUES (1, 'sim-1', 0, 0, 0, 1);
        INSERT INTO Resources VALUES (2, 'sim-1', 10, 1, 0, 1);
        INSERT INTO ResCreators VALUES ('sim-1', 1, {AGENT_A});
        INSERT INTO Transactions VALUES (1, 'sim-1', 5, {AGENT_B});
        INSERT INTO TransactedResources VALUES (1, 1, 'sim-1');

        -- sim-2: 5 created by C at 2 and never touched, plus a self transfer.
        INSERT INTO Resources VALUES (5, 'sim-2', 2, 0, 0, 1);
        INSERT INTO ResCreators VALUES ('sim-2', 5, {AGENT_C});
        INSERT INTO Transactions VALUES (2, 'sim-2', 4, {AGENT_C});
        INSERT INTO TransactedResources VALUES (2, 5, 'sim-2');

        -- sim-2 reuses resource id 1 with a different history than sim-1.
        INSERT INTO Resources VALUES (1, 'sim-2', 3, 0, 0, 1);
        INSERT INTO ResCreators VALUES ('sim-2', 1, {AGENT_C});
        "
    ))
    .expect("seed source tables");
    path
}

fn inventories(path: &Path) -> Vec<Row> {
    let conn = Connection::open(path).expect("reopen db");
    let mut stmt = conn
        .prepare(
            "SELECT SimID, ResID, AgentID, StartTime, EndTime FROM Inventories
             ORDER BY SimID, ResID, StartTime",
        )
        .expect("prepare select");
    let rows = stmt
        .query_map([], |row| {
            Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
        })
        .expect("query inventories");
    rows.collect::<rusqlite::Result<Vec<Row>>>()
        .expect("decode inventories")
}

fn run(path: &Path) {
    let store = InventoryStore::open(path, WalkConfig::default()).expect("open store");
    store.build_all(None).expect("build inventories");
}

#[test]
fn end_to_end_inventories_per_simulation() {
    let dir = TempDir::new().expect("temp dir");
    let path = seed_database(&dir);
    run(&path);

    assert_eq!(
        inventories(&path),
        vec![
            ("sim-1".to_string(), 1, AGENT_A, 0, 5),
            ("sim-1".to_string(), 1, AGENT_B, 5, 10),
            ("sim-1".to_string(), 2, AGENT_B, 10, OPEN_END),
            ("sim-2".to_string(), 1, AGENT_C, 3, OPEN_END),
            ("sim-2".to_string(), 5, AGENT_C, 2, OPEN_END),
        ]
    );
}

#[test]
fn rerun_produces_identical_inventories() {
    let dir = TempDir::new().expect("temp dir");
    let path = seed_database(&dir);

    run(&path);
    let first = inventories(&path);
    run(&path);
    let second = inventories(&path);

    assert_eq!(first, second);
}

#[test]
fn scratch_tables_are_gone_and_output_is_indexed() {
    let dir = TempDir::new().expect("temp dir");
    let path = seed_database(&dir);
    run(&path);

    let conn = Connection::open(&path).expect("reopen db");
    let scratch: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name LIKE 'tmp_restbl_%'",
            [],
            |row| row.get(0),
        )
        .expect("count scratch tables");
    let output_indices: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'index' AND tbl_name = 'Inventories'",
            [],
            |row| row.get(0),
        )
        .expect("count output indices");

    assert_eq!(scratch, 0);
    assert_eq!(output_indices, 3);
}

#[test]
fn history_mirrors_every_row() {
    let dir = TempDir::new().expect("temp dir");
    let path = seed_database(&dir);
    let store = InventoryStore::open(&path, WalkConfig::default()).expect("open store");

    let (tx, rx) = history::channel(1);
    let consumer = thread::spawn(move || rx.into_iter().collect::<Vec<String>>());
    let report = store.build_all(Some(&tx)).expect("build inventories");
    drop(tx);
    let statements = consumer.join().expect("history consumer");

    assert_eq!(statements.len() as u64, report.total_intervals());
    assert!(statements
        .contains(&"INSERT INTO Inventories VALUES('sim-2',5,13,2,2147483647);".to_string()));

    // Replaying the statements reproduces the table.
    let replay = Connection::open_in_memory().expect("replay db");
    replay
        .execute_batch(
            "CREATE TABLE Inventories (SimID TEXT, ResID INTEGER, AgentID INTEGER, StartTime INTEGER, EndTime INTEGER);",
        )
        .expect("create replay table");
    replay
        .execute_batch(&statements.join("\n"))
        .expect("replay statements");
    let replayed: i64 = replay
        .query_row("SELECT COUNT(*) FROM Inventories", [], |row| row.get(0))
        .expect("count replayed");
    assert_eq!(replayed as u64, report.total_intervals());
}

#[test]
fn missing_database_is_not_created() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("absent.sqlite");

    assert!(InventoryStore::open(&path, WalkConfig::default()).is_err());
    assert!(!path.exists());
}
