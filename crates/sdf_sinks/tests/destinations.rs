//! Write through `open_sink`, read back through `load_results`.

use sdf_protocol::TestResult;
use sdf_sinks::{load_results, open_sink, Destination, RecordIndex, SqliteStore};

fn sample_rows() -> Vec<TestResult> {
    vec![
        TestResult::new("canonicalization", "MCULE-2", "formula C6H6\nbonds 1:3 2:3"),
        TestResult::passed("invariance", "MCULE-1"),
        TestResult::new("invariance", "MCULE-3", "atom count differs: 4 vs 5"),
    ]
}

fn round_trip(destination: &Destination) {
    let rows = sample_rows();
    let mut sink = open_sink(destination).unwrap();
    for row in &rows {
        sink.append(row).unwrap();
    }
    sink.finish().unwrap();
    assert_eq!(sink.rows_written(), 3);
    drop(sink);

    let loaded = load_results(destination).unwrap();
    assert_eq!(loaded.len(), rows.len());
    for (got, want) in loaded.iter().zip(&rows) {
        assert_eq!(got.test_name, want.test_name);
        assert_eq!(got.record_id, want.record_id);
        assert_eq!(got.outcome, want.outcome);
        assert_eq!(got.timestamp.timestamp(), want.timestamp.timestamp());
    }
}

#[test]
fn test_tsv_destination_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = Destination::parse(tmp.path().join("run.tsv").to_str().unwrap()).unwrap();
    assert!(matches!(dest, Destination::Tsv(_)));
    round_trip(&dest);
}

#[test]
fn test_sqlite_destination_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let dest = Destination::parse(tmp.path().join("run.sqlite").to_str().unwrap()).unwrap();
    assert!(matches!(dest, Destination::Sqlite(_)));
    round_trip(&dest);
}

#[test]
fn test_reference_store_serves_indexed_lookups() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("current.db");
    let mut sink = open_sink(&Destination::Sqlite(path.clone())).unwrap();
    for row in sample_rows() {
        sink.append(&row).unwrap();
    }
    sink.finish().unwrap();
    drop(sink);

    let store = SqliteStore::open(&path).unwrap();
    store.create_index().unwrap();
    assert_eq!(
        store.lookup("invariance", "MCULE-3").unwrap().as_deref(),
        Some("atom count differs: 4 vs 5")
    );
    assert_eq!(store.lookup("invariance", "MCULE-9").unwrap(), None);
    assert_eq!(store.lookup("canonicalization", "MCULE-3").unwrap(), None);
}
