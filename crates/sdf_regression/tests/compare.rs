//! End-to-end comparisons over the real index and sink types.

use sdf_protocol::{ResultSet, TestResult};
use sdf_regression::{compare, VerdictCategory, MISSING_OUTCOME};
use sdf_sinks::{
    load_results, open_sink, Destination, MemoryIndex, MemorySink, ResultSink, SqliteStore,
};

fn canonical(id: &str, form: &str) -> TestResult {
    TestResult::new("canonicalization", id, form)
}

fn reference() -> ResultSet {
    (0..50)
        .map(|i| canonical(&format!("MCULE-{}", i), &format!("C{}H{}", i, 2 * i + 2)))
        .collect()
}

#[test]
fn test_identical_run_passes_everything() {
    let reference = reference();
    let current = reference.clone();
    let index = MemoryIndex::build(&current);
    let mut sink = MemorySink::new();

    let report = compare(&reference, &index, &mut sink).unwrap();

    assert_eq!(report.total, 50);
    assert!(report.is_clean());
    assert_eq!(sink.results().len(), 50);
    assert!(sink.results().iter().all(|r| r.is_passed() && r.test_name == "regression"));
}

#[test]
fn test_single_mutation_reports_exactly_one_failure() {
    let reference = reference();
    let current: ResultSet = reference
        .iter()
        .map(|r| {
            if r.record_id == "MCULE-17" {
                canonical("MCULE-17", "C17H35")
            } else {
                r.clone()
            }
        })
        .collect();
    let index = MemoryIndex::build(&current);
    let mut sink = MemorySink::new();

    let report = compare(&reference, &index, &mut sink).unwrap();

    assert_eq!(report.failed(), 1);
    assert_eq!(report.count(VerdictCategory::Mismatch), 1);
    assert_eq!(report.samples[0].record_id, "MCULE-17");
    assert_eq!(
        report.samples[0].detail,
        "reference: C17H36 / current: C17H35"
    );
    let failures: Vec<_> = sink.results().failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].record_id, "MCULE-17");
}

#[test]
fn test_missing_ids_are_reported_not_skipped() {
    let reference = reference();
    let current: ResultSet = reference
        .iter()
        .filter(|r| r.record_id != "MCULE-3")
        .cloned()
        .collect();
    let index = MemoryIndex::build(&current);
    let mut sink = MemorySink::new();

    let report = compare(&reference, &index, &mut sink).unwrap();

    assert_eq!(report.total, 50);
    assert_eq!(report.count(VerdictCategory::Missing), 1);
    let missing: Vec<_> = sink.results().failures().collect();
    assert_eq!(missing[0].record_id, "MCULE-3");
    assert_eq!(missing[0].outcome, MISSING_OUTCOME);
}

#[test]
fn test_duplicate_current_ids_use_first_arrival() {
    let reference: ResultSet = vec![canonical("dup", "A")].into();
    let current: ResultSet = vec![canonical("dup", "A"), canonical("dup", "B")].into();
    let mut sink = MemorySink::new();

    let report = compare(&reference, &MemoryIndex::build(&current), &mut sink).unwrap();
    assert!(report.is_clean());
}

#[test]
fn test_sqlite_index_and_persisted_verdicts() {
    let tmp = tempfile::tempdir().unwrap();
    let reference = reference();

    let mut current = SqliteStore::in_memory().unwrap();
    for row in reference.iter().filter(|r| r.record_id != "MCULE-49") {
        current.append(row).unwrap();
    }
    current.finish().unwrap();
    current.create_index().unwrap();

    let verdicts = Destination::Tsv(tmp.path().join("verdicts.tsv"));
    let mut sink = open_sink(&verdicts).unwrap();
    let report = compare(&reference, &current, sink.as_mut()).unwrap();
    sink.finish().unwrap();
    drop(sink);

    assert_eq!(report.count(VerdictCategory::Missing), 1);

    // The verdict log is itself a valid result set.
    let persisted = load_results(&verdicts).unwrap();
    assert_eq!(persisted.len(), 50);
    assert_eq!(persisted.failures().count(), 1);
}

#[test]
fn test_report_serializes_for_json_output() {
    let reference: ResultSet = vec![canonical("a", "X")].into();
    let mut sink = MemorySink::new();
    let report = compare(&reference, &MemoryIndex::default(), &mut sink).unwrap();

    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["total"], 1);
    assert_eq!(json["samples"][0]["category"], "missing");
}

#[test]
fn test_rows_are_matched_on_their_own_test() {
    let reference: ResultSet = (0..5)
        .flat_map(|i| {
            let id = format!("mol-{}", i);
            [
                TestResult::passed("always", id.clone()),
                TestResult::new("length", id, format!("{}", 160 + i)),
            ]
        })
        .collect();
    let index = MemoryIndex::build(&reference);
    assert_eq!(index.duplicates(), 0);

    let mut sink = MemorySink::new();
    let report = compare(&reference, &index, &mut sink).unwrap();
    assert_eq!(report.total, 10);
    assert!(report.is_clean());

    let mut current = SqliteStore::in_memory().unwrap();
    for row in &reference {
        current.append(row).unwrap();
    }
    current.finish().unwrap();
    current.create_index().unwrap();
    let report = compare(&reference, &current, &mut MemorySink::new()).unwrap();
    assert!(report.is_clean());
}
