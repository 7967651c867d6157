//! Output formatting for end-of-run summaries
//!
//! Tables for humans, one JSON object per run with `--json`.

use comfy_table::{presets::UTF8_FULL_CONDENSED, Cell, Color, ContentArrangement, Table};
use sdf_pipeline::{InvarianceSummary, PipelineReport, RegressionSummary};
use sdf_regression::VerdictCategory;
use serde_json::json;
use std::time::Duration;

/// Failures listed in the table before truncating.
const MAX_LISTED_FAILURES: usize = 20;

/// Print a table with a cyan header row
pub fn print_table(headers: &[&str], rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .set_content_arrangement(ContentArrangement::Dynamic);

    let header_cells: Vec<Cell> = headers
        .iter()
        .map(|h| Cell::new(h).fg(Color::Cyan))
        .collect();
    table.set_header(header_cells);

    for row in rows {
        table.add_row(row);
    }

    println!("{}", table);
}

/// Format a duration as seconds with millisecond precision
///
/// Examples:
/// - 1.5s -> "1.500s"
/// - 65s -> "1m 5.000s"
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    if secs >= 60 {
        format!("{}m {}.{:03}s", secs / 60, secs % 60, millis)
    } else {
        format!("{}.{:03}s", secs, millis)
    }
}

fn run_rows(report: &PipelineReport) -> Vec<Vec<String>> {
    vec![
        vec!["Records read".into(), report.records_read.to_string()],
        vec!["Results written".into(), report.results_written.to_string()],
        vec!["Workers finished".into(), report.workers_finished.to_string()],
        vec!["Not passed".into(), report.failures.to_string()],
        vec!["Elapsed".into(), format_elapsed(report.elapsed)],
    ]
}

fn run_json(report: &PipelineReport) -> serde_json::Value {
    json!({
        "records_read": report.records_read,
        "results_written": report.results_written,
        "workers_finished": report.workers_finished,
        "failures": report.failures,
        "elapsed_ms": report.elapsed.as_millis() as u64,
    })
}

pub fn print_invariance(summary: &InvarianceSummary, json: bool) {
    if json {
        let failures: Vec<_> = summary
            .failures
            .iter()
            .map(|r| json!({ "time": r.timestamp, "record_id": r.record_id, "outcome": r.outcome }))
            .collect();
        println!(
            "{}",
            json!({ "status": "ok", "kind": "invariance", "run": run_json(&summary.report), "failures": failures })
        );
        return;
    }

    println!("Invariance");
    print_table(&["Metric", "Value"], run_rows(&summary.report));

    if summary.failures.is_empty() {
        println!("All records passed.");
        return;
    }
    let rows = summary
        .failures
        .iter()
        .take(MAX_LISTED_FAILURES)
        .map(|r| {
            vec![
                r.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                r.record_id.clone(),
                r.outcome.clone(),
            ]
        })
        .collect();
    print_table(&["Time", "Record", "Outcome"], rows);
    if summary.failures.len() > MAX_LISTED_FAILURES {
        println!(
            "... and {} more (see the result log)",
            summary.failures.len() - MAX_LISTED_FAILURES
        );
    }
}

pub fn print_reference(report: &PipelineReport, destination: &str, json: bool) {
    if json {
        println!(
            "{}",
            json!({ "status": "ok", "kind": "reference", "destination": destination, "run": run_json(report) })
        );
        return;
    }

    println!("Reference results -> {}", destination);
    print_table(&["Metric", "Value"], run_rows(report));
}

pub fn print_regression(summary: &RegressionSummary, json: bool) {
    let regression = &summary.regression;
    if json {
        println!(
            "{}",
            json!({
                "status": "ok",
                "kind": "regression",
                "run": run_json(&summary.report),
                "regression": regression,
                "ignored_reference_rows": summary.ignored_reference_rows,
                "duplicate_ids": summary.duplicate_ids,
            })
        );
        return;
    }

    println!("Regression");
    let mut rows = run_rows(&summary.report);
    rows.extend([
        vec!["Compared".into(), regression.total.to_string()],
        vec!["Passed".into(), regression.passed().to_string()],
        vec![
            "Mismatch".into(),
            regression.count(VerdictCategory::Mismatch).to_string(),
        ],
        vec![
            "Missing".into(),
            regression.count(VerdictCategory::Missing).to_string(),
        ],
        vec![
            "Pass rate".into(),
            format!("{:.1}%", regression.pass_rate * 100.0),
        ],
    ]);
    print_table(&["Metric", "Value"], rows);

    if !regression.samples.is_empty() {
        let rows = regression
            .samples
            .iter()
            .map(|s| vec![s.record_id.clone(), s.category.to_string(), s.detail.clone()])
            .collect();
        print_table(&["Record", "Verdict", "Detail"], rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_elapsed() {
        assert_eq!(format_elapsed(Duration::from_millis(1500)), "1.500s");
        assert_eq!(format_elapsed(Duration::from_millis(65_000)), "1m 5.000s");
        assert_eq!(format_elapsed(Duration::ZERO), "0.000s");
    }
}
