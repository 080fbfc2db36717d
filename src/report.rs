// src/report.rs

//! Console summary and JSON export of test results.

use std::fs;
use std::path::Path;

use crate::errors::Result;
use crate::suite::{TestCase, TestResult};

/// Counts over a finished run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
    /// Expected-failure cases that did fail.
    pub expected_failures: usize,
    /// Expected-failure cases that passed anyway.
    pub unexpected_passes: usize,
}

impl Summary {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.expected_failures + self.unexpected_passes
    }

    /// True when every case behaved as its expectation says.
    pub fn is_ok(&self) -> bool {
        self.failed == 0 && self.unexpected_passes == 0
    }
}

/// `cases` and `results` are parallel slices.
pub fn summarize(cases: &[TestCase], results: &[TestResult]) -> Summary {
    let mut summary = Summary::default();
    for (case, result) in cases.iter().zip(results) {
        match (case.expected_failure, result.success) {
            (false, true) => summary.passed += 1,
            (false, false) => summary.failed += 1,
            (true, false) => summary.expected_failures += 1,
            (true, true) => summary.unexpected_passes += 1,
        }
    }
    summary
}

fn status_label(case: &TestCase, result: &TestResult) -> &'static str {
    match (case.expected_failure, result.success) {
        (false, true) => "PASS",
        (false, false) => "FAIL",
        (true, false) => "XFAIL",
        (true, true) => "XPASS",
    }
}

/// Print one line per case plus totals; failures include their error text.
pub fn print_summary(cases: &[TestCase], results: &[TestResult]) -> Summary {
    println!("prunecheck results");
    for (case, result) in cases.iter().zip(results) {
        let status = status_label(case, result);
        println!("  {status:<5} {} ({} ms)", result.label, result.duration_ms);
        if status == "FAIL" {
            if let Some(error) = &result.error {
                for line in error.lines() {
                    println!("        {line}");
                }
            }
        }
    }

    let summary = summarize(cases, results);
    println!();
    println!(
        "{} passed, {} failed, {} expected failures, {} unexpected passes ({} total)",
        summary.passed,
        summary.failed,
        summary.expected_failures,
        summary.unexpected_passes,
        summary.total()
    );
    summary
}

/// Write `results` as a pretty-printed JSON array.
pub fn write_json(path: &Path, results: &[TestResult]) -> Result<()> {
    let json = serde_json::to_string_pretty(results)?;
    fs::write(path, json)?;
    Ok(())
}
