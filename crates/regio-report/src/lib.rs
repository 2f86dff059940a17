//! Outputs of a harmonization run.
//!
//! - `<measure>.csv`: harmonized rows per anchor code and period
//! - `change_events.csv`: the registry with override annotations
//! - `run_report.json`: counts, overrides, coverage and diagnostics
//! - crosswalk CSVs for the `crosswalk` command

#![deny(unsafe_code)]

pub mod error;
pub mod run_report;
pub mod tables;

pub use error::{ReportError, Result};
pub use run_report::{
    AnchorCoverageSummary, DiagnosticSummary, EventCounts, MeasureSummary, OverrideSummary,
    RUN_REPORT_FILE, ReplaySummary, RunReport, input_fingerprint, write_run_report,
};
pub use tables::{
    CHANGE_EVENTS_FILE, write_change_events_csv, write_change_events_file, write_crosswalk_csv,
    write_crosswalk_file, write_measure_csv, write_measure_file,
};
