//! The machine-readable record of one harmonization run.

use std::path::{Path, PathBuf};

use chrono::{NaiveDate, Utc};
use regio_aggregate::{AnchorCoverage, Aggregation, CoverageReport};
use regio_core::{ChangeEventStore, OverrideOutcome, ReplayReport};
use regio_model::{ChangeEvent, Diagnostic, Diagnostics, OverrideKind, OverrideRule, ReplayScope};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{ReportError, Result};

pub const RUN_REPORT_FILE: &str = "run_report.json";
const REPORT_SCHEMA: &str = "regio.run-report";
const REPORT_SCHEMA_VERSION: u32 = 1;

/// SHA-256 over the replayed inputs: registry events and override rules.
///
/// Two runs with the same fingerprint and anchor date produce the same
/// mapping.
pub fn input_fingerprint(events: &[ChangeEvent], rules: &[OverrideRule]) -> String {
    let mut hasher = Sha256::new();
    for event in events {
        hasher.update(event.effective_date().to_string().as_bytes());
        hasher.update(b"\t");
        hasher.update(event.from_code().as_str().as_bytes());
        hasher.update(b"\t");
        hasher.update(event.to_code().as_str().as_bytes());
        hasher.update(b"\n");
    }
    for rule in rules {
        let kind = match rule.kind {
            OverrideKind::Suppress => "suppress",
            OverrideKind::Inject => "inject",
        };
        let date = rule
            .effective_date
            .map(|date| date.to_string())
            .unwrap_or_default();
        for part in [kind, rule.from.as_str(), rule.to.as_str(), date.as_str()] {
            hasher.update(part.as_bytes());
            hasher.update(b"\t");
        }
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

#[derive(Debug, Clone, Serialize)]
pub struct EventCounts {
    pub registry: usize,
    pub duplicates_removed: usize,
    pub suppressed: usize,
    pub injected: usize,
    pub replayed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct OverrideSummary {
    pub name: String,
    pub kind: OverrideKind,
    pub from: String,
    pub to: String,
    pub removed: usize,
    pub added: usize,
    pub justification: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReplaySummary {
    pub observed_keys: usize,
    pub changed_keys: usize,
    pub anchor_codes: usize,
    pub forward_batches: usize,
    pub forward_rewrites: usize,
    pub backward_batches: usize,
    pub backward_rewrites: usize,
    pub ambiguities: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasureSummary {
    pub name: String,
    pub input_rows: usize,
    pub dropped_filtered: usize,
    pub dropped_zero_total: usize,
    pub output_rows: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub coverage: Option<CoverageReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anchor_coverage: Option<AnchorCoverageSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnchorCoverageSummary {
    pub rows: usize,
    pub known_rows: usize,
    pub share: f64,
    pub unknown_codes: Vec<String>,
}

impl From<&AnchorCoverage> for AnchorCoverageSummary {
    fn from(coverage: &AnchorCoverage) -> Self {
        Self {
            rows: coverage.rows,
            known_rows: coverage.known_rows,
            share: coverage.share(),
            unknown_codes: coverage
                .unknown_codes
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl MeasureSummary {
    pub fn new(aggregation: &Aggregation) -> Self {
        Self {
            name: aggregation.measure.clone(),
            input_rows: aggregation.input_rows,
            dropped_filtered: aggregation.dropped.filtered,
            dropped_zero_total: aggregation.dropped.zero_total,
            output_rows: aggregation.rows.len(),
            output: None,
            coverage: None,
            anchor_coverage: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticSummary {
    pub warnings: usize,
    pub infos: usize,
    pub items: Vec<Diagnostic>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub schema: &'static str,
    pub schema_version: u32,
    pub generated_at: String,
    pub anchor_date: NaiveDate,
    pub scope: ReplayScope,
    pub input_fingerprint: String,
    pub events: EventCounts,
    pub overrides: Vec<OverrideSummary>,
    pub replay: ReplaySummary,
    pub measures: Vec<MeasureSummary>,
    pub diagnostics: DiagnosticSummary,
}

impl RunReport {
    pub fn new(
        store: &ChangeEventStore,
        outcome: &OverrideOutcome,
        rules: &[OverrideRule],
        replay: &ReplayReport,
        anchor_date: NaiveDate,
    ) -> Self {
        Self {
            schema: REPORT_SCHEMA,
            schema_version: REPORT_SCHEMA_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            anchor_date,
            scope: replay.scope,
            input_fingerprint: input_fingerprint(store.events(), rules),
            events: EventCounts {
                registry: store.len(),
                duplicates_removed: store.duplicates_removed(),
                suppressed: outcome.suppressed().len(),
                injected: outcome.injected().len(),
                replayed: outcome.events().len(),
            },
            overrides: outcome
                .applications()
                .iter()
                .map(|application| OverrideSummary {
                    name: application.name.clone(),
                    kind: application.kind,
                    from: application.from.to_string(),
                    to: application.to.to_string(),
                    removed: application.removed,
                    added: application.added,
                    justification: application.justification.clone(),
                })
                .collect(),
            replay: ReplaySummary {
                observed_keys: replay.observed_keys,
                changed_keys: replay.changed_keys,
                anchor_codes: replay.anchor_codes,
                forward_batches: replay.forward.batches,
                forward_rewrites: replay.forward.rewrites,
                backward_batches: replay.backward.batches,
                backward_rewrites: replay.backward.rewrites,
                ambiguities: replay.ambiguities.len(),
            },
            measures: Vec::new(),
            diagnostics: DiagnosticSummary {
                warnings: 0,
                infos: 0,
                items: Vec::new(),
            },
        }
    }

    pub fn push_measure(&mut self, summary: MeasureSummary) {
        self.measures.push(summary);
    }

    pub fn set_diagnostics(&mut self, diagnostics: &Diagnostics) {
        self.diagnostics = DiagnosticSummary {
            warnings: diagnostics.warning_count(),
            infos: diagnostics.info_count(),
            items: diagnostics.iter().cloned().collect(),
        };
    }
}

pub fn write_run_report(output_dir: &Path, report: &RunReport) -> Result<PathBuf> {
    let path = output_dir.join(RUN_REPORT_FILE);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, format!("{json}\n")).map_err(|err| ReportError::io(&path, err))?;
    info!(path = %path.display(), "wrote run report");
    Ok(path)
}
