//! Harmonization pipeline with explicit stages.
//!
//! The stages run in this order:
//! 1. **Config**: load the TOML run configuration, apply CLI overrides
//! 2. **Events**: read the registry, apply overrides, check component splits
//! 3. **Ingest**: read every measure's observation table
//! 4. **Replay**: build the anchor mapping for all observed keys
//! 5. **Aggregate**: aggregate each measure, check coverage and anchor codes
//! 6. **Output**: write measure tables, the change list and the run report
//!
//! Measures run sequentially over one shared mapping.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::{Context, Result};
use regio_aggregate::{Aggregation, aggregate, check, check_anchor_codes};
use regio_core::{
    AnchorMapping, ChangeEventStore, ChangeGraph, OverrideOutcome, OverrideRuleSet,
    TemporalReplayer, component_splits,
};
use regio_ingest::{
    ObservationTable, load_config, read_change_events, read_code_list, read_observations,
    read_reference_totals,
};
use regio_model::{
    Diagnostic, DiagnosticKind, Diagnostics, HarmonizeConfig, MeasureSpec, OverrideRule,
    RegionCode,
};
use regio_report::{
    AnchorCoverageSummary, MeasureSummary, RunReport, write_change_events_file,
    write_measure_file, write_run_report,
};
use tracing::{info, info_span, warn};

use crate::types::{RunOptions, RunResult};

// ============================================================================
// Stage 1: Config
// ============================================================================

/// Load the configuration and apply command-line overrides.
pub fn load_run_config(options: &RunOptions) -> Result<HarmonizeConfig> {
    let path = &options.config_path;
    let mut config =
        load_config(path).with_context(|| format!("load config {}", path.display()))?;
    options.apply(&mut config);
    Ok(config)
}

/// Output directory: the configured one, else `output/` next to the config.
pub fn output_dir(config: &HarmonizeConfig, config_path: &Path) -> PathBuf {
    config.output_dir.clone().unwrap_or_else(|| {
        config_path
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join("output")
    })
}

// ============================================================================
// Stage 2: Events
// ============================================================================

/// The registry before and after overrides.
#[derive(Debug)]
pub struct PreparedEvents {
    pub store: ChangeEventStore,
    pub rules: Vec<OverrideRule>,
    pub outcome: OverrideOutcome,
    /// Override and component-split findings.
    pub diagnostics: Diagnostics,
}

impl PreparedEvents {
    /// Graph over the registry as published.
    pub fn raw_graph(&self) -> ChangeGraph {
        ChangeGraph::new(self.store.events())
    }

    /// Graph over the events that replay uses.
    pub fn overridden_graph(&self) -> ChangeGraph {
        ChangeGraph::new(self.outcome.events())
    }

    pub fn replayer(&self, config: &HarmonizeConfig) -> Result<TemporalReplayer<'_>> {
        TemporalReplayer::new(self.outcome.events(), config.anchor_date)
            .context("prepare temporal replay")
    }
}

pub fn prepare_events(config: &HarmonizeConfig) -> Result<PreparedEvents> {
    let start = Instant::now();
    let path = &config.sources.events;
    let rows = read_change_events(path).context("read change events")?;
    let store = ChangeEventStore::load(&rows, &config.codes)
        .with_context(|| format!("parse change events from {}", path.display()))?;
    let rules = config.normalized_overrides();
    let outcome = OverrideRuleSet::new(rules.clone())
        .strict(config.strict_overrides)
        .apply(store.events())
        .context("apply overrides")?;

    let mut diagnostics = outcome.diagnostics().clone();
    diagnostics.extend(component_splits(
        &ChangeGraph::new(store.events()),
        &ChangeGraph::new(outcome.events()),
    ));
    info!(
        events = store.len(),
        suppressed = outcome.suppressed().len(),
        injected = outcome.injected().len(),
        replayed = outcome.events().len(),
        duration_ms = start.elapsed().as_millis(),
        "events prepared"
    );
    Ok(PreparedEvents {
        store,
        rules,
        outcome,
        diagnostics,
    })
}

// ============================================================================
// Stage 3: Ingest
// ============================================================================

pub fn ingest(config: &HarmonizeConfig) -> Result<Vec<ObservationTable>> {
    let start = Instant::now();
    let mut tables = Vec::with_capacity(config.measures.len());
    for spec in &config.measures {
        let table = read_observations(&spec.input, spec, &config.codes)
            .with_context(|| format!("read observations for measure `{}`", spec.name))?;
        tables.push(table);
    }
    info!(
        measures = tables.len(),
        rows = tables
            .iter()
            .map(|table| table.observations.len())
            .sum::<usize>(),
        duration_ms = start.elapsed().as_millis(),
        "ingest complete"
    );
    Ok(tables)
}

fn ingest_diagnostics(spec: &MeasureSpec, table: &ObservationTable) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    if table.skipped_rows > 0 {
        diagnostics.push(
            Diagnostic::info(
                DiagnosticKind::DroppedRows,
                format!(
                    "measure `{}`: skipped {} rows with codes of another width",
                    spec.name, table.skipped_rows
                ),
            )
            .with_count(table.skipped_rows as u64),
        );
    }
    if table.missing_values > 0 {
        diagnostics.push(
            Diagnostic::info(
                DiagnosticKind::DroppedRows,
                format!(
                    "measure `{}`: {} values marked as missing",
                    spec.name, table.missing_values
                ),
            )
            .with_count(table.missing_values as u64),
        );
    }
    diagnostics
}

// ============================================================================
// Stage 5: Aggregate
// ============================================================================

struct MeasureRun {
    aggregation: Aggregation,
    summary: MeasureSummary,
    diagnostics: Diagnostics,
}

fn run_measure(
    spec: &MeasureSpec,
    table: &ObservationTable,
    mapping: &AnchorMapping,
    config: &HarmonizeConfig,
    anchor_codes: Option<&BTreeSet<RegionCode>>,
) -> Result<MeasureRun> {
    let span = info_span!("measure", name = %spec.name);
    let _guard = span.enter();
    let start = Instant::now();

    let aggregation = aggregate(&table.observations, mapping, spec)
        .with_context(|| format!("aggregate measure `{}`", spec.name))?;
    let mut diagnostics = ingest_diagnostics(spec, table);
    diagnostics.extend(aggregation.diagnostics.clone());
    let mut summary = MeasureSummary::new(&aggregation);

    if let Some(coverage) = &spec.coverage {
        let reference = read_reference_totals(
            &coverage.reference,
            coverage,
            &config.codes,
            &spec.missing_markers,
        )
        .with_context(|| format!("read reference totals for measure `{}`", spec.name))?;
        let report = check(&aggregation.rows, &reference, coverage);
        diagnostics.extend(report.diagnostics.clone());
        summary.coverage = Some(report);
    }
    if let Some(anchor_codes) = anchor_codes {
        let (coverage, found) = check_anchor_codes(&aggregation.rows, anchor_codes);
        diagnostics.extend(found);
        summary.anchor_coverage = Some(AnchorCoverageSummary::from(&coverage));
    }

    info!(
        measure = %spec.name,
        output_rows = aggregation.rows.len(),
        warnings = diagnostics.warning_count(),
        duration_ms = start.elapsed().as_millis(),
        "measure complete"
    );
    Ok(MeasureRun {
        aggregation,
        summary,
        diagnostics,
    })
}

/// Run the full harmonization.
pub fn harmonize(options: &RunOptions) -> Result<RunResult> {
    let run_start = Instant::now();
    let config = load_run_config(options)?;
    let output_dir = output_dir(&config, &options.config_path);
    let span = info_span!(
        "harmonize",
        anchor_date = %config.anchor_date,
        scope = ?config.scope
    );
    let _guard = span.enter();

    let events = prepare_events(&config)?;
    let mut diagnostics = events.diagnostics.clone();

    let tables = ingest(&config)?;

    // ========================================================================
    // Stage 4: Replay
    // ========================================================================
    let replay_start = Instant::now();
    let replayer = events.replayer(&config)?;
    let observed = tables.iter().flat_map(|table| {
        table
            .observations
            .iter()
            .map(|observation| (observation.region_code.clone(), observation.period))
    });
    let (mapping, replay) = replayer
        .build_mapping(observed, config.scope)
        .context("build anchor mapping")?;
    diagnostics.extend(replay.diagnostics.clone());
    info!(
        keys = mapping.len(),
        changed = mapping.changed(),
        duration_ms = replay_start.elapsed().as_millis(),
        "replay complete"
    );

    let anchor_codes = match &config.sources.anchor_codes {
        Some(path) => Some(read_code_list(path, &config.codes).context("read anchor codes")?),
        None => None,
    };

    let mut report = RunReport::new(
        &events.store,
        &events.outcome,
        &events.rules,
        &replay,
        config.anchor_date,
    );
    let mut runs = Vec::with_capacity(config.measures.len());
    for (spec, table) in config.measures.iter().zip(&tables) {
        let run = run_measure(spec, table, &mapping, &config, anchor_codes.as_ref())?;
        diagnostics.extend(run.diagnostics.clone());
        runs.push(run);
    }

    // ========================================================================
    // Stage 6: Output
    // ========================================================================
    let mut change_events = None;
    let mut run_report = None;
    if options.dry_run {
        info!(output_dir = %output_dir.display(), "dry run, no files written");
        for run in runs {
            report.push_measure(run.summary);
        }
        report.set_diagnostics(&diagnostics);
    } else {
        std::fs::create_dir_all(&output_dir)
            .with_context(|| format!("create output dir {}", output_dir.display()))?;
        for (spec, run) in config.measures.iter().zip(runs) {
            let MeasureRun {
                aggregation,
                mut summary,
                ..
            } = run;
            let path = write_measure_file(&output_dir, &aggregation, spec)
                .with_context(|| format!("write measure `{}`", spec.name))?;
            summary.output = Some(path);
            report.push_measure(summary);
        }
        let annotated = events.outcome.annotated(events.store.events());
        change_events = Some(
            write_change_events_file(&output_dir, &annotated).context("write change list")?,
        );
        report.set_diagnostics(&diagnostics);
        run_report = Some(write_run_report(&output_dir, &report).context("write run report")?);
    }

    if diagnostics.has_warnings() {
        warn!(
            warnings = diagnostics.warning_count(),
            "run finished with warnings"
        );
    }
    info!(
        measures = report.measures.len(),
        diagnostics = diagnostics.len(),
        duration_ms = run_start.elapsed().as_millis(),
        "harmonize complete"
    );
    Ok(RunResult {
        output_dir,
        dry_run: options.dry_run,
        report,
        diagnostics,
        change_events,
        run_report,
    })
}
