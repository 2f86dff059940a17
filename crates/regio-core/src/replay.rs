//! Temporal replay of change events onto a working code map.
//!
//! # Passes
//!
//! - **Forward** applies events dated on or before the anchor date, oldest
//!   first: a code that ceased is rewritten to its successor.
//! - **Backward** undoes events dated after the anchor date, newest first: a
//!   code created after the anchor is rewritten to its predecessor.
//!
//! Each date is applied as one simultaneous batch: every entry whose
//! *current* value is a batch source is rewritten once, so same-date events
//! never chain into each other. Forward must run before backward on a given
//! [`WorkingMap`]; the map tracks its phase and rejects other orders.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::NaiveDate;
use regio_model::{
    ChangeEvent, Diagnostic, DiagnosticKind, Diagnostics, HarmonizeError, Period, RegionCode,
    ReplayScope, Result,
};
use tracing::{debug, info, info_span, warn};

use crate::graph::ChangeGraph;
use crate::mapping::{AnchorMapping, Crosswalk};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayPhase {
    Fresh,
    Forward,
    Backward,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Direction {
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Forward => "forward",
            Self::Backward => "backward",
        })
    }
}

/// `code -> current code` for every observed code, with its replay phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingMap {
    entries: BTreeMap<RegionCode, RegionCode>,
    phase: ReplayPhase,
}

impl WorkingMap {
    pub fn identity<I>(codes: I) -> Self
    where
        I: IntoIterator<Item = RegionCode>,
    {
        Self {
            entries: codes
                .into_iter()
                .map(|code| (code.clone(), code))
                .collect(),
            phase: ReplayPhase::Fresh,
        }
    }

    pub fn phase(&self) -> ReplayPhase {
        self.phase
    }

    pub fn get(&self, code: &RegionCode) -> Option<&RegionCode> {
        self.entries.get(code)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &BTreeMap<RegionCode, RegionCode> {
        &self.entries
    }

    pub fn into_entries(self) -> BTreeMap<RegionCode, RegionCode> {
        self.entries
    }

    fn holds(&self, code: &RegionCode) -> bool {
        self.entries.values().any(|current| current == code)
    }

    fn rewrite(&mut self, targets: &BTreeMap<&RegionCode, &RegionCode>) -> usize {
        let mut rewritten = 0;
        for current in self.entries.values_mut() {
            if let Some(target) = targets.get(&*current) {
                *current = (*target).clone();
                rewritten += 1;
            }
        }
        rewritten
    }
}

/// Several candidate codes for one code within one date batch.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ambiguity {
    pub date: NaiveDate,
    pub direction: Direction,
    pub code: RegionCode,
    pub candidates: Vec<RegionCode>,
}

impl Ambiguity {
    /// The candidate the replay picked: the smallest one.
    pub fn chosen(&self) -> &RegionCode {
        &self.candidates[0]
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayStats {
    /// Events inside the pass window.
    pub events: usize,
    /// Date batches applied.
    pub batches: usize,
    /// Entry rewrites summed over all batches.
    pub rewrites: usize,
}

impl ReplayStats {
    fn add(&mut self, other: Self) {
        self.events += other.events;
        self.batches += other.batches;
        self.rewrites += other.rewrites;
    }
}

/// Outcome of one forward or backward pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassOutcome {
    pub stats: ReplayStats,
    pub ambiguities: Vec<Ambiguity>,
}

impl PassOutcome {
    /// The window held events but none of them touched the map.
    pub fn no_growth(&self) -> bool {
        self.stats.events > 0 && self.stats.rewrites == 0
    }
}

/// Statistics and findings of a mapping build.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayReport {
    pub scope: ReplayScope,
    pub observed_keys: usize,
    pub changed_keys: usize,
    /// Distinct anchor codes the observed keys resolve to.
    pub anchor_codes: usize,
    pub forward: ReplayStats,
    pub backward: ReplayStats,
    pub ambiguities: Vec<Ambiguity>,
    pub diagnostics: Diagnostics,
}

/// Replays an ordered, override-applied event list toward an anchor date.
#[derive(Debug, Clone, Copy)]
pub struct TemporalReplayer<'a> {
    events: &'a [ChangeEvent],
    anchor_date: NaiveDate,
}

impl<'a> TemporalReplayer<'a> {
    /// Fails with `CyclicChange` when a code leads back to itself through
    /// events with increasing dates; replay would not be well defined.
    pub fn new(events: &'a [ChangeEvent], anchor_date: NaiveDate) -> Result<Self> {
        if !events.is_sorted() {
            return Err(HarmonizeError::ReplayOrder(
                "change events must be sorted by date, source and target".to_string(),
            ));
        }
        if let Some(path) = ChangeGraph::new(events).find_cycle() {
            return Err(HarmonizeError::CyclicChange { path });
        }
        Ok(Self {
            events,
            anchor_date,
        })
    }

    pub fn anchor_date(&self) -> NaiveDate {
        self.anchor_date
    }

    /// Apply events with `since < date <= anchor_date`, oldest batch first.
    ///
    /// `since = None` applies every event up to the anchor date.
    pub fn forward(&self, map: &mut WorkingMap, since: Option<NaiveDate>) -> Result<PassOutcome> {
        if map.phase != ReplayPhase::Fresh {
            return Err(HarmonizeError::ReplayOrder(format!(
                "forward replay needs a fresh working map, found phase {:?}",
                map.phase
            )));
        }
        map.phase = ReplayPhase::Forward;
        let anchor = self.anchor_date;
        let window: Vec<&ChangeEvent> = self
            .events
            .iter()
            .filter(|event| {
                let date = event.effective_date();
                date <= anchor && since.is_none_or(|since| date > since)
            })
            .collect();
        Ok(apply_batches(map, &window, Direction::Forward))
    }

    /// Undo events with `anchor_date < date <= until`, newest batch first.
    ///
    /// `until = None` undoes every event after the anchor date.
    pub fn backward(&self, map: &mut WorkingMap, until: Option<NaiveDate>) -> Result<PassOutcome> {
        if map.phase == ReplayPhase::Backward {
            return Err(HarmonizeError::ReplayOrder(
                "backward replay already ran on this working map".to_string(),
            ));
        }
        map.phase = ReplayPhase::Backward;
        let anchor = self.anchor_date;
        let mut window: Vec<&ChangeEvent> = self
            .events
            .iter()
            .filter(|event| {
                let date = event.effective_date();
                date > anchor && until.is_none_or(|until| date <= until)
            })
            .collect();
        window.reverse();
        Ok(apply_batches(map, &window, Direction::Backward))
    }

    /// Replay a set of codes that were valid on `valid_on` (or on every date
    /// when `None`) through both passes.
    fn replay_codes(
        &self,
        codes: impl IntoIterator<Item = RegionCode>,
        valid_on: Option<NaiveDate>,
    ) -> Result<(WorkingMap, PassOutcome, PassOutcome)> {
        let mut map = WorkingMap::identity(codes);
        let forward = self.forward(&mut map, valid_on)?;
        let backward = self.backward(&mut map, valid_on)?;
        Ok((map, forward, backward))
    }

    /// Build the anchor mapping for every observed `(code, period)` key.
    pub fn build_mapping<I>(
        &self,
        observed: I,
        scope: ReplayScope,
    ) -> Result<(AnchorMapping, ReplayReport)>
    where
        I: IntoIterator<Item = (RegionCode, Period)>,
    {
        let span = info_span!("build_mapping", anchor_date = %self.anchor_date, ?scope);
        let _guard = span.enter();

        let mut collector = Collector::default();
        let (mapping, observed_keys) = match scope {
            ReplayScope::Global => {
                let codes: BTreeSet<RegionCode> =
                    observed.into_iter().map(|(code, _)| code).collect();
                let observed_keys = codes.len();
                let (map, forward, backward) = self.replay_codes(codes, None)?;
                collector.record(None, forward, backward);
                (
                    AnchorMapping::global(self.anchor_date, map.into_entries()),
                    observed_keys,
                )
            }
            ReplayScope::Period => {
                let mut by_period: BTreeMap<Period, BTreeSet<RegionCode>> = BTreeMap::new();
                for (code, period) in observed {
                    by_period.entry(period).or_default().insert(code);
                }
                let observed_keys: usize = by_period.values().map(BTreeSet::len).sum();
                let mut mapped = BTreeMap::new();
                for (period, codes) in by_period {
                    let (map, forward, backward) =
                        self.replay_codes(codes, Some(period.reference_date()))?;
                    collector.record(Some(period), forward, backward);
                    mapped.insert(period, map.into_entries());
                }
                (
                    AnchorMapping::per_period(self.anchor_date, mapped),
                    observed_keys,
                )
            }
        };

        let report = collector.finish(
            scope,
            observed_keys,
            mapping.changed(),
            mapping.anchor_codes().len(),
        );
        info!(
            observed_keys = report.observed_keys,
            changed_keys = report.changed_keys,
            anchor_codes = report.anchor_codes,
            forward_rewrites = report.forward.rewrites,
            backward_rewrites = report.backward.rewrites,
            ambiguities = report.ambiguities.len(),
            "built anchor mapping"
        );
        Ok((mapping, report))
    }

    /// Map a list of codes valid on `valid_on` onto the anchor geography.
    pub fn crosswalk(
        &self,
        codes: &BTreeSet<RegionCode>,
        valid_on: NaiveDate,
    ) -> Result<(Crosswalk, ReplayReport)> {
        let (map, forward, backward) =
            self.replay_codes(codes.iter().cloned(), Some(valid_on))?;
        let mut collector = Collector::default();
        collector.record(None, forward, backward);
        let crosswalk = Crosswalk::new(valid_on, self.anchor_date, map.into_entries());
        let changed = crosswalk.iter().filter(|(from, to)| from != to).count();
        let targets: BTreeSet<&RegionCode> = crosswalk.iter().map(|(_, to)| to).collect();
        let report = collector.finish(ReplayScope::Period, codes.len(), changed, targets.len());
        info!(
            valid_on = %valid_on,
            codes = crosswalk.len(),
            changed,
            "built crosswalk"
        );
        Ok((crosswalk, report))
    }
}

fn apply_batches(
    map: &mut WorkingMap,
    window: &[&ChangeEvent],
    direction: Direction,
) -> PassOutcome {
    let mut outcome = PassOutcome::default();
    outcome.stats.events = window.len();
    for batch in window.chunk_by(|a, b| a.effective_date() == b.effective_date()) {
        let date = batch[0].effective_date();
        let mut candidates: BTreeMap<&RegionCode, BTreeSet<&RegionCode>> = BTreeMap::new();
        for event in batch {
            let (source, target) = match direction {
                Direction::Forward => (event.from_code(), event.to_code()),
                Direction::Backward => (event.to_code(), event.from_code()),
            };
            candidates.entry(source).or_default().insert(target);
        }
        let mut targets: BTreeMap<&RegionCode, &RegionCode> = BTreeMap::new();
        for (source, options) in &candidates {
            let Some(chosen) = options.first() else {
                continue;
            };
            if options.len() > 1 && map.holds(source) {
                outcome.ambiguities.push(Ambiguity {
                    date,
                    direction,
                    code: (*source).clone(),
                    candidates: options.iter().map(|code| (*code).clone()).collect(),
                });
            }
            targets.insert(*source, *chosen);
        }
        let rewritten = map.rewrite(&targets);
        debug!(
            %date,
            %direction,
            events = batch.len(),
            rewritten,
            "applied change batch"
        );
        outcome.stats.batches += 1;
        outcome.stats.rewrites += rewritten;
    }
    outcome
}

/// Passes whose window held events but rewrote nothing.
#[derive(Default)]
struct Stalled {
    periods: Vec<Period>,
    passes: usize,
    events: usize,
}

#[derive(Default)]
struct Collector {
    forward: ReplayStats,
    backward: ReplayStats,
    ambiguities: BTreeSet<Ambiguity>,
    stalled: BTreeMap<Direction, Stalled>,
    diagnostics: Diagnostics,
}

impl Collector {
    fn record(&mut self, period: Option<Period>, forward: PassOutcome, backward: PassOutcome) {
        let passes = [(Direction::Forward, &forward), (Direction::Backward, &backward)];
        for (direction, pass) in passes {
            if pass.no_growth() {
                let stalled = self.stalled.entry(direction).or_default();
                stalled.passes += 1;
                stalled.events += pass.stats.events;
                stalled.periods.extend(period);
            }
        }
        self.forward.add(forward.stats);
        self.backward.add(backward.stats);
        self.ambiguities.extend(forward.ambiguities);
        self.ambiguities.extend(backward.ambiguities);
    }

    /// One `NoReplayGrowth` warning per direction, however many periods
    /// stalled.
    fn report_stalled(&mut self) {
        for (direction, stalled) in std::mem::take(&mut self.stalled) {
            let message = match (stalled.periods.first(), stalled.periods.last()) {
                (Some(first), Some(last)) if stalled.passes > 1 => format!(
                    "{direction} replay windows of {} periods ({first} to {last}) held events \
                     but rewrote no observed code",
                    stalled.passes
                ),
                (Some(period), _) => format!(
                    "{direction} replay window for {period} held {} events but rewrote no \
                     observed code",
                    stalled.events
                ),
                _ => format!(
                    "{direction} replay window held {} events but rewrote no observed code",
                    stalled.events
                ),
            };
            warn!(periods = stalled.periods.len(), "{message}");
            let count = if stalled.periods.is_empty() {
                stalled.events
            } else {
                stalled.passes
            };
            let mut diagnostic = Diagnostic::warning(DiagnosticKind::NoReplayGrowth, message)
                .with_count(count as u64);
            if let Some(period) = stalled.periods.first() {
                diagnostic = diagnostic.with_period(*period);
            }
            self.diagnostics.push(diagnostic);
        }
    }

    fn finish(
        mut self,
        scope: ReplayScope,
        observed_keys: usize,
        changed_keys: usize,
        anchor_codes: usize,
    ) -> ReplayReport {
        self.report_stalled();
        for ambiguity in &self.ambiguities {
            let candidates: Vec<&str> = ambiguity
                .candidates
                .iter()
                .map(RegionCode::as_str)
                .collect();
            let message = format!(
                "{} on {} has {} {} candidates ({}); using {}",
                ambiguity.code,
                ambiguity.date,
                ambiguity.candidates.len(),
                ambiguity.direction,
                candidates.join(", "),
                ambiguity.chosen()
            );
            warn!(code = %ambiguity.code, date = %ambiguity.date, "{message}");
            self.diagnostics.push(
                Diagnostic::warning(DiagnosticKind::AmbiguousSuccessor, message)
                    .with_code(ambiguity.code.clone())
                    .with_count(ambiguity.candidates.len() as u64),
            );
        }
        ReplayReport {
            scope,
            observed_keys,
            changed_keys,
            anchor_codes,
            forward: self.forward,
            backward: self.backward,
            ambiguities: self.ambiguities.into_iter().collect(),
            diagnostics: self.diagnostics,
        }
    }
}
