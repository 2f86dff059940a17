//! Grouping of raw observations onto anchor codes.
//!
//! Summed measures are added up per `(period, anchor_code, group_by…)`.
//! Derived measures keep their components apart until the group is complete,
//! so a mean is never an average of averages.

use std::collections::{BTreeMap, BTreeSet};

use regio_core::AnchorMapping;
use regio_model::{
    DerivedMeasure, Diagnostic, DiagnosticKind, Diagnostics, HarmonizedObservation, MeasureSpec,
    Period, RawObservation, RegionCode, Result,
};
use serde::Serialize;
use tracing::{debug, info};

/// Rows discarded before grouping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DroppedRows {
    /// Rows outside the configured dimension filters.
    pub filtered: usize,
    /// Rows of `(period, code)` groups whose measures sum to zero.
    pub zero_total: usize,
}

impl DroppedRows {
    pub fn total(&self) -> usize {
        self.filtered + self.zero_total
    }
}

/// Harmonized rows for one measure table.
#[derive(Debug, Clone, PartialEq)]
pub struct Aggregation {
    pub measure: String,
    pub input_rows: usize,
    pub dropped: DroppedRows,
    /// Sorted by period, anchor code, then grouped dimension values.
    pub rows: Vec<HarmonizedObservation>,
    pub diagnostics: Diagnostics,
}

impl Aggregation {
    /// Sum of one output measure over all rows.
    pub fn total(&self, measure: &str) -> f64 {
        self.rows.iter().filter_map(|row| row.measure(measure)).sum()
    }
}

type GroupKey = (Period, RegionCode, Vec<String>);

#[derive(Debug, Default)]
struct Accumulator {
    sums: BTreeMap<String, f64>,
    // (numerator or weighted sum, denominator or weight sum) per derived measure.
    parts: BTreeMap<String, (f64, f64)>,
}

impl Accumulator {
    fn add(&mut self, observation: &RawObservation, spec: &MeasureSpec) {
        for name in spec.summed_measures() {
            if let Some(value) = observation.measure(name) {
                *self.sums.entry(name.clone()).or_insert(0.0) += value;
            }
        }
        for derived in &spec.derived {
            let (top, bottom) = match derived {
                DerivedMeasure::Ratio {
                    numerator,
                    denominator,
                    ..
                } => (
                    observation.measure(numerator),
                    observation.measure(denominator),
                ),
                DerivedMeasure::WeightedMean { value, weight, .. } => {
                    match (observation.measure(value), observation.measure(weight)) {
                        (Some(value), Some(weight)) => (Some(value * weight), Some(weight)),
                        _ => (None, None),
                    }
                }
            };
            if top.is_none() && bottom.is_none() {
                continue;
            }
            let parts = self
                .parts
                .entry(derived.name().to_string())
                .or_insert((0.0, 0.0));
            parts.0 += top.unwrap_or(0.0);
            parts.1 += bottom.unwrap_or(0.0);
        }
    }

    fn finish(
        self,
        spec: &MeasureSpec,
    ) -> (BTreeMap<String, f64>, BTreeMap<String, Option<f64>>) {
        let derived = spec
            .derived
            .iter()
            .map(|derived| {
                let value = self
                    .parts
                    .get(derived.name())
                    .and_then(|(top, bottom)| (*bottom != 0.0).then_some(top / bottom));
                (derived.name().to_string(), value)
            })
            .collect();
        (self.sums, derived)
    }
}

fn prepare(observation: &RawObservation, spec: &MeasureSpec) -> Option<RawObservation> {
    let mut observation = observation.clone();
    for (dimension, recodes) in &spec.recode {
        if let Some(value) = observation.dimensions.get_mut(dimension)
            && let Some(replacement) = recodes.get(value.as_str())
        {
            *value = replacement.clone();
        }
    }
    let keep = spec.filters.iter().all(|(dimension, allowed)| {
        observation
            .dimension(dimension)
            .is_some_and(|value| allowed.iter().any(|candidate| candidate == value))
    });
    keep.then_some(observation)
}

/// Aggregate one measure table onto the anchor geography.
pub fn aggregate(
    observations: &[RawObservation],
    mapping: &AnchorMapping,
    spec: &MeasureSpec,
) -> Result<Aggregation> {
    spec.validate()?;
    let mut dropped = DroppedRows::default();

    let mut kept: Vec<RawObservation> = Vec::with_capacity(observations.len());
    for observation in observations {
        match prepare(observation, spec) {
            Some(observation) => kept.push(observation),
            None => dropped.filtered += 1,
        }
    }

    if spec.drop_zero_totals {
        let mut totals: BTreeMap<(Period, &RegionCode), f64> = BTreeMap::new();
        for observation in &kept {
            *totals
                .entry((observation.period, &observation.region_code))
                .or_insert(0.0) += observation.total();
        }
        let zero: BTreeSet<(Period, RegionCode)> = totals
            .into_iter()
            .filter(|(_, total)| *total == 0.0)
            .map(|((period, code), _)| (period, code.clone()))
            .collect();
        if !zero.is_empty() {
            let before = kept.len();
            kept.retain(|observation| {
                !zero.contains(&(observation.period, observation.region_code.clone()))
            });
            dropped.zero_total = before - kept.len();
        }
    }

    let mut groups: BTreeMap<GroupKey, Accumulator> = BTreeMap::new();
    for observation in &kept {
        let anchor = mapping.resolve(&observation.region_code, observation.period);
        let dimensions: Vec<String> = spec
            .group_by
            .iter()
            .map(|name| observation.dimension(name).unwrap_or_default().to_string())
            .collect();
        groups
            .entry((observation.period, anchor.clone(), dimensions))
            .or_default()
            .add(observation, spec);
    }

    let rows: Vec<HarmonizedObservation> = groups
        .into_iter()
        .map(|((period, anchor_code, values), accumulator)| {
            let (measures, derived) = accumulator.finish(spec);
            HarmonizedObservation {
                anchor_code,
                period,
                dimensions: spec.group_by.iter().cloned().zip(values).collect(),
                measures,
                derived,
            }
        })
        .collect();

    let mut diagnostics = Diagnostics::new();
    if dropped.total() > 0 {
        let message = format!(
            "measure `{}`: dropped {} filtered and {} zero-total rows",
            spec.name, dropped.filtered, dropped.zero_total
        );
        debug!("{message}");
        diagnostics.push(
            Diagnostic::info(DiagnosticKind::DroppedRows, message)
                .with_count(dropped.total() as u64),
        );
    }
    info!(
        measure = %spec.name,
        input_rows = observations.len(),
        dropped_filtered = dropped.filtered,
        dropped_zero_total = dropped.zero_total,
        output_rows = rows.len(),
        "aggregated measure"
    );
    Ok(Aggregation {
        measure: spec.name.clone(),
        input_rows: observations.len(),
        dropped,
        rows,
        diagnostics,
    })
}
