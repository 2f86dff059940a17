//! Coverage validation of harmonized output against independent totals.
//!
//! Harmonization should move population between codes, never create or lose
//! it. Discrepancies are reported as diagnostics; they never fail a run.

use std::collections::{BTreeMap, BTreeSet};

use regio_model::{
    CoverageSpec, Diagnostic, DiagnosticKind, Diagnostics, HarmonizedObservation, Period,
    ReferenceTotal, RegionCode,
};
use serde::Serialize;
use tracing::{info, warn};

/// Harmonized vs. reference total for one period (or one anchor code).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalComparison {
    pub period: Period,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<RegionCode>,
    /// `None` when no harmonized row exists for the key.
    pub harmonized: Option<f64>,
    pub reference: f64,
    pub absolute: f64,
    /// `None` when the reference is zero.
    pub relative: Option<f64>,
    pub within_tolerance: bool,
}

impl TotalComparison {
    fn new(
        period: Period,
        code: Option<RegionCode>,
        harmonized: Option<f64>,
        reference: f64,
        tolerance: f64,
    ) -> Self {
        let absolute = (harmonized.unwrap_or(0.0) - reference).abs();
        let relative = (reference != 0.0).then_some(absolute / reference.abs());
        let within_tolerance = harmonized.is_some()
            && match relative {
                Some(relative) => relative <= tolerance,
                None => absolute == 0.0,
            };
        Self {
            period,
            code,
            harmonized,
            reference,
            absolute,
            relative,
            within_tolerance,
        }
    }
}

/// Share of harmonized rows whose anchor code is valid on the anchor date.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnchorCoverage {
    pub rows: usize,
    pub known_rows: usize,
    pub unknown_codes: BTreeSet<RegionCode>,
}

impl AnchorCoverage {
    pub fn share(&self) -> f64 {
        if self.rows == 0 {
            1.0
        } else {
            self.known_rows as f64 / self.rows as f64
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub measure: String,
    pub relative_tolerance: f64,
    pub periods: Vec<TotalComparison>,
    pub codes: Vec<TotalComparison>,
    #[serde(skip)]
    pub diagnostics: Diagnostics,
}

impl CoverageReport {
    pub fn mismatches(&self) -> usize {
        self.periods
            .iter()
            .chain(&self.codes)
            .filter(|comparison| !comparison.within_tolerance)
            .count()
    }

    /// Largest relative discrepancy over all compared periods.
    pub fn worst_relative(&self) -> Option<f64> {
        self.periods
            .iter()
            .filter_map(|comparison| comparison.relative)
            .reduce(f64::max)
    }
}

fn mismatch(spec: &CoverageSpec, comparison: &TotalComparison) -> Diagnostic {
    let target = match &comparison.code {
        Some(code) => format!("{} in {}", code, comparison.period),
        None => comparison.period.to_string(),
    };
    let message = match comparison.harmonized {
        Some(harmonized) => format!(
            "`{}` for {target}: harmonized {harmonized} vs reference {} (relative {})",
            spec.measure,
            comparison.reference,
            comparison
                .relative
                .map_or_else(|| "n/a".to_string(), |relative| format!("{relative:.5}")),
        ),
        None => format!(
            "`{}` for {target}: no harmonized data for reference total {}",
            spec.measure, comparison.reference
        ),
    };
    warn!("{message}");
    let mut diagnostic = Diagnostic::warning(DiagnosticKind::CoverageMismatch, message)
        .with_period(comparison.period)
        .with_magnitude(comparison.absolute);
    if let Some(code) = &comparison.code {
        diagnostic = diagnostic.with_code(code.clone());
    }
    diagnostic
}

/// Compare harmonized totals with reference totals.
///
/// Reference rows without a code are national totals per period; rows with a
/// code are compared against the matching anchor code.
pub fn check(
    rows: &[HarmonizedObservation],
    reference: &[ReferenceTotal],
    spec: &CoverageSpec,
) -> CoverageReport {
    let mut harmonized_by_period: BTreeMap<Period, f64> = BTreeMap::new();
    let mut harmonized_by_code: BTreeMap<(Period, &RegionCode), f64> = BTreeMap::new();
    for row in rows {
        let Some(value) = row.value(&spec.measure) else {
            continue;
        };
        *harmonized_by_period.entry(row.period).or_insert(0.0) += value;
        *harmonized_by_code
            .entry((row.period, &row.anchor_code))
            .or_insert(0.0) += value;
    }

    let mut reference_by_period: BTreeMap<Period, f64> = BTreeMap::new();
    let mut reference_by_code: BTreeMap<(Period, &RegionCode), f64> = BTreeMap::new();
    for total in reference {
        match &total.code {
            Some(code) => {
                *reference_by_code
                    .entry((total.period, code))
                    .or_insert(0.0) += total.value;
            }
            None => *reference_by_period.entry(total.period).or_insert(0.0) += total.value,
        }
    }

    let tolerance = spec.relative_tolerance;
    let periods: Vec<TotalComparison> = reference_by_period
        .into_iter()
        .map(|(period, value)| {
            let harmonized = harmonized_by_period.get(&period).copied();
            TotalComparison::new(period, None, harmonized, value, tolerance)
        })
        .collect();
    let codes: Vec<TotalComparison> = reference_by_code
        .into_iter()
        .map(|((period, code), value)| {
            let harmonized = harmonized_by_code.get(&(period, code)).copied();
            TotalComparison::new(period, Some(code.clone()), harmonized, value, tolerance)
        })
        .collect();

    let mut diagnostics = Diagnostics::new();
    for comparison in periods.iter().chain(&codes) {
        if !comparison.within_tolerance {
            diagnostics.push(mismatch(spec, comparison));
        }
    }
    let report = CoverageReport {
        measure: spec.measure.clone(),
        relative_tolerance: tolerance,
        periods,
        codes,
        diagnostics,
    };
    info!(
        measure = %report.measure,
        periods = report.periods.len(),
        codes = report.codes.len(),
        mismatches = report.mismatches(),
        "checked coverage"
    );
    report
}

/// Check that every harmonized row lands on a code valid on the anchor date.
pub fn check_anchor_codes(
    rows: &[HarmonizedObservation],
    anchor_codes: &BTreeSet<RegionCode>,
) -> (AnchorCoverage, Diagnostics) {
    let mut coverage = AnchorCoverage {
        rows: rows.len(),
        known_rows: 0,
        unknown_codes: BTreeSet::new(),
    };
    for row in rows {
        if anchor_codes.contains(&row.anchor_code) {
            coverage.known_rows += 1;
        } else {
            coverage.unknown_codes.insert(row.anchor_code.clone());
        }
    }
    let mut diagnostics = Diagnostics::new();
    for code in &coverage.unknown_codes {
        let message = format!("harmonized code {code} is not in the anchor code list");
        warn!(%code, "{message}");
        diagnostics.push(
            Diagnostic::warning(DiagnosticKind::UnknownAnchorCode, message).with_code(code.clone()),
        );
    }
    (coverage, diagnostics)
}
