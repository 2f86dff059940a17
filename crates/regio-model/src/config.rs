//! Run configuration.
//!
//! A harmonization run is described by one TOML document: the anchor date,
//! the change-event source, the override table and one `[[measures]]` entry
//! per observation table. Dates are written as quoted ISO strings.

use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::{CodeFormat, HarmonizeError, OverrideKind, OverrideRule};

/// Which change events apply to an observation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplayScope {
    /// Every observed code is replayed through all events, whatever its period.
    #[default]
    Global,
    /// Only events between the observation's period and the anchor date apply.
    Period,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HarmonizeConfig {
    pub anchor_date: NaiveDate,
    #[serde(default)]
    pub scope: ReplayScope,
    /// Treat a suppression that matches nothing as a fatal error.
    #[serde(default)]
    pub strict_overrides: bool,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub codes: CodeFormat,
    pub sources: Sources,
    #[serde(default)]
    pub overrides: Vec<OverrideRule>,
    #[serde(default)]
    pub measures: Vec<MeasureSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sources {
    /// Change-event table (`oldCode,newCode,changeOccurred`).
    pub events: PathBuf,
    /// Codes valid on the anchor date, used for the anchor coverage check.
    #[serde(default)]
    pub anchor_codes: Option<PathBuf>,
}

/// Physical layout of an observation table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ObservationLayout {
    /// One column per measure.
    #[default]
    Wide,
    /// One row per measure, named in `measure_column`, valued in `value_column`.
    Long {
        measure_column: String,
        value_column: String,
    },
}

/// A measure computed from separately summed components.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DerivedMeasure {
    /// `sum(numerator) / sum(denominator)`.
    Ratio {
        name: String,
        numerator: String,
        denominator: String,
    },
    /// `sum(value * weight) / sum(weight)`, e.g. mean household income.
    WeightedMean {
        name: String,
        value: String,
        weight: String,
    },
}

impl DerivedMeasure {
    pub fn name(&self) -> &str {
        match self {
            Self::Ratio { name, .. } | Self::WeightedMean { name, .. } => name,
        }
    }

    pub fn inputs(&self) -> [&str; 2] {
        match self {
            Self::Ratio {
                numerator,
                denominator,
                ..
            } => [numerator, denominator],
            Self::WeightedMean { value, weight, .. } => [value, weight],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CoverageSpec {
    /// Harmonized measure compared against the reference.
    pub measure: String,
    /// Reference table with independently published totals.
    pub reference: PathBuf,
    #[serde(default = "default_reference_period_column")]
    pub period_column: String,
    #[serde(default = "default_reference_value_column")]
    pub value_column: String,
    /// When set, the reference holds totals per anchor code, not per period.
    #[serde(default)]
    pub code_column: Option<String>,
    #[serde(default = "default_relative_tolerance")]
    pub relative_tolerance: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MeasureSpec {
    pub name: String,
    pub input: PathBuf,
    #[serde(default)]
    pub layout: ObservationLayout,
    #[serde(default = "default_code_column")]
    pub code_column: String,
    #[serde(default = "default_period_column")]
    pub period_column: String,
    /// Header (and long-layout measure label) renames applied at ingest.
    #[serde(default)]
    pub rename: BTreeMap<String, String>,
    /// Measures read from the table, after renames.
    pub measures: Vec<String>,
    #[serde(default)]
    pub dimensions: Vec<String>,
    /// Dimensions kept in the output; the others are summed over.
    #[serde(default)]
    pub group_by: Vec<String>,
    /// Measures summed into the output. Defaults to `measures` when neither
    /// `sum` nor `derived` is given.
    #[serde(default)]
    pub sum: Vec<String>,
    #[serde(default)]
    pub derived: Vec<DerivedMeasure>,
    /// Keep only rows whose dimension value is listed.
    #[serde(default)]
    pub filters: BTreeMap<String, Vec<String>>,
    /// Dimension value recodes, e.g. `Alder = { "105+" = "105" }`.
    #[serde(default)]
    pub recode: BTreeMap<String, BTreeMap<String, String>>,
    #[serde(default = "default_missing_markers")]
    pub missing_markers: Vec<String>,
    /// Drop `(period, code)` groups whose measures sum to zero.
    #[serde(default = "default_true")]
    pub drop_zero_totals: bool,
    #[serde(default)]
    pub coverage: Option<CoverageSpec>,
}

impl MeasureSpec {
    pub fn summed_measures(&self) -> &[String] {
        if self.sum.is_empty() && self.derived.is_empty() {
            &self.measures
        } else {
            &self.sum
        }
    }

    /// Names of every output measure, summed then derived.
    pub fn output_measures(&self) -> Vec<&str> {
        self.summed_measures()
            .iter()
            .map(String::as_str)
            .chain(self.derived.iter().map(DerivedMeasure::name))
            .collect()
    }

    pub fn validate(&self) -> Result<(), HarmonizeError> {
        let invalid = |message: String| {
            Err(HarmonizeError::InvalidConfig(format!(
                "measure `{}`: {message}",
                self.name
            )))
        };
        if self.measures.is_empty() {
            return invalid("no measures listed".to_string());
        }
        let known: BTreeSet<&str> = self.measures.iter().map(String::as_str).collect();
        for name in &self.sum {
            if !known.contains(name.as_str()) {
                return invalid(format!("summed measure `{name}` is not read from the input"));
            }
        }
        for derived in &self.derived {
            for input in derived.inputs() {
                if !known.contains(input) {
                    return invalid(format!(
                        "derived measure `{}` uses unknown measure `{input}`",
                        derived.name()
                    ));
                }
            }
        }
        let dimensions: BTreeSet<&str> = self.dimensions.iter().map(String::as_str).collect();
        for key in self.group_by.iter().chain(self.filters.keys()) {
            if !dimensions.contains(key.as_str()) {
                return invalid(format!("`{key}` is not a listed dimension"));
            }
        }
        let outputs = self.output_measures();
        let mut seen = BTreeSet::new();
        for name in &outputs {
            if !seen.insert(*name) {
                return invalid(format!("output measure `{name}` is defined twice"));
            }
        }
        if let Some(coverage) = &self.coverage {
            // Derived values do not add up across codes.
            if !self.summed_measures().contains(&coverage.measure) {
                return invalid(format!(
                    "coverage measure `{}` is not a summed measure",
                    coverage.measure
                ));
            }
            if !(coverage.relative_tolerance >= 0.0) {
                return invalid("relative_tolerance must be non-negative".to_string());
            }
        }
        Ok(())
    }
}

impl HarmonizeConfig {
    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), HarmonizeError> {
        let mut names = BTreeSet::new();
        for rule in &self.overrides {
            if !names.insert(rule.name.as_str()) {
                return Err(HarmonizeError::InvalidConfig(format!(
                    "override `{}` is defined twice",
                    rule.name
                )));
            }
            if rule.kind == OverrideKind::Inject && rule.effective_date.is_none() {
                return Err(HarmonizeError::InvalidConfig(format!(
                    "injection `{}` needs an effective_date",
                    rule.name
                )));
            }
            if rule.justification.trim().is_empty() {
                return Err(HarmonizeError::InvalidConfig(format!(
                    "override `{}` has no justification",
                    rule.name
                )));
            }
        }
        let mut measures = BTreeSet::new();
        for measure in &self.measures {
            if !measures.insert(measure.name.as_str()) {
                return Err(HarmonizeError::InvalidConfig(format!(
                    "measure `{}` is defined twice",
                    measure.name
                )));
            }
            measure.validate()?;
        }
        Ok(())
    }

    /// Override rules with the run's code normalization applied.
    pub fn normalized_overrides(&self) -> Vec<OverrideRule> {
        self.overrides
            .iter()
            .cloned()
            .map(|rule| rule.normalized(&self.codes))
            .collect()
    }

    pub fn measure(&self, name: &str) -> Option<&MeasureSpec> {
        self.measures.iter().find(|measure| measure.name == name)
    }
}

fn default_code_column() -> String {
    "Region".to_string()
}

fn default_period_column() -> String {
    "Tid".to_string()
}

fn default_reference_period_column() -> String {
    "period".to_string()
}

fn default_reference_value_column() -> String {
    "value".to_string()
}

fn default_relative_tolerance() -> f64 {
    0.001
}

fn default_missing_markers() -> Vec<String> {
    [".", "..", ":", "-"].into_iter().map(String::from).collect()
}

fn default_true() -> bool {
    true
}
