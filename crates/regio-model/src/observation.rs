use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Period, RegionCode};

/// One source row as reported for its period.
///
/// A measure missing from `measures` was not reported (a `.` or `:` marker
/// in the source table); it is not a zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawObservation {
    pub region_code: RegionCode,
    pub period: Period,
    pub dimensions: BTreeMap<String, String>,
    pub measures: BTreeMap<String, f64>,
}

impl RawObservation {
    pub fn new(region_code: RegionCode, period: Period) -> Self {
        Self {
            region_code,
            period,
            dimensions: BTreeMap::new(),
            measures: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_dimension(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_measure(mut self, name: impl Into<String>, value: f64) -> Self {
        self.measures.insert(name.into(), value);
        self
    }

    pub fn measure(&self, name: &str) -> Option<f64> {
        self.measures.get(name).copied()
    }

    pub fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions.get(name).map(String::as_str)
    }

    /// Sum of all reported measures.
    pub fn total(&self) -> f64 {
        self.measures.values().sum()
    }
}

/// An independently published total used for coverage checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceTotal {
    pub period: Period,
    /// Anchor code the total refers to; `None` for a national total.
    pub code: Option<RegionCode>,
    pub value: f64,
}

/// An aggregated row expressed in the anchor geography.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HarmonizedObservation {
    pub anchor_code: RegionCode,
    pub period: Period,
    pub dimensions: BTreeMap<String, String>,
    pub measures: BTreeMap<String, f64>,
    /// Ratio measures; `None` when the denominator summed to zero.
    pub derived: BTreeMap<String, Option<f64>>,
}

impl HarmonizedObservation {
    pub fn measure(&self, name: &str) -> Option<f64> {
        self.measures.get(name).copied()
    }

    pub fn derived(&self, name: &str) -> Option<f64> {
        self.derived.get(name).copied().flatten()
    }

    /// Value of a summed or derived measure by name.
    pub fn value(&self, name: &str) -> Option<f64> {
        self.measure(name).or_else(|| self.derived(name))
    }
}
