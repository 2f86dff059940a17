//! Results of a replay: the per-run anchor mapping and code crosswalks.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use regio_model::{Period, RegionCode, ReplayScope};

/// `(region_code, period) -> anchor_code` for every observed key.
///
/// Rebuilt from the change events on every run; never read from disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorMapping {
    anchor_date: NaiveDate,
    scope: ReplayScope,
    global: BTreeMap<RegionCode, RegionCode>,
    by_period: BTreeMap<Period, BTreeMap<RegionCode, RegionCode>>,
}

impl AnchorMapping {
    pub(crate) fn global(
        anchor_date: NaiveDate,
        entries: BTreeMap<RegionCode, RegionCode>,
    ) -> Self {
        Self {
            anchor_date,
            scope: ReplayScope::Global,
            global: entries,
            by_period: BTreeMap::new(),
        }
    }

    pub(crate) fn per_period(
        anchor_date: NaiveDate,
        by_period: BTreeMap<Period, BTreeMap<RegionCode, RegionCode>>,
    ) -> Self {
        Self {
            anchor_date,
            scope: ReplayScope::Period,
            global: BTreeMap::new(),
            by_period,
        }
    }

    pub fn anchor_date(&self) -> NaiveDate {
        self.anchor_date
    }

    pub fn scope(&self) -> ReplayScope {
        self.scope
    }

    /// Anchor code for an observed code; identity for keys never observed.
    pub fn resolve<'a>(&'a self, code: &'a RegionCode, period: Period) -> &'a RegionCode {
        let entries = match self.scope {
            ReplayScope::Global => Some(&self.global),
            ReplayScope::Period => self.by_period.get(&period),
        };
        entries.and_then(|map| map.get(code)).unwrap_or(code)
    }

    /// Number of mapped keys.
    pub fn len(&self) -> usize {
        self.global.len() + self.by_period.values().map(BTreeMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys whose anchor code differs from the observed code.
    pub fn changed(&self) -> usize {
        self.global
            .iter()
            .chain(self.by_period.values().flatten())
            .filter(|(code, anchor)| code != anchor)
            .count()
    }

    /// Distinct anchor codes over all mapped keys.
    pub fn anchor_codes(&self) -> BTreeSet<&RegionCode> {
        self.global
            .values()
            .chain(self.by_period.values().flat_map(BTreeMap::values))
            .collect()
    }
}

/// Codes valid on one date, expressed in the anchor geography.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crosswalk {
    pub valid_on: NaiveDate,
    pub anchor_date: NaiveDate,
    pairs: BTreeMap<RegionCode, RegionCode>,
}

impl Crosswalk {
    pub(crate) fn new(
        valid_on: NaiveDate,
        anchor_date: NaiveDate,
        pairs: BTreeMap<RegionCode, RegionCode>,
    ) -> Self {
        Self {
            valid_on,
            anchor_date,
            pairs,
        }
    }

    pub fn get(&self, code: &RegionCode) -> Option<&RegionCode> {
        self.pairs.get(code)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&RegionCode, &RegionCode)> {
        self.pairs.iter()
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Anchor codes reached by more than one source code.
    pub fn merged_targets(&self) -> BTreeMap<&RegionCode, Vec<&RegionCode>> {
        let mut sources: BTreeMap<&RegionCode, Vec<&RegionCode>> = BTreeMap::new();
        for (source, target) in &self.pairs {
            sources.entry(target).or_default().push(source);
        }
        sources.retain(|_, codes| codes.len() > 1);
        sources
    }
}
