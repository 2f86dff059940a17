//! Loading and ordering of the change-event registry.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use regio_model::{
    ChangeEvent, CodeFormat, HarmonizeError, RawEventRow, RegionCode, Result, parse_date,
};
use tracing::{debug, info};

/// The validated, deduplicated and ordered change-event list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeEventStore {
    events: Vec<ChangeEvent>,
    duplicates_removed: usize,
}

/// How the changes of one effective date are shaped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeShape {
    pub date: NaiveDate,
    pub events: usize,
    /// Number of source codes per successor count (1 = rename or merge,
    /// 2+ = split).
    pub sources_by_successors: BTreeMap<usize, usize>,
    /// Number of target codes per predecessor count (2+ = merge).
    pub targets_by_predecessors: BTreeMap<usize, usize>,
}

impl ChangeShape {
    /// Source codes with more than one successor on this date.
    pub fn splits(&self) -> usize {
        self.sources_by_successors
            .iter()
            .filter(|(successors, _)| **successors > 1)
            .map(|(_, count)| count)
            .sum()
    }

    /// Target codes with more than one predecessor on this date.
    pub fn merges(&self) -> usize {
        self.targets_by_predecessors
            .iter()
            .filter(|(predecessors, _)| **predecessors > 1)
            .map(|(_, count)| count)
            .sum()
    }
}

fn parse_row(row: &RawEventRow, format: &CodeFormat) -> Result<ChangeEvent> {
    let malformed = |reason: String| HarmonizeError::MalformedEvent {
        row: row.row,
        reason,
    };
    let from = format
        .normalize(&row.old_code)
        .map_err(|_| malformed(format!("empty or invalid old code {:?}", row.old_code)))?;
    let to = format
        .normalize(&row.new_code)
        .map_err(|_| malformed(format!("empty or invalid new code {:?}", row.new_code)))?;
    let date = parse_date(&row.change_date)
        .map_err(|_| malformed(format!("unparsable date {:?}", row.change_date)))?;
    if from == to {
        return Err(malformed(format!("self-loop on {from}")));
    }
    ChangeEvent::new(from, to, date)
}

impl ChangeEventStore {
    /// Parse, normalize, deduplicate and order raw registry rows.
    ///
    /// Duplicates are exact `(from, to, date)` repeats; the same edge on two
    /// dates is kept as two events.
    pub fn load<'a>(
        rows: impl IntoIterator<Item = &'a RawEventRow>,
        format: &CodeFormat,
    ) -> Result<Self> {
        let mut unique = BTreeSet::new();
        let mut total = 0usize;
        for row in rows {
            total += 1;
            unique.insert(parse_row(row, format)?);
        }
        let store = Self {
            duplicates_removed: total - unique.len(),
            events: unique.into_iter().collect(),
        };
        info!(
            events = store.events.len(),
            duplicates_removed = store.duplicates_removed,
            dates = store.dates().len(),
            "loaded change events"
        );
        Ok(store)
    }

    /// Build a store from already validated events.
    pub fn from_events(events: impl IntoIterator<Item = ChangeEvent>) -> Self {
        let mut unique = BTreeSet::new();
        let mut total = 0usize;
        for event in events {
            total += 1;
            unique.insert(event);
        }
        Self {
            duplicates_removed: total - unique.len(),
            events: unique.into_iter().collect(),
        }
    }

    /// Events in replay order: date, then source code, then target code.
    pub fn events(&self) -> &[ChangeEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn duplicates_removed(&self) -> usize {
        self.duplicates_removed
    }

    /// Distinct effective dates, ascending.
    pub fn dates(&self) -> Vec<NaiveDate> {
        let mut dates: Vec<NaiveDate> = self
            .events
            .iter()
            .map(ChangeEvent::effective_date)
            .collect();
        dates.dedup();
        dates
    }

    /// Per-date counts of one-to-one, split and merge changes.
    pub fn change_shapes(&self) -> Vec<ChangeShape> {
        change_shapes(&self.events)
    }
}

/// Per-date change shapes for an ordered event list.
pub fn change_shapes(events: &[ChangeEvent]) -> Vec<ChangeShape> {
    let mut shapes = Vec::new();
    for batch in events.chunk_by(|a, b| a.effective_date() == b.effective_date()) {
        let mut successors: BTreeMap<&RegionCode, usize> = BTreeMap::new();
        let mut predecessors: BTreeMap<&RegionCode, usize> = BTreeMap::new();
        for event in batch {
            *successors.entry(event.from_code()).or_insert(0) += 1;
            *predecessors.entry(event.to_code()).or_insert(0) += 1;
        }
        let histogram = |counts: BTreeMap<&RegionCode, usize>| {
            let mut histogram = BTreeMap::new();
            for count in counts.into_values() {
                *histogram.entry(count).or_insert(0) += 1;
            }
            histogram
        };
        let shape = ChangeShape {
            date: batch[0].effective_date(),
            events: batch.len(),
            sources_by_successors: histogram(successors),
            targets_by_predecessors: histogram(predecessors),
        };
        debug!(
            date = %shape.date,
            events = shape.events,
            splits = shape.splits(),
            merges = shape.merges(),
            "change shape"
        );
        shapes.push(shape);
    }
    shapes
}
