//! Connectivity over the change-event list.
//!
//! The undirected view answers "which codes are entangled with these ones"
//! (closure, components). The directed, dated view is used to reject
//! temporal cycles before any replay.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use regio_model::{ChangeEvent, Diagnostic, DiagnosticKind, Diagnostics, RegionCode};
use tracing::debug;

#[derive(Debug, Clone, Default)]
pub struct ChangeGraph {
    neighbours: BTreeMap<RegionCode, BTreeSet<RegionCode>>,
    successors: BTreeMap<RegionCode, Vec<(NaiveDate, RegionCode)>>,
    events: Vec<ChangeEvent>,
}

impl ChangeGraph {
    pub fn new(events: &[ChangeEvent]) -> Self {
        let mut graph = Self {
            events: events.to_vec(),
            ..Self::default()
        };
        graph.events.sort();
        for event in &graph.events {
            let (from, to) = (event.from_code(), event.to_code());
            graph
                .neighbours
                .entry(from.clone())
                .or_default()
                .insert(to.clone());
            graph
                .neighbours
                .entry(to.clone())
                .or_default()
                .insert(from.clone());
            graph
                .successors
                .entry(from.clone())
                .or_default()
                .push((event.effective_date(), to.clone()));
        }
        graph
    }

    pub fn contains(&self, code: &RegionCode) -> bool {
        self.neighbours.contains_key(code)
    }

    /// Dated out-edges of a code, ascending by date.
    pub fn successors(&self, code: &RegionCode) -> &[(NaiveDate, RegionCode)] {
        self.successors.get(code).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every code connected to a seed through any chain of events, ignoring
    /// direction and date. Seeds are always part of the result.
    pub fn closure<I>(&self, seeds: I) -> BTreeSet<RegionCode>
    where
        I: IntoIterator<Item = RegionCode>,
    {
        let mut closure: BTreeSet<RegionCode> = seeds.into_iter().collect();
        let mut frontier = closure.clone();
        let mut rounds = 0usize;
        while !frontier.is_empty() {
            let mut next = BTreeSet::new();
            for code in &frontier {
                for neighbour in self.neighbours.get(code).into_iter().flatten() {
                    if !closure.contains(neighbour) {
                        next.insert(neighbour.clone());
                    }
                }
            }
            closure.extend(next.iter().cloned());
            frontier = next;
            rounds += 1;
        }
        debug!(size = closure.len(), rounds, "computed closure");
        closure
    }

    /// Connected components of the undirected view, ordered by their
    /// smallest code.
    pub fn components(&self) -> Vec<BTreeSet<RegionCode>> {
        let mut seen = BTreeSet::new();
        let mut components = Vec::new();
        for code in self.neighbours.keys() {
            if seen.contains(code) {
                continue;
            }
            let component = self.closure([code.clone()]);
            seen.extend(component.iter().cloned());
            components.push(component);
        }
        components
    }

    /// A code that leads back to itself through events with strictly
    /// increasing dates, as the path `[a, .., a]`.
    ///
    /// Same-date events form one simultaneous step, so a swap of two codes on
    /// one date is not a cycle.
    pub fn find_cycle(&self) -> Option<Vec<RegionCode>> {
        for source in self.successors.keys() {
            // Earliest date at which each code is reachable from `source`.
            let mut arrival: BTreeMap<&RegionCode, NaiveDate> = BTreeMap::new();
            let mut parent: BTreeMap<&RegionCode, &RegionCode> = BTreeMap::new();
            for event in &self.events {
                let (from, to) = (event.from_code(), event.to_code());
                let date = event.effective_date();
                let usable = from == source
                    || arrival.get(from).is_some_and(|reached| *reached < date);
                if !usable {
                    continue;
                }
                if to == source {
                    return Some(rebuild_path(source, from, &parent));
                }
                if !arrival.contains_key(to) {
                    arrival.insert(to, date);
                    parent.insert(to, from);
                }
            }
        }
        None
    }
}

fn rebuild_path(
    source: &RegionCode,
    last: &RegionCode,
    parent: &BTreeMap<&RegionCode, &RegionCode>,
) -> Vec<RegionCode> {
    let mut path = vec![source.clone()];
    let mut current = last;
    while current != source {
        path.push(current.clone());
        match parent.get(current) {
            Some(previous) => current = previous,
            None => break,
        }
    }
    path.push(source.clone());
    path.reverse();
    path
}

/// Report raw connected groups that the overrides split apart.
///
/// A split is expected for every documented override; the diagnostic lists
/// the resulting pieces so an unintended split is easy to spot.
pub fn component_splits(raw: &ChangeGraph, overridden: &ChangeGraph) -> Diagnostics {
    let mut diagnostics = Diagnostics::new();
    for component in raw.components() {
        let mut pieces: Vec<BTreeSet<RegionCode>> = Vec::new();
        for code in &component {
            if pieces.iter().any(|piece| piece.contains(code)) {
                continue;
            }
            let piece: BTreeSet<RegionCode> = overridden
                .closure([code.clone()])
                .into_iter()
                .filter(|member| component.contains(member))
                .collect();
            pieces.push(piece);
        }
        if pieces.len() < 2 {
            continue;
        }
        let rendered: Vec<String> = pieces
            .iter()
            .map(|piece| {
                let codes: Vec<&str> = piece.iter().map(RegionCode::as_str).collect();
                format!("{{{}}}", codes.join(", "))
            })
            .collect();
        let mut diagnostic = Diagnostic::info(
            DiagnosticKind::ComponentSplit,
            format!(
                "overrides split a connected group of {} codes into {}",
                component.len(),
                rendered.join(" ")
            ),
        )
        .with_count(pieces.len() as u64);
        if let Some(first) = component.first() {
            diagnostic = diagnostic.with_code(first.clone());
        }
        diagnostics.push(diagnostic);
    }
    diagnostics
}
