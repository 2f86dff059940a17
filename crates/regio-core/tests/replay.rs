//! Replay scenarios and properties over the change-event pipeline.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use proptest::prelude::*;
use regio_core::{
    ChangeEventStore, ChangeGraph, OverrideRuleSet, ReplayPhase, TemporalReplayer, WorkingMap,
};
use regio_model::{
    ChangeEvent, DiagnosticKind, HarmonizeError, OverrideRule, Period, RegionCode, ReplayScope,
};

fn date(raw: &str) -> NaiveDate {
    regio_model::parse_date(raw).expect("valid date")
}

fn code(raw: u32) -> RegionCode {
    RegionCode::from(raw)
}

fn event(from: u32, to: u32, on: &str) -> ChangeEvent {
    ChangeEvent::new(code(from), code(to), date(on)).expect("valid event")
}

fn store(events: Vec<ChangeEvent>) -> ChangeEventStore {
    ChangeEventStore::from_events(events)
}

fn map_codes(
    events: &[ChangeEvent],
    anchor: &str,
    codes: &[u32],
) -> std::collections::BTreeMap<RegionCode, RegionCode> {
    let replayer = TemporalReplayer::new(events, date(anchor)).expect("replayer");
    let mut map = WorkingMap::identity(codes.iter().copied().map(code));
    replayer.forward(&mut map, None).expect("forward");
    replayer.backward(&mut map, None).expect("backward");
    map.into_entries()
}

#[test]
fn chain_composes_forward() {
    let events = store(vec![event(1, 2, "2000-01-01"), event(2, 3, "2010-01-01")]);
    let mapped = map_codes(events.events(), "2020-01-01", &[1, 2, 3]);
    assert_eq!(mapped[&code(1)], code(3));
    assert_eq!(mapped[&code(2)], code(3));
    assert_eq!(mapped[&code(3)], code(3));
}

#[test]
fn anchor_between_events_stops_the_chain() {
    let events = store(vec![event(1, 2, "2000-01-01"), event(2, 3, "2010-01-01")]);
    let mapped = map_codes(events.events(), "2005-01-01", &[1, 3]);
    assert_eq!(mapped[&code(1)], code(2));
    // 3 did not exist on the anchor date; it is mapped back to its predecessor.
    assert_eq!(mapped[&code(3)], code(2));
}

#[test]
fn event_on_anchor_date_applies_forward() {
    let events = store(vec![event(1534, 1580, "2024-01-01")]);
    let mapped = map_codes(events.events(), "2024-01-01", &[1534]);
    assert_eq!(mapped[&code(1534)], code(1580));
}

#[test]
fn backward_replay_undoes_later_change() {
    let events = store(vec![event(10, 20, "2024-01-01")]);
    let mapped = map_codes(events.events(), "2020-01-01", &[10, 20]);
    assert_eq!(mapped[&code(20)], code(10));
    assert_eq!(mapped[&code(10)], code(10));
}

#[test]
fn same_date_batch_does_not_chain() {
    // Both events share a date: 1 becomes 2, but not 3 in the same step.
    let events = store(vec![event(1, 2, "2020-01-01"), event(2, 3, "2020-01-01")]);
    let mapped = map_codes(events.events(), "2020-01-01", &[1, 2]);
    assert_eq!(mapped[&code(1)], code(2));
    assert_eq!(mapped[&code(2)], code(3));
}

#[test]
fn unknown_code_keeps_identity() {
    let events = store(vec![event(1, 2, "2000-01-01")]);
    let mapped = map_codes(events.events(), "2020-01-01", &[301]);
    assert_eq!(mapped[&code(301)], code(301));
}

#[test]
fn split_with_override_selects_documented_successor() {
    let raw = store(vec![
        event(5012, 5056, "2020-01-01"),
        event(5012, 5055, "2020-01-01"),
        event(5012, 5059, "2020-01-01"),
    ]);
    let rules = vec![
        OverrideRule::suppress("snillfjord-hitra", code(5012), code(5056), "Only Fillan moved."),
        OverrideRule::suppress("snillfjord-heim", code(5012), code(5055), "Only Vennastranda moved."),
    ];
    let outcome = OverrideRuleSet::new(rules).apply(raw.events()).expect("overrides");
    let mapped = map_codes(outcome.events(), "2020-01-01", &[5012]);
    assert_eq!(mapped[&code(5012)], code(5059));

    let closure = ChangeGraph::new(raw.events()).closure([code(5012)]);
    let expected: BTreeSet<RegionCode> = [5012, 5055, 5056, 5059].into_iter().map(code).collect();
    assert_eq!(closure, expected);
}

#[test]
fn unresolved_split_picks_smallest_and_warns() {
    let events = store(vec![
        event(5012, 5056, "2020-01-01"),
        event(5012, 5055, "2020-01-01"),
        event(5012, 5059, "2020-01-01"),
    ]);
    let replayer = TemporalReplayer::new(events.events(), date("2020-01-01")).expect("replayer");
    let (mapping, report) = replayer
        .build_mapping([(code(5012), Period::Year(2019))], ReplayScope::Global)
        .expect("mapping");
    assert_eq!(mapping.resolve(&code(5012), Period::Year(2019)), &code(5055));
    assert_eq!(report.ambiguities.len(), 1);
    assert_eq!(report.ambiguities[0].candidates.len(), 3);
    assert_eq!(
        report
            .diagnostics
            .of_kind(DiagnosticKind::AmbiguousSuccessor)
            .count(),
        1
    );
}

#[test]
fn suppression_removes_edge_from_replay_and_closure() {
    let raw = store(vec![
        event(114, 105, "1992-01-01"),
        event(114, 128, "1992-01-01"),
        event(128, 3024, "2020-01-01"),
    ]);
    let rules = vec![OverrideRule::suppress(
        "varteig-no-rakkestad",
        code(114),
        code(128),
        "Only a handful of residents moved to 128.",
    )];
    let outcome = OverrideRuleSet::new(rules).apply(raw.events()).expect("overrides");
    let mapped = map_codes(outcome.events(), "2024-01-01", &[114]);
    assert_eq!(mapped[&code(114)], code(105));

    let closure = ChangeGraph::new(outcome.events()).closure([code(114)]);
    assert!(!closure.contains(&code(128)));
    assert!(closure.contains(&code(105)));
}

#[test]
fn haram_reinjection_maps_to_new_code() {
    let raw = store(vec![
        event(1534, 1507, "2020-01-01"),
        event(1507, 1580, "2024-01-01"),
        event(1507, 1508, "2024-01-01"),
    ]);
    let rules = vec![
        OverrideRule::suppress("haram-merge", code(1534), code(1507), "Haram split out again."),
        OverrideRule::suppress("haram-split", code(1507), code(1580), "Haram split out again."),
        OverrideRule::inject(
            "haram-direct",
            code(1534),
            code(1580),
            date("2024-01-01"),
            "Haram 1534 continues as 1580.",
        ),
    ];
    let outcome = OverrideRuleSet::new(rules).apply(raw.events()).expect("overrides");
    let replayer = TemporalReplayer::new(outcome.events(), date("2024-01-01")).expect("replayer");
    let (mapping, _) = replayer
        .build_mapping([(code(1534), Period::Year(2022))], ReplayScope::Global)
        .expect("mapping");
    assert_eq!(mapping.resolve(&code(1534), Period::Year(2022)), &code(1580));
}

#[test]
fn temporal_cycle_is_rejected() {
    let events = store(vec![
        event(1, 2, "2000-01-01"),
        event(2, 1, "2010-01-01"),
    ]);
    let err = TemporalReplayer::new(events.events(), date("2020-01-01")).unwrap_err();
    match err {
        HarmonizeError::CyclicChange { path } => {
            assert_eq!(path, vec![code(1), code(2), code(1)]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn replay_order_is_enforced() {
    let events = store(vec![event(1, 2, "2000-01-01")]);
    let replayer = TemporalReplayer::new(events.events(), date("2020-01-01")).expect("replayer");

    let mut map = WorkingMap::identity([code(1)]);
    replayer.backward(&mut map, None).expect("backward");
    assert_eq!(map.phase(), ReplayPhase::Backward);
    assert!(matches!(
        replayer.forward(&mut map, None),
        Err(HarmonizeError::ReplayOrder(_))
    ));
    assert!(matches!(
        replayer.backward(&mut map, None),
        Err(HarmonizeError::ReplayOrder(_))
    ));

    let mut map = WorkingMap::identity([code(1)]);
    replayer.forward(&mut map, None).expect("forward");
    assert!(matches!(
        replayer.forward(&mut map, None),
        Err(HarmonizeError::ReplayOrder(_))
    ));
}

#[test]
fn unsorted_events_are_rejected() {
    let events = vec![event(1, 2, "2010-01-01"), event(3, 4, "2000-01-01")];
    assert!(matches!(
        TemporalReplayer::new(&events, date("2020-01-01")),
        Err(HarmonizeError::ReplayOrder(_))
    ));
}

#[test]
fn window_without_rewrites_warns() {
    let events = store(vec![event(1, 2, "2000-01-01")]);
    let replayer = TemporalReplayer::new(events.events(), date("2020-01-01")).expect("replayer");
    let (_, report) = replayer
        .build_mapping([(code(301), Period::Year(2020))], ReplayScope::Global)
        .expect("mapping");
    assert_eq!(
        report
            .diagnostics
            .of_kind(DiagnosticKind::NoReplayGrowth)
            .count(),
        1
    );
}

#[test]
fn stalled_period_windows_warn_once() {
    let events = store(vec![event(1, 2, "2000-01-01")]);
    let replayer = TemporalReplayer::new(events.events(), date("2020-01-01")).expect("replayer");
    let observed = (1995..=1997).map(|year| (code(301), Period::Year(year)));
    let (_, report) = replayer
        .build_mapping(observed, ReplayScope::Period)
        .expect("mapping");
    let stalled: Vec<_> = report
        .diagnostics
        .of_kind(DiagnosticKind::NoReplayGrowth)
        .collect();
    assert_eq!(stalled.len(), 1);
    assert_eq!(stalled[0].count, Some(3));
    assert_eq!(stalled[0].period, Some(Period::Year(1995)));
    assert!(stalled[0].message.contains("3 periods (1995 to 1997)"), "{}", stalled[0].message);
}

#[test]
fn period_scope_respects_code_reuse() {
    // Code 2 is retired in 2000 and reused for a new area in 2010.
    let events = store(vec![
        event(2, 5, "2000-01-01"),
        event(1, 2, "2010-01-01"),
    ]);
    let replayer = TemporalReplayer::new(events.events(), date("2020-01-01")).expect("replayer");
    let observed = [
        (code(2), Period::Year(1995)),
        (code(2), Period::Year(2015)),
        (code(1), Period::Year(2005)),
    ];
    let (mapping, report) = replayer
        .build_mapping(observed, ReplayScope::Period)
        .expect("mapping");
    assert_eq!(report.anchor_codes, 2);
    assert_eq!(mapping.resolve(&code(2), Period::Year(1995)), &code(5));
    assert_eq!(mapping.resolve(&code(2), Period::Year(2015)), &code(2));
    assert_eq!(mapping.resolve(&code(1), Period::Year(2005)), &code(2));
    // Keys never observed fall back to identity.
    assert_eq!(mapping.resolve(&code(7), Period::Year(2005)), &code(7));
}

#[test]
fn crosswalk_maps_newer_codes_back_to_anchor() {
    let events = store(vec![
        event(1507, 1508, "2024-01-01"),
        event(1534, 1580, "2024-01-01"),
    ]);
    let replayer = TemporalReplayer::new(events.events(), date("2020-01-01")).expect("replayer");
    let codes: BTreeSet<RegionCode> = [1508, 1580, 301].into_iter().map(code).collect();
    let (crosswalk, report) = replayer
        .crosswalk(&codes, date("2024-01-01"))
        .expect("crosswalk");
    assert_eq!(crosswalk.get(&code(1508)), Some(&code(1507)));
    assert_eq!(crosswalk.get(&code(1580)), Some(&code(1534)));
    assert_eq!(crosswalk.get(&code(301)), Some(&code(301)));
    assert_eq!(report.changed_keys, 2);
    assert_eq!(report.anchor_codes, 3);
    assert!(crosswalk.merged_targets().is_empty());
}

// Chains of renames and merges without code reuse: every target is a fresh
// code larger than anything used before, dated after everything before.
fn merge_chains() -> impl Strategy<Value = (Vec<ChangeEvent>, Vec<u32>)> {
    prop::collection::vec((0usize..8, 0usize..8), 1..12).prop_map(|steps| {
        let mut live: Vec<u32> = (1..=8).collect();
        let mut next_code = 100u32;
        let mut events = Vec::new();
        let base = date("1990-01-01");
        for (year, (a, b)) in steps.into_iter().enumerate() {
            let on = base + chrono::Months::new(12 * year as u32);
            let first = live[a % live.len()];
            let second = live[b % live.len()];
            let target = next_code;
            next_code += 1;
            for source in BTreeSet::from([first, second]) {
                events.push(ChangeEvent::new(code(source), code(target), on).expect("event"));
                live.retain(|live_code| *live_code != source);
            }
            live.push(target);
        }
        events.sort();
        (events, (1..next_code.min(200)).filter(|c| *c <= 8 || *c >= 100).collect())
    })
}

proptest! {
    #[test]
    fn mapping_is_idempotent((events, codes) in merge_chains()) {
        let mapped = map_codes(&events, "2030-01-01", &codes);
        let anchors: Vec<u32> = mapped
            .values()
            .map(|anchor| anchor.as_str().parse().expect("numeric code"))
            .collect();
        let remapped = map_codes(&events, "2030-01-01", &anchors);
        for anchor in mapped.values() {
            prop_assert_eq!(&remapped[anchor], anchor);
        }
    }

    #[test]
    fn merges_conserve_totals(
        (events, codes) in merge_chains(),
        values in prop::collection::vec(0u32..1000, 120)
    ) {
        let mapped = map_codes(&events, "2030-01-01", &codes);
        let graph = ChangeGraph::new(&events);
        for component in graph.components() {
            let anchors: BTreeSet<&RegionCode> =
                component.iter().filter_map(|member| mapped.get(member)).collect();
            prop_assert_eq!(anchors.len(), 1);
            let anchor = anchors.into_iter().next().expect("one anchor");
            let pre: u64 = component
                .iter()
                .map(|member| u64::from(values[value_slot(member)]))
                .sum();
            let post: u64 = mapped
                .iter()
                .filter(|(_, target)| *target == anchor)
                .map(|(member, _)| u64::from(values[value_slot(member)]))
                .sum();
            prop_assert_eq!(pre, post);
        }
    }

    #[test]
    fn backward_inverts_single_later_change(from in 1u32..50, to in 50u32..100) {
        let events = vec![event(from, to, "2024-01-01")];
        let mapped = map_codes(&events, "2020-01-01", &[from, to]);
        prop_assert_eq!(&mapped[&code(to)], &code(from));
        let forward_then_back = map_codes(&events, "2020-01-01", &[from]);
        prop_assert_eq!(&forward_then_back[&code(from)], &code(from));
    }
}

fn value_slot(code: &RegionCode) -> usize {
    let raw: usize = code.as_str().parse().expect("numeric code");
    raw % 120
}
