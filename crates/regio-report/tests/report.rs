//! Tests for the run outputs.

use regio_aggregate::aggregate;
use regio_core::{ChangeEventStore, OverrideRuleSet, TemporalReplayer};
use regio_model::{
    ChangeEvent, MeasureSpec, OverrideRule, Period, RawObservation, RegionCode, ReplayScope,
};
use regio_report::{
    MeasureSummary, RunReport, input_fingerprint, write_change_events_csv,
    write_change_events_file, write_crosswalk_csv, write_measure_csv, write_run_report,
};

fn code(raw: u32) -> RegionCode {
    RegionCode::from(raw)
}

fn date(raw: &str) -> chrono::NaiveDate {
    regio_model::parse_date(raw).unwrap()
}

fn event(from: u32, to: u32, on: &str) -> ChangeEvent {
    ChangeEvent::new(code(from), code(to), date(on)).unwrap()
}

fn haram() -> (ChangeEventStore, Vec<OverrideRule>) {
    let store = ChangeEventStore::from_events(vec![
        event(1534, 1507, "2020-01-01"),
        event(1507, 1580, "2024-01-01"),
        event(1507, 1508, "2024-01-01"),
    ]);
    let rules = vec![
        OverrideRule::suppress("haram-merge", code(1534), code(1507), "Haram split out."),
        OverrideRule::suppress("haram-split", code(1507), code(1580), "Haram split out."),
        OverrideRule::inject(
            "haram-direct",
            code(1534),
            code(1580),
            date("2024-01-01"),
            "Haram continues as 1580.",
        ),
    ];
    (store, rules)
}

fn to_string(bytes: Vec<u8>) -> String {
    String::from_utf8(bytes).expect("utf-8 output")
}

#[test]
fn change_list_is_annotated() {
    let (store, rules) = haram();
    let outcome = OverrideRuleSet::new(rules).apply(store.events()).unwrap();
    let mut buffer = Vec::new();
    write_change_events_csv(&mut buffer, &outcome.annotated(store.events())).unwrap();
    insta::assert_snapshot!(to_string(buffer), @r"
    from_code,to_code,effective_date,suppressed_by,injected_by
    1534,1507,2020-01-01,haram-merge,
    1507,1508,2024-01-01,,
    1507,1580,2024-01-01,haram-split,
    1534,1580,2024-01-01,,haram-direct
    ");
}

#[test]
fn measure_table_lists_group_dimensions_and_derived_values() {
    let observations = vec![
        RawObservation::new(code(1534), Period::Year(2022))
            .with_dimension("HusholdType", "0")
            .with_measure("households", 3000.0)
            .with_measure("income_mean", 500_000.0),
        RawObservation::new(code(301), Period::Year(2022))
            .with_dimension("HusholdType", "0")
            .with_measure("households", 1000.0)
            .with_measure("income_mean", 612_500.5),
    ];
    let (store, rules) = haram();
    let outcome = OverrideRuleSet::new(rules).apply(store.events()).unwrap();
    let replayer = TemporalReplayer::new(outcome.events(), date("2024-01-01")).unwrap();
    let keys = observations
        .iter()
        .map(|observation| (observation.region_code.clone(), observation.period));
    let (mapping, _) = replayer.build_mapping(keys, ReplayScope::Global).unwrap();
    let spec: MeasureSpec = toml::from_str(
        r#"
name = "income"
input = "income.csv"
measures = ["households", "income_mean"]
dimensions = ["HusholdType"]
group_by = ["HusholdType"]
sum = ["households"]
derived = [{ kind = "weighted_mean", name = "income_mean", value = "income_mean", weight = "households" }]
"#,
    )
    .unwrap();
    let aggregation = aggregate(&observations, &mapping, &spec).unwrap();
    let mut buffer = Vec::new();
    write_measure_csv(&mut buffer, &aggregation, &spec).unwrap();
    insta::assert_snapshot!(to_string(buffer), @r"
    anchor_code,period,HusholdType,households,income_mean
    1580,2022,0,3000,500000
    301,2022,0,1000,612500.5
    ");
}

#[test]
fn crosswalk_has_two_columns() {
    let store = ChangeEventStore::from_events(vec![event(1507, 1508, "2024-01-01")]);
    let replayer = TemporalReplayer::new(store.events(), date("2020-01-01")).unwrap();
    let codes = [code(1508), code(301)].into_iter().collect();
    let (crosswalk, _) = replayer.crosswalk(&codes, date("2024-01-01")).unwrap();
    let mut buffer = Vec::new();
    write_crosswalk_csv(&mut buffer, &crosswalk).unwrap();
    insta::assert_snapshot!(to_string(buffer), @r"
    code,anchor_code
    1508,1507
    301,301
    ");
}

#[test]
fn fingerprint_tracks_events_and_rules() {
    let (store, rules) = haram();
    let first = input_fingerprint(store.events(), &rules);
    assert_eq!(first.len(), 64);
    assert_eq!(first, input_fingerprint(store.events(), &rules));
    assert_ne!(first, input_fingerprint(store.events(), &rules[..2]));
    assert_ne!(first, input_fingerprint(&store.events()[1..], &rules));
}

#[test]
fn run_report_is_written_as_json() {
    let (store, rules) = haram();
    let outcome = OverrideRuleSet::new(rules.clone())
        .apply(store.events())
        .unwrap();
    let replayer = TemporalReplayer::new(outcome.events(), date("2024-01-01")).unwrap();
    let observations = vec![
        RawObservation::new(code(1534), Period::Year(2022)).with_measure("persons", 9000.0),
    ];
    let keys = observations
        .iter()
        .map(|observation| (observation.region_code.clone(), observation.period));
    let (mapping, replay) = replayer.build_mapping(keys, ReplayScope::Global).unwrap();
    let spec: MeasureSpec =
        toml::from_str("name = \"population\"\ninput = \"p.csv\"\nmeasures = [\"persons\"]\n")
            .unwrap();
    let aggregation = aggregate(&observations, &mapping, &spec).unwrap();

    let mut report = RunReport::new(&store, &outcome, &rules, &replay, date("2024-01-01"));
    report.push_measure(MeasureSummary::new(&aggregation));
    report.set_diagnostics(outcome.diagnostics());

    let dir = tempfile::tempdir().unwrap();
    let path = write_run_report(dir.path(), &report).unwrap();
    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["schema"], "regio.run-report");
    assert_eq!(json["anchor_date"], "2024-01-01");
    assert_eq!(json["scope"], "global");
    assert_eq!(json["events"]["registry"], 3);
    assert_eq!(json["events"]["suppressed"], 2);
    assert_eq!(json["events"]["injected"], 1);
    assert_eq!(json["events"]["replayed"], 2);
    assert_eq!(json["overrides"].as_array().unwrap().len(), 3);
    assert_eq!(json["overrides"][2]["kind"], "inject");
    assert_eq!(json["replay"]["changed_keys"], 1);
    assert_eq!(json["replay"]["anchor_codes"], 1);
    assert_eq!(json["measures"][0]["name"], "population");
    assert_eq!(json["measures"][0]["output_rows"], 1);
    assert_eq!(json["diagnostics"]["warnings"], 0);

    let path = write_change_events_file(dir.path(), &outcome.annotated(store.events())).unwrap();
    assert!(path.ends_with("change_events.csv"));
}
