//! End-to-end runs of the harmonization pipeline on small input sets.

use std::fs;
use std::path::{Path, PathBuf};

use regio_cli::pipeline::{harmonize, load_run_config, prepare_events};
use regio_cli::types::RunOptions;
use regio_model::{DiagnosticKind, ReplayScope};
use tempfile::TempDir;

const EVENTS: &str = "\
oldCode,newCode,changeOccurred
1534,1507,2020-01-01
1001,1002,2020-01-01
1507,1580,2024-01-01
1507,1508,2024-01-01
";

const POPULATION: &str = "\
Region;Tid;persons
0301;2019;700000
1001;2019;100
1002;2019;200
1534;2019;9000
1534;2022;9100
1507;2022;60000
0;2022;738300
";

const ANCHOR_CODES: &str = "\
code
0301
1002
1508
1580
";

fn config(strict: bool) -> String {
    format!(
        r#"
anchor_date = "2024-01-01"
strict_overrides = {strict}

[codes]
numeric = true
width = 4

[sources]
events = "events.csv"
anchor_codes = "anchor_codes.csv"

[[overrides]]
name = "haram-merge"
kind = "suppress"
from = 1534
to = 1507
justification = "Haram was merged into Ålesund in 2020 and split out again in 2024."

[[overrides]]
name = "haram-split"
kind = "suppress"
from = 1507
to = 1580
justification = "Haram was merged into Ålesund in 2020 and split out again in 2024."

[[overrides]]
name = "haram-direct"
kind = "inject"
from = 1534
to = 1580
effective_date = "2024-01-01"
justification = "Haram continues as 1580."

[[measures]]
name = "population"
input = "population.csv"
measures = ["persons"]

[measures.coverage]
measure = "persons"
reference = "reference.csv"
"#
    )
}

fn setup(reference_2022: u32, strict: bool) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let write = |name: &str, contents: &str| fs::write(dir.path().join(name), contents).unwrap();
    write("events.csv", EVENTS);
    write("population.csv", POPULATION);
    write("anchor_codes.csv", ANCHOR_CODES);
    write(
        "reference.csv",
        &format!("period,value\n2019,709300\n2022,{reference_2022}\n"),
    );
    let config_path = dir.path().join("harmonize.toml");
    write("harmonize.toml", &config(strict));
    (dir, config_path)
}

fn read(path: &Path) -> String {
    fs::read_to_string(path).unwrap()
}

#[test]
fn harmonize_writes_every_output() {
    let (dir, config_path) = setup(69_100, false);
    let result = harmonize(&RunOptions::new(&config_path)).unwrap();

    assert_eq!(result.output_dir, dir.path().join("output"));
    assert!(!result.has_warnings(), "{:?}", result.diagnostics);
    insta::assert_snapshot!(read(&result.output_dir.join("population.csv")), @r"
    anchor_code,period,persons
    1002,2019,300
    1580,2019,9000
    301,2019,700000
    1508,2022,60000
    1580,2022,9100
    ");

    let change_list = read(result.change_events.as_ref().unwrap());
    assert!(change_list.contains("1534,1507,2020-01-01,haram-merge,"));
    assert!(change_list.contains("1534,1580,2024-01-01,,haram-direct"));

    let report: serde_json::Value =
        serde_json::from_str(&read(result.run_report.as_ref().unwrap())).unwrap();
    assert_eq!(report["events"]["registry"], 4);
    assert_eq!(report["events"]["replayed"], 3);
    assert_eq!(report["measures"][0]["input_rows"], 6);
    assert_eq!(report["measures"][0]["coverage"]["periods"][1]["within_tolerance"], true);
    assert_eq!(report["measures"][0]["anchor_coverage"]["share"], 1.0);

    let splits: Vec<_> = result
        .diagnostics
        .of_kind(DiagnosticKind::ComponentSplit)
        .collect();
    assert_eq!(splits.len(), 1);
    assert!(splits[0].message.contains("{1534, 1580}"));
}

#[test]
fn dry_run_writes_nothing() {
    let (dir, config_path) = setup(69_100, false);
    let options = RunOptions {
        dry_run: true,
        scope: Some(ReplayScope::Period),
        ..RunOptions::new(&config_path)
    };
    let result = harmonize(&options).unwrap();

    assert!(result.dry_run);
    assert!(result.run_report.is_none());
    assert!(!dir.path().join("output").exists());
    assert_eq!(result.report.scope, ReplayScope::Period);
    assert_eq!(result.report.measures[0].output_rows, 5);
}

#[test]
fn coverage_mismatch_is_a_warning() {
    let (_dir, config_path) = setup(70_000, false);
    let options = RunOptions {
        dry_run: true,
        ..RunOptions::new(&config_path)
    };
    let result = harmonize(&options).unwrap();

    assert!(result.has_warnings());
    let mismatches: Vec<_> = result
        .diagnostics
        .of_kind(DiagnosticKind::CoverageMismatch)
        .collect();
    assert_eq!(mismatches.len(), 1);
}

#[test]
fn strict_mode_rejects_stale_suppression() {
    let (dir, config_path) = setup(69_100, true);
    let stale = "\
oldCode,newCode,changeOccurred
1001,1002,2020-01-01
1507,1580,2024-01-01
";
    fs::write(dir.path().join("events.csv"), stale).unwrap();

    let error = harmonize(&RunOptions::new(&config_path)).unwrap_err();
    let message = format!("{error:#}");
    assert!(message.contains("apply overrides"), "{message}");
    assert!(message.contains("haram-merge"), "{message}");
}

#[test]
fn cli_overrides_replace_config_values() {
    let (dir, config_path) = setup(69_100, false);
    let elsewhere = dir.path().join("elsewhere");
    let options = RunOptions {
        anchor_date: regio_model::parse_date("2019-06-01").ok(),
        output_dir: Some(elsewhere.clone()),
        ..RunOptions::new(&config_path)
    };
    let config = load_run_config(&options).unwrap();
    assert_eq!(config.anchor_date.to_string(), "2019-06-01");
    assert_eq!(config.output_dir, Some(elsewhere));

    let events = prepare_events(&config).unwrap();
    assert_eq!(events.store.len(), 4);
    assert_eq!(events.outcome.suppressed().len(), 2);
    assert_eq!(events.outcome.injected().len(), 1);
}
