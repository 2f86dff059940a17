//! Tests for regio-model types.

use regio_model::{
    DerivedMeasure, Diagnostic, DiagnosticKind, Diagnostics, HarmonizeConfig, HarmonizeError,
    ObservationLayout, OverrideKind, Period, RegionCode, ReplayScope, parse_date,
};

const CONFIG: &str = r#"
anchor_date = "2024-01-01"
scope = "period"

[sources]
events = "data/change_events.csv"
anchor_codes = "data/municipalities_2024.csv"

[[overrides]]
name = "oslo-no-baerum"
kind = "suppress"
from = 114
to = 128
justification = "Small boundary adjustment; population stays with 114."

[[overrides]]
name = "haram-return"
kind = "inject"
from = "1534"
to = "1580"
effective_date = "2024-01-01"
justification = "Haram re-established from Ålesund on 2024-01-01."

[[measures]]
name = "income"
input = "data/income.csv"
measures = ["households", "income_mean"]
dimensions = ["HusholdType"]
group_by = ["HusholdType"]
sum = ["households"]

[[measures.derived]]
kind = "weighted_mean"
name = "income_mean"
value = "income_mean"
weight = "households"

[[measures]]
name = "population"
input = "data/population.csv"
layout = { kind = "long", measure_column = "ContentsCode", value_column = "value" }
measures = ["persons"]
dimensions = ["Alder"]
recode = { Alder = { "105+" = "105" } }

[measures.coverage]
measure = "persons"
reference = "data/national_totals.csv"
relative_tolerance = 0.0005
"#;

fn parse(raw: &str) -> HarmonizeConfig {
    toml::from_str(raw).expect("parse config")
}

#[test]
fn config_parses_with_defaults() {
    let config = parse(CONFIG);
    assert_eq!(config.anchor_date, parse_date("2024-01-01").unwrap());
    assert_eq!(config.scope, ReplayScope::Period);
    assert!(!config.strict_overrides);
    assert!(config.codes.numeric);
    assert_eq!(config.overrides.len(), 2);
    assert_eq!(config.overrides[0].kind, OverrideKind::Suppress);
    assert_eq!(config.overrides[0].from, RegionCode::from(114u32));
    assert_eq!(config.overrides[0].effective_date, None);
    assert_eq!(
        config.overrides[1].effective_date,
        Some(parse_date("2024-01-01").unwrap())
    );

    let income = config.measure("income").expect("income measure");
    assert_eq!(income.layout, ObservationLayout::Wide);
    assert_eq!(income.code_column, "Region");
    assert_eq!(income.period_column, "Tid");
    assert!(income.drop_zero_totals);
    assert_eq!(income.missing_markers, vec![".", "..", ":", "-"]);
    assert_eq!(income.output_measures(), vec!["households", "income_mean"]);

    let population = config.measure("population").expect("population measure");
    assert_eq!(
        population.layout,
        ObservationLayout::Long {
            measure_column: "ContentsCode".to_string(),
            value_column: "value".to_string(),
        }
    );
    assert_eq!(population.summed_measures(), ["persons".to_string()]);
    assert_eq!(population.recode["Alder"]["105+"], "105");
    let coverage = population.coverage.as_ref().expect("coverage");
    assert_eq!(coverage.period_column, "period");
    assert_eq!(coverage.value_column, "value");
    assert!(coverage.code_column.is_none());

    config.validate().expect("valid config");
}

#[test]
fn config_rejects_unknown_fields() {
    let raw = CONFIG.replace("scope = \"period\"", "scoop = \"period\"");
    assert!(toml::from_str::<HarmonizeConfig>(&raw).is_err());
}

#[test]
fn injection_without_date_is_invalid() {
    let raw = CONFIG.replace("effective_date = \"2024-01-01\"\n", "");
    let err = parse(&raw).validate().unwrap_err();
    assert!(matches!(err, HarmonizeError::InvalidConfig(message) if message.contains("haram-return")));
}

#[test]
fn duplicate_override_names_are_invalid() {
    let raw = CONFIG.replace("name = \"haram-return\"", "name = \"oslo-no-baerum\"");
    assert!(parse(&raw).validate().is_err());
}

#[test]
fn derived_measure_inputs_must_be_read() {
    let raw = CONFIG.replace("weight = \"households\"", "weight = \"persons\"");
    let err = parse(&raw).validate().unwrap_err();
    assert!(err.to_string().contains("unknown measure `persons`"));
}

#[test]
fn group_by_must_name_a_dimension() {
    let raw = CONFIG.replace("group_by = [\"HusholdType\"]", "group_by = [\"Kjonn\"]");
    assert!(parse(&raw).validate().is_err());
}

const EMPLOYMENT: &str = r#"
anchor_date = "2024-01-01"

[sources]
events = "events.csv"

[[measures]]
name = "employment"
input = "employment.csv"
measures = ["employed", "persons"]
sum = ["employed", "persons"]
derived = [{ kind = "ratio", name = "rate", numerator = "employed", denominator = "persons" }]

[measures.coverage]
measure = "rate"
reference = "national.csv"
"#;

#[test]
fn coverage_requires_a_summed_measure() {
    let err = parse(EMPLOYMENT).validate().unwrap_err();
    assert!(err.to_string().contains("`rate` is not a summed measure"), "{err}");

    let raw = EMPLOYMENT.replace("measure = \"rate\"", "measure = \"employed\"");
    assert!(parse(&raw).validate().is_ok());
}

#[test]
fn derived_measure_names() {
    let ratio = DerivedMeasure::Ratio {
        name: "share".to_string(),
        numerator: "a".to_string(),
        denominator: "b".to_string(),
    };
    assert_eq!(ratio.name(), "share");
    assert_eq!(ratio.inputs(), ["a", "b"]);
}

#[test]
fn diagnostics_count_by_severity() {
    let mut diagnostics = Diagnostics::new();
    diagnostics.push(
        Diagnostic::warning(DiagnosticKind::CoverageMismatch, "totals differ")
            .with_period(Period::Year(2020))
            .with_magnitude(12.0),
    );
    diagnostics.push(Diagnostic::info(DiagnosticKind::ComponentSplit, "split"));
    diagnostics.push(
        Diagnostic::warning(DiagnosticKind::UnknownAnchorCode, "unknown")
            .with_code(RegionCode::from(9999u32)),
    );
    assert_eq!(diagnostics.len(), 3);
    assert_eq!(diagnostics.warning_count(), 2);
    assert_eq!(diagnostics.info_count(), 1);
    assert!(diagnostics.has_warnings());
    assert_eq!(diagnostics.of_kind(DiagnosticKind::ComponentSplit).count(), 1);
    assert_eq!(
        diagnostics.counts_by_kind()[&DiagnosticKind::CoverageMismatch],
        1
    );
}

#[test]
fn diagnostic_serializes_without_empty_fields() {
    let diagnostic = Diagnostic::warning(DiagnosticKind::NoReplayGrowth, "no growth")
        .with_count(3);
    let json = serde_json::to_value(&diagnostic).expect("serialize diagnostic");
    assert_eq!(json["kind"], "no_replay_growth");
    assert_eq!(json["severity"], "warning");
    assert_eq!(json["count"], 3);
    assert!(json.get("code").is_none());
    assert!(json.get("period").is_none());
}

#[test]
fn cyclic_change_renders_path() {
    let err = HarmonizeError::CyclicChange {
        path: vec![1u32.into(), 2u32.into(), 1u32.into()],
    };
    assert_eq!(err.to_string(), "cyclic change chain: 1 -> 2 -> 1");
}

#[test]
fn period_serializes_as_label() {
    let json = serde_json::to_string(&Period::Quarter { year: 2021, quarter: 3 }).unwrap();
    assert_eq!(json, "\"2021Q3\"");
    let back: Period = serde_json::from_str("\"2021K3\"").unwrap();
    assert_eq!(back, Period::Quarter { year: 2021, quarter: 3 });
}
