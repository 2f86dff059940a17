//! CSV outputs: harmonized measure tables, the annotated change list and
//! code crosswalks.

use std::io::Write;
use std::path::{Path, PathBuf};

use csv::Writer;
use regio_aggregate::Aggregation;
use regio_core::{AnnotatedEvent, Crosswalk};
use regio_model::MeasureSpec;
use tracing::info;

use crate::error::{ReportError, Result};

pub const CHANGE_EVENTS_FILE: &str = "change_events.csv";

fn format_value(value: Option<f64>) -> String {
    value.map(|value| value.to_string()).unwrap_or_default()
}

/// Write one measure's harmonized rows.
///
/// Columns: `anchor_code`, `period`, the `group_by` dimensions, summed
/// measures, then derived measures. Missing values are empty cells.
pub fn write_measure_csv<W: Write>(
    writer: W,
    aggregation: &Aggregation,
    spec: &MeasureSpec,
) -> std::result::Result<(), csv::Error> {
    let mut csv = Writer::from_writer(writer);
    let measures = spec.output_measures();
    let mut header: Vec<&str> = vec!["anchor_code", "period"];
    header.extend(spec.group_by.iter().map(String::as_str));
    header.extend(measures.iter().copied());
    csv.write_record(&header)?;
    for row in &aggregation.rows {
        let mut record: Vec<String> = vec![row.anchor_code.to_string(), row.period.to_string()];
        record.extend(
            spec.group_by
                .iter()
                .map(|name| row.dimensions.get(name).cloned().unwrap_or_default()),
        );
        record.extend(measures.iter().map(|name| format_value(row.value(name))));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_measure_file(
    output_dir: &Path,
    aggregation: &Aggregation,
    spec: &MeasureSpec,
) -> Result<PathBuf> {
    let path = output_dir.join(format!("{}.csv", spec.name));
    let file = create(&path)?;
    write_measure_csv(file, aggregation, spec).map_err(|err| ReportError::csv(&path, err))?;
    info!(path = %path.display(), rows = aggregation.rows.len(), "wrote measure table");
    Ok(path)
}

/// Write every registry and injected event with the rule that touched it.
pub fn write_change_events_csv<W: Write>(
    writer: W,
    events: &[AnnotatedEvent],
) -> std::result::Result<(), csv::Error> {
    let mut csv = Writer::from_writer(writer);
    csv.write_record([
        "from_code",
        "to_code",
        "effective_date",
        "suppressed_by",
        "injected_by",
    ])?;
    for annotated in events {
        let event = &annotated.event;
        let date = event.effective_date().to_string();
        csv.write_record([
            event.from_code().as_str(),
            event.to_code().as_str(),
            date.as_str(),
            annotated.suppressed_by.as_deref().unwrap_or(""),
            annotated.injected_by.as_deref().unwrap_or(""),
        ])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_change_events_file(output_dir: &Path, events: &[AnnotatedEvent]) -> Result<PathBuf> {
    let path = output_dir.join(CHANGE_EVENTS_FILE);
    let file = create(&path)?;
    write_change_events_csv(file, events).map_err(|err| ReportError::csv(&path, err))?;
    info!(path = %path.display(), events = events.len(), "wrote change list");
    Ok(path)
}

pub fn write_crosswalk_csv<W: Write>(
    writer: W,
    crosswalk: &Crosswalk,
) -> std::result::Result<(), csv::Error> {
    let mut csv = Writer::from_writer(writer);
    csv.write_record(["code", "anchor_code"])?;
    for (code, anchor) in crosswalk.iter() {
        csv.write_record([code.as_str(), anchor.as_str()])?;
    }
    csv.flush()?;
    Ok(())
}

pub fn write_crosswalk_file(path: &Path, crosswalk: &Crosswalk) -> Result<PathBuf> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|err| ReportError::io(parent, err))?;
    }
    let file = create(path)?;
    write_crosswalk_csv(file, crosswalk).map_err(|err| ReportError::csv(path, err))?;
    info!(path = %path.display(), codes = crosswalk.len(), "wrote crosswalk");
    Ok(path.to_path_buf())
}

fn create(path: &Path) -> Result<std::fs::File> {
    std::fs::File::create(path).map_err(|err| ReportError::io(path, err))
}
