use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::Path;

use regio_model::{
    CodeFormat, MeasureSpec, ObservationLayout, Period, RawObservation, RegionCode,
};
use tracing::{debug, info};

use crate::csv_table::{CsvRow, CsvTable, is_missing, read_csv_table};
use crate::error::{IngestError, Result};

/// Observations read from one measure's input table.
#[derive(Debug, Clone, Default)]
pub struct ObservationTable {
    pub observations: Vec<RawObservation>,
    /// Rows whose code did not have the configured width.
    pub skipped_rows: usize,
    /// Cells holding a missing-value marker.
    pub missing_values: usize,
}

struct Columns {
    code: usize,
    period: usize,
    dimensions: Vec<(String, usize)>,
}

struct RowReader<'a> {
    path: &'a Path,
    table: &'a CsvTable,
    spec: &'a MeasureSpec,
    format: &'a CodeFormat,
    columns: Columns,
}

impl RowReader<'_> {
    /// Code and period of a row, or `None` when the code is filtered out.
    fn key(&self, row: &CsvRow) -> Result<Option<(RegionCode, Period)>> {
        let raw_code = row.get(self.columns.code);
        if !self.format.accepts_width(raw_code) {
            return Ok(None);
        }
        let code = self.format.normalize(raw_code).map_err(|err| {
            IngestError::invalid(self.path, row.line, &self.spec.code_column, err.to_string())
        })?;
        let period = row.get(self.columns.period).parse::<Period>().map_err(|err| {
            IngestError::invalid(self.path, row.line, &self.spec.period_column, err.to_string())
        })?;
        Ok(Some((code, period)))
    }

    fn dimensions(&self, row: &CsvRow) -> BTreeMap<String, String> {
        self.columns
            .dimensions
            .iter()
            .map(|(name, idx)| (name.clone(), row.get(*idx).to_string()))
            .collect()
    }

    /// Parse a measure cell; `None` for a missing-value marker.
    fn value(&self, row: &CsvRow, idx: usize) -> Result<Option<f64>> {
        let raw = row.get(idx);
        if is_missing(raw, &self.spec.missing_markers) {
            return Ok(None);
        }
        let parsed = self.table.number(raw).ok_or_else(|| {
            IngestError::invalid(
                self.path,
                row.line,
                &self.table.headers[idx],
                format!("not a number: {raw:?}"),
            )
        })?;
        Ok(Some(parsed))
    }
}

fn renamed(spec: &MeasureSpec, name: &str) -> String {
    spec.rename
        .get(name)
        .cloned()
        .unwrap_or_else(|| name.to_string())
}

/// Read one measure's observation table.
///
/// Headers (and, for the long layout, measure labels) are renamed first;
/// all other lookups use the renamed names. Rows whose region code does not
/// have the configured width are aggregates and are skipped.
pub fn read_observations(
    path: &Path,
    spec: &MeasureSpec,
    format: &CodeFormat,
) -> Result<ObservationTable> {
    let mut table = read_csv_table(path)?;
    table.headers = table
        .headers
        .iter()
        .map(|header| renamed(spec, header))
        .collect();
    let columns = Columns {
        code: table.column(&spec.code_column)?,
        period: table.column(&spec.period_column)?,
        dimensions: spec
            .dimensions
            .iter()
            .map(|name| Ok((name.clone(), table.column(name)?)))
            .collect::<Result<_>>()?,
    };
    let reader = RowReader {
        path,
        table: &table,
        spec,
        format,
        columns,
    };
    let result = match &spec.layout {
        ObservationLayout::Wide => read_wide(&reader)?,
        ObservationLayout::Long {
            measure_column,
            value_column,
        } => read_long(&reader, measure_column, value_column)?,
    };
    info!(
        measure = %spec.name,
        path = %path.display(),
        observations = result.observations.len(),
        skipped_rows = result.skipped_rows,
        missing_values = result.missing_values,
        "read observations"
    );
    Ok(result)
}

fn read_wide(reader: &RowReader<'_>) -> Result<ObservationTable> {
    let measure_columns: Vec<(String, usize)> = reader
        .spec
        .measures
        .iter()
        .map(|name| Ok((name.clone(), reader.table.column(name)?)))
        .collect::<Result<_>>()?;
    let mut result = ObservationTable::default();
    for row in &reader.table.rows {
        let Some((code, period)) = reader.key(row)? else {
            result.skipped_rows += 1;
            continue;
        };
        let mut observation = RawObservation::new(code, period);
        observation.dimensions = reader.dimensions(row);
        for (name, idx) in &measure_columns {
            match reader.value(row, *idx)? {
                Some(value) => {
                    observation.measures.insert(name.clone(), value);
                }
                None => result.missing_values += 1,
            }
        }
        result.observations.push(observation);
    }
    Ok(result)
}

type PivotKey = (RegionCode, Period, BTreeMap<String, String>);

// One output observation per (code, period, dimensions), one measure per row.
fn read_long(
    reader: &RowReader<'_>,
    measure_column: &str,
    value_column: &str,
) -> Result<ObservationTable> {
    let table = reader.table;
    let measure_idx = table.column(measure_column)?;
    let value_idx = table.column(value_column)?;
    let mut pivot: BTreeMap<PivotKey, RawObservation> = BTreeMap::new();
    let mut result = ObservationTable::default();
    let mut ignored_labels = 0usize;
    for row in &table.rows {
        let Some((code, period)) = reader.key(row)? else {
            result.skipped_rows += 1;
            continue;
        };
        let label = renamed(reader.spec, row.get(measure_idx));
        if !reader.spec.measures.contains(&label) {
            ignored_labels += 1;
            continue;
        }
        let dimensions = reader.dimensions(row);
        let observation = pivot
            .entry((code.clone(), period, dimensions.clone()))
            .or_insert_with(|| RawObservation {
                dimensions,
                ..RawObservation::new(code, period)
            });
        let Some(value) = reader.value(row, value_idx)? else {
            result.missing_values += 1;
            continue;
        };
        match observation.measures.entry(label) {
            Entry::Vacant(slot) => {
                slot.insert(value);
            }
            Entry::Occupied(slot) => {
                return Err(IngestError::invalid(
                    reader.path,
                    row.line,
                    measure_column,
                    format!("duplicate value for measure `{}`", slot.key()),
                ));
            }
        }
    }
    if ignored_labels > 0 {
        debug!(rows = ignored_labels, "ignored rows for unlisted measures");
    }
    result.observations = pivot.into_values().collect();
    Ok(result)
}
