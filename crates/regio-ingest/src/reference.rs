use std::path::Path;

use regio_model::{CodeFormat, CoverageSpec, Period, ReferenceTotal};

use crate::csv_table::{is_missing, read_csv_table};
use crate::error::{IngestError, Result};

/// Read published reference totals for a coverage check.
///
/// Rows whose value is empty or one of `missing_markers` are skipped; they
/// carry no reference to compare against.
pub fn read_reference_totals(
    path: &Path,
    spec: &CoverageSpec,
    format: &CodeFormat,
    missing_markers: &[String],
) -> Result<Vec<ReferenceTotal>> {
    let table = read_csv_table(path)?;
    let period_idx = table.column(&spec.period_column)?;
    let value_idx = table.column(&spec.value_column)?;
    let code_idx = spec
        .code_column
        .as_deref()
        .map(|column| table.column(column))
        .transpose()?;
    let mut totals = Vec::with_capacity(table.rows.len());
    for row in &table.rows {
        let raw_value = row.get(value_idx);
        if is_missing(raw_value, missing_markers) {
            continue;
        }
        let period = row.get(period_idx).parse::<Period>().map_err(|err| {
            IngestError::invalid(path, row.line, &spec.period_column, err.to_string())
        })?;
        let value = table.number(raw_value).ok_or_else(|| {
            IngestError::invalid(
                path,
                row.line,
                &spec.value_column,
                format!("not a number: {raw_value:?}"),
            )
        })?;
        let code = match code_idx {
            Some(idx) => Some(format.normalize(row.get(idx)).map_err(|err| {
                IngestError::invalid(path, row.line, &table.headers[idx], err.to_string())
            })?),
            None => None,
        };
        totals.push(ReferenceTotal {
            period,
            code,
            value,
        });
    }
    Ok(totals)
}
