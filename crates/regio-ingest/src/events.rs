use std::path::Path;

use regio_model::RawEventRow;
use tracing::debug;

use crate::csv_table::read_csv_table;
use crate::error::Result;

const OLD_CODE_ALIASES: &[&str] = &["oldCode", "old_code", "from_code"];
const NEW_CODE_ALIASES: &[&str] = &["newCode", "new_code", "to_code"];
const DATE_ALIASES: &[&str] = &["changeOccurred", "change_date", "effective_date"];

/// Read the registry's change list.
///
/// Accepts the Klass export header (`oldCode,newCode,changeOccurred`) and
/// the snake-case aliases; other columns (names, notes) are ignored. Values
/// are returned unparsed so the event store can report row-level errors.
pub fn read_change_events(path: &Path) -> Result<Vec<RawEventRow>> {
    let table = read_csv_table(path)?;
    let old_idx = table
        .find_column(OLD_CODE_ALIASES)
        .ok_or_else(|| table.missing_column(OLD_CODE_ALIASES[0]))?;
    let new_idx = table
        .find_column(NEW_CODE_ALIASES)
        .ok_or_else(|| table.missing_column(NEW_CODE_ALIASES[0]))?;
    let date_idx = table
        .find_column(DATE_ALIASES)
        .ok_or_else(|| table.missing_column(DATE_ALIASES[0]))?;
    let rows: Vec<RawEventRow> = table
        .rows
        .iter()
        .map(|row| RawEventRow {
            row: row.line,
            old_code: row.get(old_idx).to_string(),
            new_code: row.get(new_idx).to_string(),
            change_date: row.get(date_idx).to_string(),
        })
        .collect();
    debug!(path = %path.display(), rows = rows.len(), "read change events");
    Ok(rows)
}
